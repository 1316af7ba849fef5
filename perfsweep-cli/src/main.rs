use std::process::ExitCode;

fn main() -> ExitCode {
    match perfsweep_cli::cli::execute() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error:?}");
            ExitCode::FAILURE
        }
    }
}
