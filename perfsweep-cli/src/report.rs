//! Human readable summaries printed after a sweep or reduction.

use perfsweep_core::SweepReport;
use perfsweep_core::reduce::ReduceReport;
use perfsweep_core::sweep::PointOutcome;
use yansi::Paint;

/// Prints the outcome of a sweep to stdout.
pub fn print_sweep(report: &SweepReport) {
    println!("{}", "## SWEEP".bold());

    for (point, outcome) in &report.outcomes {
        match outcome {
            PointOutcome::Completed => println!("{} {point}", "DONE:".bold().green()),
            PointOutcome::Skipped(violation) => {
                println!("{} {point}: {violation}", "SKIPPED:".bold().yellow())
            }
            PointOutcome::Failed(error) => {
                println!("{} {point}: {error}", "FAILED:".bold().red())
            }
        }
    }

    print!("{} completed", report.completed().bold());
    print!(", {} skipped", report.skipped().bold());
    let failed = report.failed();
    if failed > 0 {
        println!(", {}", format!("{failed} failed").bold().red());
    } else {
        println!(", {failed} failed");
    }
}

/// Prints the throughput tables and incomplete runs of a reduction to stdout.
pub fn print_reduce(report: &ReduceReport) {
    for reduced in &report.tables {
        println!(
            "{} {} ({})",
            "## THROUGHPUT".bold(),
            reduced.test.bold().blue(),
            reduced.dir.display()
        );
        for point in reduced.table.points() {
            println!(
                "  {:>4} clients: {:>12.2} operations/s",
                point.clients,
                point.ops_per_sec.bold()
            );
        }
    }

    if report.failures.is_empty() {
        return;
    }

    println!("{}", "## INCOMPLETE".bold().red());
    for failure in &report.failures {
        match failure.clients {
            Some(clients) => println!(
                "  {} clients={clients} ({}): {}",
                failure.test,
                failure.dir.display(),
                failure.error
            ),
            None => println!(
                "  {} ({}): {}",
                failure.test,
                failure.dir.display(),
                failure.error
            ),
        }
    }
}
