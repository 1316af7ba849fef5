use std::num::NonZeroU32;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use argh::FromArgs;
use perfsweep_core::reduce;
use perfsweep_core::runner::ServerLogLevel;

use crate::config::{
    ClientOverrides, ClusterOverrides, Config, Overrides, Runner, SweepOverrides,
};
use crate::{observability, report};

/// Parameter sweeps of storage cluster benchmarks.
///
/// Options given here override the configuration file and `PS__` environment variables. List
/// options take comma-separated values.
#[derive(Debug, FromArgs)]
struct Args {
    /// path to the YAML configuration file
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,

    /// numbers of storage servers
    #[argh(option, from_str_fn(u32_list))]
    servers: Option<Vec<u32>>,

    /// numbers of backup replicas per segment
    #[argh(option, from_str_fn(u32_list))]
    replicas: Option<Vec<u32>>,

    /// number of backup disks per server (0, 1 or 2)
    #[argh(option)]
    backup_disks: Option<u32>,

    /// do not colocate clients with servers
    #[argh(switch)]
    disjunct: bool,

    /// additional command line arguments for every master
    #[argh(option)]
    master_args: Option<String>,

    /// transport used to communicate with the servers
    #[argh(option, short = 't')]
    transport: Option<String>,

    /// abort a run after this many seconds
    #[argh(option)]
    timeout: Option<u64>,

    /// top level directory for server logs
    #[argh(option)]
    log_dir: Option<PathBuf>,

    /// server log level (DEBUG, NOTICE, WARNING, ERROR or SILENT)
    #[argh(option, from_str_fn(server_log_level))]
    log_level: Option<ServerLogLevel>,

    /// pause after starting the servers to allow attaching a debugger
    #[argh(switch)]
    debug: bool,

    /// let the cluster runner print progress messages
    #[argh(switch, short = 'v')]
    verbose: bool,

    /// path of the benchmark client binary
    #[argh(option)]
    binary: Option<PathBuf>,

    /// number of elements fetched by the LRANGE test
    #[argh(option)]
    lrange_len: Option<u64>,

    /// limit the run time of each client thread to this many seconds
    #[argh(option)]
    time_limit: Option<u64>,

    /// names of the tests to run
    #[argh(option, from_str_fn(string_list))]
    tests: Option<Vec<String>>,

    /// numbers of servers the workload is spread over
    #[argh(option, from_str_fn(u32_list))]
    server_span: Option<Vec<u32>>,

    /// value sizes in bytes
    #[argh(option, from_str_fn(u64_list))]
    value_size: Option<Vec<u64>>,

    /// sizes of the key space
    #[argh(option, from_str_fn(u64_list))]
    keyspace_len: Option<Vec<u64>>,

    /// numbers of concurrent clients
    #[argh(option, from_str_fn(client_list))]
    clients: Option<Vec<NonZeroU32>>,

    /// total operations per run, shared by all clients
    #[argh(option)]
    total_ops: Option<u64>,

    /// operations per client and run
    #[argh(option)]
    per_client_ops: Option<u64>,

    /// root directory of all results
    #[argh(option, short = 'o')]
    output_dir: Option<PathBuf>,

    /// log invocations instead of running them
    #[argh(switch)]
    dry_run: bool,

    #[argh(subcommand)]
    command: Command,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            output_dir: self.output_dir.clone(),
            cluster: ClusterOverrides {
                backup_disks: self.backup_disks,
                disjunct: self.disjunct.then_some(true),
                master_args: self.master_args.clone(),
                transport: self.transport.clone(),
                timeout: self.timeout.map(Duration::from_secs),
                debug: self.debug.then_some(true),
                log_dir: self.log_dir.clone(),
                log_level: self.log_level,
                verbose: self.verbose.then_some(true),
            },
            client: ClientOverrides {
                binary: self.binary.clone(),
                lrange_len: self.lrange_len,
                time_limit: self.time_limit.map(Duration::from_secs),
            },
            sweep: SweepOverrides {
                servers: self.servers.clone(),
                replicas: self.replicas.clone(),
                server_span: self.server_span.clone(),
                value_size: self.value_size.clone(),
                key_space_len: self.keyspace_len.clone(),
                tests: self.tests.clone(),
                clients: self.clients.clone(),
                total_ops: self.total_ops,
                per_client_ops: self.per_client_ops,
            },
            runner: self.dry_run.then_some(Runner::DryRun),
        }
    }
}

#[derive(Debug, FromArgs)]
#[argh(subcommand)]
enum Command {
    Run(RunCommand),
    Sweep(SweepCommand),
    Reduce(ReduceCommand),
    Version(VersionCommand),
}

/// run the sweep and reduce its results
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "run")]
struct RunCommand {}

/// run the sweep without reducing its results
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "sweep")]
struct SweepCommand {}

/// reduce the results of a previous sweep
///
/// The sweep dimensions must match the sweep that produced the results.
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "reduce")]
struct ReduceCommand {}

/// print the perfsweep version
#[derive(Default, Debug, FromArgs)]
#[argh(subcommand, name = "version")]
struct VersionCommand {}

fn split_list<T: FromStr>(value: &str) -> Result<Vec<T>, String>
where
    T::Err: std::fmt::Display,
{
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            item.parse()
                .map_err(|e| format!("invalid list item {item:?}: {e}"))
        })
        .collect()
}

fn u32_list(value: &str) -> Result<Vec<u32>, String> {
    split_list(value)
}

fn u64_list(value: &str) -> Result<Vec<u64>, String> {
    split_list(value)
}

fn client_list(value: &str) -> Result<Vec<NonZeroU32>, String> {
    split_list(value)
}

fn string_list(value: &str) -> Result<Vec<String>, String> {
    split_list(value)
}

fn server_log_level(value: &str) -> Result<ServerLogLevel, String> {
    match value.to_ascii_uppercase().as_str() {
        "DEBUG" => Ok(ServerLogLevel::Debug),
        "NOTICE" => Ok(ServerLogLevel::Notice),
        "WARNING" => Ok(ServerLogLevel::Warning),
        "ERROR" => Ok(ServerLogLevel::Error),
        "SILENT" => Ok(ServerLogLevel::Silent),
        _ => Err(format!("unknown server log level {value:?}")),
    }
}

/// Bootstrap the runtime and execute the CLI command.
///
/// Only configuration and setup errors are returned. Failed runs and incomplete results are
/// reported on stdout and do not fail the command.
pub fn execute() -> Result<()> {
    let args: Args = argh::from_env();

    // Special switch to just print the version and exit.
    if let Command::Version(_) = args.command {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = Config::load(args.config.as_deref(), &args.overrides())
        .context("failed to load configuration")?;

    observability::init_tracing(&config);
    tracing::debug!(?config);

    // Reduction only needs the sweep dimensions, not the operation target.
    if let Command::Reduce(ReduceCommand {}) = args.command {
        let space = config.space().context("invalid sweep configuration")?;
        let reduced = reduce::reduce(&space, &config.output_dir);
        report::print_reduce(&reduced);
        return Ok(());
    }

    let sweep = config.sweep().context("invalid sweep configuration")?;

    // Runs are strictly sequential, a single thread drives them.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let runner = config.runner();
    let swept = runtime.block_on(sweep.run(runner.as_ref()));
    report::print_sweep(&swept);

    if let Command::Run(RunCommand {}) = args.command {
        let reduced = reduce::reduce(sweep.space(), &config.output_dir);
        report::print_reduce(&reduced);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::from_args(&["perfsweep"], args).unwrap()
    }

    #[test]
    fn comma_separated_lists() {
        let args = parse(&[
            "--servers",
            "4, 8,16",
            "--tests",
            "get,set",
            "--clients",
            "1,2,4",
            "--keyspace-len",
            "1,1000",
            "run",
        ]);

        assert_eq!(args.servers, Some(vec![4, 8, 16]));
        assert_eq!(args.tests, Some(vec!["get".to_owned(), "set".to_owned()]));
        assert_eq!(args.keyspace_len, Some(vec![1, 1000]));
        assert_eq!(args.clients.as_deref().map(<[_]>::len), Some(3));
        assert!(matches!(args.command, Command::Run(_)));
    }

    #[test]
    fn invalid_list_items() {
        assert!(Args::from_args(&["perfsweep"], &["--clients", "1,0", "run"]).is_err());
        assert!(Args::from_args(&["perfsweep"], &["--servers", "4,x", "run"]).is_err());
    }

    #[test]
    fn switches_only_override_when_set() {
        let overrides = parse(&["sweep"]).overrides();
        assert_eq!(overrides.cluster.disjunct, None);
        assert_eq!(overrides.runner, None);

        let overrides = parse(&[
            "--disjunct",
            "--dry-run",
            "--log-level",
            "warning",
            "--timeout",
            "60",
            "sweep",
        ])
        .overrides();
        assert_eq!(overrides.cluster.disjunct, Some(true));
        assert_eq!(overrides.cluster.log_level, Some(ServerLogLevel::Warning));
        assert_eq!(overrides.cluster.timeout, Some(Duration::from_secs(60)));
        assert_eq!(overrides.runner, Some(Runner::DryRun));
    }

    #[test]
    fn reduce_does_not_need_an_ops_target() {
        figment::Jail::expect_with(|_jail| {
            let args = parse(&["--tests", "get", "--clients", "1,2", "reduce"]);
            let config = Config::load(None, &args.overrides()).unwrap();

            assert!(config.sweep().is_err());
            let space = config.space().unwrap();
            assert_eq!(space.len(), 2);

            let root = tempfile::tempdir().unwrap();
            let reduced = reduce::reduce(&space, root.path());
            assert!(reduced.tables.is_empty());
            assert_eq!(reduced.failures.len(), 2);

            Ok(())
        });
    }

    #[test]
    fn overrides_reach_the_sweep() {
        figment::Jail::expect_with(|_jail| {
            let args = parse(&[
                "--tests",
                "get",
                "--clients",
                "1,8",
                "--per-client-ops",
                "1000",
                "--time-limit",
                "5",
                "reduce",
            ]);
            let config = Config::load(None, &args.overrides()).unwrap();
            assert_eq!(config.client.time_limit, Some(Duration::from_secs(5)));

            let sweep = config.sweep().unwrap();
            assert_eq!(sweep.space().len(), 2);

            Ok(())
        });
    }
}
