//! The seam to the external cluster runner.
//!
//! The cluster runner provisions servers and backups, starts the benchmark client processes and
//! waits for them to finish. This crate only describes *what* to run as an [`Invocation`]; a
//! [`ClusterRunner`] implementation decides *how*.

use std::fmt::{self, Debug};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::error::InvocationError;

/// A type-erased [`ClusterRunner`] instance.
pub type BoxedRunner = Box<dyn ClusterRunner>;

/// Executes one benchmark configuration on the cluster.
#[async_trait::async_trait]
pub trait ClusterRunner: Debug + Send + Sync {
    /// Runs the invocation and waits until all clients finished or the run timed out.
    async fn run(&self, invocation: &Invocation) -> Result<(), InvocationError>;
}

/// Log level of the storage servers.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ServerLogLevel {
    /// Everything, including debug output.
    Debug,
    /// Notable events.
    #[default]
    Notice,
    /// Warnings and errors.
    Warning,
    /// Errors only.
    Error,
    /// No logging at all.
    Silent,
}

impl ServerLogLevel {
    /// The name the cluster runner expects.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Notice => "NOTICE",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Silent => "SILENT",
        }
    }
}

impl fmt::Display for ServerLogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cluster settings shared by every run of a sweep.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ClusterOptions {
    /// Number of backup disks on each server host (0, 1 or 2).
    pub backup_disks: u32,
    /// Do not colocate clients with servers.
    pub disjunct: bool,
    /// Additional command line arguments for every master.
    pub master_args: Option<String>,
    /// Transport used to communicate with the servers.
    pub transport: String,
    /// Abort a run if the clients do not finish within this time.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Pause after starting the servers to allow attaching a debugger.
    pub debug: bool,
    /// Top level directory for server logs.
    pub log_dir: PathBuf,
    /// Log level of the servers.
    pub log_level: ServerLogLevel,
    /// Let the cluster runner print progress messages.
    pub verbose: bool,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            backup_disks: 2,
            disjunct: false,
            master_args: None,
            transport: "basic+infud".to_owned(),
            timeout: Duration::from_secs(30),
            debug: false,
            log_dir: PathBuf::from("logs"),
            log_level: ServerLogLevel::Notice,
            verbose: false,
        }
    }
}

/// Settings of the benchmark client shared by every run of a sweep.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientOptions {
    /// Path of the benchmark client binary on the client hosts.
    pub binary: PathBuf,
    /// Number of elements fetched by the LRANGE test.
    pub lrange_len: u64,
    /// Optional limit on the run time of each client thread.
    #[serde(with = "humantime_serde")]
    pub time_limit: Option<Duration>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("ramdis-benchmark"),
            lrange_len: 100,
            time_limit: None,
        }
    }
}

/// The benchmark client command line of one run.
#[derive(Clone, Debug, PartialEq)]
pub struct ClientCommand {
    /// Path of the benchmark client binary.
    pub binary: PathBuf,
    /// The test to execute.
    pub test: String,
    /// Size of written values in bytes.
    pub value_size: u64,
    /// Number of elements fetched by the LRANGE test.
    pub lrange_len: u64,
    /// Number of distinct keys to operate on.
    pub key_space_len: u64,
    /// Number of servers the workload is spread over.
    pub server_span: u32,
    /// Client threads per benchmark process.
    pub threads: u32,
    /// Requests per client thread.
    pub requests: u64,
    /// Optional limit on the run time of each client thread.
    pub time_limit: Option<Duration>,
    /// Directory the clients write their raw results to.
    pub output_dir: PathBuf,
}

impl ClientCommand {
    /// The arguments passed to the benchmark binary.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "--tests".to_owned(),
            self.test.clone(),
            "--valueSize".to_owned(),
            self.value_size.to_string(),
            "--lrangelen".to_owned(),
            self.lrange_len.to_string(),
            "--keyspacelen".to_owned(),
            self.key_space_len.to_string(),
            "--serverSpan".to_owned(),
            self.server_span.to_string(),
            "--threads".to_owned(),
            self.threads.to_string(),
            "--requests".to_owned(),
            self.requests.to_string(),
        ];
        if let Some(limit) = self.time_limit {
            args.push("--timeLimit".to_owned());
            args.push(whole_secs(limit).to_string());
        }
        args.push("--outputDir".to_owned());
        args.push(self.output_dir.display().to_string());
        args
    }

    /// The full command line as a single string, as the cluster runner expects it.
    pub fn command_line(&self) -> String {
        let mut line = self.binary.display().to_string();
        for arg in self.args() {
            line.push(' ');
            line.push_str(&arg);
        }
        line
    }
}

/// Seconds of `duration`, rounded up so that sub-second values never become zero.
fn whole_secs(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}

/// Everything the cluster runner needs for one run.
#[derive(Clone, Debug, PartialEq)]
pub struct Invocation {
    /// Number of storage servers.
    pub servers: u32,
    /// Number of backup replicas per segment.
    pub replicas: u32,
    /// Number of benchmark client processes.
    pub client_processes: u32,
    /// Shared cluster settings.
    pub cluster: ClusterOptions,
    /// The benchmark client command line.
    pub client: ClientCommand,
}

impl Invocation {
    /// The arguments passed to the cluster runner, excluding the client command line.
    pub fn cluster_args(&self) -> Vec<String> {
        let cluster = &self.cluster;
        let mut args = vec![
            "--servers".to_owned(),
            self.servers.to_string(),
            "--replicas".to_owned(),
            self.replicas.to_string(),
            "--numBackupDisks".to_owned(),
            cluster.backup_disks.to_string(),
            "--clients".to_owned(),
            self.client_processes.to_string(),
            "--transport".to_owned(),
            cluster.transport.clone(),
            "--timeout".to_owned(),
            whole_secs(cluster.timeout).to_string(),
            "--logDir".to_owned(),
            cluster.log_dir.display().to_string(),
            "--logLevel".to_owned(),
            cluster.log_level.to_string(),
            "--shareHosts".to_owned(),
        ];
        if let Some(master_args) = &cluster.master_args {
            args.push("--masterArgs".to_owned());
            args.push(master_args.clone());
        }
        for (enabled, flag) in [
            (cluster.disjunct, "--disjunct"),
            (cluster.debug, "--debug"),
            (cluster.verbose, "--verbose"),
        ] {
            if enabled {
                args.push(flag.to_owned());
            }
        }
        args
    }
}

/// Runs invocations by spawning an external cluster runner program.
///
/// The program receives the [cluster arguments](Invocation::cluster_args) followed by
/// `--client <command line>`. The program enforces the configured timeout itself; if it has not
/// exited `grace` after that timeout, it is killed.
#[derive(Debug)]
pub struct CommandRunner {
    program: PathBuf,
    grace: Duration,
}

impl CommandRunner {
    /// Creates a runner that spawns `program`.
    pub fn new(program: impl Into<PathBuf>, grace: Duration) -> Self {
        Self {
            program: program.into(),
            grace,
        }
    }
}

#[async_trait::async_trait]
impl ClusterRunner for CommandRunner {
    async fn run(&self, invocation: &Invocation) -> Result<(), InvocationError> {
        let mut child = Command::new(&self.program)
            .args(invocation.cluster_args())
            .arg("--client")
            .arg(invocation.client.command_line())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(InvocationError::Spawn)?;

        let limit = invocation.cluster.timeout + self.grace;
        match tokio::time::timeout(limit, child.wait()).await {
            Ok(Ok(status)) if status.success() => Ok(()),
            Ok(Ok(status)) => Err(InvocationError::Failed(status)),
            Ok(Err(err)) => Err(InvocationError::Spawn(err)),
            Err(_) => {
                if let Err(err) = child.kill().await {
                    tracing::warn!(
                        error = &err as &dyn std::error::Error,
                        "failed to kill cluster runner"
                    );
                }
                Err(InvocationError::Timeout(limit))
            }
        }
    }
}

/// Logs every invocation instead of running it.
#[derive(Debug, Default)]
pub struct DryRunRunner;

#[async_trait::async_trait]
impl ClusterRunner for DryRunRunner {
    async fn run(&self, invocation: &Invocation) -> Result<(), InvocationError> {
        tracing::info!(
            cluster = %invocation.cluster_args().join(" "),
            client = %invocation.client.command_line(),
            "dry run, not invoking cluster runner"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invocation() -> Invocation {
        Invocation {
            servers: 4,
            replicas: 3,
            client_processes: 2,
            cluster: ClusterOptions {
                timeout: Duration::ZERO,
                ..Default::default()
            },
            client: ClientCommand {
                binary: PathBuf::from("bench"),
                test: "get".to_owned(),
                value_size: 3,
                lrange_len: 100,
                key_space_len: 1,
                server_span: 1,
                threads: 4,
                requests: 12_500,
                time_limit: None,
                output_dir: PathBuf::from("out/x"),
            },
        }
    }

    #[test]
    fn client_command_line() {
        assert_eq!(
            invocation().client.command_line(),
            "bench --tests get --valueSize 3 --lrangelen 100 --keyspacelen 1 --serverSpan 1 \
             --threads 4 --requests 12500 --outputDir out/x"
        );
    }

    #[test]
    fn optional_cluster_flags() {
        let mut invocation = invocation();
        let args = invocation.cluster_args();
        assert!(!args.contains(&"--debug".to_owned()));
        assert!(!args.contains(&"--masterArgs".to_owned()));

        invocation.cluster.debug = true;
        invocation.cluster.master_args = Some("-t 4000".to_owned());
        let args = invocation.cluster_args();
        assert!(args.contains(&"--debug".to_owned()));
        assert!(args.ends_with(&["-t 4000".to_owned(), "--debug".to_owned()]));
    }

    #[test]
    fn sub_second_durations_round_up() {
        let mut invocation = invocation();
        invocation.cluster.timeout = Duration::from_millis(30_500);
        invocation.client.time_limit = Some(Duration::from_millis(500));

        let args = invocation.cluster_args();
        let timeout = args.iter().position(|a| a == "--timeout").unwrap();
        assert_eq!(args[timeout + 1], "31");

        let client_args = invocation.client.args();
        let limit = client_args.iter().position(|a| a == "--timeLimit").unwrap();
        assert_eq!(client_args[limit + 1], "1");
    }

    #[tokio::test]
    async fn dry_run_succeeds() {
        DryRunRunner.run(&invocation()).await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_exit_status() {
        let runner = CommandRunner::new("true", Duration::from_secs(5));
        runner.run(&invocation()).await.unwrap();

        let runner = CommandRunner::new("false", Duration::from_secs(5));
        let err = runner.run(&invocation()).await.unwrap_err();
        assert!(matches!(err, InvocationError::Failed(_)));
    }

    #[tokio::test]
    async fn missing_program() {
        let runner = CommandRunner::new("/nonexistent/cluster-runner", Duration::ZERO);
        let err = runner.run(&invocation()).await.unwrap_err();
        assert!(matches!(err, InvocationError::Spawn(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn hung_runner_is_killed() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("hang.sh");
        std::fs::write(&script, "#!/bin/sh\nexec sleep 30\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let runner = CommandRunner::new(&script, Duration::from_millis(200));
        let err = runner.run(&invocation()).await.unwrap_err();
        assert!(matches!(err, InvocationError::Timeout(_)));
    }
}
