//! Configuration for perfsweep.
//!
//! Configuration can be loaded from multiple sources with the following precedence (highest to
//! lowest):
//!
//! 1. Command line options
//! 2. Environment variables (prefixed with `PS__`)
//! 3. YAML configuration file (specified via `-c` or `--config` flag)
//! 4. Defaults
//!
//! # Environment Variables
//!
//! Environment variables use `PS__` as a prefix and double underscores (`__`) to denote nested
//! configuration structures. For example:
//!
//! - `PS__OUTPUT_DIR=/data/results` sets the output root
//! - `PS__CLUSTER__TRANSPORT=tcp` sets the server transport
//! - `PS__SWEEP__CLIENTS=[1,2,4,8]` sets the client counts
//!
//! # YAML Configuration File
//!
//! ```yaml
//! output_dir: /data/results
//!
//! cluster:
//!   transport: tcp
//!   timeout: 2m
//!
//! runner:
//!   type: command
//!   program: scripts/cluster-run
//!
//! sweep:
//!   servers: [4, 8]
//!   tests: [get, set]
//!   clients: [1, 2, 4, 8]
//!   total_ops: 100000
//! ```

use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use figment::providers::{Env, Format, Serialized, Yaml};
use perfsweep_core::runner::{
    BoxedRunner, ClientOptions, ClusterOptions, CommandRunner, DryRunRunner, ServerLogLevel,
};
use perfsweep_core::{ConfigError, OpsTarget, RunOptions, Sweep, SweepSpace};
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

/// Environment variable prefix for all configuration options.
const ENV_PREFIX: &str = "PS__";

/// The external program that executes a single benchmark configuration.
///
/// Used in: [`Config::runner`]
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Runner {
    /// Spawn a cluster runner program for every configuration.
    ///
    /// # Example
    ///
    /// ```yaml
    /// runner:
    ///   type: command
    ///   program: scripts/cluster-run
    ///   grace: 10s
    /// ```
    Command {
        /// Path of the cluster runner program.
        program: PathBuf,
        /// Extra time after the cluster timeout before the runner is killed.
        #[serde(with = "humantime_serde")]
        grace: Duration,
    },
    /// Only log what would be run.
    DryRun,
}

impl Default for Runner {
    fn default() -> Self {
        Self::Command {
            program: PathBuf::from("cluster-run"),
            grace: Duration::from_secs(10),
        }
    }
}

/// The dimensions of the parameter sweep and the operation target.
///
/// Used in: [`Config::sweep`]
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SweepConfig {
    /// Numbers of storage servers.
    pub servers: Vec<u32>,
    /// Numbers of backup replicas per segment.
    pub replicas: Vec<u32>,
    /// Numbers of servers the workload is spread over.
    pub server_span: Vec<u32>,
    /// Value sizes in bytes.
    pub value_size: Vec<u64>,
    /// Sizes of the key space.
    pub key_space_len: Vec<u64>,
    /// Names of the tests to run. Required.
    pub tests: Vec<String>,
    /// Numbers of concurrent clients. Required.
    pub clients: Vec<NonZeroU32>,
    /// Total operations per run, shared by all clients.
    ///
    /// Mutually exclusive with `per_client_ops`.
    pub total_ops: Option<u64>,
    /// Operations per client and run.
    ///
    /// Mutually exclusive with `total_ops`.
    pub per_client_ops: Option<u64>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        let space = SweepSpace::default();
        Self {
            servers: space.servers,
            replicas: space.replicas,
            server_span: space.server_span,
            value_size: space.value_size,
            key_space_len: space.key_space_len,
            tests: space.tests,
            clients: space.clients,
            total_ops: None,
            per_client_ops: None,
        }
    }
}

/// Log output format.
///
/// Controls how log messages are formatted. The format can be explicitly specified or
/// auto-detected based on whether output is to a TTY.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Auto detect the best format.
    ///
    /// This chooses [`LogFormat::Pretty`] for TTY, otherwise [`LogFormat::Simplified`].
    Auto,

    /// Pretty printing with colors.
    Pretty,

    /// Simplified plain text output.
    ///
    /// ```text
    /// 2026-10-19T12:10:32Z  INFO perfsweep_core::sweep: ===== TEST: get CLIENTS: 8 (2x4) =====
    /// ```
    Simplified,

    /// Dump out JSON lines.
    Json,
}

mod display_fromstr {
    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
        T: std::fmt::Display,
    {
        serializer.collect_str(&value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        D: serde::Deserializer<'de>,
        T: std::str::FromStr,
        <T as std::str::FromStr>::Err: std::fmt::Display,
    {
        use serde::Deserialize;
        let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Logging configuration.
///
/// Logs are always written to stderr. The `RUST_LOG` environment variable takes precedence over
/// the configured level.
///
/// Used in: [`Config::logging`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Logging {
    /// Minimum log level to output.
    ///
    /// # Default
    ///
    /// `INFO`
    #[serde(with = "display_fromstr")]
    pub level: LevelFilter,

    /// Log output format.
    ///
    /// # Default
    ///
    /// `Auto` (pretty for TTY, simplified otherwise)
    pub format: LogFormat,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            format: LogFormat::Auto,
        }
    }
}

/// Main configuration struct for perfsweep.
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Root directory of all benchmark results.
    ///
    /// Every combination of numeric cluster parameters gets its own sub-directory.
    ///
    /// # Default
    ///
    /// `results`
    pub output_dir: PathBuf,

    /// Cluster settings shared by all runs.
    pub cluster: ClusterOptions,

    /// Benchmark client settings shared by all runs.
    pub client: ClientOptions,

    /// How configurations are executed.
    pub runner: Runner,

    /// The sweep dimensions and operation target.
    pub sweep: SweepConfig,

    /// Logging configuration.
    pub logging: Logging,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("results"),
            cluster: ClusterOptions::default(),
            client: ClientOptions::default(),
            runner: Runner::default(),
            sweep: SweepConfig::default(),
            logging: Logging::default(),
        }
    }
}

impl Config {
    /// Loads configuration from all sources.
    ///
    /// Configuration is merged in the following order (later sources override earlier ones):
    /// 1. Default values
    /// 2. YAML configuration file (if provided)
    /// 3. Environment variables (prefixed with `PS__`)
    /// 4. Command line overrides
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML file cannot be read or parsed, or if any source contains
    /// invalid values.
    pub fn load(path: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        let mut figment = figment::Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(Serialized::defaults(overrides))
            .extract()?;

        Ok(config)
    }

    /// The sweep space described by this configuration.
    pub fn space(&self) -> Result<SweepSpace, ConfigError> {
        let sweep = &self.sweep;
        let space = SweepSpace {
            servers: sweep.servers.clone(),
            replicas: sweep.replicas.clone(),
            server_span: sweep.server_span.clone(),
            value_size: sweep.value_size.clone(),
            key_space_len: sweep.key_space_len.clone(),
            tests: sweep.tests.clone(),
            clients: sweep.clients.clone(),
        };
        space.validate()?;
        Ok(space)
    }

    /// Builds the sweep described by this configuration.
    pub fn sweep(&self) -> Result<Sweep, ConfigError> {
        let ops = OpsTarget::from_options(self.sweep.total_ops, self.sweep.per_client_ops)?;
        let options = RunOptions {
            cluster: self.cluster.clone(),
            client: self.client.clone(),
            ops,
            output_root: self.output_dir.clone(),
        };
        Sweep::new(self.space()?, options)
    }

    /// Creates the configured cluster runner.
    pub fn runner(&self) -> BoxedRunner {
        match &self.runner {
            Runner::Command { program, grace } => Box::new(CommandRunner::new(program, *grace)),
            Runner::DryRun => Box::new(DryRunRunner),
        }
    }
}

/// Configuration values given on the command line.
///
/// Only values that are set are merged over the other configuration sources.
#[derive(Debug, Default, Serialize)]
pub struct Overrides {
    /// See [`Config::output_dir`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    /// See [`Config::cluster`].
    pub cluster: ClusterOverrides,
    /// See [`Config::client`].
    pub client: ClientOverrides,
    /// See [`Config::sweep`].
    pub sweep: SweepOverrides,
    /// Replaces the configured runner with [`Runner::DryRun`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runner: Option<Runner>,
}

/// Command line overrides of [`ClusterOptions`].
#[derive(Debug, Default, Serialize)]
pub struct ClusterOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_disks: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disjunct: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub master_args: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "humantime_serde::option"
    )]
    pub timeout: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<ServerLogLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verbose: Option<bool>,
}

/// Command line overrides of [`ClientOptions`].
#[derive(Debug, Default, Serialize)]
pub struct ClientOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lrange_len: Option<u64>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "humantime_serde::option"
    )]
    pub time_limit: Option<Duration>,
}

/// Command line overrides of [`SweepConfig`].
#[derive(Debug, Default, Serialize)]
pub struct SweepOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub servers: Option<Vec<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<Vec<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_span: Option<Vec<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_size: Option<Vec<u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_space_len: Option<Vec<u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tests: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clients: Option<Vec<NonZeroU32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_ops: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_client_ops: Option<u64>,
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn nz(values: &[u32]) -> Vec<NonZeroU32> {
        values.iter().map(|&v| NonZeroU32::new(v).unwrap()).collect()
    }

    #[test]
    fn default_values() {
        figment::Jail::expect_with(|_jail| {
            let config = Config::load(None, &Overrides::default()).unwrap();

            assert_eq!(config.cluster.transport, "basic+infud");
            assert_eq!(config.cluster.timeout, Duration::from_secs(30));
            assert_eq!(config.cluster.backup_disks, 2);
            assert_eq!(config.cluster.log_level, ServerLogLevel::Notice);
            assert_eq!(config.client.lrange_len, 100);
            assert_eq!(config.sweep.servers, [4]);
            assert_eq!(config.sweep.replicas, [3]);
            assert_eq!(config.output_dir, Path::new("results"));

            Ok(())
        });
    }

    #[test]
    fn configurable_via_env() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("PS__CLUSTER__TRANSPORT", "tcp");
            jail.set_env("PS__CLUSTER__TIMEOUT", "2m");
            jail.set_env("PS__SWEEP__TESTS", "[get,set]");
            jail.set_env("PS__SWEEP__CLIENTS", "[1,2,4]");
            jail.set_env("PS__SWEEP__PER_CLIENT_OPS", "500");
            jail.set_env("PS__RUNNER__TYPE", "dry_run");

            let config = Config::load(None, &Overrides::default()).unwrap();

            assert_eq!(config.cluster.transport, "tcp");
            assert_eq!(config.cluster.timeout, Duration::from_secs(120));
            assert_eq!(config.sweep.tests, ["get", "set"]);
            assert_eq!(config.sweep.clients, nz(&[1, 2, 4]));
            assert_eq!(config.runner, Runner::DryRun);

            let sweep = config.sweep().unwrap();
            assert_eq!(sweep.options().ops, OpsTarget::PerClient(500));
            assert_eq!(sweep.space().len(), 6);

            Ok(())
        });
    }

    #[test]
    fn configurable_via_yaml() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile
            .write_all(
                br#"
            output_dir: /data/results
            cluster:
                log_level: DEBUG
                master_args: "-t 4000"
            runner:
                type: command
                program: scripts/cluster-run
                grace: 5s
            sweep:
                servers: [4, 8]
                value_size: [3, 100]
                tests: [lrange]
                clients: [1, 12]
                total_ops: 100000
            "#,
            )
            .unwrap();

        figment::Jail::expect_with(|_jail| {
            let config = Config::load(Some(tempfile.path()), &Overrides::default()).unwrap();

            assert_eq!(config.output_dir, Path::new("/data/results"));
            assert_eq!(config.cluster.log_level, ServerLogLevel::Debug);
            assert_eq!(config.cluster.master_args.as_deref(), Some("-t 4000"));
            assert_eq!(
                config.runner,
                Runner::Command {
                    program: PathBuf::from("scripts/cluster-run"),
                    grace: Duration::from_secs(5),
                }
            );

            let sweep = config.sweep().unwrap();
            assert_eq!(sweep.space().len(), 8);
            assert_eq!(sweep.options().ops, OpsTarget::Total(100_000));

            Ok(())
        });
    }

    #[test]
    fn overrides_take_precedence() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile
            .write_all(
                br#"
            sweep:
                tests: [get]
                clients: [1]
            "#,
            )
            .unwrap();

        figment::Jail::expect_with(|jail| {
            jail.set_env("PS__SWEEP__CLIENTS", "[2]");
            jail.set_env("PS__CLUSTER__TRANSPORT", "tcp");

            let overrides = Overrides {
                sweep: SweepOverrides {
                    clients: Some(nz(&[4, 8])),
                    ..Default::default()
                },
                cluster: ClusterOverrides {
                    timeout: Some(Duration::from_secs(90)),
                    ..Default::default()
                },
                runner: Some(Runner::DryRun),
                ..Default::default()
            };
            let config = Config::load(Some(tempfile.path()), &overrides).unwrap();

            assert_eq!(config.sweep.tests, ["get"]);
            assert_eq!(config.sweep.clients, nz(&[4, 8]));
            assert_eq!(config.cluster.transport, "tcp");
            assert_eq!(config.cluster.timeout, Duration::from_secs(90));
            assert_eq!(config.runner, Runner::DryRun);

            Ok(())
        });
    }

    #[test]
    fn missing_required_options() {
        figment::Jail::expect_with(|jail| {
            let config = Config::load(None, &Overrides::default()).unwrap();
            assert_eq!(
                config.space().unwrap_err(),
                ConfigError::EmptyDimension("tests")
            );

            jail.set_env("PS__SWEEP__TESTS", "[get]");
            jail.set_env("PS__SWEEP__CLIENTS", "[1]");
            let config = Config::load(None, &Overrides::default()).unwrap();
            assert_eq!(
                config.sweep().unwrap_err(),
                ConfigError::MissingOpsTarget
            );

            jail.set_env("PS__SWEEP__TOTAL_OPS", "100");
            jail.set_env("PS__SWEEP__PER_CLIENT_OPS", "100");
            let config = Config::load(None, &Overrides::default()).unwrap();
            assert_eq!(
                config.sweep().unwrap_err(),
                ConfigError::ConflictingOpsTarget
            );

            Ok(())
        });
    }

    #[test]
    fn zero_clients_are_rejected() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("PS__SWEEP__CLIENTS", "[0]");
            assert!(Config::load(None, &Overrides::default()).is_err());
            Ok(())
        });
    }
}
