//! Error types of sweeps and reductions.

use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

/// Errors in the sweep configuration.
///
/// These are fatal: they are reported before any cluster interaction takes place.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Neither a total nor a per-client operation count was configured.
    #[error("one of `total_ops` or `per_client_ops` must be set")]
    MissingOpsTarget,

    /// Both a total and a per-client operation count were configured.
    #[error("`total_ops` and `per_client_ops` are mutually exclusive")]
    ConflictingOpsTarget,

    /// A sweep dimension has no values.
    #[error("sweep dimension `{0}` must have at least one value")]
    EmptyDimension(&'static str),
}

/// A sweep point that does not satisfy one of the validation rules.
///
/// Violations are not fatal. The offending point is skipped and the sweep continues.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Violation {
    /// There are not enough servers to hold all replicas of a segment.
    #[error("{servers} servers cannot hold {replicas} replicas (need at least {})", .replicas + 1)]
    InsufficientServers {
        /// Configured server count.
        servers: u32,
        /// Configured replica count.
        replicas: u32,
    },

    /// The workload is spread over more servers than the cluster has.
    #[error("server span {span} exceeds the {servers} available servers")]
    SpanExceedsServers {
        /// Configured server span.
        span: u32,
        /// Configured server count.
        servers: u32,
    },
}

/// Errors while executing a single sweep point.
///
/// These are not fatal for the sweep, the failed point is reported and the sweep continues.
#[derive(Debug, Error)]
pub enum InvocationError {
    /// The output directory of the run could not be created.
    #[error("failed to create output directory `{}`: {cause}", .path.display())]
    OutputDir {
        /// The directory that was to be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        cause: std::io::Error,
    },

    /// The runner process could not be started or awaited.
    #[error("failed to spawn cluster runner: {0}")]
    Spawn(#[source] std::io::Error),

    /// The runner did not finish within the configured timeout.
    #[error("cluster runner timed out after {0:?}")]
    Timeout(Duration),

    /// The runner exited unsuccessfully.
    #[error("cluster runner failed: {0}")]
    Failed(ExitStatus),

    /// Any other failure reported by a runner implementation.
    #[error("cluster runner error: {0}")]
    Other(String),
}

/// Errors while reducing the raw output of one configuration.
#[derive(Debug, Error)]
pub enum ReduceError {
    /// A raw file could not be read or a reduced file could not be written.
    #[error("i/o error on `{}`: {cause}", .path.display())]
    Io {
        /// The file that was accessed.
        path: PathBuf,
        /// The underlying error.
        #[source]
        cause: std::io::Error,
    },

    /// A token in a raw file is not a valid number.
    #[error("invalid number `{token}` in `{}` line {line}", .path.display())]
    Parse {
        /// The file containing the token.
        path: PathBuf,
        /// The 1-based line number.
        line: usize,
        /// The offending token.
        token: String,
    },

    /// An execution summary lacks a required field.
    #[error("execution summary `{}` has no `{field}` field", .path.display())]
    MissingField {
        /// The summary file.
        path: PathBuf,
        /// The name of the missing field.
        field: &'static str,
    },

    /// The latency files contained no samples at all.
    #[error("no latency samples found")]
    NoSamples,

    /// No execution summaries were given, or every client reported zero runtime.
    #[error("cannot compute throughput without a positive run time")]
    ZeroDuration,
}

impl ReduceError {
    pub(crate) fn io(path: impl Into<PathBuf>, cause: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            cause,
        }
    }
}

/// Result type for reduction operations.
pub type ReduceResult<T, E = ReduceError> = std::result::Result<T, E>;
