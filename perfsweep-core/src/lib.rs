//! Parameter sweeps of storage cluster benchmarks and reduction of their results.
//!
//! A sweep runs one benchmark per point of a [`SweepSpace`]: for every combination of cluster
//! size, replication, workload parameters, test and client count, it resolves how clients are
//! spread over processes ([`Topology`]) and how many requests each issues ([`OpsTarget`]), and
//! hands the resulting [`Invocation`] to an external [`ClusterRunner`].
//!
//! The benchmark clients write raw latency and execution summary files, which the
//! [reducer](reduce) turns into latency percentile tables and throughput over client count.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod cdf;
pub mod error;
pub mod layout;
pub mod quota;
pub mod reduce;
pub mod runner;
pub mod sweep;
pub mod throughput;
pub mod topology;

pub use error::{ConfigError, InvocationError, ReduceError, Violation};
pub use quota::{OpsTarget, Quota};
pub use runner::{ClusterRunner, Invocation};
pub use sweep::{RunConfig, RunOptions, Sweep, SweepReport, SweepSpace};
pub use topology::Topology;
