//! Naming of output directories and raw/reduced result files.
//!
//! Every combination of numeric cluster parameters gets its own sub-directory below the output
//! root. Inside it, files are named after the test, the client count `N` and the client index
//! `i` (1-based):
//!
//! | File                                    | Content                          |
//! |-----------------------------------------|----------------------------------|
//! | `<test>_client<N>-<i>_reqLatencies.dat` | raw latencies of one client      |
//! | `<test>_client<N>-<i>_execSummary.dat`  | execution summary of one client  |
//! | `<test>_client<N>-all_reqLatencies.cdf` | merged latency percentile table  |
//! | `<test>_client<N>-all_throughput.dat`   | aggregate throughput of the run  |
//! | `<test>_throughput_v_clients.dat`       | throughput over client count     |

use std::path::{Path, PathBuf};

/// The numeric parameters that identify an output sub-directory.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ClusterShape {
    /// Number of storage servers.
    pub servers: u32,
    /// Number of backup replicas per segment.
    pub replicas: u32,
    /// Number of servers the workload is spread over.
    pub server_span: u32,
    /// Size of written values in bytes.
    pub value_size: u64,
    /// Number of distinct keys the workload operates on.
    pub key_space_len: u64,
}

impl ClusterShape {
    /// The name of the sub-directory holding all results for this shape.
    ///
    /// The name only depends on the parameters, so repeated sweeps reuse the same directory.
    pub fn dir_name(&self) -> String {
        format!(
            "servers{}_replicas{}_span{}_value{}_keys{}",
            self.servers, self.replicas, self.server_span, self.value_size, self.key_space_len
        )
    }
}

/// Result files of one test at one client count inside an output directory.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RunFiles<'a> {
    dir: &'a Path,
    test: &'a str,
    clients: u32,
}

impl<'a> RunFiles<'a> {
    /// Creates the file naming for `test` run with `clients` clients inside `dir`.
    pub fn new(dir: &'a Path, test: &'a str, clients: u32) -> Self {
        Self { dir, test, clients }
    }

    fn file(&self, client: &str, suffix: &str) -> PathBuf {
        self.dir
            .join(format!("{}_client{}-{client}_{suffix}", self.test, self.clients))
    }

    /// Raw latency file of client `index` (1-based).
    pub fn latencies(&self, index: u32) -> PathBuf {
        self.file(&index.to_string(), "reqLatencies.dat")
    }

    /// Execution summary file of client `index` (1-based).
    pub fn summary(&self, index: u32) -> PathBuf {
        self.file(&index.to_string(), "execSummary.dat")
    }

    /// Raw latency files of all clients, in client order.
    pub fn all_latencies(&self) -> Vec<PathBuf> {
        (1..=self.clients).map(|i| self.latencies(i)).collect()
    }

    /// Execution summary files of all clients, in client order.
    pub fn all_summaries(&self) -> Vec<PathBuf> {
        (1..=self.clients).map(|i| self.summary(i)).collect()
    }

    /// The merged latency percentile table.
    pub fn cdf(&self) -> PathBuf {
        self.file("all", "reqLatencies.cdf")
    }

    /// The aggregate throughput of this run.
    pub fn throughput(&self) -> PathBuf {
        self.file("all", "throughput.dat")
    }
}

/// The throughput over client count summary of `test` inside `dir`.
pub fn throughput_v_clients(dir: &Path, test: &str) -> PathBuf {
    dir.join(format!("{test}_throughput_v_clients.dat"))
}
