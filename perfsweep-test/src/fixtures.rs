//! Writers for the raw result files a benchmark client produces.
//!
//! All functions panic on I/O errors, which is the desired behavior in tests.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use perfsweep_core::layout::RunFiles;

/// Writes the raw latency file of client `index` of a run with `clients` clients.
pub fn write_latencies(dir: &Path, test: &str, clients: u32, index: u32, samples: &[f64]) -> PathBuf {
    let path = RunFiles::new(dir, test, clients).latencies(index);
    let mut contents = String::new();
    for sample in samples {
        writeln!(contents, "{sample}").unwrap();
    }
    std::fs::write(&path, contents).unwrap();
    path
}

/// Writes the execution summary of client `index` of a run with `clients` clients.
pub fn write_summary(
    dir: &Path,
    test: &str,
    clients: u32,
    index: u32,
    total_time: f64,
    total_ops: u64,
) -> PathBuf {
    let path = RunFiles::new(dir, test, clients).summary(index);
    let contents = format!("totalTime {total_time:.2}\ntotalOps {total_ops}\n");
    std::fs::write(&path, contents).unwrap();
    path
}

/// Writes complete raw results for every client of a run.
///
/// Every client reports `total_time` seconds and `ops` operations, with latencies `1..=ops`
/// microseconds offset by the client index.
pub fn write_run(dir: &Path, test: &str, clients: u32, total_time: f64, ops: u64) {
    for index in 1..=clients {
        let samples: Vec<f64> = (1..=ops).map(|i| (i + u64::from(index)) as f64).collect();
        write_latencies(dir, test, clients, index, &samples);
        write_summary(dir, test, clients, index, total_time, ops);
    }
}
