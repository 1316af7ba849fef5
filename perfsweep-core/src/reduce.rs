//! Reduction of raw per-client results into percentile tables and throughput figures.
//!
//! The reducer walks the same sweep space the sweep ran, so it finds exactly the files the
//! benchmark clients wrote. For every test and client count it merges the latency files into a
//! percentile table and the execution summaries into one throughput figure. Per test and output
//! directory it then writes the throughput over client count.
//!
//! A run with missing or malformed raw files is reported and skipped; the remaining runs are
//! reduced regardless.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::cdf::PercentileTable;
use crate::error::{ReduceError, ReduceResult};
use crate::layout::{self, RunFiles};
use crate::sweep::{SweepSpace, validate_shape};
use crate::throughput::{self, ExecutionSummary, ThroughputTable};

/// Reduces the results of a single run.
///
/// All raw files are read and reduced before anything is written, so a run with incomplete data
/// leaves no reduced files behind. Returns the aggregate throughput of the run.
pub fn reduce_run(files: &RunFiles<'_>) -> ReduceResult<f64> {
    let table = PercentileTable::from_files(&files.all_latencies())?;
    let summaries = files
        .all_summaries()
        .iter()
        .map(|path| ExecutionSummary::from_file(path))
        .collect::<ReduceResult<Vec<_>>>()?;
    let throughput = throughput::aggregate(&summaries)?;

    write_file(&files.cdf(), |w| table.write_to(w))?;
    write_file(&files.throughput(), |w| writeln!(w, "{throughput:.2}"))?;

    Ok(throughput)
}

fn write_file(
    path: &Path,
    write: impl FnOnce(&mut BufWriter<File>) -> std::io::Result<()>,
) -> ReduceResult<()> {
    let file = File::create(path).map_err(|e| ReduceError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    write(&mut writer)
        .and_then(|()| writer.flush())
        .map_err(|e| ReduceError::io(path, e))
}

/// Reduces all runs of a sweep below `output_root`.
///
/// Shapes that violate a validation rule were never run and are not visited.
pub fn reduce(space: &SweepSpace, output_root: &Path) -> ReduceReport {
    let mut report = ReduceReport::default();

    for shape in space.shapes() {
        if validate_shape(&shape).is_err() {
            continue;
        }
        let dir = output_root.join(shape.dir_name());

        for test in &space.tests {
            let mut table = ThroughputTable::default();

            for clients in &space.clients {
                let clients = clients.get();
                let files = RunFiles::new(&dir, test, clients);
                match reduce_run(&files) {
                    Ok(ops_per_sec) => {
                        tracing::debug!(
                            test = %test,
                            clients,
                            ops_per_sec,
                            dir = %dir.display(),
                            "reduced run"
                        );
                        table.push(clients, ops_per_sec);
                    }
                    Err(error) => {
                        tracing::warn!(
                            test = %test,
                            clients,
                            dir = %dir.display(),
                            error = &error as &dyn std::error::Error,
                            "skipping reduction of incomplete run"
                        );
                        report.failures.push(ReduceFailure {
                            dir: dir.clone(),
                            test: test.clone(),
                            clients: Some(clients),
                            error,
                        });
                    }
                }
            }

            if table.is_empty() {
                continue;
            }

            let path = layout::throughput_v_clients(&dir, test);
            if let Err(error) = write_file(&path, |w| table.write_to(w)) {
                tracing::error!(
                    test = %test,
                    error = &error as &dyn std::error::Error,
                    "failed to write throughput summary"
                );
                report.failures.push(ReduceFailure {
                    dir: dir.clone(),
                    test: test.clone(),
                    clients: None,
                    error,
                });
                continue;
            }

            report.tables.push(ReducedTest {
                dir: dir.clone(),
                test: test.clone(),
                table,
            });
        }
    }

    report
}

/// The throughput over client count of one test in one output directory.
#[derive(Debug)]
pub struct ReducedTest {
    /// The output directory of the cluster shape.
    pub dir: PathBuf,
    /// The test name.
    pub test: String,
    /// Throughput per client count, in sweep order.
    pub table: ThroughputTable,
}

/// A run whose results could not be reduced.
#[derive(Debug)]
pub struct ReduceFailure {
    /// The output directory of the cluster shape.
    pub dir: PathBuf,
    /// The test name.
    pub test: String,
    /// The client count of the run, or `None` if writing the test's throughput table failed.
    pub clients: Option<u32>,
    /// What went wrong.
    pub error: ReduceError,
}

/// The outcome of a full reduction.
#[derive(Debug, Default)]
pub struct ReduceReport {
    /// Successfully written throughput tables.
    pub tables: Vec<ReducedTest>,
    /// Runs that were skipped.
    pub failures: Vec<ReduceFailure>,
}
