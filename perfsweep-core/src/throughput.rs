//! Cluster-wide throughput computed from per-client execution summaries.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use crate::error::{ReduceError, ReduceResult};

const TOTAL_TIME: &str = "totalTime";
const TOTAL_OPS: &str = "totalOps";

/// The execution summary a single benchmark client writes when it finishes.
///
/// The file consists of `<field> <value>` lines. Only `totalTime` (seconds) and `totalOps` are
/// required, other fields are ignored.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExecutionSummary {
    /// Wall clock time the client ran, in seconds.
    pub total_time: f64,
    /// Number of operations the client executed.
    pub total_ops: u64,
}

impl ExecutionSummary {
    /// Reads the summary file at `path`.
    pub fn from_file(path: &Path) -> ReduceResult<Self> {
        let file = File::open(path).map_err(|e| ReduceError::io(path, e))?;
        Self::parse(BufReader::new(file), path)
    }

    /// Parses a summary from `reader`. `path` is only used for error reporting.
    pub fn parse(reader: impl BufRead, path: &Path) -> ReduceResult<Self> {
        let mut total_time = None;
        let mut total_ops = None;

        for (index, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| ReduceError::io(path, e))?;
            let mut columns = line.split_whitespace();
            let Some(name) = columns.next() else {
                continue;
            };

            let parse_error = |token: &str| ReduceError::Parse {
                path: path.to_owned(),
                line: index + 1,
                token: token.to_owned(),
            };
            let value = columns.next().ok_or_else(|| parse_error(&line))?;

            match name {
                TOTAL_TIME => {
                    let time = value.parse::<f64>().map_err(|_| parse_error(value))?;
                    total_time = Some(time);
                }
                TOTAL_OPS => {
                    let ops = value.parse::<u64>().map_err(|_| parse_error(value))?;
                    total_ops = Some(ops);
                }
                _ => {}
            }
        }

        let missing = |field| ReduceError::MissingField {
            path: path.to_owned(),
            field,
        };
        Ok(Self {
            total_time: total_time.ok_or_else(|| missing(TOTAL_TIME))?,
            total_ops: total_ops.ok_or_else(|| missing(TOTAL_OPS))?,
        })
    }
}

/// Computes the aggregate throughput of concurrently running clients in operations per second.
///
/// All operations are attributed to the run time of the slowest client, since the run as a whole
/// is only finished once the last client is done.
pub fn aggregate(summaries: &[ExecutionSummary]) -> ReduceResult<f64> {
    let total_ops: u64 = summaries.iter().map(|s| s.total_ops).sum();
    let max_time = summaries
        .iter()
        .map(|s| s.total_time)
        .fold(0.0_f64, f64::max);

    if max_time <= 0.0 {
        return Err(ReduceError::ZeroDuration);
    }

    Ok(total_ops as f64 / max_time)
}

/// Aggregate throughput of one run, keyed by its client count.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ThroughputPoint {
    /// Number of concurrent clients.
    pub clients: u32,
    /// Aggregate throughput in operations per second.
    pub ops_per_sec: f64,
}

/// Throughput over client count for one test of a sweep.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ThroughputTable {
    points: Vec<ThroughputPoint>,
}

impl ThroughputTable {
    /// Records a point, keeping the table ordered by ascending client count.
    pub fn push(&mut self, clients: u32, ops_per_sec: f64) {
        let index = self.points.partition_point(|p| p.clients <= clients);
        self.points.insert(
            index,
            ThroughputPoint {
                clients,
                ops_per_sec,
            },
        );
    }

    /// All points by ascending client count.
    pub fn points(&self) -> &[ThroughputPoint] {
        &self.points
    }

    /// Returns `true` if no point has been recorded.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Writes one `<clients> <throughput>` line per point.
    pub fn write_to(&self, mut writer: impl Write) -> io::Result<()> {
        for point in &self.points {
            writeln!(writer, "{} {:9.2}", point.clients, point.ops_per_sec)?;
        }
        writer.flush()
    }
}
