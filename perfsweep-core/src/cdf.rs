//! Latency percentile tables computed from raw per-client latency files.
//!
//! Raw latency files contain floating point samples separated by newlines or commas. Lines that
//! start with a timestamp (`<digits>.<digits> `) are log output of the benchmark client and are
//! ignored. All samples of all files are merged into a single distribution before percentiles are
//! computed.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{ReduceError, ReduceResult};

static TIMESTAMP_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+\.[0-9]+ ").expect("timestamp pattern is valid"));

/// Reads and merges the samples of all given latency files.
pub fn read_samples(paths: &[PathBuf]) -> ReduceResult<Vec<f64>> {
    let mut samples = Vec::new();
    for path in paths {
        let file = File::open(path).map_err(|e| ReduceError::io(path, e))?;
        parse_samples(BufReader::new(file), path, &mut samples)?;
    }
    Ok(samples)
}

/// Parses latency samples from `reader` and appends them to `samples`.
///
/// `path` is only used for error reporting.
pub fn parse_samples(
    reader: impl BufRead,
    path: &Path,
    samples: &mut Vec<f64>,
) -> ReduceResult<()> {
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| ReduceError::io(path, e))?;
        if TIMESTAMP_LINE.is_match(&line) {
            continue;
        }

        for token in line.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let sample = token
                .parse::<f64>()
                .ok()
                .filter(|value| !value.is_nan())
                .ok_or_else(|| ReduceError::Parse {
                    path: path.to_owned(),
                    line: index + 1,
                    token: token.to_owned(),
                })?;
            samples.push(sample);
        }
    }

    Ok(())
}

/// One point of a cumulative distribution.
///
/// `fraction` of all samples are less than or equal to `value`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PercentilePoint {
    /// The sample value at this point of the distribution.
    pub value: f64,
    /// The cumulative fraction in `0.0..=1.0`.
    pub fraction: f64,
}

/// A cumulative latency distribution sampled at fixed percentiles.
///
/// The table contains a synthetic origin `(0, 0)`, the minimum, the 1st through 99th percentile,
/// the 99.9th and 99.99th percentile, and the maximum. Percentile `p` is the sample at index
/// `floor(N * p)` of the sorted samples.
///
/// The high percentiles are only meaningful for at least 10,000 samples; with fewer samples they
/// collapse onto the largest values. For fewer than 100 samples the minimum's fraction `1/N` is
/// larger than some percentile fractions. Points are therefore ordered by fraction, and of several
/// points with the same fraction only the first (the minimum, if involved) is kept.
#[derive(Clone, Debug, PartialEq)]
pub struct PercentileTable {
    points: Vec<PercentilePoint>,
}

impl PercentileTable {
    /// Computes the percentile table of the given samples.
    pub fn from_samples(mut samples: Vec<f64>) -> ReduceResult<Self> {
        if samples.is_empty() {
            return Err(ReduceError::NoSamples);
        }
        samples.sort_by(f64::total_cmp);

        let n = samples.len();
        let at = |index: usize| samples[index.min(n - 1)];

        let mut points = Vec::with_capacity(104);
        points.push(PercentilePoint {
            value: 0.0,
            fraction: 0.0,
        });
        points.push(PercentilePoint {
            value: samples[0],
            fraction: 1.0 / n as f64,
        });
        for i in 1..100 {
            points.push(PercentilePoint {
                value: at(n * i / 100),
                fraction: i as f64 / 100.0,
            });
        }
        points.push(PercentilePoint {
            value: at(n * 999 / 1000),
            fraction: 0.999,
        });
        points.push(PercentilePoint {
            value: at(n * 9999 / 10000),
            fraction: 0.9999,
        });
        points.push(PercentilePoint {
            value: samples[n - 1],
            fraction: 1.0,
        });

        points.sort_by(|a, b| a.fraction.total_cmp(&b.fraction));
        points.dedup_by(|later, earlier| later.fraction == earlier.fraction);

        Ok(Self { points })
    }

    /// Reads all latency files and computes their combined percentile table.
    pub fn from_files(paths: &[PathBuf]) -> ReduceResult<Self> {
        Self::from_samples(read_samples(paths)?)
    }

    /// The points of this table in ascending fraction order.
    pub fn points(&self) -> &[PercentilePoint] {
        &self.points
    }

    /// Writes the table as `value    fraction` lines.
    pub fn write_to(&self, mut writer: impl Write) -> io::Result<()> {
        for point in &self.points {
            writeln!(writer, "{:8.4}    {:10.6}", point.value, point.fraction)?;
        }
        writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn parse(input: &str) -> ReduceResult<Vec<f64>> {
        let mut samples = Vec::new();
        parse_samples(Cursor::new(input), Path::new("test.dat"), &mut samples)?;
        Ok(samples)
    }

    #[test]
    fn parses_newline_and_comma_separated() {
        let samples = parse("1.5\n2,3, 4\n\n5\n").unwrap();
        assert_eq!(samples, [1.5, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn skips_timestamp_lines() {
        let samples = parse("1700000000.123 client started\n7\n8.5\n").unwrap();
        assert_eq!(samples, [7.0, 8.5]);
    }

    #[test]
    fn reports_bad_tokens() {
        let err = parse("1\n2\nabc\n").unwrap_err();
        let ReduceError::Parse { line, token, .. } = err else {
            panic!("expected parse error, got {err:?}");
        };
        assert_eq!(line, 3);
        assert_eq!(token, "abc");
    }

    #[test]
    fn empty_input_has_no_table() {
        assert!(matches!(
            PercentileTable::from_samples(vec![]),
            Err(ReduceError::NoSamples)
        ));
    }

    #[test]
    fn extremes_of_hundred_samples() {
        // 100 distinct values in scrambled order.
        let samples: Vec<f64> = (0..100).map(|i| ((i * 37) % 100 + 1) as f64).collect();
        let table = PercentileTable::from_samples(samples).unwrap();
        let points = table.points();

        assert_eq!(points[0], PercentilePoint { value: 0.0, fraction: 0.0 });
        assert_eq!(points[1], PercentilePoint { value: 1.0, fraction: 0.01 });
        assert_eq!(
            *points.last().unwrap(),
            PercentilePoint {
                value: 100.0,
                fraction: 1.0
            }
        );
        // The 50th percentile is the sample at index 50.
        let median = points.iter().find(|p| p.fraction == 0.5).unwrap();
        assert_eq!(median.value, 51.0);
    }

    #[test]
    fn full_table_for_large_sample_sets() {
        let samples: Vec<f64> = (0..20_000).rev().map(f64::from).collect();
        let table = PercentileTable::from_samples(samples).unwrap();
        let points = table.points();

        assert_eq!(points.len(), 104);
        assert_eq!(points[1].value, 0.0);
        assert_eq!(points[1].fraction, 1.0 / 20_000.0);
        assert_eq!(points[101].value, 19_980.0);
        assert_eq!(points[101].fraction, 0.999);
        assert_eq!(points[102].value, 19_998.0);
        assert_eq!(points[102].fraction, 0.9999);
        assert_eq!(points[103].value, 19_999.0);
    }

    #[test]
    fn monotonic_for_any_size() {
        for n in [1usize, 2, 7, 50, 100, 101, 999, 12_345] {
            let samples: Vec<f64> = (0..n).map(|i| ((i * 7919) % n) as f64 * 0.5).collect();
            let table = PercentileTable::from_samples(samples).unwrap();
            let points = table.points();

            assert_eq!(points.first().unwrap().fraction, 0.0);
            assert_eq!(points.last().unwrap().fraction, 1.0);
            for pair in points.windows(2) {
                assert!(pair[0].fraction < pair[1].fraction, "n={n}: {pair:?}");
                assert!(pair[0].value <= pair[1].value, "n={n}: {pair:?}");
            }
        }
    }

    #[test]
    fn duplicates_are_kept() {
        let table = PercentileTable::from_samples(vec![3.0; 200]).unwrap();
        assert!(table.points()[1..].iter().all(|p| p.value == 3.0));
    }

    #[test]
    fn writes_value_fraction_lines() {
        let table = PercentileTable::from_samples(vec![2.0; 1000]).unwrap();
        let mut out = Vec::new();
        table.write_to(&mut out).unwrap();

        let out = String::from_utf8(out).unwrap();
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 104);
        assert_eq!(lines[0], "  0.0000      0.000000");
        assert_eq!(lines[1], "  2.0000      0.001000");
        assert_eq!(lines[103], "  2.0000      1.000000");
    }
}
