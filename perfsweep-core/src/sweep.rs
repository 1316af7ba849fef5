//! Enumeration and execution of a parameter sweep.
//!
//! A [`SweepSpace`] lists the values of every configuration dimension. The sweep visits the
//! cartesian product of all dimensions in a fixed nested order, from the outermost to the
//! innermost dimension:
//!
//! servers, replicas, server span, value size, key space length, test, clients.
//!
//! Every point is checked against the [validation rules](VALIDATION_RULES), turned into an
//! immutable [`RunConfig`] and handed to a [`ClusterRunner`]. Points are run strictly one after
//! another, since every run occupies the whole cluster.

use std::fmt;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, InvocationError, Violation};
use crate::layout::ClusterShape;
use crate::quota::{OpsTarget, Quota};
use crate::runner::{ClientCommand, ClientOptions, ClusterOptions, ClusterRunner, Invocation};
use crate::topology::Topology;

/// The values of every configuration dimension of a sweep.
#[derive(Clone, Debug, PartialEq)]
pub struct SweepSpace {
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
    /// Names of the tests to run.
    pub tests: Vec<String>,
    /// Numbers of concurrent clients.
    pub clients: Vec<NonZeroU32>,
}

impl Default for SweepSpace {
    fn default() -> Self {
        Self {
            servers: vec![4],
            replicas: vec![3],
            server_span: vec![1],
            value_size: vec![3],
            key_space_len: vec![1],
            tests: vec![],
            clients: vec![],
        }
    }
}

impl SweepSpace {
    /// Checks that every dimension has at least one value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let dimensions = [
            ("servers", self.servers.is_empty()),
            ("replicas", self.replicas.is_empty()),
            ("server_span", self.server_span.is_empty()),
            ("value_size", self.value_size.is_empty()),
            ("key_space_len", self.key_space_len.is_empty()),
            ("tests", self.tests.is_empty()),
            ("clients", self.clients.is_empty()),
        ];

        match dimensions.into_iter().find(|(_, empty)| *empty) {
            Some((name, _)) => Err(ConfigError::EmptyDimension(name)),
            None => Ok(()),
        }
    }

    /// The number of points in this sweep.
    pub fn len(&self) -> usize {
        self.shape_count() * self.tests.len() * self.clients.len()
    }

    /// Returns `true` if the sweep has no points.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn shape_count(&self) -> usize {
        self.servers.len()
            * self.replicas.len()
            * self.server_span.len()
            * self.value_size.len()
            * self.key_space_len.len()
    }

    /// All combinations of the numeric cluster dimensions, in sweep order.
    pub fn shapes(&self) -> impl Iterator<Item = ClusterShape> + '_ {
        let Self {
            servers,
            replicas,
            server_span,
            value_size,
            key_space_len,
            ..
        } = self;

        servers.iter().flat_map(move |&servers| {
            replicas.iter().flat_map(move |&replicas| {
                server_span.iter().flat_map(move |&server_span| {
                    value_size.iter().flat_map(move |&value_size| {
                        key_space_len.iter().map(move |&key_space_len| ClusterShape {
                            servers,
                            replicas,
                            server_span,
                            value_size,
                            key_space_len,
                        })
                    })
                })
            })
        })
    }

    /// All points of the sweep, in sweep order.
    pub fn points(&self) -> impl Iterator<Item = SweepPoint> + '_ {
        self.shapes().flat_map(move |shape| {
            self.tests.iter().flat_map(move |test| {
                self.clients.iter().map(move |&clients| SweepPoint {
                    shape,
                    test: test.clone(),
                    clients,
                })
            })
        })
    }
}

/// One assignment of every sweep dimension.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct SweepPoint {
    /// The numeric cluster parameters.
    pub shape: ClusterShape,
    /// The test to run.
    pub test: String,
    /// The number of concurrent clients.
    pub clients: NonZeroU32,
}

impl fmt::Display for SweepPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} clients={} ({})",
            self.test,
            self.clients,
            self.shape.dir_name()
        )
    }
}

/// A precondition every sweep point has to satisfy before it is run.
pub type ValidationRule = fn(&ClusterShape) -> Result<(), Violation>;

/// The rules checked for every sweep point.
pub const VALIDATION_RULES: &[ValidationRule] = &[enough_servers, span_within_servers];

fn enough_servers(shape: &ClusterShape) -> Result<(), Violation> {
    if shape.servers <= shape.replicas {
        return Err(Violation::InsufficientServers {
            servers: shape.servers,
            replicas: shape.replicas,
        });
    }
    Ok(())
}

fn span_within_servers(shape: &ClusterShape) -> Result<(), Violation> {
    if shape.server_span > shape.servers {
        return Err(Violation::SpanExceedsServers {
            span: shape.server_span,
            servers: shape.servers,
        });
    }
    Ok(())
}

/// Checks a shape against all [`VALIDATION_RULES`].
pub fn validate_shape(shape: &ClusterShape) -> Result<(), Violation> {
    VALIDATION_RULES.iter().try_for_each(|rule| rule(shape))
}

/// Settings shared by all runs of a sweep.
#[derive(Clone, Debug, PartialEq)]
pub struct RunOptions {
    /// Cluster settings.
    pub cluster: ClusterOptions,
    /// Benchmark client settings.
    pub client: ClientOptions,
    /// How many operations every run executes.
    pub ops: OpsTarget,
    /// Root directory of all results.
    pub output_root: PathBuf,
}

/// A fully resolved sweep point, ready to be run.
#[derive(Clone, Debug, PartialEq)]
pub struct RunConfig {
    /// The sweep point this configuration was derived from.
    pub point: SweepPoint,
    /// Distribution of clients over processes and threads.
    pub topology: Topology,
    /// Requests per client and total operations.
    pub quota: Quota,
    /// Directory the clients write their raw results to.
    pub output_dir: PathBuf,
}

impl RunConfig {
    /// Resolves the derived fields of `point`.
    pub fn new(point: SweepPoint, ops: OpsTarget, output_root: &Path) -> Self {
        let topology = Topology::resolve(point.clients);
        let quota = ops.quota(point.clients);
        let output_dir = output_root.join(point.shape.dir_name());

        Self {
            point,
            topology,
            quota,
            output_dir,
        }
    }

    /// Builds the invocation of the cluster runner for this configuration.
    pub fn invocation(&self, cluster: &ClusterOptions, client: &ClientOptions) -> Invocation {
        let shape = &self.point.shape;
        Invocation {
            servers: shape.servers,
            replicas: shape.replicas,
            client_processes: self.topology.processes,
            cluster: cluster.clone(),
            client: ClientCommand {
                binary: client.binary.clone(),
                test: self.point.test.clone(),
                value_size: shape.value_size,
                lrange_len: client.lrange_len,
                key_space_len: shape.key_space_len,
                server_span: shape.server_span,
                threads: self.topology.threads_per_process,
                requests: self.quota.per_client_requests,
                time_limit: client.time_limit,
                output_dir: self.output_dir.clone(),
            },
        }
    }
}

/// A validated sweep, ready to be planned or run.
#[derive(Debug)]
pub struct Sweep {
    space: SweepSpace,
    options: RunOptions,
}

impl Sweep {
    /// Creates a sweep after checking that every dimension has values.
    pub fn new(space: SweepSpace, options: RunOptions) -> Result<Self, ConfigError> {
        space.validate()?;
        Ok(Self { space, options })
    }

    /// The sweep space.
    pub fn space(&self) -> &SweepSpace {
        &self.space
    }

    /// The shared run options.
    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Resolves every point of the sweep, in sweep order.
    ///
    /// Points that violate a validation rule are yielded as errors.
    pub fn plan(&self) -> impl Iterator<Item = Result<RunConfig, (SweepPoint, Violation)>> + '_ {
        self.space.points().map(move |point| match validate_shape(&point.shape) {
            Ok(()) => Ok(RunConfig::new(
                point,
                self.options.ops,
                &self.options.output_root,
            )),
            Err(violation) => Err((point, violation)),
        })
    }

    /// Runs every valid point of the sweep on `runner`, one after another.
    ///
    /// Invalid points are skipped and failed runs are reported; neither stops the sweep.
    pub async fn run(&self, runner: &dyn ClusterRunner) -> SweepReport {
        let mut report = SweepReport::default();

        for planned in self.plan() {
            let config = match planned {
                Ok(config) => config,
                Err((point, violation)) => {
                    tracing::warn!(
                        point = %point,
                        error = &violation as &dyn std::error::Error,
                        "skipping invalid configuration"
                    );
                    report.push(point, PointOutcome::Skipped(violation));
                    continue;
                }
            };

            let outcome = match self.run_config(&config, runner).await {
                Ok(()) => PointOutcome::Completed,
                Err(error) => {
                    tracing::error!(
                        point = %config.point,
                        error = &error as &dyn std::error::Error,
                        "benchmark run failed"
                    );
                    PointOutcome::Failed(error)
                }
            };
            report.push(config.point, outcome);
        }

        report
    }

    async fn run_config(
        &self,
        config: &RunConfig,
        runner: &dyn ClusterRunner,
    ) -> Result<(), InvocationError> {
        tokio::fs::create_dir_all(&config.output_dir)
            .await
            .map_err(|cause| InvocationError::OutputDir {
                path: config.output_dir.clone(),
                cause,
            })?;

        tracing::info!(
            test = %config.point.test,
            clients = config.point.clients.get(),
            processes = config.topology.processes,
            threads = config.topology.threads_per_process,
            total_ops = config.quota.grand_total_ops,
            dir = %config.output_dir.display(),
            "===== TEST: {} CLIENTS: {} ({}) =====",
            config.point.test,
            config.point.clients,
            config.topology,
        );

        let invocation = config.invocation(&self.options.cluster, &self.options.client);
        runner.run(&invocation).await
    }
}

/// What happened to a single sweep point.
#[derive(Debug)]
pub enum PointOutcome {
    /// The cluster runner finished successfully.
    Completed,
    /// The point violated a validation rule and was not run.
    Skipped(Violation),
    /// The run did not complete.
    Failed(InvocationError),
}

/// The outcome of every point of a sweep, in sweep order.
#[derive(Debug, Default)]
pub struct SweepReport {
    /// Every visited point with its outcome.
    pub outcomes: Vec<(SweepPoint, PointOutcome)>,
}

impl SweepReport {
    fn push(&mut self, point: SweepPoint, outcome: PointOutcome) {
        self.outcomes.push((point, outcome));
    }

    /// Number of successfully completed runs.
    pub fn completed(&self) -> usize {
        self.count(|o| matches!(o, PointOutcome::Completed))
    }

    /// Number of points skipped by a validation rule.
    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, PointOutcome::Skipped(_)))
    }

    /// Number of runs that failed or timed out.
    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, PointOutcome::Failed(_)))
    }

    fn count(&self, f: impl Fn(&PointOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| f(o)).count()
    }
}
