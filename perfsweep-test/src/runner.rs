//! A [`ClusterRunner`] that records invocations instead of talking to a cluster.

use std::collections::HashSet;
use std::sync::Mutex;

use perfsweep_core::error::InvocationError;
use perfsweep_core::runner::{ClusterRunner, Invocation};

use crate::fixtures;

/// Records every invocation and optionally fakes the output of the benchmark clients.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    invocations: Mutex<Vec<Invocation>>,
    fail_clients: HashSet<u32>,
    write_results: bool,
}

impl RecordingRunner {
    /// Creates a runner that succeeds for every invocation without writing files.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails every run with the given total client count.
    pub fn fail_for(mut self, clients: u32) -> Self {
        self.fail_clients.insert(clients);
        self
    }

    /// Writes raw latency and summary files for every successful run, like real clients would.
    ///
    /// Each client reports one second of run time and executes its full request quota.
    pub fn with_results(mut self) -> Self {
        self.write_results = true;
        self
    }

    /// All invocations received so far, in order.
    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ClusterRunner for RecordingRunner {
    async fn run(&self, invocation: &Invocation) -> Result<(), InvocationError> {
        self.invocations.lock().unwrap().push(invocation.clone());

        let clients = invocation.client_processes * invocation.client.threads;
        if self.fail_clients.contains(&clients) {
            return Err(InvocationError::Other(format!(
                "simulated failure with {clients} clients"
            )));
        }

        if self.write_results {
            let client = &invocation.client;
            fixtures::write_run(&client.output_dir, &client.test, clients, 1.0, client.requests);
        }

        Ok(())
    }
}
