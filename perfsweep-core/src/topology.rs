//! Mapping of a requested client count onto benchmark processes and threads.

use std::fmt;
use std::num::NonZeroU32;

/// Thread counts per client process, in order of preference.
///
/// The first entry that evenly divides the requested client count wins, so larger thread counts
/// (and therefore fewer client processes) are preferred. `1` always divides, which makes the
/// resolution total.
pub const THREAD_PREFERENCE: [u32; 4] = [4, 3, 2, 1];

/// How a number of benchmark clients is spread across client processes.
///
/// Every client is one thread inside a benchmark process, so `processes * threads_per_process`
/// always equals the requested client count.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Topology {
    /// Number of benchmark client processes the cluster runner spawns.
    pub processes: u32,
    /// Number of client threads inside each of those processes.
    pub threads_per_process: u32,
}

impl Topology {
    /// Resolves the topology for `clients` concurrent benchmark clients.
    pub fn resolve(clients: NonZeroU32) -> Self {
        let clients = clients.get();
        let threads_per_process = THREAD_PREFERENCE
            .into_iter()
            .find(|threads| clients % threads == 0)
            .unwrap_or(1);

        Self {
            processes: clients / threads_per_process,
            threads_per_process,
        }
    }

    /// Total number of client threads across all processes.
    pub fn clients(&self) -> u32 {
        self.processes * self.threads_per_process
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.processes, self.threads_per_process)
    }
}
