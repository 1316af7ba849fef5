//! Per-client request quotas derived from the configured operation target.

use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How many operations a single sweep point should execute.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpsTarget {
    /// A fixed number of operations shared by all clients of a run.
    Total(u64),
    /// A fixed number of operations for every single client.
    PerClient(u64),
}

impl OpsTarget {
    /// Builds the target from two mutually exclusive options.
    ///
    /// Exactly one of `total` and `per_client` must be set.
    pub fn from_options(total: Option<u64>, per_client: Option<u64>) -> Result<Self, ConfigError> {
        match (total, per_client) {
            (Some(total), None) => Ok(Self::Total(total)),
            (None, Some(per_client)) => Ok(Self::PerClient(per_client)),
            (Some(_), Some(_)) => Err(ConfigError::ConflictingOpsTarget),
            (None, None) => Err(ConfigError::MissingOpsTarget),
        }
    }

    /// Computes the request quota for a run with `clients` concurrent clients.
    ///
    /// For a [total](Self::Total) target the quota is `total / clients`, truncated. The remainder
    /// of up to `clients - 1` operations is not executed, while `grand_total_ops` still reports the
    /// configured total.
    pub fn quota(self, clients: NonZeroU32) -> Quota {
        let clients = u64::from(clients.get());
        match self {
            Self::Total(total) => Quota {
                per_client_requests: total / clients,
                grand_total_ops: total,
            },
            Self::PerClient(per_client) => Quota {
                per_client_requests: per_client,
                grand_total_ops: per_client * clients,
            },
        }
    }
}

/// The request quota of a single sweep point.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Quota {
    /// Number of requests each client thread issues.
    pub per_client_requests: u64,
    /// Number of operations the run is expected to execute in total.
    pub grand_total_ops: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    const EIGHT: NonZeroU32 = NonZeroU32::new(8).unwrap();

    #[test]
    fn requires_exactly_one_target() {
        assert_eq!(
            OpsTarget::from_options(None, None),
            Err(ConfigError::MissingOpsTarget)
        );
        assert_eq!(
            OpsTarget::from_options(Some(1), Some(1)),
            Err(ConfigError::ConflictingOpsTarget)
        );
        assert_eq!(
            OpsTarget::from_options(Some(10), None),
            Ok(OpsTarget::Total(10))
        );
        assert_eq!(
            OpsTarget::from_options(None, Some(10)),
            Ok(OpsTarget::PerClient(10))
        );
    }

    #[test]
    fn total_is_split_across_clients() {
        let quota = OpsTarget::Total(100_000).quota(EIGHT);
        assert_eq!(quota.per_client_requests, 12_500);
        assert_eq!(quota.grand_total_ops, 100_000);
    }

    #[test]
    fn per_client_is_multiplied() {
        let quota = OpsTarget::PerClient(500).quota(EIGHT);
        assert_eq!(quota.per_client_requests, 500);
        assert_eq!(quota.grand_total_ops, 4_000);
    }

    #[test]
    fn total_remainder_is_dropped() {
        let quota = OpsTarget::Total(10).quota(NonZeroU32::new(3).unwrap());
        assert_eq!(quota.per_client_requests, 3);
        assert_eq!(quota.grand_total_ops, 10);
    }
}
