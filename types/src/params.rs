//! Settlement parameters shared by the engine and the node.

use serde::{Deserialize, Serialize};

use crate::MilliSats;

/// Fee assumed for a destination with no recorded history (msat).
pub const DEFAULT_FEE_ESTIMATE: MilliSats = MilliSats::new(1_000);

/// Number of realized fees kept per destination.
pub const FEE_HISTORY_LEN: usize = 10;

/// Tunables for the payout engine.
///
/// `Default` matches the values the service has always run with; the node
/// overrides the timing fields from its configuration file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementParams {
    /// How long a target waits after an uneconomical batch before trying
    /// again without new value arriving (seconds).
    pub deferral_secs: u64,

    /// Linear backoff step: after the n-th consecutive failure the target
    /// waits `n * backoff_step_secs`.
    pub backoff_step_secs: u64,

    /// Max-sendable assumed when a destination does not advertise one.
    pub default_max_sendable: MilliSats,

    /// The most a split accepts in one incoming invoice.
    pub split_max_sendable: MilliSats,

    /// Longest payer comment accepted on the split's own LNURL-pay endpoint.
    pub comment_allowed: u32,

    /// Expired incoming invoices older than this are pruned (seconds).
    pub expired_retention_secs: u64,
}

impl Default for SettlementParams {
    fn default() -> Self {
        Self {
            deferral_secs: 24 * 3600,
            backoff_step_secs: 60,
            default_max_sendable: MilliSats::from_sats(500_000),
            split_max_sendable: MilliSats::from_sats(500_000),
            comment_allowed: 256,
            expired_retention_secs: 7 * 24 * 3600,
        }
    }
}
