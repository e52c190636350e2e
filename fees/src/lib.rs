//! Fee tracker: a bounded moving average of realized routing fees.
//!
//! Every payout records the fee the backend actually paid, keyed by the
//! destination's LNURL-pay endpoint. The batcher asks for an estimate before
//! deciding whether a batch is worth sending, so estimates improve as a split
//! pays out. Each key keeps only the last [`FEE_HISTORY_LEN`] fees (a FIFO:
//! when full, the oldest entry is evicted).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

use prism_types::params::{DEFAULT_FEE_ESTIMATE, FEE_HISTORY_LEN};
use prism_types::MilliSats;

/// Recent fees per destination key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeeTracker {
    history: BTreeMap<String, VecDeque<MilliSats>>,
}

impl FeeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a realized fee. Backends report outgoing fees with either
    /// sign; negative values are clamped to zero.
    pub fn record(&mut self, key: &str, fee_msat: i64) {
        let fee = MilliSats::new(fee_msat.max(0) as u64);
        let fees = self.history.entry(key.to_string()).or_default();
        fees.push_back(fee);
        while fees.len() > FEE_HISTORY_LEN {
            fees.pop_front();
        }
        tracing::trace!(key, fee_msat = fee.raw(), samples = fees.len(), "recorded fee");
    }

    /// Rounded mean of the recorded fees, or `None` without history.
    pub fn average(&self, key: &str) -> Option<MilliSats> {
        let fees = self.history.get(key).filter(|f| !f.is_empty())?;
        let total: u128 = fees.iter().map(|f| u128::from(f.raw())).sum();
        let count = fees.len() as u128;
        Some(MilliSats::new(((total * 2 + count) / (count * 2)) as u64))
    }

    /// The average, or the default estimate without history.
    pub fn estimate(&self, key: &str) -> MilliSats {
        self.average(key).unwrap_or(DEFAULT_FEE_ESTIMATE)
    }

    /// Recorded fees for `key`, oldest first.
    pub fn samples(&self, key: &str) -> Vec<MilliSats> {
        self.history
            .get(key)
            .map(|f| f.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}
