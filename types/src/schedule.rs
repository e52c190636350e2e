//! Per-target payout eligibility.
//!
//! A target is either ready to batch, backing off after failed attempts, or
//! deferred because the last batch was not worth its fee. The retry timestamp
//! lives inside the state so every transition is explicit and testable.

use serde::{Deserialize, Serialize};

use crate::Timestamp;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum PayoutSchedule {
    #[default]
    Ready,
    /// Linear backoff after `failures` consecutive failed batches.
    Backoff { failures: u32, until: Timestamp },
    /// Waiting for more value; does not count as a failure.
    Deferred { failures: u32, until: Timestamp },
}

impl PayoutSchedule {
    /// Whether a batch may be attempted at `now`.
    pub fn is_due(&self, now: Timestamp) -> bool {
        match self {
            Self::Ready => true,
            Self::Backoff { until, .. } | Self::Deferred { until, .. } => now >= *until,
        }
    }

    /// Consecutive failed batches so far.
    pub fn failures(&self) -> u32 {
        match self {
            Self::Ready => 0,
            Self::Backoff { failures, .. } | Self::Deferred { failures, .. } => *failures,
        }
    }

    pub fn next_attempt_at(&self) -> Option<Timestamp> {
        match self {
            Self::Ready => None,
            Self::Backoff { until, .. } | Self::Deferred { until, .. } => Some(*until),
        }
    }

    /// A batch failed: wait `failures * step_secs` before the next attempt.
    pub fn after_failure(&self, now: Timestamp, step_secs: u64) -> Self {
        let failures = self.failures().saturating_add(1);
        Self::Backoff {
            failures,
            until: now.plus_secs(u64::from(failures).saturating_mul(step_secs)),
        }
    }

    /// A batch was not worth sending: wait for more value.
    pub fn after_deferral(&self, now: Timestamp, deferral_secs: u64) -> Self {
        Self::Deferred {
            failures: self.failures(),
            until: now.plus_secs(deferral_secs),
        }
    }

    /// A batch was paid.
    pub fn after_success(&self) -> Self {
        Self::Ready
    }

    /// New value was owed to the target. Ends a deferral early; a backoff is
    /// left untouched.
    pub fn on_new_value(&self, now: Timestamp) -> Self {
        match *self {
            Self::Deferred { failures: 0, .. } => Self::Ready,
            Self::Deferred { failures, .. } => Self::Backoff {
                failures,
                until: now,
            },
            other => other,
        }
    }
}
