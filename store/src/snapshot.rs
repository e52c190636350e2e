//! Snapshot records.
//!
//! Missing optional fields default to their documented values, so snapshots
//! written by older builds keep loading.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use prism_crypto::SigningKey;
use prism_fees::FeeTracker;
use prism_types::{
    IncomingPayment, OutgoingPayment, PayoutSchedule, SplitId, TargetId, TargetKind, Timestamp,
};

/// Current snapshot format.
pub const SNAPSHOT_VERSION: u32 = 1;

fn default_true() -> bool {
    true
}

fn default_weight() -> u32 {
    1
}

/// Everything the node persists.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub version: u32,
    /// Process-wide signing key, generated on first start.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_key: Option<SigningKey>,
    #[serde(default)]
    pub splits: Vec<SplitRecord>,
    /// Incoming payments of every split (each names its split).
    #[serde(default)]
    pub incoming: Vec<IncomingPayment>,
    /// Outgoing obligations of every target (each names its target).
    #[serde(default)]
    pub outgoing: Vec<OutgoingPayment>,
    #[serde(default)]
    pub fees: FeeTracker,
    /// Backend refresh tokens by credential key.
    #[serde(default)]
    pub refresh_tokens: BTreeMap<String, StoredToken>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SplitRecord {
    pub id: SplitId,
    pub name: String,
    pub domain: String,
    pub key: SigningKey,
    #[serde(default)]
    pub api_key: String,
    /// Sign zap requests and publish zap receipts.
    #[serde(default = "default_true")]
    pub enable_zaps: bool,
    /// Publish a kind-0 profile for the split.
    #[serde(default = "default_true")]
    pub publish_profile: bool,
    #[serde(default)]
    pub targets: Vec<TargetRecord>,
    #[serde(default = "Timestamp::now")]
    pub created_at: Timestamp,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TargetRecord {
    pub id: TargetId,
    #[serde(default)]
    pub kind: TargetKind,
    pub input: String,
    #[serde(default = "default_weight")]
    pub weight: u32,
    #[serde(default)]
    pub fixed: bool,
    #[serde(default = "default_true")]
    pub forward_comment: bool,
    /// Minimum share of a batch that must survive the fee (percent).
    #[serde(default)]
    pub payout_threshold: f64,
    #[serde(default)]
    pub schedule: PayoutSchedule,
    /// Resolved LNURL-pay endpoint, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

/// A persisted backend refresh token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<Timestamp>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_target_gets_defaults() {
        let record: TargetRecord =
            serde_json::from_str(r#"{"id":"t1","input":"alice@example.com"}"#).unwrap();
        assert_eq!(record.kind, TargetKind::Lnurl);
        assert_eq!(record.weight, 1);
        assert!(!record.fixed);
        assert!(record.forward_comment);
        assert_eq!(record.payout_threshold, 0.0);
        assert_eq!(record.schedule, PayoutSchedule::Ready);
    }

    #[test]
    fn empty_document_is_an_empty_snapshot() {
        let snapshot: Snapshot = serde_json::from_str("{}").unwrap();
        assert_eq!(snapshot.version, 0);
        assert!(snapshot.splits.is_empty());
        assert!(snapshot.fees.is_empty());
        assert!(snapshot.process_key.is_none());
    }
}
