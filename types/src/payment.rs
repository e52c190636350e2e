//! Incoming and outgoing payment records.
//!
//! These are the audit records of the settlement engine. They are plain data:
//! the transitions between states are enforced by `prism-splits`, which owns
//! the only code paths that mutate them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{IncomingId, MilliSats, OutgoingId, SplitId, TargetId, Timestamp, TypeError};

/// Lifecycle of an invoice issued to a payer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncomingStatus {
    /// Invoice issued, not yet paid.
    #[default]
    Pending,
    /// Backend confirmed payment; outgoing obligations exist.
    Received,
    /// Every obligation derived from this payment is complete.
    Complete,
    /// The invoice timed out unpaid.
    Expired,
}

impl IncomingStatus {
    /// Whether the payment has been settled into obligations.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Received | Self::Complete)
    }

    /// Whether no further transition is possible.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Complete | Self::Expired)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Received => "received",
            Self::Complete => "complete",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for IncomingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IncomingStatus {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "received" => Ok(Self::Received),
            "complete" => Ok(Self::Complete),
            "expired" => Ok(Self::Expired),
            other => Err(TypeError::InvalidStatus(other.to_string())),
        }
    }
}

/// Lifecycle of one obligation owed to one target.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutgoingStatus {
    #[default]
    Pending,
    /// Part of a batch whose payment is in flight.
    Paying,
    Complete,
    /// Last attempt failed; eligible for the next batch.
    Failed,
}

impl OutgoingStatus {
    /// Whether the batcher may pick this obligation up.
    pub fn is_payable(&self) -> bool {
        matches!(self, Self::Pending | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paying => "paying",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for OutgoingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One invoice issued to a payer of a split.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IncomingPayment {
    pub id: IncomingId,
    pub split_id: SplitId,
    #[serde(default)]
    pub status: IncomingStatus,
    pub amount: MilliSats,
    /// BOLT11 payment request handed to the payer.
    pub invoice: String,
    pub payment_hash: String,
    /// LNURL comment, or the content of the zap request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Payer identity: a Lightning address or a hex pubkey.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    /// Signed zap request (JSON) used to build the zap receipt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zap_request: Option<String>,
    /// Obligations created when this payment was received.
    #[serde(default)]
    pub outgoing: Vec<OutgoingId>,
    pub created_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settled_at: Option<Timestamp>,
}

/// One obligation owed to one target.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutgoingPayment {
    pub id: OutgoingId,
    pub target_id: TargetId,
    /// The incoming payment this obligation was split from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incoming_id: Option<IncomingId>,
    #[serde(default)]
    pub status: OutgoingStatus,
    pub amount: MilliSats,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    /// Message of the last failed attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    /// Invoice of the batch currently being paid, recorded before the
    /// backend call so an interrupted payment can be verified after restart.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_flight: Option<String>,
    pub created_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
}
