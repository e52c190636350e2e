//! The backend contract consumed by the settlement engine.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use prism_types::{MilliSats, Timestamp};

use crate::BackendError;

/// A freshly issued invoice.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvoiceDetails {
    /// BOLT11 payment request.
    pub invoice: String,
    pub payment_hash: String,
}

/// Result of a successful outgoing payment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentDetails {
    pub payment_hash: String,
    /// Routing fee in msat as reported by the backend. Some backends report
    /// outgoing fees as negative numbers; consumers clamp.
    pub fee_msat: i64,
}

/// Status of an invoice we issued.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvoiceStatus {
    Pending,
    Paid,
    Expired,
}

/// Status of an invoice we attempted to pay, used to recover payments that
/// were in flight when the process stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutgoingPaymentStatus {
    Paid { fee_msat: i64 },
    Pending,
    Failed,
    /// The backend has no record of paying this invoice.
    NotFound,
    /// The backend cannot answer.
    Unknown,
}

/// A long-lived credential the node persists between runs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshToken {
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<Timestamp>,
}

impl RefreshToken {
    pub fn is_valid(&self, now: Timestamp) -> bool {
        self.expires_at.map_or(true, |exp| now < exp)
    }
}

/// A Lightning node the engine can receive and send through.
#[async_trait]
pub trait PaymentBackend: Send + Sync {
    /// Short name used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Verify connectivity and credentials.
    async fn setup(&self) -> Result<(), BackendError>;

    /// Issue an invoice. `description` is committed to by hash (LUD-06
    /// metadata); `webhook` is called by the backend once the invoice is paid.
    async fn create_invoice(
        &self,
        amount: MilliSats,
        description: &str,
        webhook: Option<&str>,
    ) -> Result<InvoiceDetails, BackendError>;

    /// Pay a BOLT11 invoice and report the realized fee.
    async fn pay_invoice(&self, invoice: &str) -> Result<PaymentDetails, BackendError>;

    async fn invoice_status(&self, payment_hash: &str) -> Result<InvoiceStatus, BackendError>;

    /// Whether an invoice we tried to pay was actually paid.
    async fn outgoing_status(&self, _invoice: &str) -> Result<OutgoingPaymentStatus, BackendError> {
        Ok(OutgoingPaymentStatus::Unknown)
    }

    /// Credential to persist for the next start, if the backend uses one.
    async fn refresh_token(&self) -> Option<RefreshToken> {
        None
    }
}
