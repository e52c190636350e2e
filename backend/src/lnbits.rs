//! LNbits wallet backend (admin API key).

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use prism_types::{Clock, MilliSats, SystemClock, Timestamp};

use crate::http::{build_client, i64_at, read_json, required_str, str_at};
use crate::{
    BackendError, InvoiceDetails, InvoiceStatus, OutgoingPaymentStatus, PaymentBackend,
    PaymentDetails,
};

const NAME: &str = "LNbits";

pub struct LnbitsBackend {
    http: reqwest::Client,
    base_url: String,
    admin_key: String,
    clock: Arc<dyn Clock>,
}

impl LnbitsBackend {
    pub fn new(base_url: impl Into<String>, admin_key: impl Into<String>) -> Result<Self, BackendError> {
        Self::with_clock(base_url, admin_key, Arc::new(SystemClock))
    }

    pub fn with_clock(
        base_url: impl Into<String>,
        admin_key: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, BackendError> {
        let admin_key = admin_key.into();
        if admin_key.is_empty() {
            return Err(BackendError::Config("LNbits admin key is empty".into()));
        }
        Ok(Self {
            http: build_client()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            admin_key,
            clock,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and surface LNbits' `detail` error field as an API error.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<serde_json::Value, BackendError> {
        let response = request.header("X-Api-Key", &self.admin_key).send().await?;
        let (status, json) = read_json(response).await?;

        if let Some(detail) = json.get("detail") {
            let message = detail
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| detail.to_string());
            if status == reqwest::StatusCode::UNAUTHORIZED {
                return Err(BackendError::Unauthorized(message));
            }
            return Err(BackendError::Api {
                backend: NAME,
                message,
            });
        }
        if !status.is_success() {
            return Err(BackendError::Api {
                backend: NAME,
                message: format!("HTTP {status}"),
            });
        }
        Ok(json)
    }

    async fn get(&self, path: &str) -> Result<serde_json::Value, BackendError> {
        self.send(self.http.get(self.url(path))).await
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<serde_json::Value, BackendError> {
        self.send(self.http.post(self.url(path)).json(&body)).await
    }
}

/// Payment status as LNbits reports it: a top-level `status` in newer
/// versions, `details.status` in older ones.
fn payment_status(json: &serde_json::Value) -> Option<&str> {
    str_at(json, &["status"]).or_else(|| str_at(json, &["details", "status"]))
}

#[async_trait]
impl PaymentBackend for LnbitsBackend {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn setup(&self) -> Result<(), BackendError> {
        let wallet = self.get("/api/v1/wallet").await?;
        let balance = i64_at(&wallet, &["balance"]).unwrap_or(0).max(0) as u64;
        tracing::info!(
            wallet = str_at(&wallet, &["name"]).unwrap_or("?"),
            balance_sats = MilliSats::new(balance).to_sats(),
            "connected to LNbits wallet"
        );
        Ok(())
    }

    async fn create_invoice(
        &self,
        amount: MilliSats,
        description: &str,
        webhook: Option<&str>,
    ) -> Result<InvoiceDetails, BackendError> {
        // LNbits takes whole sats.
        let body = serde_json::json!({
            "out": false,
            "amount": amount.to_sats(),
            "memo": "invoice",
            "internal": false,
            "description_hash": hex::encode(Sha256::digest(description.as_bytes())),
            "unhashed_description": hex::encode(description.as_bytes()),
            "webhook": webhook,
        });
        let result = self.post("/api/v1/payments", body).await?;
        let invoice = str_at(&result, &["payment_request"])
            .or_else(|| str_at(&result, &["bolt11"]))
            .map(str::to_string)
            .ok_or_else(|| BackendError::InvalidResponse("missing payment_request".into()))?;
        Ok(InvoiceDetails {
            invoice,
            payment_hash: required_str(&result, &["payment_hash"])?,
        })
    }

    async fn pay_invoice(&self, invoice: &str) -> Result<PaymentDetails, BackendError> {
        let result = self
            .post("/api/v1/payments", serde_json::json!({ "out": true, "bolt11": invoice }))
            .await?;
        let payment_hash = required_str(&result, &["payment_hash"])?;

        let details = self.get(&format!("/api/v1/payments/{payment_hash}")).await?;
        let fee_msat = i64_at(&details, &["details", "fee"]).unwrap_or(0);

        Ok(PaymentDetails {
            payment_hash,
            fee_msat,
        })
    }

    async fn invoice_status(&self, payment_hash: &str) -> Result<InvoiceStatus, BackendError> {
        let result = self.get(&format!("/api/v1/payments/{payment_hash}")).await?;
        if result.get("paid").and_then(|p| p.as_bool()) == Some(true) {
            return Ok(InvoiceStatus::Paid);
        }
        if matches!(payment_status(&result), Some("expired" | "failed")) {
            return Ok(InvoiceStatus::Expired);
        }
        let expiry = i64_at(&result, &["details", "expiry"]).filter(|e| *e > 0);
        match expiry {
            Some(expiry) if self.clock.now() >= Timestamp::new(expiry as u64) => {
                Ok(InvoiceStatus::Expired)
            }
            _ => Ok(InvoiceStatus::Pending),
        }
    }

    async fn outgoing_status(&self, invoice: &str) -> Result<OutgoingPaymentStatus, BackendError> {
        let decoded = self
            .post("/api/v1/payments/decode", serde_json::json!({ "data": invoice }))
            .await?;
        let payment_hash = required_str(&decoded, &["payment_hash"])?;

        let result = match self.get(&format!("/api/v1/payments/{payment_hash}")).await {
            Ok(result) => result,
            Err(BackendError::Api { message, .. })
                if message.to_lowercase().contains("does not exist") =>
            {
                return Ok(OutgoingPaymentStatus::NotFound)
            }
            Err(e) => return Err(e),
        };

        if result.get("paid").and_then(|p| p.as_bool()) == Some(true) {
            let fee_msat = i64_at(&result, &["details", "fee"]).unwrap_or(0);
            return Ok(OutgoingPaymentStatus::Paid { fee_msat });
        }
        Ok(match payment_status(&result) {
            Some("failed") => OutgoingPaymentStatus::Failed,
            _ => OutgoingPaymentStatus::Pending,
        })
    }
}
