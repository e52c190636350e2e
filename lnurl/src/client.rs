//! The LNURL client seam and its HTTP implementation.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::pay::PAY_REQUEST_TAG;
use crate::{InvoiceParams, LnurlError, PayRequest};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// How long fetched pay-request metadata is reused.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

#[async_trait]
pub trait LnurlClient: Send + Sync {
    /// GET the pay-request document at `url`.
    async fn fetch_pay_request(&self, url: &str) -> Result<PayRequest, LnurlError>;

    /// Call `callback` with `params` and return the BOLT11 invoice (`pr`).
    async fn request_invoice(
        &self,
        callback: &str,
        params: &InvoiceParams,
    ) -> Result<String, LnurlError>;
}

/// reqwest-backed client with a small TTL cache for pay-request metadata.
pub struct HttpLnurlClient {
    http: reqwest::Client,
    cache: Mutex<HashMap<String, (Instant, PayRequest)>>,
    ttl: Duration,
}

impl HttpLnurlClient {
    pub fn new() -> Result<Self, LnurlError> {
        Self::with_ttl(DEFAULT_CACHE_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Result<Self, LnurlError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("prism/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LnurlError::InvalidInput(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            http,
            cache: Mutex::new(HashMap::new()),
            ttl,
        })
    }

    async fn get_json(&self, url: reqwest::Url) -> Result<serde_json::Value, LnurlError> {
        let display = url.to_string();
        let unreachable_err = |reason: String| LnurlError::Unreachable {
            url: display.clone(),
            reason,
        };
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| unreachable_err(e.to_string()))?;
        let status = response.status();
        let json = response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| LnurlError::InvalidResponse(format!("{display}: {e}")))?;

        // LUD-06 error shape, on any HTTP status.
        if json.get("status").and_then(|s| s.as_str()) == Some("ERROR") {
            let reason = json
                .get("reason")
                .and_then(|r| r.as_str())
                .unwrap_or("unknown error");
            return Err(LnurlError::Callback(reason.to_string()));
        }
        if !status.is_success() {
            return Err(unreachable_err(format!("HTTP {status}")));
        }
        Ok(json)
    }
}

#[async_trait]
impl LnurlClient for HttpLnurlClient {
    async fn fetch_pay_request(&self, url: &str) -> Result<PayRequest, LnurlError> {
        if let Some((fetched, pay)) = self.cache.lock().await.get(url) {
            if fetched.elapsed() < self.ttl {
                return Ok(pay.clone());
            }
        }

        let parsed =
            reqwest::Url::parse(url).map_err(|e| LnurlError::InvalidInput(format!("{url}: {e}")))?;
        let json = self.get_json(parsed).await?;
        let pay: PayRequest = serde_json::from_value(json)
            .map_err(|e| LnurlError::InvalidResponse(format!("{url}: {e}")))?;
        if pay.tag != PAY_REQUEST_TAG {
            return Err(LnurlError::InvalidResponse(format!(
                "{url}: expected tag payRequest, got {}",
                pay.tag
            )));
        }
        tracing::debug!(url, min = %pay.min_sendable, max = %pay.max_sendable, "fetched LNURL-pay metadata");

        self.cache
            .lock()
            .await
            .insert(url.to_string(), (Instant::now(), pay.clone()));
        Ok(pay)
    }

    async fn request_invoice(
        &self,
        callback: &str,
        params: &InvoiceParams,
    ) -> Result<String, LnurlError> {
        let mut url = reqwest::Url::parse(callback)
            .map_err(|e| LnurlError::InvalidResponse(format!("bad callback {callback}: {e}")))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("amount", &params.amount.raw().to_string());
            if let Some(comment) = &params.comment {
                query.append_pair("comment", comment);
            }
            if let Some(zap) = &params.zap_request {
                query.append_pair("nostr", zap);
            }
        }

        let json = self.get_json(url).await?;
        json.get("pr")
            .and_then(|pr| pr.as_str())
            .map(str::to_string)
            .ok_or_else(|| LnurlError::InvalidResponse(format!("{callback}: missing pr")))
    }
}
