//! Nullable LNURL-pay endpoints.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use prism_lnurl::{address_to_url, InvoiceParams, LnurlClient, LnurlError, PayRequest};
use prism_types::MilliSats;

use crate::lock;

/// A pay-request document for `callback` accepting `min..=max` msat.
pub fn pay_request(callback: &str, min: MilliSats, max: MilliSats) -> PayRequest {
    PayRequest {
        callback: callback.to_string(),
        min_sendable: min,
        max_sendable: max,
        metadata: r#"[["text/plain","null"]]"#.to_string(),
        comment_allowed: 0,
        allows_nostr: false,
        nostr_pubkey: None,
        tag: "payRequest".to_string(),
    }
}

#[derive(Default)]
struct State {
    endpoints: HashMap<String, PayRequest>,
    unreachable: HashSet<String>,
    callback_errors: HashMap<String, String>,
    requests: Vec<(String, InvoiceParams)>,
    fetches: usize,
    counter: u64,
}

/// In-memory LNURL-pay endpoints keyed by URL.
///
/// Every invoice request is recorded and answered with a fresh fake BOLT11
/// string that encodes the requested amount.
#[derive(Default)]
pub struct NullLnurl {
    state: Mutex<State>,
}

impl NullLnurl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_endpoint(&self, url: &str, pay: PayRequest) {
        lock(&self.state).endpoints.insert(url.to_string(), pay);
    }

    /// Serve a Lightning address with the given range; returns its URL.
    pub fn add_address(&self, address: &str, min: MilliSats, max: MilliSats) -> String {
        self.add_address_with(address, |pay| {
            pay.min_sendable = min;
            pay.max_sendable = max;
        })
    }

    /// Serve a Lightning address, letting `configure` adjust the document.
    pub fn add_address_with(&self, address: &str, configure: impl FnOnce(&mut PayRequest)) -> String {
        let url = address_to_url(address).unwrap_or_else(|_| address.to_string());
        let mut pay = pay_request(
            &format!("{url}/callback"),
            MilliSats::new(1_000),
            MilliSats::from_sats(1_000_000),
        );
        configure(&mut pay);
        self.add_endpoint(&url, pay);
        url
    }

    /// Make `url` (an endpoint or a callback) fail with a transport error.
    pub fn set_unreachable(&self, url: &str, unreachable: bool) {
        let mut state = lock(&self.state);
        if unreachable {
            state.unreachable.insert(url.to_string());
        } else {
            state.unreachable.remove(url);
        }
    }

    /// Make `callback` answer `{"status":"ERROR","reason":reason}`.
    pub fn fail_callback(&self, callback: &str, reason: &str) {
        lock(&self.state)
            .callback_errors
            .insert(callback.to_string(), reason.to_string());
    }

    /// Every invoice request as `(callback, params)`.
    pub fn requests(&self) -> Vec<(String, InvoiceParams)> {
        lock(&self.state).requests.clone()
    }

    pub fn last_request(&self) -> Option<(String, InvoiceParams)> {
        lock(&self.state).requests.last().cloned()
    }

    pub fn fetch_count(&self) -> usize {
        lock(&self.state).fetches
    }
}

fn unreachable(url: &str) -> LnurlError {
    LnurlError::Unreachable {
        url: url.to_string(),
        reason: "connection refused".to_string(),
    }
}

#[async_trait]
impl LnurlClient for NullLnurl {
    async fn fetch_pay_request(&self, url: &str) -> Result<PayRequest, LnurlError> {
        let mut state = lock(&self.state);
        state.fetches += 1;
        if state.unreachable.contains(url) {
            return Err(unreachable(url));
        }
        state.endpoints.get(url).cloned().ok_or_else(|| unreachable(url))
    }

    async fn request_invoice(
        &self,
        callback: &str,
        params: &InvoiceParams,
    ) -> Result<String, LnurlError> {
        let mut state = lock(&self.state);
        if state.unreachable.contains(callback) {
            return Err(unreachable(callback));
        }
        if let Some(reason) = state.callback_errors.get(callback) {
            return Err(LnurlError::Callback(reason.clone()));
        }
        state
            .requests
            .push((callback.to_string(), params.clone()));
        state.counter += 1;
        Ok(format!("lnbc{}n1target{}", params.amount.raw(), state.counter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn serves_addresses() {
        let lnurl = NullLnurl::new();
        let url = lnurl.add_address("alice@example.com", MilliSats::new(1_000), MilliSats::new(9_000));
        assert_eq!(url, "https://example.com/.well-known/lnurlp/alice");

        let pay = lnurl.fetch_pay_request(&url).await.unwrap();
        assert_eq!(pay.max_sendable, MilliSats::new(9_000));

        let params = InvoiceParams {
            amount: MilliSats::new(2_000),
            ..InvoiceParams::default()
        };
        let invoice = lnurl.request_invoice(&pay.callback, &params).await.unwrap();
        assert!(invoice.starts_with("lnbc2000n1"));
        assert_eq!(lnurl.requests().len(), 1);

        lnurl.set_unreachable(&url, true);
        assert!(matches!(
            lnurl.fetch_pay_request(&url).await,
            Err(LnurlError::Unreachable { .. })
        ));
    }
}
