//! Pay-request documents and the invoice-request rules.

use serde::{Deserialize, Serialize};

use prism_types::MilliSats;

use crate::{LnurlClient, LnurlError};

pub const PAY_REQUEST_TAG: &str = "payRequest";

/// A LUD-06 pay-request document (with LUD-12 comments and NIP-57 zap
/// fields).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayRequest {
    pub callback: String,
    #[serde(default)]
    pub min_sendable: MilliSats,
    /// Zero when the endpoint did not advertise one.
    #[serde(default)]
    pub max_sendable: MilliSats,
    #[serde(default)]
    pub metadata: String,
    #[serde(default)]
    pub comment_allowed: u32,
    #[serde(default)]
    pub allows_nostr: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nostr_pubkey: Option<String>,
    pub tag: String,
}

impl PayRequest {
    /// `max_sendable`, or `fallback` if the endpoint left it out.
    pub fn max_sendable_or(&self, fallback: MilliSats) -> MilliSats {
        if self.max_sendable.is_zero() {
            fallback
        } else {
            self.max_sendable
        }
    }
}

/// What to ask a callback for.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InvoiceParams {
    pub amount: MilliSats,
    pub comment: Option<String>,
    /// Signed kind-9734 zap request (JSON).
    pub zap_request: Option<String>,
}

/// Fetch an invoice from the LNURL-pay endpoint at `url`.
///
/// The amount must be within the advertised range. A zap request is sent
/// only to endpoints that allow Nostr; otherwise the comment is sent, but
/// only if the endpoint accepts comments and it fits.
pub async fn fetch_invoice(
    client: &dyn LnurlClient,
    url: &str,
    params: InvoiceParams,
) -> Result<String, LnurlError> {
    let pay = client.fetch_pay_request(url).await?;

    let max = pay.max_sendable_or(MilliSats::new(u64::MAX));
    if params.amount < pay.min_sendable || params.amount > max {
        return Err(LnurlError::AmountOutOfRange {
            amount: params.amount,
            min: pay.min_sendable,
            max,
        });
    }

    let mut query = InvoiceParams {
        amount: params.amount,
        comment: None,
        zap_request: None,
    };
    match params.zap_request {
        Some(zap) if pay.allows_nostr => query.zap_request = Some(zap),
        _ => {
            if let Some(comment) = params.comment.filter(|c| !c.is_empty()) {
                if pay.comment_allowed > 0 {
                    let len = comment.chars().count();
                    if len > pay.comment_allowed as usize {
                        return Err(LnurlError::CommentTooLong {
                            len,
                            max: pay.comment_allowed,
                        });
                    }
                    query.comment = Some(comment);
                }
            }
        }
    }

    client.request_invoice(&pay.callback, &query).await
}

/// The `metadata` string of a split's own pay request: a plain-text address
/// and one `label: pct%` line per target.
pub fn split_metadata(address: &str, shares: &[(String, f64)]) -> String {
    let long_desc = shares
        .iter()
        .map(|(label, fraction)| format!("{label}: {:.2}%", fraction * 100.0))
        .collect::<Vec<_>>()
        .join("\n");
    serde_json::json!([["text/plain", address], ["text/long-desc", long_desc]]).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Fixed {
        pay: PayRequest,
        last: Mutex<Option<InvoiceParams>>,
    }

    #[async_trait]
    impl LnurlClient for Fixed {
        async fn fetch_pay_request(&self, _url: &str) -> Result<PayRequest, LnurlError> {
            Ok(self.pay.clone())
        }

        async fn request_invoice(
            &self,
            _callback: &str,
            params: &InvoiceParams,
        ) -> Result<String, LnurlError> {
            *self.last.lock().unwrap() = Some(params.clone());
            Ok("lnbc1fake".into())
        }
    }

    fn endpoint(comment_allowed: u32, allows_nostr: bool) -> Fixed {
        Fixed {
            pay: PayRequest {
                callback: "https://example.com/cb".into(),
                min_sendable: MilliSats::new(1_000),
                max_sendable: MilliSats::new(100_000),
                metadata: "[]".into(),
                comment_allowed,
                allows_nostr,
                nostr_pubkey: None,
                tag: PAY_REQUEST_TAG.into(),
            },
            last: Mutex::new(None),
        }
    }

    fn params(amount: u64, comment: Option<&str>, zap: Option<&str>) -> InvoiceParams {
        InvoiceParams {
            amount: MilliSats::new(amount),
            comment: comment.map(String::from),
            zap_request: zap.map(String::from),
        }
    }

    #[tokio::test]
    async fn rejects_out_of_range_amounts() {
        let client = endpoint(0, false);
        for amount in [999, 100_001] {
            let err = fetch_invoice(&client, "u", params(amount, None, None))
                .await
                .unwrap_err();
            assert!(matches!(err, LnurlError::AmountOutOfRange { .. }));
        }
        assert!(client.last.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn comment_sent_only_when_allowed() {
        let client = endpoint(0, false);
        fetch_invoice(&client, "u", params(5_000, Some("hi"), None))
            .await
            .unwrap();
        assert_eq!(client.last.lock().unwrap().as_ref().unwrap().comment, None);

        let client = endpoint(10, false);
        fetch_invoice(&client, "u", params(5_000, Some("hi"), None))
            .await
            .unwrap();
        assert_eq!(
            client.last.lock().unwrap().as_ref().unwrap().comment.as_deref(),
            Some("hi")
        );

        let err = fetch_invoice(&client, "u", params(5_000, Some("far too long"), None))
            .await
            .unwrap_err();
        assert_eq!(err, LnurlError::CommentTooLong { len: 12, max: 10 });
    }

    #[tokio::test]
    async fn zap_request_needs_nostr_support() {
        let client = endpoint(10, true);
        fetch_invoice(&client, "u", params(5_000, Some("hi"), Some("{}")))
            .await
            .unwrap();
        let sent = client.last.lock().unwrap().clone().unwrap();
        assert_eq!(sent.zap_request.as_deref(), Some("{}"));
        assert_eq!(sent.comment, None);

        let client = endpoint(10, false);
        fetch_invoice(&client, "u", params(5_000, Some("hi"), Some("{}")))
            .await
            .unwrap();
        let sent = client.last.lock().unwrap().clone().unwrap();
        assert_eq!(sent.zap_request, None);
        assert_eq!(sent.comment.as_deref(), Some("hi"));
    }

    #[test]
    fn metadata_document() {
        let doc = split_metadata(
            "tips@prism.example.com",
            &[("alice@example.com".into(), 0.25), ("bob@example.com".into(), 0.75)],
        );
        let parsed: serde_json::Value = serde_json::from_str(&doc).unwrap();
        assert_eq!(parsed[0][1], "tips@prism.example.com");
        assert_eq!(
            parsed[1][1],
            "alice@example.com: 25.00%\nbob@example.com: 75.00%"
        );
    }

    #[test]
    fn pay_request_uses_camel_case() {
        let json = r#"{"callback":"https://x/cb","minSendable":1000,"maxSendable":0,
                      "metadata":"[]","tag":"payRequest","commentAllowed":32}"#;
        let pay: PayRequest = serde_json::from_str(json).unwrap();
        assert_eq!(pay.comment_allowed, 32);
        assert!(!pay.allows_nostr);
        assert_eq!(pay.max_sendable_or(MilliSats::new(7)), MilliSats::new(7));
    }
}
