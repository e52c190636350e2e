//! IBEX Hub backend (bearer tokens).
//!
//! IBEX issues a short-lived access token and a long-lived refresh token.
//! The access token is treated as expired a little before its advertised
//! expiry, and dropped immediately if a request comes back 401; the request
//! is then retried once with a fresh token. When the refresh token itself is
//! rejected or expired the backend signs in again with email and password,
//! if it has them.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use prism_types::{Clock, MilliSats, SystemClock, Timestamp};

use crate::http::{build_client, i64_at, read_json, required_str, str_at};
use crate::{
    BackendError, InvoiceDetails, InvoiceStatus, PaymentBackend, PaymentDetails, RefreshToken,
};

const NAME: &str = "IBEX";

pub const DEFAULT_IBEX_URL: &str = "https://ibexhub.ibexmercado.com";

/// Seconds before the advertised expiry at which a token is refreshed.
const EXPIRY_MARGIN_SECS: u64 = 30;

/// Invoice lifetime requested from IBEX (seconds).
const INVOICE_EXPIRATION_SECS: u64 = 120;

/// How the backend authenticates.
#[derive(Clone, Debug, Default)]
pub struct IbexAuth {
    pub email: Option<String>,
    pub password: Option<String>,
    pub refresh_token: Option<RefreshToken>,
}

#[derive(Default)]
struct Session {
    access_token: Option<String>,
    access_expires_at: Option<Timestamp>,
    refresh_token: Option<RefreshToken>,
}

impl Session {
    fn valid_access_token(&self, now: Timestamp) -> Option<&str> {
        let token = self.access_token.as_deref()?;
        match self.access_expires_at {
            Some(exp) if now.plus_secs(EXPIRY_MARGIN_SECS) >= exp => None,
            _ => Some(token),
        }
    }

    fn valid_refresh_token(&self, now: Timestamp) -> Option<&str> {
        self.refresh_token
            .as_ref()
            .filter(|t| t.is_valid(now))
            .map(|t| t.token.as_str())
    }
}

pub struct IbexBackend {
    http: reqwest::Client,
    base_url: String,
    account_id: String,
    email: Option<String>,
    password: Option<String>,
    session: Mutex<Session>,
    clock: Arc<dyn Clock>,
}

fn api_error(json: &serde_json::Value) -> Option<String> {
    ["Error", "error"].iter().find_map(|k| {
        json.get(*k).filter(|v| !v.is_null()).map(|v| {
            v.as_str()
                .map(str::to_string)
                .unwrap_or_else(|| v.to_string())
        })
    })
}

fn timestamp_at(json: &serde_json::Value, key: &str) -> Option<Timestamp> {
    i64_at(json, &[key])
        .filter(|t| *t > 0)
        .map(|t| Timestamp::new(t as u64))
}

impl IbexBackend {
    pub fn new(
        base_url: impl Into<String>,
        account_id: impl Into<String>,
        auth: IbexAuth,
    ) -> Result<Self, BackendError> {
        Self::with_clock(base_url, account_id, auth, Arc::new(SystemClock))
    }

    pub fn with_clock(
        base_url: impl Into<String>,
        account_id: impl Into<String>,
        auth: IbexAuth,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, BackendError> {
        let has_login = auth.email.is_some() && auth.password.is_some();
        if !has_login && auth.refresh_token.is_none() {
            return Err(BackendError::Config(
                "IBEX needs email and password or a refresh token".into(),
            ));
        }
        Ok(Self {
            http: build_client()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            account_id: account_id.into(),
            email: auth.email,
            password: auth.password,
            session: Mutex::new(Session {
                refresh_token: auth.refresh_token,
                ..Session::default()
            }),
            clock,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<serde_json::Value, BackendError> {
        let response = request.header("Accept", "application/json").send().await?;
        let (status, json) = read_json(response).await?;
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(BackendError::Unauthorized(
                api_error(&json).unwrap_or_else(|| format!("HTTP {status}")),
            ));
        }
        if let Some(message) = api_error(&json) {
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

    async fn sign_in(&self, session: &mut Session) -> Result<(), BackendError> {
        let (Some(email), Some(password)) = (&self.email, &self.password) else {
            return Err(BackendError::Unauthorized(
                "refresh token rejected and no email/password configured".into(),
            ));
        };
        let result = self
            .send(self.http.post(self.url("/auth/signin")).json(&serde_json::json!({
                "email": email,
                "password": password,
            })))
            .await?;

        session.access_token = Some(required_str(&result, &["accessToken"])?);
        session.access_expires_at = timestamp_at(&result, "accessTokenExpiresAt");
        session.refresh_token = Some(RefreshToken {
            token: required_str(&result, &["refreshToken"])?,
            expires_at: timestamp_at(&result, "refreshTokenExpiresAt"),
        });
        tracing::info!("signed in to IBEX");
        Ok(())
    }

    async fn refresh_access_token(&self, session: &mut Session) -> Result<(), BackendError> {
        let now = self.clock.now();
        let Some(refresh) = session.valid_refresh_token(now).map(str::to_string) else {
            return self.sign_in(session).await;
        };

        let result = self
            .send(
                self.http
                    .post(self.url("/auth/refresh-access-token"))
                    .json(&serde_json::json!({ "refreshToken": refresh })),
            )
            .await;

        match result {
            Ok(result) => {
                session.access_token = Some(required_str(&result, &["accessToken"])?);
                session.access_expires_at = timestamp_at(&result, "expiresAt");
                tracing::debug!("refreshed IBEX access token");
                Ok(())
            }
            Err(BackendError::Unauthorized(_)) | Err(BackendError::Api { .. })
                if self.email.is_some() =>
            {
                tracing::warn!("IBEX refresh token rejected, signing in again");
                session.refresh_token = None;
                self.sign_in(session).await
            }
            Err(e) => Err(e),
        }
    }

    async fn access_token(&self) -> Result<String, BackendError> {
        let mut session = self.session.lock().await;
        if let Some(token) = session.valid_access_token(self.clock.now()) {
            return Ok(token.to_string());
        }
        self.refresh_access_token(&mut session).await?;
        session
            .access_token
            .clone()
            .ok_or_else(|| BackendError::Unauthorized("no access token".into()))
    }

    async fn invalidate_access_token(&self) {
        let mut session = self.session.lock().await;
        session.access_token = None;
        session.access_expires_at = None;
    }

    /// Authenticated request; on 401 the access token is dropped and the
    /// request retried once.
    async fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, BackendError> {
        let mut retried = false;
        loop {
            let token = self.access_token().await?;
            let mut request = self
                .http
                .request(method.clone(), self.url(path))
                .header(reqwest::header::AUTHORIZATION, token);
            if let Some(body) = &body {
                request = request.json(body);
            }
            match self.send(request).await {
                Err(BackendError::Unauthorized(reason)) if !retried => {
                    tracing::debug!(%reason, "IBEX rejected access token, retrying");
                    self.invalidate_access_token().await;
                    retried = true;
                }
                other => return other,
            }
        }
    }
}

#[async_trait]
impl PaymentBackend for IbexBackend {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn setup(&self) -> Result<(), BackendError> {
        let account = self
            .request(
                reqwest::Method::GET,
                &format!("/v2/account/{}", self.account_id),
                None,
            )
            .await?;
        let balance = i64_at(&account, &["balance"]).unwrap_or(0).max(0) as u64;
        tracing::info!(
            account = str_at(&account, &["name"]).unwrap_or("?"),
            balance_sats = MilliSats::new(balance).to_sats(),
            "connected to IBEX account"
        );
        Ok(())
    }

    async fn create_invoice(
        &self,
        amount: MilliSats,
        description: &str,
        webhook: Option<&str>,
    ) -> Result<InvoiceDetails, BackendError> {
        let body = serde_json::json!({
            "amountMsat": amount.raw(),
            "accountId": self.account_id,
            "descPrehash": description,
            "webhookUrl": webhook,
            "expiration": INVOICE_EXPIRATION_SECS,
        });
        let result = self
            .request(reqwest::Method::POST, "/invoice/add", Some(body))
            .await?;
        Ok(InvoiceDetails {
            invoice: required_str(&result, &["bolt11"])?,
            payment_hash: required_str(&result, &["hash"])?,
        })
    }

    async fn pay_invoice(&self, invoice: &str) -> Result<PaymentDetails, BackendError> {
        let body = serde_json::json!({ "bolt11": invoice, "accountId": self.account_id });
        let result = self
            .request(reqwest::Method::POST, "/v2/invoice/pay", Some(body))
            .await?;
        Ok(PaymentDetails {
            payment_hash: required_str(&result, &["transaction", "payment", "hash"])?,
            fee_msat: i64_at(&result, &["transaction", "networkFee"]).unwrap_or(0),
        })
    }

    async fn invoice_status(&self, payment_hash: &str) -> Result<InvoiceStatus, BackendError> {
        let result = self
            .request(
                reqwest::Method::GET,
                &format!("/invoice/from-hash/{payment_hash}"),
                None,
            )
            .await?;
        Ok(match str_at(&result, &["state", "name"]) {
            Some("SETTLED") => InvoiceStatus::Paid,
            Some("CANCELED" | "CANCELLED" | "EXPIRED") => InvoiceStatus::Expired,
            _ => InvoiceStatus::Pending,
        })
    }

    async fn refresh_token(&self) -> Option<RefreshToken> {
        self.session.lock().await.refresh_token.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_some_credential() {
        assert!(matches!(
            IbexBackend::new(DEFAULT_IBEX_URL, "acct", IbexAuth::default()),
            Err(BackendError::Config(_))
        ));
        let only_email = IbexAuth {
            email: Some("a@b.c".into()),
            ..IbexAuth::default()
        };
        assert!(IbexBackend::new(DEFAULT_IBEX_URL, "acct", only_email).is_err());
    }

    #[test]
    fn access_token_expires_early() {
        let session = Session {
            access_token: Some("tok".into()),
            access_expires_at: Some(Timestamp::new(1_000)),
            refresh_token: None,
        };
        assert_eq!(session.valid_access_token(Timestamp::new(900)), Some("tok"));
        assert_eq!(session.valid_access_token(Timestamp::new(970)), None);
    }

    #[test]
    fn error_field_either_case() {
        assert_eq!(
            api_error(&serde_json::json!({ "Error": "insufficient balance" })),
            Some("insufficient balance".to_string())
        );
        assert_eq!(
            api_error(&serde_json::json!({ "error": "bad hash" })),
            Some("bad hash".to_string())
        );
        assert_eq!(api_error(&serde_json::json!({ "error": null })), None);
    }
}
