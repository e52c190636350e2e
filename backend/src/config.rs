//! Backend selection from configuration.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use prism_types::Clock;

use crate::ibex::DEFAULT_IBEX_URL;
use crate::{BackendError, IbexAuth, IbexBackend, LnbitsBackend, PaymentBackend, RefreshToken};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Lnbits,
    Ibex,
}

/// The `[backend]` table of the node configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Force a backend. Without it the first complete credential set wins:
    /// LNbits url+key, then IBEX email+password, then an IBEX refresh token.
    pub kind: Option<BackendKind>,
    pub url: Option<String>,
    /// LNbits admin key.
    pub admin_key: Option<String>,
    /// IBEX account id.
    pub account_id: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    /// IBEX developer (refresh) token.
    pub refresh_token: Option<String>,
}

impl BackendConfig {
    /// The backend this configuration selects.
    pub fn resolve_kind(&self) -> Result<BackendKind, BackendError> {
        if let Some(kind) = self.kind {
            return Ok(kind);
        }
        if self.url.is_some() && self.admin_key.is_some() {
            return Ok(BackendKind::Lnbits);
        }
        if self.account_id.is_some()
            && ((self.email.is_some() && self.password.is_some()) || self.refresh_token.is_some())
        {
            return Ok(BackendKind::Ibex);
        }
        Err(BackendError::Config("no lightning backend configured".into()))
    }

    /// Key under which this backend's persisted credential is stored.
    pub fn credential_key(&self) -> String {
        self.url.clone().unwrap_or_else(|| DEFAULT_IBEX_URL.to_string())
    }
}

/// Build the configured backend. `stored_token` is a refresh token persisted
/// by a previous run; it is preferred over the configured developer token.
pub fn build_backend(
    config: &BackendConfig,
    stored_token: Option<RefreshToken>,
    clock: Arc<dyn Clock>,
) -> Result<Arc<dyn PaymentBackend>, BackendError> {
    match config.resolve_kind()? {
        BackendKind::Lnbits => {
            let url = config
                .url
                .as_deref()
                .ok_or_else(|| BackendError::Config("LNbits url missing".into()))?;
            let key = config
                .admin_key
                .as_deref()
                .ok_or_else(|| BackendError::Config("LNbits admin key missing".into()))?;
            Ok(Arc::new(LnbitsBackend::with_clock(url, key, clock)?))
        }
        BackendKind::Ibex => {
            let account_id = config
                .account_id
                .as_deref()
                .ok_or_else(|| BackendError::Config("IBEX account id missing".into()))?;
            let configured_token = config.refresh_token.clone().map(|token| RefreshToken {
                token,
                expires_at: None,
            });
            let now = clock.now();
            let refresh_token = stored_token
                .filter(|t| t.is_valid(now))
                .or(configured_token);
            let auth = IbexAuth {
                email: config.email.clone(),
                password: config.password.clone(),
                refresh_token,
            };
            let url = config.url.as_deref().unwrap_or(DEFAULT_IBEX_URL);
            Ok(Arc::new(IbexBackend::with_clock(url, account_id, auth, clock)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_types::SystemClock;

    fn lnbits() -> BackendConfig {
        BackendConfig {
            url: Some("https://lnbits.example.com".into()),
            admin_key: Some("key".into()),
            ..BackendConfig::default()
        }
    }

    #[test]
    fn lnbits_wins_when_complete() {
        let mut config = lnbits();
        config.account_id = Some("acct".into());
        config.email = Some("a@b.c".into());
        config.password = Some("pw".into());
        assert_eq!(config.resolve_kind().unwrap(), BackendKind::Lnbits);
    }

    #[test]
    fn ibex_with_login_or_token() {
        let login = BackendConfig {
            account_id: Some("acct".into()),
            email: Some("a@b.c".into()),
            password: Some("pw".into()),
            ..BackendConfig::default()
        };
        assert_eq!(login.resolve_kind().unwrap(), BackendKind::Ibex);

        let token = BackendConfig {
            account_id: Some("acct".into()),
            refresh_token: Some("dev".into()),
            ..BackendConfig::default()
        };
        assert_eq!(token.resolve_kind().unwrap(), BackendKind::Ibex);
        assert_eq!(token.credential_key(), DEFAULT_IBEX_URL);
    }

    #[test]
    fn nothing_configured_is_an_error() {
        assert!(matches!(
            BackendConfig::default().resolve_kind(),
            Err(BackendError::Config(_))
        ));
        let half = BackendConfig {
            url: Some("https://lnbits.example.com".into()),
            ..BackendConfig::default()
        };
        assert!(half.resolve_kind().is_err());
    }

    #[test]
    fn builds_selected_backend() {
        let backend = build_backend(&lnbits(), None, Arc::new(SystemClock)).unwrap();
        assert_eq!(backend.name(), "LNbits");

        let ibex = BackendConfig {
            kind: Some(BackendKind::Ibex),
            account_id: Some("acct".into()),
            refresh_token: Some("dev".into()),
            ..BackendConfig::default()
        };
        assert_eq!(build_backend(&ibex, None, Arc::new(SystemClock)).unwrap().name(), "IBEX");
    }

    #[test]
    fn parses_from_toml_shape() {
        let config: BackendConfig = serde_json::from_value(serde_json::json!({
            "kind": "ibex",
            "account_id": "acct",
            "refresh_token": "dev"
        }))
        .unwrap();
        assert_eq!(config.kind, Some(BackendKind::Ibex));
    }
}
