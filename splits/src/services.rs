//! Collaborators shared by every split.

use std::sync::Arc;
use tokio::sync::Mutex;

use prism_backend::PaymentBackend;
use prism_crypto::SigningKey;
use prism_fees::FeeTracker;
use prism_lnurl::LnurlClient;
use prism_relay::IdentityResolver;
use prism_types::{Clock, SettlementParams, Timestamp};

/// Everything the engine talks to, passed explicitly into each operation.
pub struct Services {
    pub backend: Arc<dyn PaymentBackend>,
    pub lnurl: Arc<dyn LnurlClient>,
    pub identity: Arc<dyn IdentityResolver>,
    pub clock: Arc<dyn Clock>,
    pub fees: Mutex<FeeTracker>,
    /// Signs zap requests for splits that do not publish their own profile.
    pub process_key: Arc<SigningKey>,
    pub params: SettlementParams,
    /// Relays for profiles, zap requests and target resolution.
    pub relays: Vec<String>,
}

impl Services {
    pub fn builder(
        backend: Arc<dyn PaymentBackend>,
        lnurl: Arc<dyn LnurlClient>,
        identity: Arc<dyn IdentityResolver>,
        clock: Arc<dyn Clock>,
    ) -> ServicesBuilder {
        ServicesBuilder {
            backend,
            lnurl,
            identity,
            clock,
            fees: FeeTracker::new(),
            process_key: None,
            params: SettlementParams::default(),
            relays: Vec::new(),
        }
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }
}

pub struct ServicesBuilder {
    backend: Arc<dyn PaymentBackend>,
    lnurl: Arc<dyn LnurlClient>,
    identity: Arc<dyn IdentityResolver>,
    clock: Arc<dyn Clock>,
    fees: FeeTracker,
    process_key: Option<Arc<SigningKey>>,
    params: SettlementParams,
    relays: Vec<String>,
}

impl ServicesBuilder {
    pub fn fees(mut self, fees: FeeTracker) -> Self {
        self.fees = fees;
        self
    }

    pub fn process_key(mut self, key: Arc<SigningKey>) -> Self {
        self.process_key = Some(key);
        self
    }

    pub fn params(mut self, params: SettlementParams) -> Self {
        self.params = params;
        self
    }

    pub fn relays(mut self, relays: Vec<String>) -> Self {
        self.relays = relays;
        self
    }

    /// Without an explicit process key a fresh one is generated.
    pub fn build(self) -> Services {
        Services {
            backend: self.backend,
            lnurl: self.lnurl,
            identity: self.identity,
            clock: self.clock,
            fees: Mutex::new(self.fees),
            process_key: self
                .process_key
                .unwrap_or_else(|| Arc::new(SigningKey::generate())),
            params: self.params,
            relays: self.relays,
        }
    }
}
