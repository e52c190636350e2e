//! Nullable relay network: canned profiles and a log of published events.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use prism_crypto::{Event, PublicKey};
use prism_relay::{IdentityResolver, Profile, RelayError};

use crate::lock;

#[derive(Default)]
struct State {
    profiles: HashMap<PublicKey, Profile>,
    published: Vec<(Vec<String>, Event)>,
    offline: bool,
    lookups: usize,
}

#[derive(Default)]
pub struct NullIdentity {
    state: Mutex<State>,
}

impl NullIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_profile(&self, pubkey: PublicKey, profile: Profile) {
        lock(&self.state).profiles.insert(pubkey, profile);
    }

    /// A profile paying to `lud16`.
    pub fn add_lightning_address(&self, pubkey: PublicKey, lud16: &str) {
        self.add_profile(
            pubkey,
            Profile {
                lud16: Some(lud16.to_string()),
                ..Profile::default()
            },
        );
    }

    /// Fail every lookup and publish as if no relay answered.
    pub fn set_offline(&self, offline: bool) {
        lock(&self.state).offline = offline;
    }

    /// Published events with the relays they were sent to.
    pub fn published(&self) -> Vec<(Vec<String>, Event)> {
        lock(&self.state).published.clone()
    }

    pub fn published_kinds(&self) -> Vec<u32> {
        lock(&self.state)
            .published
            .iter()
            .map(|(_, event)| event.kind)
            .collect()
    }

    pub fn lookups(&self) -> usize {
        lock(&self.state).lookups
    }
}

#[async_trait]
impl IdentityResolver for NullIdentity {
    async fn resolve_profile(
        &self,
        pubkey: &PublicKey,
        _hints: &[String],
    ) -> Result<Profile, RelayError> {
        let mut state = lock(&self.state);
        state.lookups += 1;
        if state.offline {
            return Err(RelayError::NoRelays);
        }
        state
            .profiles
            .get(pubkey)
            .cloned()
            .ok_or_else(|| RelayError::ProfileNotFound(pubkey.to_hex()))
    }

    async fn publish(&self, relays: &[String], event: &Event) -> Result<usize, RelayError> {
        let mut state = lock(&self.state);
        if state.offline {
            return Err(RelayError::NoRelays);
        }
        state.published.push((relays.to_vec(), event.clone()));
        Ok(relays.len().max(1))
    }
}
