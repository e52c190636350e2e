//! Nostr events (NIP-01).
//!
//! The event id is the SHA-256 of the canonical JSON array
//! `[0, pubkey, created_at, kind, tags, content]`, and the signature is a
//! BIP-340 schnorr signature over that id.

use secp256k1::schnorr::Signature;
use secp256k1::{Message, SECP256K1};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::str::FromStr;

use prism_types::Timestamp;

use crate::{CryptoError, PublicKey, SigningKey};

/// Event kinds used by Prism.
pub mod kind {
    pub const METADATA: u32 = 0;
    pub const ZAP_REQUEST: u32 = 9734;
    pub const ZAP_RECEIPT: u32 = 9735;
    pub const RELAY_LIST: u32 = 10002;
}

/// A signed Nostr event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub pubkey: PublicKey,
    pub created_at: u64,
    pub kind: u32,
    #[serde(default)]
    pub tags: Vec<Vec<String>>,
    #[serde(default)]
    pub content: String,
    pub sig: String,
}

/// An event before it is signed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventTemplate {
    pub kind: u32,
    pub tags: Vec<Vec<String>>,
    pub content: String,
}

fn compute_id(
    pubkey: &PublicKey,
    created_at: u64,
    kind: u32,
    tags: &[Vec<String>],
    content: &str,
) -> [u8; 32] {
    let canonical = serde_json::json!([0, pubkey.to_hex(), created_at, kind, tags, content]);
    Sha256::digest(canonical.to_string().as_bytes()).into()
}

impl EventTemplate {
    pub fn new(kind: u32, content: impl Into<String>) -> Self {
        Self {
            kind,
            tags: Vec::new(),
            content: content.into(),
        }
    }

    /// Append a tag such as `["p", <hex>]`.
    pub fn tag<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.push(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn sign(self, key: &SigningKey, created_at: Timestamp) -> Event {
        let pubkey = key.public_key();
        let created_at = created_at.as_secs();
        let id = compute_id(&pubkey, created_at, self.kind, &self.tags, &self.content);
        let sig = SECP256K1.sign_schnorr(&Message::from_digest(id), key.keypair());
        Event {
            id: hex::encode(id),
            pubkey,
            created_at,
            kind: self.kind,
            tags: self.tags,
            content: self.content,
            sig: sig.to_string(),
        }
    }
}

impl Event {
    /// Check that the id matches the content and the signature is valid.
    pub fn verify(&self) -> Result<(), CryptoError> {
        let id = compute_id(
            &self.pubkey,
            self.created_at,
            self.kind,
            &self.tags,
            &self.content,
        );
        if hex::encode(id) != self.id.to_lowercase() {
            return Err(CryptoError::IdMismatch);
        }
        let sig = Signature::from_str(&self.sig).map_err(|_| CryptoError::InvalidSignature)?;
        SECP256K1
            .verify_schnorr(&sig, &Message::from_digest(id), self.pubkey.inner())
            .map_err(|_| CryptoError::InvalidSignature)
    }

    /// First value of the first tag named `name`.
    pub fn tag_value(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.first().map(String::as_str) == Some(name))
            .and_then(|t| t.get(1))
            .map(String::as_str)
    }

    /// Every tag named `name`, without the name itself.
    pub fn tags_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a [String]> + 'a {
        self.tags
            .iter()
            .filter(move |t| t.first().map(String::as_str) == Some(name))
            .map(|t| &t[1..])
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_json(s: &str) -> Result<Self, CryptoError> {
        serde_json::from_str(s).map_err(|e| CryptoError::InvalidEvent(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(key: &SigningKey) -> Event {
        EventTemplate::new(kind::METADATA, "{\"name\":\"alice\"}")
            .tag(["p", "abc"])
            .tag(["relays", "wss://a", "wss://b"])
            .sign(key, Timestamp::new(1_700_000_000))
    }

    #[test]
    fn signed_event_verifies() {
        let key = SigningKey::generate();
        let event = sample(&key);
        assert_eq!(event.pubkey, key.public_key());
        assert_eq!(event.id.len(), 64);
        assert!(event.verify().is_ok());
    }

    #[test]
    fn tampered_content_fails() {
        let key = SigningKey::generate();
        let mut event = sample(&key);
        event.content.push('!');
        assert_eq!(event.verify(), Err(CryptoError::IdMismatch));
    }

    #[test]
    fn foreign_signature_fails() {
        let key = SigningKey::generate();
        let other = SigningKey::generate();
        let mut event = sample(&key);
        event.sig = sample(&other).sig;
        assert_eq!(event.verify(), Err(CryptoError::InvalidSignature));
    }

    #[test]
    fn tag_lookup() {
        let event = sample(&SigningKey::generate());
        assert_eq!(event.tag_value("p"), Some("abc"));
        assert_eq!(event.tag_value("e"), None);
        let relays: Vec<_> = event.tags_named("relays").collect();
        assert_eq!(relays.len(), 1);
        assert_eq!(relays[0].to_vec(), vec!["wss://a".to_string(), "wss://b".to_string()]);
    }

    #[test]
    fn json_roundtrip_still_verifies() {
        let event = sample(&SigningKey::generate());
        let parsed = Event::from_json(&event.to_json()).unwrap();
        assert_eq!(parsed, event);
        assert!(parsed.verify().is_ok());
    }

    #[test]
    fn id_escapes_control_characters() {
        let key = SigningKey::generate();
        let event = EventTemplate::new(kind::ZAP_REQUEST, "line1\nline2\t\"quoted\"")
            .sign(&key, Timestamp::new(1));
        assert!(event.verify().is_ok());
    }
}
