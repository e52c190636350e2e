//! Cryptographic primitives for Prism.
//!
//! - **secp256k1 schnorr** keys and signatures (Nostr identities)
//! - **SHA-256** event ids over the canonical NIP-01 serialization
//! - **bech32** encodings: NIP-19 (`npub`, `nsec`, `nprofile`) and LUD-06 (`lnurl1...`)
//! - Zap request / zap receipt (NIP-57) and profile event builders

pub mod error;
pub mod event;
pub mod keys;
pub mod lud06;
pub mod nip19;
pub mod zap;

pub use error::CryptoError;
pub use event::{kind, Event, EventTemplate};
pub use keys::{PublicKey, SigningKey};
pub use lud06::{decode_lnurl, encode_lnurl};
pub use nip19::{decode_identity, encode_nprofile, encode_npub, encode_nsec, Nip19};
pub use zap::{metadata_event, relay_list_event, zap_receipt, ZapRequest};
