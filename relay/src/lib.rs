//! Nostr relay access.
//!
//! The engine needs two things from the relay network: resolve a pubkey to
//! its kind-0 profile (to find the Lightning address a Nostr target is paid
//! at) and publish events (split profiles, zap receipts). Both sit behind
//! [`IdentityResolver`]; [`RelayPool`] implements it over websockets.

pub mod error;
pub mod message;
pub mod pool;
pub mod profile;
pub mod resolver;

pub use error::RelayError;
pub use message::{ClientMessage, Filter, RelayMessage};
pub use pool::{RelayPool, DEFAULT_RELAY_TIMEOUT};
pub use profile::Profile;
pub use resolver::IdentityResolver;
