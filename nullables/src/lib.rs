//! Nullable infrastructure for deterministic testing.
//!
//! Every collaborator of the settlement engine (clock, Lightning backend,
//! LNURL-pay endpoints, Nostr relays, snapshot storage) sits behind a trait.
//! This crate provides in-memory implementations that:
//! - Return deterministic values
//! - Can be scripted and inspected programmatically
//! - Never touch the filesystem or network
//!
//! Usage: build `Services` from these in tests instead of the real clients.

pub mod backend;
pub mod clock;
pub mod identity;
pub mod lnurl;
pub mod store;

pub use backend::{CreatedInvoice, NullBackend};
pub use clock::NullClock;
pub use identity::NullIdentity;
pub use lnurl::{pay_request, NullLnurl};
pub use store::NullStore;

use std::sync::{Mutex, MutexGuard};

/// Lock ignoring poisoning; a panicking test must not cascade into others.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
