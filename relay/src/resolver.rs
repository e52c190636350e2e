use async_trait::async_trait;

use prism_crypto::{Event, PublicKey};

use crate::{Profile, RelayError};

/// Resolves Nostr identities and publishes events.
///
/// Failures are soft: callers log them and retry on a later tick.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Newest kind-0 profile of `pubkey`. `hints` are relays named by the
    /// identity itself (e.g. from an nprofile) and are queried alongside the
    /// resolver's own relays.
    async fn resolve_profile(
        &self,
        pubkey: &PublicKey,
        hints: &[String],
    ) -> Result<Profile, RelayError>;

    /// Publish `event` to `relays` (or the resolver's own relays when empty).
    /// Returns how many relays accepted it.
    async fn publish(&self, relays: &[String], event: &Event) -> Result<usize, RelayError>;
}
