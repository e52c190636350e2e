//! Nostr events a split publishes: its profile and zap receipts.
//!
//! Publication is best effort. Failures are logged and never affect
//! settlement.

use prism_crypto::{metadata_event, relay_list_event, zap_receipt, Event, ZapRequest};
use prism_relay::IdentityResolver;
use prism_types::Timestamp;
use prism_utils::format_percent;

use crate::Split;

/// Kind-0 profile and kind-10002 relay list for `split`.
pub fn profile_events(split: &Split, relays: &[String], now: Timestamp) -> Vec<Event> {
    let about = split
        .percentages()
        .into_iter()
        .filter_map(|(id, fraction)| {
            split
                .target(&id)
                .map(|t| format!("{} {}", t.link(), format_percent(fraction)))
        })
        .collect::<Vec<_>>()
        .join("\n");
    let address = split.address();
    vec![
        metadata_event(split.key(), &address, &address, &about, now),
        relay_list_event(split.key(), relays, now),
    ]
}

/// Zap receipt for a paid invoice that carried `zap_request`.
pub fn receipt_event(
    split: &Split,
    zap_request: &str,
    bolt11: &str,
    paid_at: Timestamp,
) -> Option<(Event, Vec<String>)> {
    match ZapRequest::parse(zap_request) {
        Ok(request) => {
            let event = zap_receipt(split.key(), &request, bolt11, paid_at);
            Some((event, request.relays))
        }
        Err(e) => {
            tracing::warn!(split = %split.address(), error = %e, "stored zap request no longer parses");
            None
        }
    }
}

pub async fn publish_all(
    identity: &dyn IdentityResolver,
    relays: &[String],
    events: &[Event],
    what: &str,
    split: &str,
) -> bool {
    let mut ok = true;
    for event in events {
        match identity.publish(relays, event).await {
            Ok(accepted) => {
                tracing::debug!(split, what, kind = event.kind, accepted, "published")
            }
            Err(e) => {
                ok = false;
                tracing::warn!(split, what, kind = event.kind, error = %e, "failed to publish");
            }
        }
    }
    ok
}
