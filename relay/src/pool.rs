//! Websocket relay pool.
//!
//! Each call opens a short-lived connection per relay, runs one exchange and
//! closes it again. Relays are queried concurrently and every exchange is
//! bounded by the pool timeout, so one slow relay cannot stall a tick.

use async_trait::async_trait;
use futures_util::future::join_all;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use prism_crypto::{kind, Event, PublicKey};

use crate::{ClientMessage, Filter, IdentityResolver, Profile, RelayError, RelayMessage};

type Socket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

pub const DEFAULT_RELAY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct RelayPool {
    relays: Vec<String>,
    timeout: Duration,
}

impl RelayPool {
    pub fn new(relays: Vec<String>) -> Self {
        Self {
            relays,
            timeout: DEFAULT_RELAY_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn relays(&self) -> &[String] {
        &self.relays
    }

    /// `extra` followed by the pool's own relays, without duplicates.
    fn targets(&self, extra: &[String]) -> Vec<String> {
        dedupe(extra.iter().chain(&self.relays))
    }
}

fn dedupe<'a>(relays: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for relay in relays {
        let relay = relay.trim().trim_end_matches('/');
        if !relay.is_empty() && !out.iter().any(|r| r == relay) {
            out.push(relay.to_string());
        }
    }
    out
}

fn subscription_id() -> String {
    format!("prism-{:016x}", rand::random::<u64>())
}

async fn connect(relay: &str) -> Result<Socket, RelayError> {
    let (socket, _) = connect_async(relay)
        .await
        .map_err(|e| RelayError::Connect {
            relay: relay.to_string(),
            reason: e.to_string(),
        })?;
    Ok(socket)
}

async fn send(socket: &mut Socket, message: &ClientMessage) -> Result<(), RelayError> {
    socket
        .send(Message::Text(message.to_json()))
        .await
        .map_err(|e| RelayError::Protocol(e.to_string()))
}

/// Next relay frame, or `None` once the relay hangs up.
async fn next_frame(socket: &mut Socket) -> Result<Option<RelayMessage>, RelayError> {
    while let Some(message) = socket.next().await {
        match message.map_err(|e| RelayError::Protocol(e.to_string()))? {
            Message::Text(text) => match RelayMessage::from_json(&text) {
                Ok(frame) => return Ok(Some(frame)),
                Err(e) => tracing::debug!(error = %e, "ignoring relay frame"),
            },
            Message::Close(_) => return Ok(None),
            _ => {}
        }
    }
    Ok(None)
}

/// Newest valid kind-0 event of `pubkey` held by `relay`.
async fn fetch_metadata(relay: &str, pubkey: &PublicKey) -> Result<Option<Event>, RelayError> {
    let mut socket = connect(relay).await?;
    let subscription = subscription_id();
    send(
        &mut socket,
        &ClientMessage::Req {
            subscription: subscription.clone(),
            filter: Filter {
                authors: vec![pubkey.to_hex()],
                kinds: vec![kind::METADATA],
                limit: Some(1),
            },
        },
    )
    .await?;

    let mut newest: Option<Event> = None;
    while let Some(frame) = next_frame(&mut socket).await? {
        match frame {
            RelayMessage::Event {
                subscription: sub,
                event,
            } if sub == subscription => {
                if event.pubkey != *pubkey || event.kind != kind::METADATA {
                    continue;
                }
                if let Err(e) = event.verify() {
                    tracing::debug!(relay, error = %e, "dropping unverifiable profile event");
                    continue;
                }
                if newest
                    .as_ref()
                    .map_or(true, |n| event.created_at > n.created_at)
                {
                    newest = Some(event);
                }
            }
            RelayMessage::Eose(sub) if sub == subscription => break,
            RelayMessage::Closed { message, .. } => {
                tracing::debug!(relay, %message, "relay closed subscription");
                break;
            }
            RelayMessage::Notice(message) => tracing::debug!(relay, %message, "relay notice"),
            _ => {}
        }
    }

    let _ = send(&mut socket, &ClientMessage::Close(subscription)).await;
    let _ = socket.close(None).await;
    Ok(newest)
}

/// Send `event` to `relay`; `Ok(true)` if the relay accepted it.
async fn send_event(relay: &str, event: &Event) -> Result<bool, RelayError> {
    let mut socket = connect(relay).await?;
    send(&mut socket, &ClientMessage::Event(event.clone())).await?;

    let mut accepted = false;
    while let Some(frame) = next_frame(&mut socket).await? {
        if let RelayMessage::Ok {
            event_id,
            accepted: ok,
            message,
        } = frame
        {
            if event_id == event.id {
                if !ok {
                    tracing::debug!(relay, %message, "relay rejected event");
                }
                accepted = ok;
                break;
            }
        }
    }
    let _ = socket.close(None).await;
    Ok(accepted)
}

#[async_trait]
impl IdentityResolver for RelayPool {
    async fn resolve_profile(
        &self,
        pubkey: &PublicKey,
        hints: &[String],
    ) -> Result<Profile, RelayError> {
        let relays = self.targets(hints);
        if relays.is_empty() {
            return Err(RelayError::NoRelays);
        }

        let results = join_all(relays.iter().map(|relay| async move {
            match tokio::time::timeout(self.timeout, fetch_metadata(relay, pubkey)).await {
                Ok(result) => result,
                Err(_) => Err(RelayError::Timeout(relay.clone())),
            }
        }))
        .await;

        let mut newest: Option<Event> = None;
        let mut first_error = None;
        let mut answered = false;
        for (relay, result) in relays.iter().zip(results) {
            match result {
                Ok(found) => {
                    answered = true;
                    if let Some(event) = found {
                        if newest
                            .as_ref()
                            .map_or(true, |n| event.created_at > n.created_at)
                        {
                            newest = Some(event);
                        }
                    }
                }
                Err(e) => {
                    tracing::debug!(relay = %relay, error = %e, "profile query failed");
                    first_error.get_or_insert(e);
                }
            }
        }

        match newest {
            Some(event) => Profile::from_content(&event.content)
                .ok_or_else(|| RelayError::ProfileNotFound(pubkey.to_hex())),
            None => match first_error {
                Some(e) if !answered => Err(e),
                _ => Err(RelayError::ProfileNotFound(pubkey.to_hex())),
            },
        }
    }

    async fn publish(&self, relays: &[String], event: &Event) -> Result<usize, RelayError> {
        let relays = if relays.is_empty() {
            self.targets(&[])
        } else {
            dedupe(relays.iter())
        };
        if relays.is_empty() {
            return Err(RelayError::NoRelays);
        }

        let results = join_all(relays.iter().map(|relay| async move {
            match tokio::time::timeout(self.timeout, send_event(relay, event)).await {
                Ok(result) => result,
                Err(_) => Err(RelayError::Timeout(relay.clone())),
            }
        }))
        .await;

        let mut accepted = 0;
        for (relay, result) in relays.iter().zip(results) {
            match result {
                Ok(true) => accepted += 1,
                Ok(false) => {}
                Err(e) => tracing::debug!(relay = %relay, error = %e, "publish failed"),
            }
        }
        tracing::debug!(kind = event.kind, accepted, total = relays.len(), "published event");

        if accepted == 0 {
            return Err(RelayError::Rejected(event.id.clone()));
        }
        Ok(accepted)
    }
}
