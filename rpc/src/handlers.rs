//! HTTP request handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::header::{CONTENT_TYPE, HOST};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use prism_node::tracing_spans::settle_incoming_span;
use prism_splits::{CreateInvoice, WebhookOutcome};
use prism_types::{IncomingId, MilliSats, SplitId};

use crate::error::RpcError;
use crate::server::RpcState;

// ── LNURL-pay ────────────────────────────────────────────────────────────

/// LUD-06 pay request of a split.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayRequestResponse {
    pub tag: String,
    pub callback: String,
    pub min_sendable: u64,
    pub max_sendable: u64,
    pub metadata: String,
    pub comment_allowed: u32,
    pub allows_nostr: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nostr_pubkey: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    /// Amount in msat.
    pub amount: Option<String>,
    pub comment: Option<String>,
    /// Signed zap request (NIP-57).
    pub nostr: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CallbackResponse {
    pub pr: String,
    pub routes: Vec<serde_json::Value>,
}

fn host(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.split(':').next())
        .filter(|h| !h.is_empty())
}

/// `GET /lnurlp/:name` and `GET /.well-known/lnurlp/:name`.
pub async fn pay_request(
    State(state): State<Arc<RpcState>>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Result<Json<PayRequestResponse>, RpcError> {
    let shared = state.find_split(&name, host(&headers)).await?;
    let mut split = shared.lock().await;

    let min = split.min_sendable(&state.services).await?.round_to_sats();
    let max = split.max_sendable(&state.services.params).round_to_sats();
    Ok(Json(PayRequestResponse {
        tag: "payRequest".to_string(),
        callback: format!("https://{}/lnurlp-callback/{}", split.domain, split.name),
        min_sendable: min.raw(),
        max_sendable: max.raw(),
        metadata: split.metadata_document(),
        comment_allowed: state.services.params.comment_allowed,
        allows_nostr: split.enable_zaps,
        nostr_pubkey: split.enable_zaps.then(|| split.pubkey().to_hex()),
    }))
}

/// `GET /lnurlp-callback/:name?amount=<msat>[&comment=..][&nostr=..]`.
pub async fn pay_callback(
    State(state): State<Arc<RpcState>>,
    Path(name): Path<String>,
    Query(params): Query<CallbackParams>,
    headers: HeaderMap,
) -> Result<Json<CallbackResponse>, RpcError> {
    let amount = params
        .amount
        .as_deref()
        .and_then(|a| a.trim().parse::<u64>().ok())
        .map(MilliSats::new)
        .ok_or_else(|| RpcError::InvalidRequest("missing amount".into()))?;

    let comment = params.comment.filter(|c| !c.is_empty());
    let comment_allowed = state.services.params.comment_allowed as usize;
    if comment
        .as_ref()
        .is_some_and(|c| c.chars().count() > comment_allowed)
    {
        return Err(RpcError::InvalidRequest(format!(
            "comment longer than {comment_allowed} characters"
        )));
    }

    let shared = state.find_split(&name, host(&headers)).await?;
    let mut split = shared.lock().await;

    let min = split.min_sendable(&state.services).await?.round_to_sats();
    let max = split.max_sendable(&state.services.params).round_to_sats();
    if amount < min {
        return Err(RpcError::InvalidRequest(format!(
            "amount less than minSendable ({min})"
        )));
    }
    if amount > max {
        return Err(RpcError::InvalidRequest(format!(
            "amount greater than maxSendable ({max})"
        )));
    }

    let incoming = split
        .create_invoice(
            &state.services,
            CreateInvoice {
                amount,
                comment,
                identifier: None,
                zap_request: params.nostr.filter(|z| !z.is_empty()),
            },
        )
        .await?;
    state.metrics.invoices_created.inc();

    Ok(Json(CallbackResponse {
        pr: incoming.invoice,
        routes: Vec::new(),
    }))
}

// ── Webhooks ─────────────────────────────────────────────────────────────

/// `GET|POST /webhook/:split_id/:id`, called by the backend once an invoice
/// is paid. Repeated calls are acknowledged without effect.
pub async fn payment_webhook(
    State(state): State<Arc<RpcState>>,
    Path((split_id, incoming_id)): Path<(String, String)>,
) -> Result<&'static str, RpcError> {
    let split_id: SplitId = split_id
        .parse()
        .map_err(|_| RpcError::SplitNotFound(split_id.clone()))?;
    let incoming_id: IncomingId = incoming_id
        .parse()
        .map_err(|_| RpcError::InvalidRequest(format!("invalid payment id {incoming_id}")))?;

    let shared = state
        .registry
        .get(&split_id)
        .await
        .ok_or_else(|| RpcError::SplitNotFound(split_id.to_string()))?;
    let mut split = shared.lock().await;
    let span = settle_incoming_span(&split.address(), incoming_id.as_str());

    match split
        .handle_webhook(&incoming_id, &state.services)
        .instrument(span)
        .await?
    {
        WebhookOutcome::Settled(obligations) => {
            state.metrics.incoming_settled.inc();
            tracing::debug!(incoming = %incoming_id, obligations = obligations.len(), "webhook settled payment");
        }
        WebhookOutcome::AlreadyHandled(status) => {
            tracing::debug!(incoming = %incoming_id, status = %status, "webhook for handled payment");
        }
        WebhookOutcome::NotPaid => {
            tracing::debug!(incoming = %incoming_id, "webhook before payment");
        }
        WebhookOutcome::Expired => {
            state.metrics.incoming_expired.inc();
        }
    }
    Ok("success")
}

// ── Metrics ──────────────────────────────────────────────────────────────

/// `GET /metrics` in the Prometheus text format.
pub async fn metrics(State(state): State<Arc<RpcState>>) -> Result<impl IntoResponse, RpcError> {
    if !state.enable_metrics {
        return Err(RpcError::MetricsDisabled);
    }
    let body = state
        .metrics
        .encode()
        .map_err(|e| RpcError::Server(e.to_string()))?;
    Ok(([(CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}
