//! Pre-built [`tracing::Span`] constructors for the node's recurring work.
//!
//! Using consistent span names and field sets makes it easy to filter and
//! correlate a split's payouts across ticks.

use tracing::{info_span, Span};

/// Span covering one payout tick over every split.
pub fn payout_tick_span(splits: usize) -> Span {
    info_span!("payout_tick", splits = splits)
}

/// Span covering one invoice-status sweep over every split.
pub fn invoice_sweep_span(splits: usize) -> Span {
    info_span!("invoice_sweep", splits = splits)
}

/// Span covering settlement of a single paid invoice.
pub fn settle_incoming_span(split: &str, incoming: &str) -> Span {
    info_span!("settle_incoming", split = %split, incoming = %incoming)
}

/// Span covering the payout work of one split within a tick.
pub fn pay_batch_span(split: &str) -> Span {
    info_span!("pay_batch", split = %split)
}
