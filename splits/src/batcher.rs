//! Greedy batch planning.
//!
//! Obligations are taken in creation order. One that would push the batch
//! past the destination's max-sendable ends the batch, unless the batch is
//! still empty: then that obligation alone can never be sent and is skipped
//! so it does not block the ones behind it. Comments follow the same rule
//! against the destination's comment limit, except that the first comment of
//! a batch is truncated rather than skipped.

use prism_types::{MilliSats, OutgoingId, OutgoingPayment};

const COMMENT_SEPARATOR: &str = "\n";

/// Ceilings for one batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchLimits {
    pub max_amount: MilliSats,
    /// Longest comment the destination accepts; zero means none.
    pub max_comment: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Batch {
    pub ids: Vec<OutgoingId>,
    pub amount: MilliSats,
    pub comment: Option<String>,
    /// Payer identity shared by every batched obligation, if they agree.
    pub identifier: Option<String>,
    /// Obligations larger than `max_amount` on their own.
    pub oversized: Vec<OutgoingId>,
}

impl Batch {
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// The comment an obligation contributes: its own comment, prefixed with an
/// attribution line naming the payer when comments are forwarded.
pub fn comment_piece(payment: &OutgoingPayment, forward_comment: bool) -> Option<String> {
    let comment = payment.comment.as_deref().filter(|c| !c.trim().is_empty());
    let identifier = payment
        .identifier
        .as_deref()
        .filter(|_| forward_comment)
        .filter(|i| !i.is_empty());
    match (identifier, comment) {
        (Some(who), Some(comment)) => Some(format!("From {who}:{COMMENT_SEPARATOR}{comment}")),
        (Some(who), None) => Some(format!("From {who}")),
        (None, Some(comment)) => Some(comment.to_string()),
        (None, None) => None,
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

pub fn plan_batch<'a>(
    obligations: impl IntoIterator<Item = &'a OutgoingPayment>,
    limits: BatchLimits,
    forward_comment: bool,
) -> Batch {
    let mut batch = Batch::default();
    let mut comment = String::new();
    let mut identifiers: Vec<Option<&str>> = Vec::new();

    for payment in obligations {
        if !payment.status.is_payable() {
            continue;
        }

        let amount = match batch.amount.checked_add(payment.amount) {
            Some(total) if total <= limits.max_amount => total,
            _ if batch.is_empty() => {
                batch.oversized.push(payment.id.clone());
                continue;
            }
            _ => break,
        };

        let mut next_comment = None;
        if limits.max_comment > 0 {
            if let Some(piece) = comment_piece(payment, forward_comment) {
                let already = comment.split(COMMENT_SEPARATOR).any(|l| l == piece);
                if !already {
                    if comment.is_empty() {
                        next_comment = Some(truncate_chars(&piece, limits.max_comment));
                    } else {
                        let joined = format!("{comment}{COMMENT_SEPARATOR}{piece}");
                        if joined.chars().count() > limits.max_comment {
                            break;
                        }
                        next_comment = Some(joined);
                    }
                }
            }
        }

        batch.amount = amount;
        batch.ids.push(payment.id.clone());
        identifiers.push(payment.identifier.as_deref());
        if let Some(next) = next_comment {
            comment = next;
        }
    }

    if !comment.is_empty() {
        batch.comment = Some(comment);
    }
    if let Some(first) = identifiers.first().copied().flatten() {
        if identifiers.iter().all(|i| *i == Some(first)) {
            batch.identifier = Some(first.to_string());
        }
    }
    batch
}
