//! Paying one target: the outgoing state machine.
//!
//! A payout runs in three steps. [`prepare_payout`] plans a batch of
//! `Pending`/`Failed` obligations, checks the economics, fetches an invoice
//! and leaves the obligations `Paying` with the invoice recorded as in
//! flight. [`send_payout`] asks the backend to pay it and touches no engine
//! state, so the caller can persist the prepared state first and need not
//! hold the split while the payment routes. [`complete_payout`] applies the
//! result: complete, failed (linear backoff, counted), or deferred because
//! the fee would eat too much of the batch (long wait, not counted, ended
//! early by new value). Deferred and failed obligations go back to `Failed`
//! so the next batch picks them up again.

use prism_backend::{BackendError, PaymentDetails};
use prism_crypto::SigningKey;
use prism_types::{MilliSats, OutgoingId, OutgoingStatus, PayoutSchedule, TargetId, Timestamp};
use prism_utils::{format_sats, format_until};

use crate::batcher::{plan_batch, Batch, BatchLimits};
use crate::target::InvoiceRequest;
use crate::{PaymentBook, PayoutOutcome, Services, SplitError, Target};

/// Split-level inputs to a payout.
pub struct PayoutContext<'a> {
    pub split: &'a str,
    pub signer: &'a SigningKey,
    pub zaps: bool,
}

/// A batch whose obligations are `Paying` and whose invoice is recorded on
/// them, waiting to be paid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingPayout {
    pub split: String,
    pub target_id: TargetId,
    pub ids: Vec<OutgoingId>,
    /// Sum of the batched obligations.
    pub owed: MilliSats,
    /// Amount of the invoice, after the fee estimate and sat rounding.
    pub amount: MilliSats,
    pub invoice: String,
}

/// Whether a batch of `amount` is worth paying with `fee` given the
/// target's threshold: `(1 - fee/amount) * 100` must reach it.
pub fn worth_paying(amount: MilliSats, fee: MilliSats, threshold_percent: f64) -> bool {
    if amount.is_zero() {
        return false;
    }
    let kept = (1.0 - fee.raw() as f64 / amount.raw() as f64) * 100.0;
    kept >= threshold_percent
}

fn retry_in(schedule: &PayoutSchedule, now: Timestamp) -> String {
    schedule
        .next_attempt_at()
        .map_or_else(|| "now".to_string(), |at| format_until(at, now))
}

fn set_status(book: &mut PaymentBook, ids: &[OutgoingId], status: OutgoingStatus) {
    for id in ids {
        if let Some(payment) = book.outgoing_mut(id) {
            payment.status = status;
        }
    }
}

fn fail_batch(book: &mut PaymentBook, ids: &[OutgoingId], error: &SplitError) {
    for id in ids {
        if let Some(payment) = book.outgoing_mut(id) {
            payment.status = OutgoingStatus::Failed;
            payment.failure = Some(error.to_string());
            payment.in_flight = None;
        }
    }
}

/// Put a batch back in the queue after `error`: a long deferral for
/// uneconomical batches, linear backoff for everything else.
pub fn abandon_payout(
    target: &mut Target,
    book: &mut PaymentBook,
    split: &str,
    ids: &[OutgoingId],
    owed: MilliSats,
    error: SplitError,
    services: &Services,
) -> PayoutOutcome {
    fail_batch(book, ids, &error);
    let now = services.now();
    if let SplitError::RetryOnNextPayment { .. } = error {
        target.schedule = target
            .schedule
            .after_deferral(now, services.params.deferral_secs);
        tracing::info!(
            split,
            target_id = %target.id,
            amount = %format_sats(owed),
            retry = %retry_in(&target.schedule, now),
            "payout deferred until more value arrives"
        );
        return PayoutOutcome::Deferred { available: owed };
    }

    target.schedule = target
        .schedule
        .after_failure(now, services.params.backoff_step_secs);
    target.forget_endpoint();
    tracing::warn!(
        split,
        target_id = %target.id,
        failures = target.schedule.failures(),
        retry = %retry_in(&target.schedule, now),
        error = %error,
        "payout failed"
    );
    PayoutOutcome::Failed {
        error: error.to_string(),
    }
}

/// Plan a batch for `target` and get it ready to pay. Returns the outcome
/// instead when there is nothing to send this tick.
pub async fn prepare_payout(
    target: &mut Target,
    book: &mut PaymentBook,
    ctx: &PayoutContext<'_>,
    services: &Services,
) -> Result<PendingPayout, PayoutOutcome> {
    if !book.has_payable(&target.id) {
        return Err(PayoutOutcome::Idle);
    }
    let now = services.now();
    if !target.schedule.is_due(now) {
        return Err(PayoutOutcome::NotDue);
    }

    let pay = match target.pay_request(services).await {
        Ok(pay) => pay,
        Err(e) => {
            tracing::warn!(split = ctx.split, target_id = %target.id, error = %e, "destination unavailable");
            target.forget_endpoint();
            return Err(PayoutOutcome::Unavailable {
                error: e.to_string(),
            });
        }
    };

    let limits = BatchLimits {
        max_amount: pay.max_sendable_or(services.params.default_max_sendable),
        max_comment: pay.comment_allowed as usize,
    };
    let batch = plan_batch(book.outgoing_for(&target.id), limits, target.forward_comment);
    for id in &batch.oversized {
        tracing::warn!(split = ctx.split, target_id = %target.id, obligation = %id, max = %limits.max_amount, "obligation exceeds max sendable, skipped");
    }
    if batch.is_empty() {
        return Err(PayoutOutcome::Idle);
    }
    set_status(book, &batch.ids, OutgoingStatus::Paying);

    match invoice_batch(target, &batch, pay.min_sendable, ctx, services).await {
        Ok((amount, invoice)) => {
            for id in &batch.ids {
                if let Some(payment) = book.outgoing_mut(id) {
                    payment.in_flight = Some(invoice.clone());
                }
            }
            Ok(PendingPayout {
                split: ctx.split.to_string(),
                target_id: target.id.clone(),
                ids: batch.ids,
                owed: batch.amount,
                amount,
                invoice,
            })
        }
        Err(e) => Err(abandon_payout(
            target,
            book,
            ctx.split,
            &batch.ids,
            batch.amount,
            e,
            services,
        )),
    }
}

/// Check the economics and fetch an invoice for the batch.
async fn invoice_batch(
    target: &mut Target,
    batch: &Batch,
    min_sendable: MilliSats,
    ctx: &PayoutContext<'_>,
    services: &Services,
) -> Result<(MilliSats, String), SplitError> {
    let estimated_fee = target.estimated_fee(&*services.fees.lock().await);
    if !worth_paying(batch.amount, estimated_fee, target.payout_threshold) {
        return Err(SplitError::RetryOnNextPayment {
            needed: estimated_fee,
            available: batch.amount,
        });
    }

    // Most nodes cannot pay msat-precise invoices.
    let amount = batch.amount.saturating_sub(estimated_fee).round_to_sats();
    if amount.is_zero() || amount < min_sendable {
        return Err(SplitError::RetryOnNextPayment {
            needed: min_sendable.max(MilliSats::from_sats(1)) + estimated_fee,
            available: batch.amount,
        });
    }

    let invoice = target
        .get_invoice(
            services,
            InvoiceRequest {
                amount,
                comment: batch.comment.as_deref(),
                identifier: batch.identifier.as_deref(),
                signer: ctx.signer,
                zaps: ctx.zaps,
            },
        )
        .await?;
    tracing::debug!(
        split = ctx.split,
        target_id = %target.id,
        obligations = batch.ids.len(),
        amount_msat = amount.raw(),
        estimated_fee_msat = estimated_fee.raw(),
        "payout invoiced"
    );
    Ok((amount, invoice))
}

/// Pay a prepared batch through the backend.
pub async fn send_payout(
    services: &Services,
    payout: &PendingPayout,
) -> Result<PaymentDetails, BackendError> {
    tracing::info!(
        split = %payout.split,
        target_id = %payout.target_id,
        obligations = payout.ids.len(),
        amount_msat = payout.amount.raw(),
        "sending payout"
    );
    services.backend.pay_invoice(&payout.invoice).await
}

/// Apply the backend's answer for a prepared batch.
pub async fn complete_payout(
    target: &mut Target,
    book: &mut PaymentBook,
    payout: &PendingPayout,
    result: Result<PaymentDetails, BackendError>,
    services: &Services,
) -> PayoutOutcome {
    let details = match result {
        Ok(details) => details,
        Err(e) => {
            return abandon_payout(
                target,
                book,
                &payout.split,
                &payout.ids,
                payout.owed,
                SplitError::Payment(e.to_string()),
                services,
            )
        }
    };

    services
        .fees
        .lock()
        .await
        .record(target.fee_key(), details.fee_msat);
    let fee = MilliSats::new(details.fee_msat.max(0) as u64);
    let now = services.now();
    for id in &payout.ids {
        if let Some(payment) = book.outgoing_mut(id) {
            payment.status = OutgoingStatus::Complete;
            payment.failure = None;
            payment.in_flight = None;
            payment.completed_at = Some(now);
        }
    }
    target.schedule = target.schedule.after_success();
    tracing::info!(
        split = %payout.split,
        target_id = %target.id,
        amount_msat = payout.amount.raw(),
        fee_msat = fee.raw(),
        "payout sent"
    );
    PayoutOutcome::Paid {
        obligations: payout.ids.len(),
        amount: payout.owed,
        fee,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_compares_kept_share() {
        let amount = MilliSats::new(10_000);
        // 10% fee keeps 90%.
        assert!(worth_paying(amount, MilliSats::new(1_000), 90.0));
        assert!(!worth_paying(amount, MilliSats::new(1_001), 90.0));
        assert!(worth_paying(amount, MilliSats::new(9_000), 0.0));
        assert!(!worth_paying(MilliSats::ZERO, MilliSats::ZERO, 0.0));
    }
}
