//! Resolving obligations left `Paying` by an interrupted process.
//!
//! Every batch records its invoice on its obligations before the backend is
//! asked to pay it. On start the backend is asked what became of each such
//! invoice; obligations without one never left the process and go back to
//! `Pending`.

use std::collections::BTreeMap;

use prism_backend::OutgoingPaymentStatus;
use prism_types::{OutgoingId, OutgoingStatus};

use crate::{RecoveryReport, Services, Split};

/// Resolve every `Paying` obligation of `split`.
pub async fn recover_in_flight(split: &mut Split, services: &Services) -> RecoveryReport {
    let mut report = RecoveryReport::default();
    let address = split.address();
    let now = services.now();

    let mut by_invoice: BTreeMap<String, Vec<OutgoingId>> = BTreeMap::new();
    let mut never_sent = Vec::new();
    for payment in split.book().outgoing_payments() {
        if payment.status != OutgoingStatus::Paying {
            continue;
        }
        match &payment.in_flight {
            Some(invoice) => by_invoice
                .entry(invoice.clone())
                .or_default()
                .push(payment.id.clone()),
            None => never_sent.push(payment.id.clone()),
        }
    }

    let (targets, book) = split.parts_mut();
    for id in never_sent {
        if let Some(payment) = book.outgoing_mut(&id) {
            payment.status = OutgoingStatus::Pending;
            report.requeued += 1;
        }
    }

    for (invoice, ids) in by_invoice {
        let status = match services.backend.outgoing_status(&invoice).await {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(split = %address, obligations = ids.len(), error = %e, "could not check interrupted payout");
                report.unresolved += ids.len();
                continue;
            }
        };

        match status {
            OutgoingPaymentStatus::Paid { fee_msat } => {
                let fee_key = ids
                    .first()
                    .and_then(|id| book.outgoing(id))
                    .and_then(|p| targets.iter().find(|t| t.id == p.target_id))
                    .map(|t| t.fee_key().to_string());
                if let Some(key) = fee_key {
                    services.fees.lock().await.record(&key, fee_msat);
                }
                for id in &ids {
                    if let Some(payment) = book.outgoing_mut(id) {
                        payment.status = OutgoingStatus::Complete;
                        payment.in_flight = None;
                        payment.failure = None;
                        payment.completed_at = Some(now);
                    }
                }
                report.completed += ids.len();
                tracing::info!(split = %address, obligations = ids.len(), fee_msat, "interrupted payout had completed");
            }
            OutgoingPaymentStatus::Failed => {
                for id in &ids {
                    if let Some(payment) = book.outgoing_mut(id) {
                        payment.status = OutgoingStatus::Failed;
                        payment.in_flight = None;
                        payment.failure = Some("payment failed while the node was down".into());
                    }
                }
                report.failed += ids.len();
                tracing::info!(split = %address, obligations = ids.len(), "interrupted payout had failed");
            }
            OutgoingPaymentStatus::NotFound => {
                for id in &ids {
                    if let Some(payment) = book.outgoing_mut(id) {
                        payment.status = OutgoingStatus::Pending;
                        payment.in_flight = None;
                    }
                }
                report.requeued += ids.len();
                tracing::info!(split = %address, obligations = ids.len(), "interrupted payout never reached the backend");
            }
            OutgoingPaymentStatus::Pending | OutgoingPaymentStatus::Unknown => {
                report.unresolved += ids.len();
                tracing::warn!(split = %address, obligations = ids.len(), ?status, "interrupted payout unresolved, leaving it in flight");
            }
        }
    }

    split.reconcile(now);
    report
}
