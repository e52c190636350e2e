//! Nullable Lightning backend: scripted invoices and payments.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tokio::sync::Notify;

use prism_backend::{
    BackendError, InvoiceDetails, InvoiceStatus, OutgoingPaymentStatus, PaymentBackend,
    PaymentDetails, RefreshToken,
};
use prism_types::MilliSats;

use crate::lock;

/// An invoice issued through [`NullBackend::create_invoice`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreatedInvoice {
    pub amount: MilliSats,
    pub description: String,
    pub webhook: Option<String>,
    pub invoice: String,
    pub payment_hash: String,
}

#[derive(Default)]
struct State {
    counter: u64,
    created: Vec<CreatedInvoice>,
    invoice_status: HashMap<String, InvoiceStatus>,
    /// Invoices passed to `pay_invoice`, including failed attempts.
    pay_calls: Vec<String>,
    paid: HashMap<String, i64>,
    scripted: VecDeque<Result<i64, BackendError>>,
    fail_always: Option<BackendError>,
    fee_msat: i64,
    outgoing_status: HashMap<String, OutgoingPaymentStatus>,
    status_error: Option<BackendError>,
    refresh_token: Option<RefreshToken>,
    hold_payments: bool,
}

/// A backend that records every call and answers from a script.
///
/// Issued invoices stay `Pending` until [`NullBackend::mark_paid`] or
/// [`NullBackend::mark_expired`]. Payments succeed with the configured fee
/// unless a failure was scripted. Held payments wait, already recorded in
/// [`NullBackend::pay_calls`], until released.
#[derive(Default)]
pub struct NullBackend {
    state: Mutex<State>,
    release: Notify,
}

impl NullBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fee reported for successful payments.
    pub fn set_fee(&self, fee_msat: i64) {
        lock(&self.state).fee_msat = fee_msat;
    }

    /// Queue the result of the next `pay_invoice` call.
    pub fn script_payment(&self, result: Result<i64, BackendError>) {
        lock(&self.state).scripted.push_back(result);
    }

    /// Make the next `pay_invoice` fail with `error`.
    pub fn fail_next_payment(&self, error: BackendError) {
        self.script_payment(Err(error));
    }

    /// Fail every payment until cleared with `None`.
    pub fn fail_payments(&self, error: Option<BackendError>) {
        lock(&self.state).fail_always = error;
    }

    /// Make `pay_invoice` hang until [`NullBackend::release_payments`].
    pub fn hold_payments(&self) {
        lock(&self.state).hold_payments = true;
    }

    pub fn release_payments(&self) {
        lock(&self.state).hold_payments = false;
        self.release.notify_waiters();
    }

    pub fn mark_paid(&self, payment_hash: &str) {
        lock(&self.state)
            .invoice_status
            .insert(payment_hash.to_string(), InvoiceStatus::Paid);
    }

    pub fn mark_expired(&self, payment_hash: &str) {
        lock(&self.state)
            .invoice_status
            .insert(payment_hash.to_string(), InvoiceStatus::Expired);
    }

    /// Override what `outgoing_status` reports for `invoice`.
    pub fn set_outgoing_status(&self, invoice: &str, status: OutgoingPaymentStatus) {
        lock(&self.state)
            .outgoing_status
            .insert(invoice.to_string(), status);
    }

    /// Make status queries fail until cleared with `None`.
    pub fn fail_status_checks(&self, error: Option<BackendError>) {
        lock(&self.state).status_error = error;
    }

    pub fn set_refresh_token(&self, token: Option<RefreshToken>) {
        lock(&self.state).refresh_token = token;
    }

    pub fn created(&self) -> Vec<CreatedInvoice> {
        lock(&self.state).created.clone()
    }

    pub fn last_created(&self) -> Option<CreatedInvoice> {
        lock(&self.state).created.last().cloned()
    }

    /// Every invoice `pay_invoice` was called with.
    pub fn pay_calls(&self) -> Vec<String> {
        lock(&self.state).pay_calls.clone()
    }

    pub fn pay_count(&self) -> usize {
        lock(&self.state).pay_calls.len()
    }
}

#[async_trait]
impl PaymentBackend for NullBackend {
    fn name(&self) -> &'static str {
        "null"
    }

    async fn setup(&self) -> Result<(), BackendError> {
        Ok(())
    }

    async fn create_invoice(
        &self,
        amount: MilliSats,
        description: &str,
        webhook: Option<&str>,
    ) -> Result<InvoiceDetails, BackendError> {
        let mut state = lock(&self.state);
        state.counter += 1;
        let n = state.counter;
        let details = InvoiceDetails {
            invoice: format!("lnbcrt{}n1null{n}", amount.raw()),
            payment_hash: format!("{n:064x}"),
        };
        state
            .invoice_status
            .insert(details.payment_hash.clone(), InvoiceStatus::Pending);
        state.created.push(CreatedInvoice {
            amount,
            description: description.to_string(),
            webhook: webhook.map(str::to_string),
            invoice: details.invoice.clone(),
            payment_hash: details.payment_hash.clone(),
        });
        Ok(details)
    }

    async fn pay_invoice(&self, invoice: &str) -> Result<PaymentDetails, BackendError> {
        lock(&self.state).pay_calls.push(invoice.to_string());
        loop {
            let released = self.release.notified();
            if !lock(&self.state).hold_payments {
                break;
            }
            released.await;
        }

        let mut state = lock(&self.state);
        let scripted = state.scripted.pop_front();
        let result = match (state.fail_always.clone(), scripted) {
            (Some(error), _) => Err(error),
            (None, Some(result)) => result,
            (None, None) => Ok(state.fee_msat),
        };
        let fee_msat = result?;
        state.paid.insert(invoice.to_string(), fee_msat);
        Ok(PaymentDetails {
            payment_hash: format!("{:064x}", state.pay_calls.len()),
            fee_msat,
        })
    }

    async fn invoice_status(&self, payment_hash: &str) -> Result<InvoiceStatus, BackendError> {
        let state = lock(&self.state);
        if let Some(error) = &state.status_error {
            return Err(error.clone());
        }
        state
            .invoice_status
            .get(payment_hash)
            .copied()
            .ok_or_else(|| BackendError::Api {
                backend: "null",
                message: format!("unknown payment hash {payment_hash}"),
            })
    }

    async fn outgoing_status(&self, invoice: &str) -> Result<OutgoingPaymentStatus, BackendError> {
        let state = lock(&self.state);
        if let Some(error) = &state.status_error {
            return Err(error.clone());
        }
        if let Some(status) = state.outgoing_status.get(invoice) {
            return Ok(*status);
        }
        Ok(match state.paid.get(invoice) {
            Some(fee_msat) => OutgoingPaymentStatus::Paid {
                fee_msat: *fee_msat,
            },
            None => OutgoingPaymentStatus::NotFound,
        })
    }

    async fn refresh_token(&self) -> Option<RefreshToken> {
        lock(&self.state).refresh_token.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn invoices_stay_pending_until_marked() {
        let backend = NullBackend::new();
        let details = backend
            .create_invoice(MilliSats::new(5_000), "desc", Some("https://hook"))
            .await
            .unwrap();
        assert_eq!(
            backend.invoice_status(&details.payment_hash).await.unwrap(),
            InvoiceStatus::Pending
        );
        backend.mark_paid(&details.payment_hash);
        assert_eq!(
            backend.invoice_status(&details.payment_hash).await.unwrap(),
            InvoiceStatus::Paid
        );
        assert_eq!(backend.created()[0].webhook.as_deref(), Some("https://hook"));
    }

    #[tokio::test]
    async fn held_payments_wait_for_release() {
        let backend = std::sync::Arc::new(NullBackend::new());
        backend.hold_payments();
        let paying = {
            let backend = backend.clone();
            tokio::spawn(async move { backend.pay_invoice("lnbc1").await })
        };
        while backend.pay_count() == 0 {
            tokio::task::yield_now().await;
        }
        assert!(!paying.is_finished());
        assert_eq!(
            backend.outgoing_status("lnbc1").await.unwrap(),
            OutgoingPaymentStatus::NotFound
        );

        backend.release_payments();
        assert!(paying.await.unwrap().is_ok());
        assert!(matches!(
            backend.outgoing_status("lnbc1").await.unwrap(),
            OutgoingPaymentStatus::Paid { .. }
        ));
    }

    #[tokio::test]
    async fn scripted_payments() {
        let backend = NullBackend::new();
        backend.set_fee(1_000);
        backend.fail_next_payment(BackendError::Transport("down".into()));
        assert!(backend.pay_invoice("lnbc1").await.is_err());
        assert_eq!(backend.pay_invoice("lnbc2").await.unwrap().fee_msat, 1_000);
        assert_eq!(backend.pay_calls(), ["lnbc1", "lnbc2"]);

        assert_eq!(
            backend.outgoing_status("lnbc1").await.unwrap(),
            OutgoingPaymentStatus::NotFound
        );
        assert_eq!(
            backend.outgoing_status("lnbc2").await.unwrap(),
            OutgoingPaymentStatus::Paid { fee_msat: 1_000 }
        );
    }
}
