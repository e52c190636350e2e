//! The split aggregate.
//!
//! A split owns its targets and every payment made to or by them. Incoming
//! value moves `Pending -> Received` exactly once, at which point one
//! obligation per target is created; the incoming payment becomes `Complete`
//! once all of those obligations are.

use rand::distributions::{Alphanumeric, DistString};

use prism_backend::{BackendError, InvoiceStatus, PaymentDetails};
use prism_crypto::{encode_nprofile, encode_npub, encode_nsec, PublicKey, SigningKey, ZapRequest};
use prism_fees::FeeTracker;
use prism_lnurl::split_metadata;
use prism_store::SplitRecord;
use prism_types::{
    IncomingId, IncomingPayment, IncomingStatus, MilliSats, OutgoingId, OutgoingPayment,
    OutgoingStatus, SettlementParams, SplitId, TargetId, Timestamp,
};

use crate::allocation::{allocate, percentages, Share};
use crate::payout::{
    abandon_payout, complete_payout, prepare_payout, send_payout, PayoutContext, PendingPayout,
};
use crate::publish::{profile_events, publish_all, receipt_event};
use crate::{
    PaymentBook, PayoutOutcome, Services, SplitError, SweepReport, Target, TargetSettings,
    TickReport,
};

const API_KEY_LEN: usize = 21;

/// A payer's request for an invoice.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CreateInvoice {
    pub amount: MilliSats,
    /// LNURL comment.
    pub comment: Option<String>,
    /// Payer identity (Lightning address), when the wallet sends one.
    pub identifier: Option<String>,
    /// Signed kind-9734 zap request (JSON).
    pub zap_request: Option<String>,
}

/// What a payment webhook did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The invoice was paid and split into these obligations.
    Settled(Vec<OutgoingId>),
    /// The payment had already left `Pending`; nothing changed.
    AlreadyHandled(IncomingStatus),
    /// The backend does not consider the invoice paid.
    NotPaid,
    Expired,
}

/// Fee view of one target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TargetFee {
    pub estimate: MilliSats,
    pub average: Option<MilliSats>,
}

/// Split names become Lightning address local parts.
pub fn validate_name(name: &str) -> Result<(), SplitError> {
    let ok = !name.is_empty()
        && name.len() <= 64
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b"-_.".contains(&b));
    if ok {
        Ok(())
    } else {
        Err(SplitError::Validation(format!(
            "split name {name:?} must be lowercase letters, digits, '-', '_' or '.'"
        )))
    }
}

fn validate_domain(domain: &str) -> Result<(), SplitError> {
    if domain.is_empty() || domain.contains(['/', '@', ' ']) {
        return Err(SplitError::Validation(format!("invalid domain {domain:?}")));
    }
    Ok(())
}

#[derive(Debug)]
pub struct Split {
    pub id: SplitId,
    pub name: String,
    pub domain: String,
    key: SigningKey,
    pub api_key: String,
    /// Sign zap requests to Nostr targets and publish zap receipts.
    pub enable_zaps: bool,
    /// Publish a profile for the split; also makes the split key the zap
    /// request signer.
    pub publish_profile: bool,
    targets: Vec<Target>,
    book: PaymentBook,
    pub created_at: Timestamp,
}

impl Split {
    pub fn new(name: &str, domain: &str, now: Timestamp) -> Result<Self, SplitError> {
        Self::with_key(name, domain, SigningKey::generate(), now)
    }

    pub fn with_key(
        name: &str,
        domain: &str,
        key: SigningKey,
        now: Timestamp,
    ) -> Result<Self, SplitError> {
        let name = name.trim().to_lowercase();
        let domain = domain.trim().to_lowercase();
        validate_name(&name)?;
        validate_domain(&domain)?;
        Ok(Self {
            id: SplitId::generate(),
            name,
            domain,
            key,
            api_key: Alphanumeric.sample_string(&mut rand::thread_rng(), API_KEY_LEN),
            enable_zaps: true,
            publish_profile: true,
            targets: Vec::new(),
            book: PaymentBook::new(),
            created_at: now,
        })
    }

    /// `name@domain`.
    pub fn address(&self) -> String {
        format!("{}@{}", self.name, self.domain)
    }

    /// LUD-17 URL of the split's own pay endpoint.
    pub fn lnurlp(&self) -> String {
        format!("lnurlp://{}/lnurlp/{}", self.domain, self.name)
    }

    pub fn key(&self) -> &SigningKey {
        &self.key
    }

    pub fn pubkey(&self) -> PublicKey {
        self.key.public_key()
    }

    pub fn npub(&self) -> String {
        let pubkey = self.pubkey();
        encode_npub(&pubkey).unwrap_or_else(|_| pubkey.to_hex())
    }

    pub fn nprofile(&self, relays: &[String]) -> String {
        let pubkey = self.pubkey();
        let first = relays.first().cloned().into_iter().collect::<Vec<_>>();
        encode_nprofile(&pubkey, &first).unwrap_or_else(|_| pubkey.to_hex())
    }

    pub fn nsec(&self) -> String {
        encode_nsec(&self.key).unwrap_or_else(|_| self.key.secret_hex())
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn target(&self, id: &TargetId) -> Option<&Target> {
        self.targets.iter().find(|t| &t.id == id)
    }

    pub fn target_by_input(&self, input: &str) -> Option<&Target> {
        let input = input.trim();
        self.targets.iter().find(|t| t.input == input)
    }

    pub fn book(&self) -> &PaymentBook {
        &self.book
    }

    pub fn incoming(&self, id: &IncomingId) -> Option<&IncomingPayment> {
        self.book.incoming(id)
    }

    /// Fraction of incoming value owed to each target, in target order.
    pub fn percentages(&self) -> Vec<(TargetId, f64)> {
        let shares: Vec<Share> = self
            .targets
            .iter()
            .map(|t| Share {
                weight: t.weight,
                fixed: t.fixed,
            })
            .collect();
        self.targets
            .iter()
            .map(|t| t.id.clone())
            .zip(percentages(&shares))
            .collect()
    }

    /// The split's LNURL-pay `metadata` string.
    pub fn metadata_document(&self) -> String {
        let shares: Vec<(String, f64)> = self
            .percentages()
            .into_iter()
            .filter_map(|(id, fraction)| self.target(&id).map(|t| (t.input.clone(), fraction)))
            .collect();
        split_metadata(&self.address(), &shares)
    }

    pub fn target_fees(&self, fees: &FeeTracker) -> Vec<(TargetId, TargetFee)> {
        self.targets
            .iter()
            .map(|t| {
                (
                    t.id.clone(),
                    TargetFee {
                        estimate: t.estimated_fee(fees),
                        average: t.average_fee(fees),
                    },
                )
            })
            .collect()
    }

    /// Fee the split expects to pay to forward one incoming payment.
    pub fn estimated_fee(&self, fees: &FeeTracker) -> MilliSats {
        self.targets.iter().map(|t| t.estimated_fee(fees)).sum()
    }

    /// Smallest incoming amount that leaves every target at least its
    /// destination's min-sendable, plus the expected fees.
    pub async fn min_sendable(&mut self, services: &Services) -> Result<MilliSats, SplitError> {
        let fees = self.estimated_fee(&*services.fees.lock().await);
        let fractions = self.percentages();

        let mut floor = 0.0_f64;
        for (target, (_, fraction)) in self.targets.iter_mut().zip(fractions) {
            if fraction <= 0.0 {
                continue;
            }
            let pay = target.pay_request(services).await?;
            floor = floor.max(pay.min_sendable.raw() as f64 / fraction);
        }
        Ok(MilliSats::new(floor.ceil() as u64) + fees)
    }

    pub fn max_sendable(&self, params: &SettlementParams) -> MilliSats {
        params.split_max_sendable
    }

    /// Add a destination. It must be reachable now, and no other target may
    /// have the same input.
    pub async fn add_target(
        &mut self,
        input: &str,
        settings: &TargetSettings,
        services: &Services,
    ) -> Result<TargetId, SplitError> {
        let mut target = Target::new(input, settings)?;
        if self.target_by_input(&target.input).is_some() {
            return Err(SplitError::Conflict(format!(
                "a target with {} already exists",
                target.input
            )));
        }
        target.resolve(services).await.map_err(as_validation)?;

        let id = target.id.clone();
        tracing::info!(split = %self.address(), target_id = %id, input = %target.input, kind = %target.kind, "added target");
        self.targets.push(target);
        self.update_profile(services).await;
        Ok(id)
    }

    /// Remove a target and every obligation it still had.
    pub async fn remove_target(
        &mut self,
        id: &TargetId,
        services: &Services,
    ) -> Result<Target, SplitError> {
        let index = self
            .targets
            .iter()
            .position(|t| &t.id == id)
            .ok_or_else(|| SplitError::UnknownTarget(id.clone()))?;
        let target = self.targets.remove(index);
        let purged = self.book.remove_target(id);
        tracing::info!(split = %self.address(), target_id = %id, purged, "removed target");
        self.update_profile(services).await;
        Ok(target)
    }

    /// Change a target's settings and, if `input` differs, its destination.
    pub async fn update_target(
        &mut self,
        id: &TargetId,
        input: Option<&str>,
        settings: &TargetSettings,
        services: &Services,
    ) -> Result<(), SplitError> {
        settings.validate()?;
        let current = self
            .target(id)
            .ok_or_else(|| SplitError::UnknownTarget(id.clone()))?;

        let replacement = match input.map(str::trim) {
            Some(input) if input != current.input => {
                if self.target_by_input(input).is_some() {
                    return Err(SplitError::Conflict(format!(
                        "a target with {input} already exists"
                    )));
                }
                let mut fresh = Target::new(input, settings)?;
                fresh.resolve(services).await.map_err(as_validation)?;
                Some(fresh)
            }
            _ => None,
        };

        let address = self.address();
        let target = self
            .targets
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| SplitError::UnknownTarget(id.clone()))?;
        if let Some(fresh) = replacement {
            target.replace_destination(fresh);
        }
        target.apply(settings)?;
        tracing::info!(split = %address, target_id = %id, input = %target.input, "updated target");
        self.update_profile(services).await;
        Ok(())
    }

    /// Publish the split's profile, if it has one.
    pub async fn update_profile(&self, services: &Services) {
        if !self.publish_profile {
            return;
        }
        let events = profile_events(self, &services.relays, services.now());
        publish_all(
            services.identity.as_ref(),
            &services.relays,
            &events,
            "profile",
            &self.address(),
        )
        .await;
    }

    /// Issue an invoice for `request` through the backend.
    ///
    /// A zap request must verify and, if it commits to an amount, match it;
    /// its content and author become the payment's comment and identifier.
    pub async fn create_invoice(
        &mut self,
        services: &Services,
        request: CreateInvoice,
    ) -> Result<IncomingPayment, SplitError> {
        if self.targets.is_empty() {
            return Err(SplitError::Validation(format!(
                "{} has no targets",
                self.address()
            )));
        }
        if request.amount.is_zero() {
            return Err(SplitError::Validation("amount must be positive".into()));
        }
        let max = self.max_sendable(&services.params);
        if request.amount > max {
            return Err(SplitError::Validation(format!(
                "amount {} exceeds max sendable {max}",
                request.amount
            )));
        }

        let (comment, identifier, description) = match &request.zap_request {
            Some(json) => {
                let zap = ZapRequest::parse(json)
                    .map_err(|e| SplitError::Validation(format!("invalid zap request: {e}")))?;
                zap.check_amount(request.amount)
                    .map_err(|e| SplitError::Validation(e.to_string()))?;
                let comment = Some(zap.comment().to_string()).filter(|c| !c.is_empty());
                (comment, Some(zap.payer().to_hex()), json.clone())
            }
            None => (
                request.comment.filter(|c| !c.is_empty()),
                request.identifier.filter(|i| !i.is_empty()),
                self.metadata_document(),
            ),
        };

        let id = IncomingId::generate();
        let webhook = format!("https://{}/webhook/{}/{}", self.domain, self.id, id);
        let invoice = services
            .backend
            .create_invoice(request.amount, &description, Some(&webhook))
            .await?;

        let payment = IncomingPayment {
            id,
            split_id: self.id.clone(),
            status: IncomingStatus::Pending,
            amount: request.amount,
            invoice: invoice.invoice,
            payment_hash: invoice.payment_hash,
            comment,
            identifier,
            zap_request: request.zap_request,
            outgoing: Vec::new(),
            created_at: services.now(),
            settled_at: None,
        };
        tracing::info!(
            split = %self.address(),
            incoming = %payment.id,
            amount_msat = payment.amount.raw(),
            zap = payment.zap_request.is_some(),
            "created invoice"
        );
        self.book.insert_incoming(payment.clone());
        Ok(payment)
    }

    /// Settle a paid invoice: create one obligation per target.
    ///
    /// Fails with [`SplitError::AlreadySettled`] if the payment is no longer
    /// `Pending`; the amount is never split twice.
    pub async fn handle_paid(
        &mut self,
        id: &IncomingId,
        services: &Services,
    ) -> Result<Vec<OutgoingId>, SplitError> {
        let now = services.now();
        let address = self.address();
        let incoming = self
            .book
            .incoming(id)
            .ok_or_else(|| SplitError::UnknownIncoming(id.clone()))?;
        if incoming.status != IncomingStatus::Pending {
            tracing::error!(split = %address, incoming = %id, status = %incoming.status, "paid notification for a payment that is not pending");
            return Err(SplitError::AlreadySettled {
                id: id.clone(),
                status: incoming.status,
            });
        }
        let amount = incoming.amount;
        let comment = incoming.comment.clone();
        let identifier = incoming.identifier.clone();
        let zap_request = incoming.zap_request.clone();
        let bolt11 = incoming.invoice.clone();

        let fractions: Vec<f64> = self.percentages().into_iter().map(|(_, f)| f).collect();
        let shares = allocate(amount, &fractions);

        let mut created = Vec::with_capacity(self.targets.len());
        for (target, share) in self.targets.iter_mut().zip(shares) {
            let (comment, identifier) = if target.forward_comment {
                (comment.clone(), identifier.clone())
            } else {
                (Some(address.clone()), None)
            };
            let owed = !share.is_zero();
            let payment = OutgoingPayment {
                id: OutgoingId::generate(),
                target_id: target.id.clone(),
                incoming_id: Some(id.clone()),
                status: if owed {
                    OutgoingStatus::Pending
                } else {
                    OutgoingStatus::Complete
                },
                amount: share,
                comment,
                identifier,
                failure: None,
                in_flight: None,
                created_at: now,
                completed_at: (!owed).then_some(now),
            };
            if owed {
                target.schedule = target.schedule.on_new_value(now);
            }
            created.push(payment.id.clone());
            self.book.insert_outgoing(payment);
        }

        if let Some(incoming) = self.book.incoming_mut(id) {
            incoming.status = IncomingStatus::Received;
            incoming.outgoing = created.clone();
            incoming.settled_at = Some(now);
        }
        tracing::info!(
            split = %address,
            incoming = %id,
            amount_msat = amount.raw(),
            obligations = created.len(),
            "received payment"
        );

        if let Some(zap_request) = zap_request.filter(|_| self.enable_zaps) {
            if let Some((receipt, relays)) = receipt_event(self, &zap_request, &bolt11, now) {
                let relays = if relays.is_empty() {
                    services.relays.clone()
                } else {
                    relays
                };
                publish_all(
                    services.identity.as_ref(),
                    &relays,
                    &[receipt],
                    "zap receipt",
                    &address,
                )
                .await;
            }
        }
        Ok(created)
    }

    /// Payment webhook. Idempotent: a webhook for a payment that already
    /// left `Pending` changes nothing. The backend is asked before anything
    /// is settled, so a forged call cannot create obligations.
    pub async fn handle_webhook(
        &mut self,
        id: &IncomingId,
        services: &Services,
    ) -> Result<WebhookOutcome, SplitError> {
        let incoming = self
            .book
            .incoming(id)
            .ok_or_else(|| SplitError::UnknownIncoming(id.clone()))?;
        if incoming.status != IncomingStatus::Pending {
            return Ok(WebhookOutcome::AlreadyHandled(incoming.status));
        }
        let hash = incoming.payment_hash.clone();
        match services.backend.invoice_status(&hash).await? {
            InvoiceStatus::Paid => Ok(WebhookOutcome::Settled(
                self.handle_paid(id, services).await?,
            )),
            InvoiceStatus::Pending => Ok(WebhookOutcome::NotPaid),
            InvoiceStatus::Expired => {
                self.mark_expired(id);
                Ok(WebhookOutcome::Expired)
            }
        }
    }

    fn mark_expired(&mut self, id: &IncomingId) {
        if let Some(incoming) = self.book.incoming_mut(id) {
            if incoming.status == IncomingStatus::Pending {
                incoming.status = IncomingStatus::Expired;
                tracing::info!(incoming = %id, "invoice expired");
            }
        }
    }

    /// Ask the backend about every pending invoice; settle the paid ones,
    /// expire the expired ones, and prune old expired records.
    pub async fn check_invoices(&mut self, services: &Services) -> SweepReport {
        let mut report = SweepReport::default();
        let address = self.address();

        for id in self.book.incoming_with_status(IncomingStatus::Pending) {
            let Some(hash) = self.book.incoming(&id).map(|p| p.payment_hash.clone()) else {
                continue;
            };
            match services.backend.invoice_status(&hash).await {
                Ok(InvoiceStatus::Paid) => match self.handle_paid(&id, services).await {
                    Ok(_) => report.settled += 1,
                    Err(e) => {
                        report.errors += 1;
                        tracing::error!(split = %address, incoming = %id, error = %e, "failed to settle paid invoice");
                    }
                },
                Ok(InvoiceStatus::Expired) => {
                    self.mark_expired(&id);
                    report.expired += 1;
                }
                Ok(InvoiceStatus::Pending) => {}
                Err(e) => {
                    report.errors += 1;
                    tracing::warn!(split = %address, incoming = %id, error = %e, "failed to check invoice");
                }
            }
        }

        let now = services.now();
        let cutoff = Timestamp::new(
            now.as_secs()
                .saturating_sub(services.params.expired_retention_secs),
        );
        report.pruned = self.book.prune_expired(cutoff);
        report
    }

    /// One payout tick: a batch per due target, then reconciliation.
    ///
    /// Pays while holding the split. The node uses [`Split::prepare_payouts`]
    /// and [`Split::finish_payout`] instead so the prepared state can be
    /// saved before anything is paid.
    pub async fn pay_next(&mut self, services: &Services) -> TickReport {
        let (payouts, mut report) = self.prepare_payouts(services).await;
        for payout in &payouts {
            let result = send_payout(services, payout).await;
            report.record(&self.finish_payout(payout, result, services).await);
        }
        report.completed_incoming = self.reconcile(services.now());
        report
    }

    /// Plan, price and invoice a batch for every due target. The returned
    /// payouts have their obligations `Paying` with the invoice recorded;
    /// the report covers the targets that sent nothing.
    pub async fn prepare_payouts(&mut self, services: &Services) -> (Vec<PendingPayout>, TickReport) {
        let mut report = TickReport::default();
        let mut payouts = Vec::new();
        let address = self.address();
        let ctx = PayoutContext {
            split: &address,
            signer: if self.publish_profile {
                &self.key
            } else {
                services.process_key.as_ref()
            },
            zaps: self.enable_zaps,
        };
        for target in self.targets.iter_mut() {
            match prepare_payout(target, &mut self.book, &ctx, services).await {
                Ok(payout) => payouts.push(payout),
                Err(outcome) => report.record(&outcome),
            }
        }
        (payouts, report)
    }

    /// Apply the backend's answer for a payout from
    /// [`Split::prepare_payouts`].
    pub async fn finish_payout(
        &mut self,
        payout: &PendingPayout,
        result: Result<PaymentDetails, BackendError>,
        services: &Services,
    ) -> PayoutOutcome {
        match self.targets.iter_mut().find(|t| t.id == payout.target_id) {
            Some(target) => complete_payout(target, &mut self.book, payout, result, services).await,
            None => {
                tracing::warn!(split = %payout.split, target_id = %payout.target_id, paid = result.is_ok(), "target removed while its payout was in flight");
                match result {
                    Ok(details) => PayoutOutcome::Paid {
                        obligations: payout.ids.len(),
                        amount: payout.owed,
                        fee: MilliSats::new(details.fee_msat.max(0) as u64),
                    },
                    Err(e) => PayoutOutcome::Failed {
                        error: e.to_string(),
                    },
                }
            }
        }
    }

    /// Return prepared payouts to the queue without paying them.
    pub fn abandon_payouts(
        &mut self,
        payouts: &[PendingPayout],
        reason: &str,
        services: &Services,
    ) -> TickReport {
        let mut report = TickReport::default();
        let address = self.address();
        for payout in payouts {
            if let Some(target) = self.targets.iter_mut().find(|t| t.id == payout.target_id) {
                let outcome = abandon_payout(
                    target,
                    &mut self.book,
                    &address,
                    &payout.ids,
                    payout.owed,
                    SplitError::Unavailable(reason.to_string()),
                    services,
                );
                report.record(&outcome);
            }
        }
        report
    }

    /// `Received -> Complete` for incoming payments whose obligations are
    /// all complete. Obligations purged with their target count as done.
    pub fn reconcile(&mut self, now: Timestamp) -> usize {
        let mut completed = 0;
        for id in self.book.incoming_with_status(IncomingStatus::Received) {
            let done = self.book.incoming(&id).is_some_and(|incoming| {
                incoming.outgoing.iter().all(|o| {
                    self.book
                        .outgoing(o)
                        .map_or(true, |p| p.status == OutgoingStatus::Complete)
                })
            });
            if done {
                if let Some(incoming) = self.book.incoming_mut(&id) {
                    incoming.status = IncomingStatus::Complete;
                    incoming.settled_at.get_or_insert(now);
                    completed += 1;
                    tracing::info!(split = %self.name, incoming = %id, "incoming payment fully paid out");
                }
            }
        }
        completed
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut [Target], &mut PaymentBook) {
        (&mut self.targets, &mut self.book)
    }

    pub fn to_record(&self) -> SplitRecord {
        SplitRecord {
            id: self.id.clone(),
            name: self.name.clone(),
            domain: self.domain.clone(),
            key: self.key.clone(),
            api_key: self.api_key.clone(),
            enable_zaps: self.enable_zaps,
            publish_profile: self.publish_profile,
            targets: self.targets.iter().map(Target::to_record).collect(),
            created_at: self.created_at,
        }
    }

    pub fn from_record(record: SplitRecord, book: PaymentBook) -> Self {
        let api_key = if record.api_key.is_empty() {
            Alphanumeric.sample_string(&mut rand::thread_rng(), API_KEY_LEN)
        } else {
            record.api_key
        };
        Self {
            id: record.id,
            name: record.name,
            domain: record.domain,
            key: record.key,
            api_key,
            enable_zaps: record.enable_zaps,
            publish_profile: record.publish_profile,
            targets: record.targets.into_iter().map(Target::from_record).collect(),
            book,
            created_at: record.created_at,
        }
    }
}

fn as_validation(e: SplitError) -> SplitError {
    match e {
        SplitError::Validation(_) => e,
        other => SplitError::Validation(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_and_lnurlp() {
        let split = Split::new("Tips", "Prism.Example.com", Timestamp::new(1)).unwrap();
        assert_eq!(split.address(), "tips@prism.example.com");
        assert_eq!(split.lnurlp(), "lnurlp://prism.example.com/lnurlp/tips");
        assert!(split.npub().starts_with("npub1"));
        assert!(split.nsec().starts_with("nsec1"));
        assert!(split
            .nprofile(&["wss://relay.example.com".into()])
            .starts_with("nprofile1"));
        assert_eq!(split.api_key.len(), API_KEY_LEN);
    }

    #[test]
    fn names_validated() {
        for bad in ["", "a b", "tips/x", "ünï"] {
            assert!(Split::new(bad, "prism.example.com", Timestamp::new(1)).is_err());
        }
        assert!(Split::new("tips", "bad/domain", Timestamp::new(1)).is_err());
    }
}
