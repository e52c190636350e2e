//! End-to-end settlement scenarios: invoice → payment → allocation →
//! batched payout, against the nullable backend, LNURL endpoints, relays
//! and clock.

use std::collections::BTreeMap;
use std::sync::Arc;

use prism_backend::{BackendError, OutgoingPaymentStatus};
use prism_crypto::{encode_npub, kind, SigningKey, ZapRequest};
use prism_fees::FeeTracker;
use prism_nullables::{NullBackend, NullClock, NullIdentity, NullLnurl, NullStore};
use prism_splits::{
    recover_in_flight, CreateInvoice, Services, Split, SplitError, SplitRegistry, TargetSettings,
    TickReport, WebhookOutcome,
};
use prism_store::SnapshotStore;
use prism_types::{
    Clock, IncomingId, IncomingStatus, MilliSats, OutgoingPayment, OutgoingStatus, PayoutSchedule,
    TargetId,
};

const DOMAIN: &str = "prism.example.com";
const START: u64 = 1_700_000_000;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Harness {
    backend: Arc<NullBackend>,
    lnurl: Arc<NullLnurl>,
    identity: Arc<NullIdentity>,
    clock: Arc<NullClock>,
    services: Services,
}

fn harness() -> Harness {
    let backend = Arc::new(NullBackend::new());
    let lnurl = Arc::new(NullLnurl::new());
    let identity = Arc::new(NullIdentity::new());
    let clock = Arc::new(NullClock::new(START));
    let services = Services::builder(
        backend.clone(),
        lnurl.clone(),
        identity.clone(),
        clock.clone(),
    )
    .build();
    Harness {
        backend,
        lnurl,
        identity,
        clock,
        services,
    }
}

fn msat(n: u64) -> MilliSats {
    MilliSats::new(n)
}

fn floating(weight: u32) -> TargetSettings {
    TargetSettings {
        weight,
        ..TargetSettings::default()
    }
}

fn fixed(percent: u32) -> TargetSettings {
    TargetSettings {
        weight: percent,
        fixed: true,
        ..TargetSettings::default()
    }
}

impl Harness {
    fn serve(&self, address: &str) -> String {
        self.lnurl
            .add_address(address, msat(1_000), MilliSats::from_sats(1_000_000))
    }

    fn split(&self) -> Split {
        Split::new("tips", DOMAIN, self.clock.now()).unwrap()
    }

    async fn add(&self, split: &mut Split, address: &str, settings: TargetSettings) -> TargetId {
        self.serve(address);
        split
            .add_target(address, &settings, &self.services)
            .await
            .unwrap()
    }

    /// Issue an invoice for `amount` and settle it as paid.
    async fn receive(&self, split: &mut Split, request: CreateInvoice) -> IncomingId {
        let incoming = split
            .create_invoice(&self.services, request)
            .await
            .unwrap();
        self.backend.mark_paid(&incoming.payment_hash);
        split.handle_paid(&incoming.id, &self.services).await.unwrap();
        incoming.id
    }

    async fn receive_amount(&self, split: &mut Split, amount: u64) -> IncomingId {
        self.receive(
            split,
            CreateInvoice {
                amount: msat(amount),
                ..CreateInvoice::default()
            },
        )
        .await
    }
}

fn obligations(split: &Split, target: &TargetId) -> Vec<OutgoingPayment> {
    split.book().outgoing_for(target).cloned().collect()
}

fn amounts(split: &Split, target: &TargetId) -> Vec<MilliSats> {
    obligations(split, target).iter().map(|o| o.amount).collect()
}

// ---------------------------------------------------------------------------
// 1. Allocation scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn floating_weights_one_and_three() {
    let h = harness();
    let mut split = h.split();
    let a = h.add(&mut split, "alice@example.com", floating(1)).await;
    let b = h.add(&mut split, "bob@example.com", floating(3)).await;

    let fractions: Vec<f64> = split.percentages().into_iter().map(|(_, f)| f).collect();
    assert_eq!(fractions, vec![0.25, 0.75]);

    h.receive_amount(&mut split, 1_000_000).await;
    assert_eq!(amounts(&split, &a), vec![msat(250_000)]);
    assert_eq!(amounts(&split, &b), vec![msat(750_000)]);
}

#[tokio::test]
async fn fixed_thirty_percent_then_floating_rest() {
    let h = harness();
    let mut split = h.split();
    let a = h.add(&mut split, "alice@example.com", fixed(30)).await;
    let b = h.add(&mut split, "bob@example.com", floating(1)).await;

    h.receive_amount(&mut split, 1_000_000).await;
    assert_eq!(amounts(&split, &a), vec![msat(300_000)]);
    assert_eq!(amounts(&split, &b), vec![msat(700_000)]);
}

#[tokio::test]
async fn clipped_fixed_target_gets_a_completed_zero_obligation() {
    let h = harness();
    let mut split = h.split();
    let a = h.add(&mut split, "alice@example.com", fixed(80)).await;
    let b = h.add(&mut split, "bob@example.com", fixed(30)).await;

    let id = h.receive_amount(&mut split, 1_000_000).await;
    assert_eq!(amounts(&split, &a), vec![msat(800_000)]);
    let zero = obligations(&split, &b);
    assert_eq!(zero[0].amount, MilliSats::ZERO);
    assert_eq!(zero[0].status, OutgoingStatus::Complete);
    assert_eq!(split.incoming(&id).unwrap().outgoing.len(), 2);
}

// ---------------------------------------------------------------------------
// 2. Incoming state machine
// ---------------------------------------------------------------------------

#[tokio::test]
async fn paid_handler_is_not_idempotent_but_webhook_is() {
    let h = harness();
    let mut split = h.split();
    h.add(&mut split, "alice@example.com", floating(1)).await;

    let incoming = split
        .create_invoice(
            &h.services,
            CreateInvoice {
                amount: msat(10_000),
                ..CreateInvoice::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(incoming.status, IncomingStatus::Pending);

    let outcome = split.handle_webhook(&incoming.id, &h.services).await.unwrap();
    assert_eq!(outcome, WebhookOutcome::NotPaid);
    assert_eq!(split.book().outgoing_len(), 0);

    h.backend.mark_paid(&incoming.payment_hash);
    let outcome = split.handle_webhook(&incoming.id, &h.services).await.unwrap();
    assert!(matches!(outcome, WebhookOutcome::Settled(ref ids) if ids.len() == 1));

    let outcome = split.handle_webhook(&incoming.id, &h.services).await.unwrap();
    assert_eq!(
        outcome,
        WebhookOutcome::AlreadyHandled(IncomingStatus::Received)
    );

    let err = split
        .handle_paid(&incoming.id, &h.services)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        SplitError::AlreadySettled {
            id: incoming.id.clone(),
            status: IncomingStatus::Received,
        }
    );
    assert_eq!(split.book().outgoing_len(), 1);
}

#[tokio::test]
async fn invoice_requests_are_validated() {
    let h = harness();
    let mut split = h.split();
    let request = CreateInvoice {
        amount: msat(10_000),
        ..CreateInvoice::default()
    };
    assert!(matches!(
        split.create_invoice(&h.services, request.clone()).await,
        Err(SplitError::Validation(_))
    ));

    h.add(&mut split, "alice@example.com", floating(1)).await;
    for amount in [MilliSats::ZERO, MilliSats::from_sats(500_001)] {
        let err = split
            .create_invoice(
                &h.services,
                CreateInvoice {
                    amount,
                    ..CreateInvoice::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SplitError::Validation(_)));
    }

    let incoming = split.create_invoice(&h.services, request).await.unwrap();
    let created = h.backend.last_created().unwrap();
    assert_eq!(
        created.webhook.unwrap(),
        format!("https://{DOMAIN}/webhook/{}/{}", split.id, incoming.id)
    );
    assert_eq!(created.description, split.metadata_document());
}

#[tokio::test]
async fn sweep_settles_expires_and_prunes() {
    let h = harness();
    let mut split = h.split();
    let a = h.add(&mut split, "alice@example.com", floating(1)).await;

    let request = CreateInvoice {
        amount: msat(10_000),
        ..CreateInvoice::default()
    };
    let paid = split.create_invoice(&h.services, request.clone()).await.unwrap();
    let stale = split.create_invoice(&h.services, request).await.unwrap();
    h.backend.mark_paid(&paid.payment_hash);
    h.backend.mark_expired(&stale.payment_hash);

    let report = split.check_invoices(&h.services).await;
    assert_eq!((report.settled, report.expired, report.pruned), (1, 1, 0));
    assert_eq!(amounts(&split, &a), vec![msat(10_000)]);
    assert_eq!(
        split.incoming(&stale.id).unwrap().status,
        IncomingStatus::Expired
    );

    h.clock.advance(8 * 24 * 3600);
    let report = split.check_invoices(&h.services).await;
    assert_eq!(report.pruned, 1);
    assert!(split.incoming(&stale.id).is_none());
    assert!(split.incoming(&paid.id).is_some());
}

// ---------------------------------------------------------------------------
// 3. Payout
// ---------------------------------------------------------------------------

#[tokio::test]
async fn payout_completes_obligations_and_incoming() {
    let h = harness();
    h.backend.set_fee(2_000);
    let mut split = h.split();
    let a = h.add(&mut split, "alice@example.com", floating(1)).await;
    let b = h.add(&mut split, "bob@example.com", floating(3)).await;
    let id = h.receive_amount(&mut split, 1_000_000).await;

    let report = split.pay_next(&h.services).await;
    assert_eq!(report.batches_paid, 2);
    assert_eq!(report.completed_incoming, 1);
    assert_eq!(h.backend.pay_count(), 2);

    // Batch amount minus the default 1 sat fee estimate.
    let requested: Vec<MilliSats> = h.lnurl.requests().iter().map(|(_, p)| p.amount).collect();
    assert_eq!(requested, vec![msat(249_000), msat(749_000)]);

    for target in [&a, &b] {
        let o = &obligations(&split, target)[0];
        assert_eq!(o.status, OutgoingStatus::Complete);
        assert!(o.in_flight.is_none());
    }
    assert_eq!(split.incoming(&id).unwrap().status, IncomingStatus::Complete);

    let endpoint = split.target(&a).unwrap().fee_key().to_string();
    assert_eq!(
        h.services.fees.lock().await.samples(&endpoint),
        vec![msat(2_000)]
    );

    let report = split.pay_next(&h.services).await;
    assert_eq!(report.batches_paid, 0);
    assert_eq!(h.backend.pay_count(), 2);
}

#[tokio::test]
async fn uneconomical_batch_is_deferred_without_paying() {
    let h = harness();
    let mut split = h.split();
    let settings = TargetSettings {
        payout_threshold: 85.0,
        ..floating(1)
    };
    let a = h.add(&mut split, "alice@example.com", settings).await;

    // 1 sat estimated fee on 5 sats keeps 80%.
    h.receive_amount(&mut split, 5_000).await;
    let report = split.pay_next(&h.services).await;
    assert_eq!(report.batches_deferred, 1);
    assert_eq!(h.backend.pay_count(), 0);
    assert!(h.lnurl.requests().is_empty());
    assert!(obligations(&split, &a)
        .iter()
        .all(|o| o.status == OutgoingStatus::Failed));
    assert_eq!(
        split.target(&a).unwrap().schedule,
        PayoutSchedule::Deferred {
            failures: 0,
            until: h.clock.now().plus_secs(86_400),
        }
    );

    // New value ends the deferral; 10 sats keep 90%.
    h.receive_amount(&mut split, 5_000).await;
    let report = split.pay_next(&h.services).await;
    assert_eq!(report.batches_paid, 1);
    assert_eq!(h.backend.pay_count(), 1);
    assert_eq!(h.lnurl.last_request().unwrap().1.amount, msat(9_000));
    assert!(obligations(&split, &a)
        .iter()
        .all(|o| o.status == OutgoingStatus::Complete));
}

#[tokio::test]
async fn failed_payment_backs_off() {
    let h = harness();
    let mut split = h.split();
    let a = h.add(&mut split, "alice@example.com", floating(1)).await;
    h.receive_amount(&mut split, 100_000).await;

    h.backend
        .fail_next_payment(BackendError::Transport("network down".into()));
    let report = split.pay_next(&h.services).await;
    assert_eq!(report.batches_failed, 1);
    let failed = &obligations(&split, &a)[0];
    assert_eq!(failed.status, OutgoingStatus::Failed);
    assert!(failed.failure.as_deref().unwrap().contains("network down"));
    assert_eq!(split.target(&a).unwrap().schedule.failures(), 1);

    h.clock.advance(59);
    split.pay_next(&h.services).await;
    assert_eq!(h.backend.pay_count(), 1);

    h.clock.advance(1);
    let report = split.pay_next(&h.services).await;
    assert_eq!(report.batches_paid, 1);
    assert_eq!(h.backend.pay_count(), 2);
    assert_eq!(split.target(&a).unwrap().schedule, PayoutSchedule::Ready);
}

#[tokio::test]
async fn obligations_are_batched_with_comments() {
    let h = harness();
    let mut split = h.split();
    h.lnurl.add_address_with("alice@example.com", |pay| {
        pay.comment_allowed = 100;
    });
    let a = split
        .add_target("alice@example.com", &floating(1), &h.services)
        .await
        .unwrap();

    h.receive(
        &mut split,
        CreateInvoice {
            amount: msat(20_000),
            comment: Some("nice".into()),
            identifier: Some("dave@example.com".into()),
            zap_request: None,
        },
    )
    .await;
    h.receive(
        &mut split,
        CreateInvoice {
            amount: msat(30_000),
            comment: Some("thanks".into()),
            ..CreateInvoice::default()
        },
    )
    .await;

    split.pay_next(&h.services).await;
    assert_eq!(h.backend.pay_count(), 1);
    let (_, params) = h.lnurl.last_request().unwrap();
    assert_eq!(params.amount, msat(49_000));
    assert_eq!(
        params.comment.as_deref(),
        Some("From dave@example.com:\nnice\nthanks")
    );
    assert_eq!(obligations(&split, &a).len(), 2);
}

#[tokio::test]
async fn oversized_obligation_is_skipped() {
    let h = harness();
    let mut split = h.split();
    h.lnurl
        .add_address("alice@example.com", msat(1_000), msat(100_000));
    let a = split
        .add_target("alice@example.com", &floating(1), &h.services)
        .await
        .unwrap();
    h.receive_amount(&mut split, 300_000).await;

    split.pay_next(&h.services).await;
    assert_eq!(h.backend.pay_count(), 0);
    assert_eq!(obligations(&split, &a)[0].status, OutgoingStatus::Pending);
}

// ---------------------------------------------------------------------------
// 4. Nostr targets and zaps
// ---------------------------------------------------------------------------

#[tokio::test]
async fn nostr_target_is_zapped_and_receipt_published() {
    let h = harness();
    let mut split = h.split();

    let zed = SigningKey::generate();
    h.identity
        .add_lightning_address(zed.public_key(), "zed@example.com");
    h.lnurl.add_address_with("zed@example.com", |pay| {
        pay.allows_nostr = true;
    });
    let npub = encode_npub(&zed.public_key()).unwrap();
    let z = split
        .add_target(&npub, &floating(1), &h.services)
        .await
        .unwrap();
    assert_eq!(h.identity.published_kinds(), vec![kind::METADATA, kind::RELAY_LIST]);

    let payer = SigningKey::generate();
    let zap = ZapRequest::build(
        &payer,
        &split.pubkey(),
        msat(21_000),
        &["wss://payer.example.com".to_string()],
        "",
        h.clock.now(),
    );
    let id = h
        .receive(
            &mut split,
            CreateInvoice {
                amount: msat(21_000),
                zap_request: Some(zap.to_json()),
                ..CreateInvoice::default()
            },
        )
        .await;
    assert_eq!(
        split.incoming(&id).unwrap().identifier.as_deref(),
        Some(payer.public_key().to_hex().as_str())
    );
    let (relays, receipt) = h.identity.published().pop().unwrap();
    assert_eq!(receipt.kind, kind::ZAP_RECEIPT);
    assert_eq!(relays, vec!["wss://payer.example.com".to_string()]);

    split.pay_next(&h.services).await;
    assert_eq!(obligations(&split, &z)[0].status, OutgoingStatus::Complete);
    let (_, params) = h.lnurl.last_request().unwrap();
    let forwarded = ZapRequest::parse(params.zap_request.as_deref().unwrap()).unwrap();
    assert_eq!(forwarded.recipient, zed.public_key());
    assert_eq!(forwarded.event.pubkey, split.pubkey());
    assert_eq!(forwarded.amount, Some(msat(20_000)));
    let credit = format!("Zap from nostr:{}", encode_npub(&payer.public_key()).unwrap());
    assert_eq!(forwarded.comment(), credit);
}

#[tokio::test]
async fn zap_amount_must_match_invoice() {
    let h = harness();
    let mut split = h.split();
    h.add(&mut split, "alice@example.com", floating(1)).await;
    let zap = ZapRequest::build(
        &SigningKey::generate(),
        &split.pubkey(),
        msat(21_000),
        &[],
        "",
        h.clock.now(),
    );
    let err = split
        .create_invoice(
            &h.services,
            CreateInvoice {
                amount: msat(20_000),
                zap_request: Some(zap.to_json()),
                ..CreateInvoice::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, SplitError::Validation(_)));
}

// ---------------------------------------------------------------------------
// 5. Target management
// ---------------------------------------------------------------------------

#[tokio::test]
async fn target_validation() {
    let h = harness();
    let mut split = h.split();
    h.add(&mut split, "alice@example.com", floating(1)).await;

    let err = split
        .add_target("alice@example.com", &floating(2), &h.services)
        .await
        .unwrap_err();
    assert!(matches!(err, SplitError::Conflict(_)));

    let err = split
        .add_target("nobody@example.com", &floating(1), &h.services)
        .await
        .unwrap_err();
    assert!(matches!(err, SplitError::Validation(_)));

    let stranger = encode_npub(&SigningKey::generate().public_key()).unwrap();
    let err = split
        .add_target(&stranger, &floating(1), &h.services)
        .await
        .unwrap_err();
    assert!(matches!(err, SplitError::Validation(_)));

    let err = split
        .add_target("carol@example.com", &fixed(101), &h.services)
        .await
        .unwrap_err();
    assert!(matches!(err, SplitError::Validation(_)));
    assert_eq!(split.targets().len(), 1);
}

#[tokio::test]
async fn update_and_remove_targets() {
    let h = harness();
    let mut split = h.split();
    let a = h.add(&mut split, "alice@example.com", floating(1)).await;
    let b = h.add(&mut split, "bob@example.com", floating(1)).await;

    split
        .update_target(&a, None, &floating(3), &h.services)
        .await
        .unwrap();
    assert_eq!(split.percentages()[0].1, 0.75);

    h.serve("carol@example.com");
    split
        .update_target(&b, Some("carol@example.com"), &floating(1), &h.services)
        .await
        .unwrap();
    assert_eq!(split.target(&b).unwrap().input, "carol@example.com");

    let id = h.receive_amount(&mut split, 40_000).await;
    split.remove_target(&b, &h.services).await.unwrap();
    assert!(obligations(&split, &b).is_empty());

    split.pay_next(&h.services).await;
    assert_eq!(split.incoming(&id).unwrap().status, IncomingStatus::Complete);
}

#[tokio::test]
async fn hidden_profile_is_not_published() {
    let h = harness();
    let mut split = h.split();
    split.publish_profile = false;
    h.add(&mut split, "alice@example.com", floating(1)).await;
    assert!(h.identity.published().is_empty());
}

#[tokio::test]
async fn min_sendable_covers_smallest_share_and_fees() {
    let h = harness();
    let mut split = h.split();
    h.add(&mut split, "alice@example.com", floating(1)).await;
    h.add(&mut split, "bob@example.com", floating(3)).await;

    // 1 sat / 0.25 plus two default 1 sat fee estimates.
    let min = split.min_sendable(&h.services).await.unwrap();
    assert_eq!(min, msat(6_000));
    assert_eq!(split.estimated_fee(&FeeTracker::new()), msat(2_000));
}

// ---------------------------------------------------------------------------
// 6. Crash recovery
// ---------------------------------------------------------------------------

#[tokio::test]
async fn interrupted_payouts_are_recovered_from_the_backend() {
    let h = harness();
    let registry = SplitRegistry::new();
    let shared = registry.create("tips", DOMAIN, h.clock.now()).await.unwrap();
    let (a, b, c) = {
        let mut split = shared.lock().await;
        let a = h.add(&mut split, "alice@example.com", floating(1)).await;
        let b = h.add(&mut split, "bob@example.com", floating(1)).await;
        let c = h.add(&mut split, "carol@example.com", floating(1)).await;
        h.receive_amount(&mut split, 90_000).await;
        (a, b, c)
    };

    // Batches are invoiced and saved, then the process dies before paying.
    let payouts = {
        let mut split = shared.lock().await;
        let (payouts, report) = split.prepare_payouts(&h.services).await;
        assert_eq!(report, TickReport::default());
        payouts
    };
    assert_eq!(payouts.len(), 3);
    let store = NullStore::new();
    store
        .save(
            &registry
                .snapshot(&h.services.process_key, FeeTracker::new(), BTreeMap::new())
                .await,
        )
        .unwrap();
    let snapshot = store.saved().unwrap();
    assert!(snapshot
        .outgoing
        .iter()
        .all(|p| p.status == OutgoingStatus::Paying && p.in_flight.is_some()));

    // The backend went on to pay alice's invoice and failed bob's; carol's
    // never reached it.
    let invoice_for = |target: &TargetId| {
        payouts
            .iter()
            .find(|p| &p.target_id == target)
            .map(|p| p.invoice.clone())
            .unwrap()
    };
    h.backend.set_outgoing_status(
        &invoice_for(&a),
        OutgoingPaymentStatus::Paid { fee_msat: 1_500 },
    );
    h.backend
        .set_outgoing_status(&invoice_for(&b), OutgoingPaymentStatus::Failed);

    let restored = SplitRegistry::from_snapshot(snapshot).await;
    let shared = restored.all().await.pop().unwrap();
    let mut split = shared.lock().await;
    let report = recover_in_flight(&mut split, &h.services).await;
    assert_eq!(
        (report.completed, report.failed, report.requeued, report.unresolved),
        (1, 1, 1, 0)
    );
    assert_eq!(obligations(&split, &a)[0].status, OutgoingStatus::Complete);
    assert_eq!(obligations(&split, &b)[0].status, OutgoingStatus::Failed);
    assert_eq!(obligations(&split, &c)[0].status, OutgoingStatus::Pending);

    let endpoint = split.target(&a).unwrap().fee_key().to_string();
    assert_eq!(
        h.services.fees.lock().await.samples(&endpoint),
        vec![msat(1_500)]
    );

    // Only bob and carol are paid again.
    split.pay_next(&h.services).await;
    assert_eq!(h.backend.pay_count(), 2);
    assert!(!h.backend.pay_calls().contains(&invoice_for(&a)));
    assert!(split
        .book()
        .incoming_payments()
        .all(|p| p.status == IncomingStatus::Complete));
}

#[tokio::test]
async fn abandoned_payouts_are_not_paid() {
    let h = harness();
    let mut split = h.split();
    let a = h.add(&mut split, "alice@example.com", floating(1)).await;
    h.receive_amount(&mut split, 10_000).await;

    let (payouts, _) = split.prepare_payouts(&h.services).await;
    assert_eq!(obligations(&split, &a)[0].status, OutgoingStatus::Paying);
    let report = split.abandon_payouts(&payouts, "disk full", &h.services);
    assert_eq!(report.batches_failed, 1);

    let obligation = &obligations(&split, &a)[0];
    assert_eq!(obligation.status, OutgoingStatus::Failed);
    assert_eq!(obligation.in_flight, None);
    assert!(obligation.failure.as_deref().unwrap().contains("disk full"));
    assert_eq!(h.backend.pay_count(), 0);
    assert!(!split.target(&a).unwrap().schedule.is_due(h.clock.now()));
}

#[tokio::test]
async fn unknown_in_flight_status_stays_paying() {
    let h = harness();
    let mut split = h.split();
    let a = h.add(&mut split, "alice@example.com", floating(1)).await;
    h.receive_amount(&mut split, 10_000).await;
    let (payouts, _) = split.prepare_payouts(&h.services).await;
    h.backend
        .set_outgoing_status(&payouts[0].invoice, OutgoingPaymentStatus::Unknown);

    let registry = SplitRegistry::new();
    registry.insert(split).await.unwrap();
    let snapshot = registry
        .snapshot(&h.services.process_key, FeeTracker::new(), BTreeMap::new())
        .await;

    let restored = SplitRegistry::from_snapshot(snapshot).await;
    let shared = restored.all().await.pop().unwrap();
    let mut split = shared.lock().await;
    let report = recover_in_flight(&mut split, &h.services).await;
    assert_eq!(report.unresolved, 1);
    assert_eq!(obligations(&split, &a)[0].status, OutgoingStatus::Paying);

    split.pay_next(&h.services).await;
    assert_eq!(h.backend.pay_count(), 0);
}
