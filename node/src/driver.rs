//! The periodic driver: payout ticks, invoice sweeps, saves and recovery.
//!
//! Every operation walks the registry and locks one split at a time, so
//! different splits progress concurrently. A payout tick prepares each
//! split's batches under its lock, saves the prepared `Paying` state, and
//! only then pays with the split unlocked: a crash mid-payment leaves the
//! in-flight invoices on disk for [`Driver::recover`], and HTTP requests for
//! the split are not held up by a slow payment.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use futures_util::future::join_all;
use tokio::sync::Mutex;
use tracing::Instrument;

use prism_backend::{PaymentBackend, RefreshToken};
use prism_crypto::SigningKey;
use prism_lnurl::LnurlClient;
use prism_relay::IdentityResolver;
use prism_splits::{
    recover_in_flight, send_payout, RecoveryReport, Services, SharedSplit, Split, SplitRegistry,
    SweepReport, TickReport,
};
use prism_store::{Snapshot, SnapshotStore, StoredToken};
use prism_types::Clock;

use crate::config::{NodeConfig, SplitConfig};
use crate::metrics::PrismMetrics;
use crate::tracing_spans::{invoice_sweep_span, pay_batch_span, payout_tick_span};
use crate::NodeError;

/// The outside world the engine talks to.
pub struct Collaborators {
    pub backend: Arc<dyn PaymentBackend>,
    pub lnurl: Arc<dyn LnurlClient>,
    pub identity: Arc<dyn IdentityResolver>,
    pub clock: Arc<dyn Clock>,
}

/// Shared state of a running node.
pub struct Driver {
    pub registry: Arc<SplitRegistry>,
    pub services: Arc<Services>,
    pub metrics: Arc<PrismMetrics>,
    store: Arc<dyn SnapshotStore>,
    /// Key the backend's refresh token is stored under.
    credential_key: String,
    refresh_tokens: Mutex<BTreeMap<String, StoredToken>>,
    /// Held for a whole save so snapshots reach the store in order.
    save_lock: Mutex<()>,
}

impl Driver {
    /// Rebuild the engine from `snapshot`. A process key is generated when
    /// the snapshot has none; it is persisted with the next save.
    pub async fn from_snapshot(
        config: &NodeConfig,
        store: Arc<dyn SnapshotStore>,
        snapshot: Snapshot,
        collaborators: Collaborators,
    ) -> Result<Self, NodeError> {
        let process_key = match snapshot.process_key.clone() {
            Some(key) => key,
            None => {
                let key = SigningKey::generate();
                tracing::info!(pubkey = %key.public_key().to_hex(), "generated process signing key");
                key
            }
        };

        let services = Services::builder(
            collaborators.backend,
            collaborators.lnurl,
            collaborators.identity,
            collaborators.clock,
        )
        .fees(snapshot.fees.clone())
        .process_key(Arc::new(process_key))
        .params(config.settlement_params())
        .relays(config.relays.clone())
        .build();

        let refresh_tokens = snapshot.refresh_tokens.clone();
        let registry = SplitRegistry::from_snapshot(snapshot).await;
        let metrics = PrismMetrics::new()?;
        metrics.split_count.set(registry.len().await as i64);

        Ok(Self {
            registry: Arc::new(registry),
            services: Arc::new(services),
            metrics: Arc::new(metrics),
            store,
            credential_key: config.backend.credential_key(),
            refresh_tokens: Mutex::new(refresh_tokens),
            save_lock: Mutex::new(()),
        })
    }

    /// One payout tick over every split.
    pub async fn payout_tick(&self) -> TickReport {
        let splits = self.registry.all().await;
        let span = payout_tick_span(splits.len());
        async {
            let started = Instant::now();
            let reports = join_all(splits.iter().map(|shared| self.tick_split(shared))).await;

            let mut total = TickReport::default();
            for report in &reports {
                total.merge(report);
            }
            self.metrics.record_tick(&total);
            self.metrics
                .payout_tick_ms
                .observe(started.elapsed().as_secs_f64() * 1000.0);

            if total != TickReport::default() {
                tracing::info!(
                    paid = total.batches_paid,
                    failed = total.batches_failed,
                    deferred = total.batches_deferred,
                    unavailable = total.unavailable,
                    paid_msat = total.paid.raw(),
                    fees_msat = total.fees.raw(),
                    completed_incoming = total.completed_incoming,
                    "payout tick"
                );
            }
            total
        }
        .instrument(span)
        .await
    }

    async fn tick_split(&self, shared: &SharedSplit) -> TickReport {
        let (address, payouts, mut report) = {
            let mut split = shared.lock().await;
            let address = split.address();
            let (payouts, report) = split
                .prepare_payouts(&self.services)
                .instrument(pay_batch_span(&address))
                .await;
            (address, payouts, report)
        };

        if !payouts.is_empty() {
            if let Err(e) = self.save().await {
                tracing::error!(split = %address, batches = payouts.len(), error = %e, "could not save prepared payouts, not paying");
                let reason = format!("could not save payout before paying: {e}");
                let mut split = shared.lock().await;
                report.merge(&split.abandon_payouts(&payouts, &reason, &self.services));
                return report;
            }

            let mut results = Vec::with_capacity(payouts.len());
            for payout in &payouts {
                let result = send_payout(&self.services, payout)
                    .instrument(pay_batch_span(&address))
                    .await;
                results.push(result);
            }

            let mut split = shared.lock().await;
            for (payout, result) in payouts.iter().zip(results) {
                report.record(&split.finish_payout(payout, result, &self.services).await);
            }
        }

        report.completed_incoming = shared.lock().await.reconcile(self.services.now());
        report
    }

    /// Ask the backend about every pending invoice of every split.
    pub async fn invoice_sweep(&self) -> SweepReport {
        let splits = self.registry.all().await;
        let span = invoice_sweep_span(splits.len());
        async {
            let reports = join_all(splits.iter().map(|shared| async move {
                let mut split = shared.lock().await;
                split.check_invoices(&self.services).await
            }))
            .await;

            let mut total = SweepReport::default();
            for report in &reports {
                total.merge(report);
            }
            self.metrics.record_sweep(&total);
            if total != SweepReport::default() {
                tracing::info!(
                    settled = total.settled,
                    expired = total.expired,
                    pruned = total.pruned,
                    errors = total.errors,
                    "invoice sweep"
                );
            }
            total
        }
        .instrument(span)
        .await
    }

    /// Resolve obligations a previous process left mid-payment.
    pub async fn recover(&self) -> RecoveryReport {
        let mut total = RecoveryReport::default();
        for shared in self.registry.all().await {
            let mut split = shared.lock().await;
            total.merge(&recover_in_flight(&mut split, &self.services).await);
        }
        if !total.is_empty() {
            tracing::info!(
                completed = total.completed,
                failed = total.failed,
                requeued = total.requeued,
                unresolved = total.unresolved,
                "recovered interrupted payouts"
            );
        }
        total
    }

    /// Create the configured splits that do not exist yet. Targets that
    /// cannot be added are logged and skipped.
    pub async fn ensure_splits(
        &self,
        configs: &[SplitConfig],
        domain: &str,
    ) -> Result<usize, NodeError> {
        let mut created = 0;
        for config in configs {
            let address = format!("{}@{}", config.name.trim(), domain.trim()).to_lowercase();
            if self.registry.get_by_address(&address).await.is_some() {
                continue;
            }

            let mut split = Split::new(&config.name, domain, self.services.now())?;
            split.enable_zaps = config.enable_zaps;
            split.publish_profile = config.publish_profile;
            for target in &config.targets {
                if let Err(e) = split
                    .add_target(&target.input, &target.settings(), &self.services)
                    .await
                {
                    tracing::warn!(split = %address, input = %target.input, error = %e, "skipping configured target");
                }
            }
            self.registry.insert(split).await?;
            created += 1;
        }
        self.metrics.split_count.set(self.registry.len().await as i64);
        Ok(created)
    }

    /// Write the whole state graph to the store, including the backend's
    /// current refresh token.
    pub async fn save(&self) -> Result<(), NodeError> {
        let _saving = self.save_lock.lock().await;
        if let Some(token) = self.services.backend.refresh_token().await {
            self.refresh_tokens
                .lock()
                .await
                .insert(self.credential_key.clone(), stored_token(token));
        }
        let fees = self.services.fees.lock().await.clone();
        let tokens = self.refresh_tokens.lock().await.clone();
        let snapshot = self
            .registry
            .snapshot(&self.services.process_key, fees, tokens)
            .await;
        self.store.save(&snapshot)?;
        Ok(())
    }
}

fn stored_token(token: RefreshToken) -> StoredToken {
    StoredToken {
        token: token.token,
        expires_at: token.expires_at,
    }
}

/// The refresh token a previous run stored for `credential_key`.
pub fn restored_token(snapshot: &Snapshot, credential_key: &str) -> Option<RefreshToken> {
    snapshot
        .refresh_tokens
        .get(credential_key)
        .map(|t| RefreshToken {
            token: t.token.clone(),
            expires_at: t.expires_at,
        })
}
