//! The main Prism node struct: wires the engine to its collaborators and runs
//! the background loops.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use prism_backend::build_backend;
use prism_lnurl::HttpLnurlClient;
use prism_relay::RelayPool;
use prism_store::{JsonFileStore, Snapshot, SnapshotStore};
use prism_types::{Clock, SystemClock};

use crate::config::NodeConfig;
use crate::driver::{restored_token, Collaborators, Driver};
use crate::shutdown::ShutdownController;
use crate::NodeError;

/// Timeout for waiting on background tasks during shutdown.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// A running Prism node.
pub struct PrismNode {
    pub config: NodeConfig,
    pub driver: Arc<Driver>,
    pub shutdown: Arc<ShutdownController>,
    /// Handles for spawned background tasks (joined during shutdown).
    task_handles: Vec<JoinHandle<()>>,
}

impl PrismNode {
    /// Create a node from configuration: open the snapshot file, build the
    /// configured backend and the HTTP/relay clients.
    ///
    /// Call [`start`](Self::start) to begin settling payments.
    pub async fn new(config: NodeConfig) -> Result<Self, NodeError> {
        config.validate()?;

        let store: Arc<dyn SnapshotStore> = Arc::new(JsonFileStore::new(config.db_path()));
        let snapshot = store.load()?.unwrap_or_else(Snapshot::new);

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let stored = restored_token(&snapshot, &config.backend.credential_key());
        let backend = build_backend(&config.backend, stored, clock.clone())?;
        let collaborators = Collaborators {
            backend,
            lnurl: Arc::new(HttpLnurlClient::new()?),
            identity: Arc::new(RelayPool::new(config.relays.clone())),
            clock,
        };

        Self::from_parts(config, store, snapshot, collaborators).await
    }

    /// Create a node around explicit collaborators and an already-loaded
    /// snapshot.
    pub async fn from_parts(
        config: NodeConfig,
        store: Arc<dyn SnapshotStore>,
        snapshot: Snapshot,
        collaborators: Collaborators,
    ) -> Result<Self, NodeError> {
        let driver = Driver::from_snapshot(&config, store, snapshot, collaborators).await?;
        Ok(Self {
            config,
            driver: Arc::new(driver),
            shutdown: Arc::new(ShutdownController::new()),
            task_handles: Vec::new(),
        })
    }

    /// Start the node.
    ///
    /// 1. Checks the backend's credentials
    /// 2. Resolves payouts a previous run left in flight
    /// 3. Creates configured splits that do not exist yet
    /// 4. Spawns the payout, invoice-sweep and save loops
    ///
    /// Returns once the loops are running.
    pub async fn start(&mut self) -> Result<(), NodeError> {
        if !self.task_handles.is_empty() {
            return Err(NodeError::AlreadyStarted);
        }
        tracing::info!(
            backend = self.driver.services.backend.name(),
            domain = %self.config.public_domain,
            data_dir = %self.config.data_dir.display(),
            "Prism node starting"
        );

        self.driver.services.backend.setup().await?;
        self.driver.recover().await;
        let created = self
            .driver
            .ensure_splits(&self.config.splits, &self.config.public_domain)
            .await?;
        if created > 0 {
            tracing::info!(created, "created configured splits");
        }

        // ── Payout loop ───────────────────────────────────────────────────
        let driver = Arc::clone(&self.driver);
        let mut shutdown_rx = self.shutdown.subscribe();
        let period = Duration::from_millis(self.config.payout_interval_ms);
        self.task_handles.push(tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.wait() => {
                        tracing::info!("payout task shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        driver.payout_tick().await;
                    }
                }
            }
        }));

        // ── Invoice sweep loop ────────────────────────────────────────────
        let driver = Arc::clone(&self.driver);
        let mut shutdown_rx = self.shutdown.subscribe();
        let period = Duration::from_secs(self.config.invoice_check_interval_secs);
        self.task_handles.push(tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.wait() => {
                        tracing::info!("invoice sweep task shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        driver.invoice_sweep().await;
                    }
                }
            }
        }));

        // ── Save loop ─────────────────────────────────────────────────────
        let driver = Arc::clone(&self.driver);
        let mut shutdown_rx = self.shutdown.subscribe();
        let period = Duration::from_secs(self.config.save_interval_secs);
        self.task_handles.push(tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; the state was just loaded.
            ticker.tick().await;
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.wait() => {
                        tracing::info!("save task shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = driver.save().await {
                            tracing::error!(error = %e, "failed to save snapshot");
                        }
                    }
                }
            }
        }));

        tracing::info!(
            splits = self.driver.registry.len().await,
            "Prism node started"
        );
        Ok(())
    }

    /// Stop the node gracefully.
    ///
    /// 1. Sends the shutdown signal to all background tasks.
    /// 2. Waits for them to finish (with timeout), aborting stragglers.
    /// 3. Writes a final snapshot.
    pub async fn stop(&mut self) -> Result<(), NodeError> {
        tracing::info!("Prism node stopping");
        self.shutdown.shutdown();

        let handles = std::mem::take(&mut self.task_handles);
        let aborts: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();
        let joined = tokio::time::timeout(SHUTDOWN_TIMEOUT, async {
            for handle in handles {
                let _ = handle.await;
            }
        })
        .await;
        if joined.is_err() {
            tracing::warn!("background tasks did not stop in time, aborting");
            for abort in aborts {
                abort.abort();
            }
        }

        self.driver.save().await?;
        tracing::info!("final snapshot saved, Prism node stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.task_handles.iter().any(|h| !h.is_finished())
    }
}
