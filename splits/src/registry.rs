//! All splits served by the node, addressable by id and by Lightning address.
//!
//! Each split sits behind its own mutex: operations on one split are
//! serialized, different splits proceed independently.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use prism_crypto::SigningKey;
use prism_fees::FeeTracker;
use prism_store::{Snapshot, StoredToken};
use prism_types::{IncomingPayment, OutgoingPayment, SplitId, TargetId, Timestamp};

use crate::{PaymentBook, Split, SplitError};

pub type SharedSplit = Arc<Mutex<Split>>;

#[derive(Default)]
struct Inner {
    by_id: HashMap<SplitId, SharedSplit>,
    by_address: HashMap<String, SplitId>,
    order: Vec<SplitId>,
}

#[derive(Default)]
pub struct SplitRegistry {
    inner: RwLock<Inner>,
}

impl SplitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty split at `name@domain`.
    pub async fn create(
        &self,
        name: &str,
        domain: &str,
        now: Timestamp,
    ) -> Result<SharedSplit, SplitError> {
        self.insert(Split::new(name, domain, now)?).await
    }

    /// Register `split`. Addresses are unique, case-insensitively.
    pub async fn insert(&self, split: Split) -> Result<SharedSplit, SplitError> {
        let address = split.address().to_lowercase();
        let id = split.id.clone();
        let mut inner = self.inner.write().await;
        if inner.by_address.contains_key(&address) {
            return Err(SplitError::Conflict(format!("{address} already exists")));
        }
        if inner.by_id.contains_key(&id) {
            return Err(SplitError::Conflict(format!("split {id} already exists")));
        }
        let shared = Arc::new(Mutex::new(split));
        inner.by_id.insert(id.clone(), shared.clone());
        inner.by_address.insert(address.clone(), id.clone());
        inner.order.push(id.clone());
        tracing::info!(split = %address, split_id = %id, "registered split");
        Ok(shared)
    }

    pub async fn remove(&self, id: &SplitId) -> Option<SharedSplit> {
        let mut inner = self.inner.write().await;
        let shared = inner.by_id.remove(id)?;
        inner.by_address.retain(|_, v| v != id);
        inner.order.retain(|v| v != id);
        tracing::info!(split_id = %id, "removed split");
        Some(shared)
    }

    pub async fn get(&self, id: &SplitId) -> Option<SharedSplit> {
        self.inner.read().await.by_id.get(id).cloned()
    }

    pub async fn get_by_address(&self, address: &str) -> Option<SharedSplit> {
        let inner = self.inner.read().await;
        let id = inner.by_address.get(&address.trim().to_lowercase())?;
        inner.by_id.get(id).cloned()
    }

    /// Every split, in registration order.
    pub async fn all(&self) -> Vec<SharedSplit> {
        let inner = self.inner.read().await;
        inner
            .order
            .iter()
            .filter_map(|id| inner.by_id.get(id).cloned())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.order.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Capture the whole state graph.
    pub async fn snapshot(
        &self,
        process_key: &SigningKey,
        fees: FeeTracker,
        refresh_tokens: BTreeMap<String, StoredToken>,
    ) -> Snapshot {
        let mut snapshot = Snapshot::new();
        snapshot.process_key = Some(process_key.clone());
        snapshot.fees = fees;
        snapshot.refresh_tokens = refresh_tokens;
        for shared in self.all().await {
            let split = shared.lock().await;
            snapshot.splits.push(split.to_record());
            snapshot
                .incoming
                .extend(split.book().incoming_payments().cloned());
            snapshot
                .outgoing
                .extend(split.book().outgoing_payments().cloned());
        }
        snapshot
    }

    /// Rebuild the registry from a snapshot. Payments whose split or target
    /// no longer exists are dropped.
    pub async fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut target_owner: HashMap<TargetId, SplitId> = HashMap::new();
        for record in &snapshot.splits {
            for target in &record.targets {
                target_owner.insert(target.id.clone(), record.id.clone());
            }
        }

        let mut incoming: HashMap<SplitId, Vec<IncomingPayment>> = HashMap::new();
        for payment in snapshot.incoming {
            if snapshot.splits.iter().any(|s| s.id == payment.split_id) {
                incoming
                    .entry(payment.split_id.clone())
                    .or_default()
                    .push(payment);
            } else {
                tracing::warn!(incoming = %payment.id, split_id = %payment.split_id, "dropping incoming payment of unknown split");
            }
        }

        let mut outgoing: HashMap<SplitId, Vec<OutgoingPayment>> = HashMap::new();
        for payment in snapshot.outgoing {
            match target_owner.get(&payment.target_id) {
                Some(split_id) => outgoing.entry(split_id.clone()).or_default().push(payment),
                None => {
                    tracing::warn!(outgoing = %payment.id, target_id = %payment.target_id, "dropping obligation of unknown target")
                }
            }
        }

        let registry = Self::new();
        for record in snapshot.splits {
            let book = PaymentBook::from_records(
                incoming.remove(&record.id).unwrap_or_default(),
                outgoing.remove(&record.id).unwrap_or_default(),
            );
            let split = Split::from_record(record, book);
            if let Err(e) = registry.insert(split).await {
                tracing::warn!(error = %e, "skipping duplicate split in snapshot");
            }
        }
        registry
    }
}
