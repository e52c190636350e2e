//! Per-split payment records with secondary indexes.
//!
//! Incoming payments are kept in creation order, obligations are indexed by
//! target in creation order, so batching and reconciliation never scan the
//! whole history.

use std::collections::HashMap;

use prism_types::{
    IncomingId, IncomingPayment, IncomingStatus, OutgoingId, OutgoingPayment, TargetId, Timestamp,
};

#[derive(Clone, Debug, Default)]
pub struct PaymentBook {
    incoming: HashMap<IncomingId, IncomingPayment>,
    incoming_order: Vec<IncomingId>,
    outgoing: HashMap<OutgoingId, OutgoingPayment>,
    by_target: HashMap<TargetId, Vec<OutgoingId>>,
}

impl PaymentBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a book from persisted records, keeping their order.
    pub fn from_records(
        incoming: impl IntoIterator<Item = IncomingPayment>,
        outgoing: impl IntoIterator<Item = OutgoingPayment>,
    ) -> Self {
        let mut book = Self::new();
        for payment in incoming {
            book.insert_incoming(payment);
        }
        for payment in outgoing {
            book.insert_outgoing(payment);
        }
        book
    }

    pub fn insert_incoming(&mut self, payment: IncomingPayment) {
        let id = payment.id.clone();
        if self.incoming.insert(id.clone(), payment).is_none() {
            self.incoming_order.push(id);
        }
    }

    pub fn incoming(&self, id: &IncomingId) -> Option<&IncomingPayment> {
        self.incoming.get(id)
    }

    pub fn incoming_mut(&mut self, id: &IncomingId) -> Option<&mut IncomingPayment> {
        self.incoming.get_mut(id)
    }

    /// Incoming payments in creation order.
    pub fn incoming_payments(&self) -> impl Iterator<Item = &IncomingPayment> {
        self.incoming_order.iter().filter_map(|id| self.incoming.get(id))
    }

    /// Ids of incoming payments in `status`, in creation order.
    pub fn incoming_with_status(&self, status: IncomingStatus) -> Vec<IncomingId> {
        self.incoming_payments()
            .filter(|p| p.status == status)
            .map(|p| p.id.clone())
            .collect()
    }

    pub fn insert_outgoing(&mut self, payment: OutgoingPayment) {
        let id = payment.id.clone();
        let target = payment.target_id.clone();
        if self.outgoing.insert(id.clone(), payment).is_none() {
            self.by_target.entry(target).or_default().push(id);
        }
    }

    pub fn outgoing(&self, id: &OutgoingId) -> Option<&OutgoingPayment> {
        self.outgoing.get(id)
    }

    pub fn outgoing_mut(&mut self, id: &OutgoingId) -> Option<&mut OutgoingPayment> {
        self.outgoing.get_mut(id)
    }

    /// A target's obligations in creation order.
    pub fn outgoing_for<'a>(
        &'a self,
        target: &TargetId,
    ) -> impl Iterator<Item = &'a OutgoingPayment> + 'a {
        self.by_target
            .get(target)
            .into_iter()
            .flatten()
            .filter_map(|id| self.outgoing.get(id))
    }

    /// All obligations, grouped by target.
    pub fn outgoing_payments(&self) -> impl Iterator<Item = &OutgoingPayment> {
        self.by_target
            .values()
            .flatten()
            .filter_map(|id| self.outgoing.get(id))
    }

    /// Whether a target still has obligations that can be batched.
    pub fn has_payable(&self, target: &TargetId) -> bool {
        self.outgoing_for(target).any(|p| p.status.is_payable())
    }

    /// Drop every obligation of a removed target.
    pub fn remove_target(&mut self, target: &TargetId) -> usize {
        let ids = self.by_target.remove(target).unwrap_or_default();
        for id in &ids {
            self.outgoing.remove(id);
        }
        ids.len()
    }

    /// Drop expired incoming payments created before `cutoff`.
    pub fn prune_expired(&mut self, cutoff: Timestamp) -> usize {
        let before = self.incoming.len();
        self.incoming
            .retain(|_, p| !(p.status == IncomingStatus::Expired && p.created_at < cutoff));
        let incoming = &self.incoming;
        self.incoming_order.retain(|id| incoming.contains_key(id));
        before - self.incoming.len()
    }

    pub fn incoming_len(&self) -> usize {
        self.incoming.len()
    }

    pub fn outgoing_len(&self) -> usize {
        self.outgoing.len()
    }
}
