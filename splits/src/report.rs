//! Outcomes of engine operations, for logs and metrics.

use prism_types::MilliSats;

/// What one payout attempt for one target did.
#[derive(Clone, Debug, PartialEq)]
pub enum PayoutOutcome {
    /// Nothing owed.
    Idle,
    /// Backing off or deferred.
    NotDue,
    Paid {
        obligations: usize,
        amount: MilliSats,
        fee: MilliSats,
    },
    /// Not worth paying yet.
    Deferred { available: MilliSats },
    Failed { error: String },
    /// The destination could not be reached; nothing was attempted.
    Unavailable { error: String },
}

/// Totals of one payout tick over a split.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub batches_paid: usize,
    pub batches_failed: usize,
    pub batches_deferred: usize,
    pub unavailable: usize,
    pub paid: MilliSats,
    pub fees: MilliSats,
    /// Incoming payments that reached `Complete` this tick.
    pub completed_incoming: usize,
}

impl TickReport {
    pub fn record(&mut self, outcome: &PayoutOutcome) {
        match outcome {
            PayoutOutcome::Paid { amount, fee, .. } => {
                self.batches_paid += 1;
                self.paid += *amount;
                self.fees += *fee;
            }
            PayoutOutcome::Deferred { .. } => self.batches_deferred += 1,
            PayoutOutcome::Failed { .. } => self.batches_failed += 1,
            PayoutOutcome::Unavailable { .. } => self.unavailable += 1,
            PayoutOutcome::Idle | PayoutOutcome::NotDue => {}
        }
    }

    pub fn merge(&mut self, other: &TickReport) {
        self.batches_paid += other.batches_paid;
        self.batches_failed += other.batches_failed;
        self.batches_deferred += other.batches_deferred;
        self.unavailable += other.unavailable;
        self.paid += other.paid;
        self.fees += other.fees;
        self.completed_incoming += other.completed_incoming;
    }
}

/// Totals of one invoice sweep over a split.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub settled: usize,
    pub expired: usize,
    pub pruned: usize,
    pub errors: usize,
}

impl SweepReport {
    pub fn merge(&mut self, other: &SweepReport) {
        self.settled += other.settled;
        self.expired += other.expired;
        self.pruned += other.pruned;
        self.errors += other.errors;
    }
}

/// What crash recovery did with obligations found mid-payment.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub completed: usize,
    pub failed: usize,
    pub requeued: usize,
    pub unresolved: usize,
}

impl RecoveryReport {
    pub fn merge(&mut self, other: &RecoveryReport) {
        self.completed += other.completed;
        self.failed += other.failed;
        self.requeued += other.requeued;
        self.unresolved += other.unresolved;
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
