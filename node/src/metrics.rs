//! Prometheus metrics for the Prism node.
//!
//! Counters cover the life of a payment: invoices issued, incoming payments
//! settled, payout batches sent, failed or deferred, and the value and fees
//! paid out. [`PrismMetrics`] owns a dedicated [`Registry`] that the HTTP
//! `/metrics` endpoint encodes into the Prometheus text exposition format.

use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, Encoder, Histogram, HistogramOpts, IntCounter, IntGauge,
    Opts, Registry, TextEncoder,
};

use prism_splits::{SweepReport, TickReport};

/// Central collection of all node-level Prometheus metrics.
pub struct PrismMetrics {
    /// The Prometheus registry that owns every metric below.
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Invoices issued through the LNURL-pay callback.
    pub invoices_created: IntCounter,
    /// Incoming payments split into obligations.
    pub incoming_settled: IntCounter,
    /// Incoming payments that expired unpaid.
    pub incoming_expired: IntCounter,
    /// Incoming payments whose obligations were all paid out.
    pub incoming_completed: IntCounter,
    pub batches_paid: IntCounter,
    pub batches_failed: IntCounter,
    /// Batches held back because the fee would eat too much of them.
    pub batches_deferred: IntCounter,
    /// Value delivered to targets, in msat.
    pub paid_msat: IntCounter,
    /// Routing fees paid, in msat.
    pub fees_msat: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    pub split_count: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Wall time of one payout tick over every split, in milliseconds.
    pub payout_tick_ms: Histogram,
}

impl PrismMetrics {
    /// Create a fresh set of metrics, all registered under a new
    /// [`Registry`].
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let invoices_created = register_int_counter_with_registry!(
            Opts::new("prism_invoices_created_total", "Invoices issued to payers"),
            registry
        )?;
        let incoming_settled = register_int_counter_with_registry!(
            Opts::new(
                "prism_incoming_settled_total",
                "Incoming payments split into obligations"
            ),
            registry
        )?;
        let incoming_expired = register_int_counter_with_registry!(
            Opts::new(
                "prism_incoming_expired_total",
                "Incoming invoices that expired unpaid"
            ),
            registry
        )?;
        let incoming_completed = register_int_counter_with_registry!(
            Opts::new(
                "prism_incoming_completed_total",
                "Incoming payments fully paid out to every target"
            ),
            registry
        )?;
        let batches_paid = register_int_counter_with_registry!(
            Opts::new("prism_batches_paid_total", "Payout batches paid"),
            registry
        )?;
        let batches_failed = register_int_counter_with_registry!(
            Opts::new("prism_batches_failed_total", "Payout batches that failed"),
            registry
        )?;
        let batches_deferred = register_int_counter_with_registry!(
            Opts::new(
                "prism_batches_deferred_total",
                "Payout batches deferred as uneconomical"
            ),
            registry
        )?;
        let paid_msat = register_int_counter_with_registry!(
            Opts::new("prism_paid_msat_total", "Value paid out to targets in msat"),
            registry
        )?;
        let fees_msat = register_int_counter_with_registry!(
            Opts::new("prism_fees_msat_total", "Routing fees paid in msat"),
            registry
        )?;

        let split_count = register_int_gauge_with_registry!(
            Opts::new("prism_split_count", "Current number of splits"),
            registry
        )?;

        // 1 ms to ~16 s.
        let payout_tick_ms = register_histogram_with_registry!(
            HistogramOpts::new("prism_payout_tick_ms", "Payout tick duration in milliseconds")
                .buckets(prometheus::exponential_buckets(1.0, 2.0, 15)?),
            registry
        )?;

        Ok(Self {
            registry,
            invoices_created,
            incoming_settled,
            incoming_expired,
            incoming_completed,
            batches_paid,
            batches_failed,
            batches_deferred,
            paid_msat,
            fees_msat,
            split_count,
            payout_tick_ms,
        })
    }

    pub fn record_tick(&self, report: &TickReport) {
        self.batches_paid.inc_by(report.batches_paid as u64);
        self.batches_failed.inc_by(report.batches_failed as u64);
        self.batches_deferred.inc_by(report.batches_deferred as u64);
        self.paid_msat.inc_by(report.paid.raw());
        self.fees_msat.inc_by(report.fees.raw());
        self.incoming_completed
            .inc_by(report.completed_incoming as u64);
    }

    pub fn record_sweep(&self, report: &SweepReport) {
        self.incoming_settled.inc_by(report.settled as u64);
        self.incoming_expired.inc_by(report.expired as u64);
    }

    /// Text exposition of every metric.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_types::MilliSats;

    #[test]
    fn tick_report_feeds_counters() {
        let metrics = PrismMetrics::new().unwrap();
        metrics.record_tick(&TickReport {
            batches_paid: 2,
            batches_failed: 1,
            batches_deferred: 3,
            unavailable: 0,
            paid: MilliSats::new(21_000),
            fees: MilliSats::new(1_500),
            completed_incoming: 1,
        });
        assert_eq!(metrics.batches_paid.get(), 2);
        assert_eq!(metrics.batches_failed.get(), 1);
        assert_eq!(metrics.batches_deferred.get(), 3);
        assert_eq!(metrics.paid_msat.get(), 21_000);
        assert_eq!(metrics.fees_msat.get(), 1_500);
        assert_eq!(metrics.incoming_completed.get(), 1);
    }

    #[test]
    fn encodes_text_format() {
        let metrics = PrismMetrics::new().unwrap();
        metrics.invoices_created.inc();
        metrics.record_sweep(&SweepReport {
            settled: 4,
            expired: 1,
            pruned: 0,
            errors: 0,
        });
        let text = metrics.encode().unwrap();
        assert!(text.contains("prism_invoices_created_total 1"));
        assert!(text.contains("prism_incoming_settled_total 4"));
        assert!(text.contains("prism_incoming_expired_total 1"));
    }
}
