//! Metrics collection using Prometheus
//!
//! This module records ledger operation counts, latencies and the size of
//! applied rating deltas.

use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
};
use std::sync::Arc;
use std::time::Duration;

/// Metrics collector for the rating ledger
#[derive(Clone)]
pub struct LedgerMetrics {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Ledger operations by operation and status
    pub operations_total: IntCounterVec,

    /// Ledger operation durations
    pub operation_duration: HistogramVec,

    /// Absolute rating deltas applied at commit
    pub rating_delta: Histogram,

    /// Match sides skipped on reversal because the player was removed
    pub skipped_sides: IntCounter,
}

impl LedgerMetrics {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let operations_total = IntCounterVec::new(
            Opts::new(
                "ledger_operations_total",
                "Total ledger operations by operation and status",
            ),
            &["operation", "status"],
        )?;
        registry.register(Box::new(operations_total.clone()))?;

        let operation_duration = HistogramVec::new(
            HistogramOpts::new(
                "ledger_operation_duration_seconds",
                "Time spent in ledger operations, including lock waits",
            )
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
            &["operation"],
        )?;
        registry.register(Box::new(operation_duration.clone()))?;

        let rating_delta = Histogram::with_opts(
            HistogramOpts::new(
                "ledger_rating_delta_abs",
                "Absolute rating delta applied to one side of a match",
            )
            .buckets(vec![0.0, 2.0, 4.0, 8.0, 12.0, 16.0, 20.0, 24.0, 28.0, 32.0]),
        )?;
        registry.register(Box::new(rating_delta.clone()))?;

        let skipped_sides = IntCounter::new(
            "ledger_reversal_skipped_sides_total",
            "Match sides left alone on reversal because the player no longer exists",
        )?;
        registry.register(Box::new(skipped_sides.clone()))?;

        Ok(Self {
            registry,
            operations_total,
            operation_duration,
            rating_delta,
            skipped_sides,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Record a finished ledger operation; `status` is "ok" or an error kind
    pub fn record_operation(&self, operation: &str, status: &str, duration: Duration) {
        self.operations_total
            .with_label_values(&[operation, status])
            .inc();

        self.operation_duration
            .with_label_values(&[operation])
            .observe(duration.as_secs_f64());
    }

    /// Record the deltas stored on a committed match
    pub fn record_deltas(&self, delta_a: i32, delta_b: i32) {
        self.rating_delta.observe(f64::from(delta_a.unsigned_abs()));
        self.rating_delta.observe(f64::from(delta_b.unsigned_abs()));
    }

    /// Record sides skipped by a committed reversal
    pub fn record_skipped_sides(&self, count: u64) {
        self.skipped_sides.inc_by(count);
    }

    /// Count of operations recorded with the given labels
    pub fn operation_count(&self, operation: &str, status: &str) -> u64 {
        self.operations_total
            .with_label_values(&[operation, status])
            .get()
    }
}
