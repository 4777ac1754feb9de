//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring the ledger.
//!
//! # Metrics
//!
//! - `career_ledger_transactions_total` - Transactions admitted
//! - `career_ledger_zero_delta_rejected_total` - All-zero transactions dropped
//! - `career_ledger_corrections_total{resource}` - Correction entries synthesized
//! - `career_ledger_drift_absorbed_total{resource}` - Sub-epsilon drifts absorbed
//! - `career_ledger_size` - Transactions currently held

use crate::types::Resource;
use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::fmt;
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Transactions admitted
    pub transactions_total: IntCounter,

    /// All-zero transactions dropped at admission
    pub zero_delta_rejected: IntCounter,

    /// Correction transactions per resource
    pub corrections_total: IntCounterVec,

    /// Sub-epsilon drifts absorbed per resource
    pub drift_absorbed_total: IntCounterVec,

    /// Current ledger size
    pub ledger_size: IntGauge,

    /// Prometheus registry
    registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector on a private registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let transactions_total = IntCounter::with_opts(Opts::new(
            "career_ledger_transactions_total",
            "Total number of transactions admitted",
        ))?;
        registry.register(Box::new(transactions_total.clone()))?;

        let zero_delta_rejected = IntCounter::with_opts(Opts::new(
            "career_ledger_zero_delta_rejected_total",
            "Transactions dropped because every delta was zero",
        ))?;
        registry.register(Box::new(zero_delta_rejected.clone()))?;

        let corrections_total = IntCounterVec::new(
            Opts::new(
                "career_ledger_corrections_total",
                "Correction transactions synthesized during reconciliation",
            ),
            &["resource"],
        )?;
        registry.register(Box::new(corrections_total.clone()))?;

        let drift_absorbed_total = IntCounterVec::new(
            Opts::new(
                "career_ledger_drift_absorbed_total",
                "Drifts below the reconciliation epsilon absorbed without a transaction",
            ),
            &["resource"],
        )?;
        registry.register(Box::new(drift_absorbed_total.clone()))?;

        let ledger_size = IntGauge::with_opts(Opts::new(
            "career_ledger_size",
            "Number of transactions held by the ledger",
        ))?;
        registry.register(Box::new(ledger_size.clone()))?;

        Ok(Self {
            transactions_total,
            zero_delta_rejected,
            corrections_total,
            drift_absorbed_total,
            ledger_size,
            registry,
        })
    }

    /// Record an admitted transaction
    pub fn record_admit(&self, ledger_size: usize) {
        self.transactions_total.inc();
        self.ledger_size.set(ledger_size as i64);
    }

    /// Record a dropped all-zero transaction
    pub fn record_zero_rejected(&self) {
        self.zero_delta_rejected.inc();
    }

    /// Record a correction transaction
    pub fn record_correction(&self, resource: Resource) {
        self.corrections_total
            .with_label_values(&[resource.name()])
            .inc();
    }

    /// Record an absorbed drift
    pub fn record_drift_absorbed(&self, resource: Resource) {
        self.drift_absorbed_total
            .with_label_values(&[resource.name()])
            .inc();
    }

    /// Reset the size gauge (restore clears the ledger)
    pub fn update_ledger_size(&self, ledger_size: usize) {
        self.ledger_size.set(ledger_size as i64);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl fmt::Debug for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metrics")
            .field("transactions_total", &self.transactions_total.get())
            .field("zero_delta_rejected", &self.zero_delta_rejected.get())
            .field("ledger_size", &self.ledger_size.get())
            .finish_non_exhaustive()
    }
}
