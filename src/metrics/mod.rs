//! Metrics for the rating ledger
//!
//! This module provides Prometheus counters and histograms for ledger
//! operations.

pub mod collector;

pub use collector::LedgerMetrics;
