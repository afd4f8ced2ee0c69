//! Rating Ledger - club match results with atomic, reversible Elo updates
//!
//! This crate keeps every player's rating and win/draw/loss counters
//! consistent with the match records that reference them. Recording a match
//! and deleting one are each a single unit of work over pluggable storage.

pub mod config;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod rating;
pub mod replay;
pub mod storage;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{LedgerError, LedgerResult, Result};
pub use types::*;

// Re-export key components
pub use ledger::{MatchRecord, PlayerAggregate, RatingLedger, StatCorrection};
pub use rating::{EloRatingModel, RatingModel};
pub use storage::{InMemoryStore, UnitOfWork, UnitOfWorkProvider};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
