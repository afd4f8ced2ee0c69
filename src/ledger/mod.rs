//! The rating ledger
//!
//! This module ties player aggregates and match records together. Every
//! match record is backed by exactly the rating and counter changes it
//! applied, and removing a record takes those changes back out.

pub mod locks;
pub mod player;
pub mod record;
pub mod service;

// Re-export commonly used types
pub use locks::{PlayerLockGuard, PlayerLocks};
pub use player::{PlayerAggregate, StatCorrection};
pub use record::{MatchDraft, MatchRecord};
pub use service::RatingLedger;
