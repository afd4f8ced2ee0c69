//! Rating computation for two-player matches
//!
//! This module provides the rating model interface and the Elo model used by
//! the ledger.

pub mod elo;
pub mod model;

// Re-export commonly used types
pub use elo::{expected_score, performance_rating, EloRatingModel, K_FACTOR};
pub use model::RatingModel;
