//! Rating model trait
//!
//! The ledger asks a model for deltas only when a match is committed. Stored
//! deltas are never sent back through a model, so swapping the model does
//! not affect how existing records are reversed.

use crate::types::{Outcome, Rating};

/// Trait for computing per-side rating deltas for a two-player match
pub trait RatingModel: Send + Sync {
    /// Calculate `(delta_a, delta_b)` for a match between the two ratings
    ///
    /// # Arguments
    /// * `rating_a` - Current rating of side A
    /// * `rating_b` - Current rating of side B
    /// * `outcome` - Result of the match
    fn game_deltas(&self, rating_a: Rating, rating_b: Rating, outcome: Outcome) -> (Rating, Rating);

    /// Get the initial rating for new players
    fn initial_rating(&self) -> Rating;

    /// Short name used in logs
    fn name(&self) -> &'static str;
}
