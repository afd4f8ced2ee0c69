//! Elo rating model
//!
//! Deltas are rounded half away from zero before they are stored on a match
//! record. The stored value is what reversal uses, so the rounding rule is
//! part of the record format.

use crate::rating::model::RatingModel;
use crate::types::{Outcome, Rating, Side, DEFAULT_RATING};

/// Rating adjustment scale, constant for every rating band
pub const K_FACTOR: f64 = 32.0;

/// Rating gap that moves the expected score by a factor of ten
const SCALE: f64 = 400.0;

/// Performance rating offset used for perfect and zero scores
const PERFORMANCE_CAP: Rating = 800;

/// Modeled probability that `rating_self` beats `rating_opponent`
pub fn expected_score(rating_self: Rating, rating_opponent: Rating) -> f64 {
    let gap = f64::from(rating_opponent) - f64::from(rating_self);
    1.0 / (1.0 + 10f64.powf(gap / SCALE))
}

/// Rating change for one side given its actual score (1.0, 0.5 or 0.0)
pub fn delta(rating_self: Rating, rating_opponent: Rating, actual_score: f64) -> Rating {
    let change = K_FACTOR * (actual_score - expected_score(rating_self, rating_opponent));
    // f64::round is half away from zero; |change| <= K_FACTOR so the cast is exact
    change.round() as Rating
}

/// Performance rating over a series of games against opponents averaging
/// `opponent_average`. Returns `None` when no games were played.
pub fn performance_rating(opponent_average: Rating, score: f64, games: u32) -> Option<Rating> {
    if games == 0 {
        return None;
    }

    let percentage = score / f64::from(games);
    let offset = if percentage >= 1.0 {
        PERFORMANCE_CAP
    } else if percentage <= 0.0 {
        -PERFORMANCE_CAP
    } else {
        (SCALE * (percentage / (1.0 - percentage)).log10()) as Rating
    };

    Some(opponent_average.saturating_add(offset))
}

/// Elo rating model with a fixed K-factor
#[derive(Debug, Clone)]
pub struct EloRatingModel {
    initial_rating: Rating,
}

impl EloRatingModel {
    /// Create a model that registers new players at `initial_rating`
    pub fn new(initial_rating: Rating) -> Self {
        Self { initial_rating }
    }
}

impl Default for EloRatingModel {
    fn default() -> Self {
        Self::new(DEFAULT_RATING)
    }
}

impl RatingModel for EloRatingModel {
    fn game_deltas(&self, rating_a: Rating, rating_b: Rating, outcome: Outcome) -> (Rating, Rating) {
        // Each side is rounded on its own; the pair is not forced to sum to zero
        let delta_a = delta(rating_a, rating_b, outcome.result_for(Side::A).score());
        let delta_b = delta(rating_b, rating_a, outcome.result_for(Side::B).score());
        (delta_a, delta_b)
    }

    fn initial_rating(&self) -> Rating {
        self.initial_rating
    }

    fn name(&self) -> &'static str {
        "elo"
    }
}
