//! Rating system configuration

use crate::types::{Rating, DEFAULT_RATING};
use serde::{Deserialize, Serialize};

/// Rating configuration
///
/// The K-factor is not configurable; every rating band uses the same one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingConfig {
    /// Rating given to newly registered players
    pub initial_rating: Rating,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            initial_rating: DEFAULT_RATING,
        }
    }
}
