//! Common types used throughout the rating ledger

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for players, assigned at registration and never reused
pub type PlayerId = Uuid;

/// Unique identifier for match records, assigned by the match store
pub type MatchId = u64;

/// Rating value used by the ledger
pub type Rating = i32;

/// Default rating for newly registered players
pub const DEFAULT_RATING: Rating = 1200;

/// Which side of a match a player was on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    A,
    B,
}

impl Side {
    /// The other side of the match
    pub fn opponent(self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }
}

/// Categorical result of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    AWin,
    BWin,
    Draw,
}

impl Outcome {
    /// What this outcome means for the player on `side`
    pub fn result_for(self, side: Side) -> SideResult {
        match (self, side) {
            (Outcome::Draw, _) => SideResult::Draw,
            (Outcome::AWin, Side::A) | (Outcome::BWin, Side::B) => SideResult::Win,
            (Outcome::AWin, Side::B) | (Outcome::BWin, Side::A) => SideResult::Loss,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::AWin => write!(f, "A_WIN"),
            Outcome::BWin => write!(f, "B_WIN"),
            Outcome::Draw => write!(f, "DRAW"),
        }
    }
}

/// Result of a match from one player's perspective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SideResult {
    Win,
    Draw,
    Loss,
}

impl SideResult {
    /// Actual score fed into the rating model
    pub fn score(self) -> f64 {
        match self {
            SideResult::Win => 1.0,
            SideResult::Draw => 0.5,
            SideResult::Loss => 0.0,
        }
    }
}
