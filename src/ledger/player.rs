//! Per-player rating aggregate
//!
//! The ledger is the only writer of the rating and result counters. Identity
//! data (name, credentials, admin flag) lives with profile management and is
//! not part of this record.

use crate::error::{LedgerError, LedgerResult};
use crate::types::{PlayerId, Rating, SideResult};
use crate::utils::current_timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Rating and result counters for one player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerAggregate {
    pub id: PlayerId,
    pub rating: Rating,
    pub games_played: u32,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
    pub created_at: DateTime<Utc>,
}

/// Manual correction of a player's rating and counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatCorrection {
    pub rating: Rating,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
}

impl PlayerAggregate {
    /// Create a new aggregate for a freshly registered player
    pub fn new(id: PlayerId, initial_rating: Rating) -> Self {
        Self {
            id,
            rating: initial_rating,
            games_played: 0,
            wins: 0,
            draws: 0,
            losses: 0,
            created_at: current_timestamp(),
        }
    }

    /// Apply one match result with the delta computed for this side
    ///
    /// Leaves the aggregate untouched when the rating or a counter would
    /// overflow.
    pub fn apply_result(&mut self, delta: Rating, result: SideResult) -> LedgerResult<()> {
        let player_id = self.id;
        let overflow = || LedgerError::StatOverflow { player_id };
        let rating = self.rating.checked_add(delta).ok_or_else(overflow)?;
        let games_played = self.games_played.checked_add(1).ok_or_else(overflow)?;
        let counter = self.counter_mut(result);
        *counter = counter.checked_add(1).ok_or_else(overflow)?;

        self.rating = rating;
        self.games_played = games_played;
        Ok(())
    }

    /// Undo a previous `apply_result` with the same delta and result
    ///
    /// Counters saturate at zero, which only happens when a manual correction
    /// already lowered them below what the stored matches account for.
    pub fn reverse_result(&mut self, delta: Rating, result: SideResult) -> LedgerResult<()> {
        let player_id = self.id;
        let overflow = || LedgerError::StatOverflow { player_id };
        let rating = self.rating.checked_sub(delta).ok_or_else(overflow)?;
        let (mut wins, mut draws, mut losses) = (self.wins, self.draws, self.losses);
        let counter = match result {
            SideResult::Win => &mut wins,
            SideResult::Draw => &mut draws,
            SideResult::Loss => &mut losses,
        };
        *counter = counter.saturating_sub(1);
        // One less than before whenever the counters were consistent
        let games_played = total_games(wins, draws, losses).ok_or_else(overflow)?;

        self.rating = rating;
        self.wins = wins;
        self.draws = draws;
        self.losses = losses;
        self.games_played = games_played;
        Ok(())
    }

    /// Overwrite rating and counters; `games_played` is derived
    ///
    /// Rejects counters whose sum does not fit a `u32`.
    pub fn correct(&mut self, correction: StatCorrection) -> LedgerResult<()> {
        let games_played = total_games(correction.wins, correction.draws, correction.losses)
            .ok_or(LedgerError::StatOverflow { player_id: self.id })?;

        self.rating = correction.rating;
        self.wins = correction.wins;
        self.draws = correction.draws;
        self.losses = correction.losses;
        self.games_played = games_played;
        Ok(())
    }

    /// Whether `games_played == wins + draws + losses`
    pub fn is_consistent(&self) -> bool {
        total_games(self.wins, self.draws, self.losses) == Some(self.games_played)
    }

    fn counter_mut(&mut self, result: SideResult) -> &mut u32 {
        match result {
            SideResult::Win => &mut self.wins,
            SideResult::Draw => &mut self.draws,
            SideResult::Loss => &mut self.losses,
        }
    }
}

fn total_games(wins: u32, draws: u32, losses: u32) -> Option<u32> {
    wins.checked_add(draws)?.checked_add(losses)
}
