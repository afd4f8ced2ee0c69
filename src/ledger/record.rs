//! Match records
//!
//! A record carries the deltas that were applied when it was committed.
//! Reversal reads them back verbatim, so there are no setters.

use crate::types::{MatchId, Outcome, PlayerId, Rating, Side, SideResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A match that has been computed but not yet given an id by the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchDraft {
    side_a: PlayerId,
    side_b: PlayerId,
    outcome: Outcome,
    timestamp: DateTime<Utc>,
    delta_a: Rating,
    delta_b: Rating,
}

impl MatchDraft {
    pub fn new(
        side_a: PlayerId,
        side_b: PlayerId,
        outcome: Outcome,
        timestamp: DateTime<Utc>,
        delta_a: Rating,
        delta_b: Rating,
    ) -> Self {
        Self {
            side_a,
            side_b,
            outcome,
            timestamp,
            delta_a,
            delta_b,
        }
    }

    pub fn side_a(&self) -> PlayerId {
        self.side_a
    }

    pub fn side_b(&self) -> PlayerId {
        self.side_b
    }

    /// Seal the draft with the id assigned by the match store
    pub fn into_record(self, id: MatchId) -> MatchRecord {
        MatchRecord { id, draft: self }
    }
}

/// Immutable record of a committed match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    id: MatchId,
    #[serde(flatten)]
    draft: MatchDraft,
}

impl MatchRecord {
    pub fn id(&self) -> MatchId {
        self.id
    }

    pub fn side_a(&self) -> PlayerId {
        self.draft.side_a
    }

    pub fn side_b(&self) -> PlayerId {
        self.draft.side_b
    }

    pub fn outcome(&self) -> Outcome {
        self.draft.outcome
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.draft.timestamp
    }

    pub fn delta_a(&self) -> Rating {
        self.draft.delta_a
    }

    pub fn delta_b(&self) -> Rating {
        self.draft.delta_b
    }

    /// Player id, stored delta and result for one side
    pub fn side(&self, side: Side) -> (PlayerId, Rating, SideResult) {
        let result = self.draft.outcome.result_for(side);
        match side {
            Side::A => (self.draft.side_a, self.draft.delta_a, result),
            Side::B => (self.draft.side_b, self.draft.delta_b, result),
        }
    }

    /// Whether `player_id` played in this match
    pub fn involves(&self, player_id: PlayerId) -> bool {
        self.side_of(player_id).is_some()
    }

    /// Which side `player_id` was on
    pub fn side_of(&self, player_id: PlayerId) -> Option<Side> {
        if self.draft.side_a == player_id {
            Some(Side::A)
        } else if self.draft.side_b == player_id {
            Some(Side::B)
        } else {
            None
        }
    }

    /// Delta that was applied to `player_id`
    pub fn delta_for(&self, player_id: PlayerId) -> Option<Rating> {
        self.side_of(player_id).map(|side| self.side(side).1)
    }

    /// How the match went for `player_id`
    pub fn result_for(&self, player_id: PlayerId) -> Option<SideResult> {
        self.side_of(player_id)
            .map(|side| self.draft.outcome.result_for(side))
    }
}
