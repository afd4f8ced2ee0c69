//! Script replay driver
//!
//! A script names its players and lists ledger operations. Later steps refer
//! to earlier commits by their position among the script's commit steps, so
//! `game: 0` is the first commit whether or not it succeeded.

use crate::error::{LedgerError, Result};
use crate::ledger::{MatchRecord, PlayerAggregate, RatingLedger, StatCorrection};
use crate::types::{MatchId, Outcome, PlayerId};
use anyhow::{anyhow, Context};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

/// A replay script: player names and the operations to run
#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    pub players: Vec<String>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Script {
    /// Read a JSON script from `path`
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read script {}", path.display()))?;
        Self::from_json(&contents)
            .with_context(|| format!("Failed to parse script {}", path.display()))
    }

    /// Parse a script from JSON text
    pub fn from_json(contents: &str) -> Result<Self> {
        Ok(serde_json::from_str(contents)?)
    }
}

/// One ledger operation; `game` indexes the script's commit steps
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Commit {
        a: String,
        b: String,
        outcome: Outcome,
        #[serde(default)]
        at: Option<DateTime<Utc>>,
    },
    Reverse {
        game: usize,
    },
    Amend {
        game: usize,
        outcome: Outcome,
    },
    Correct {
        player: String,
        #[serde(flatten)]
        correction: StatCorrection,
    },
    Remove {
        player: String,
    },
}

#[derive(Debug, Serialize)]
pub struct NamedPlayer {
    pub name: String,
    #[serde(flatten)]
    pub player: PlayerAggregate,
}

/// Final state after a replay
#[derive(Debug, Serialize)]
pub struct Report {
    pub players: Vec<NamedPlayer>,
    pub matches: Vec<MatchRecord>,
}

/// Replay state: name lookups and the live match behind each commit step
pub struct Replay {
    ledger: RatingLedger,
    names: Vec<(String, PlayerId)>,
    ids: HashMap<String, PlayerId>,
    games: Vec<Option<MatchId>>,
}

impl Replay {
    /// Register one ledger player per script name
    pub async fn new(ledger: RatingLedger, players: &[String]) -> Result<Self> {
        let mut names = Vec::with_capacity(players.len());
        let mut ids = HashMap::with_capacity(players.len());

        for name in players {
            if ids.contains_key(name) {
                return Err(anyhow!("Duplicate player name in script: {}", name));
            }
            let player = ledger.register_player().await?;
            names.push((name.clone(), player.id));
            ids.insert(name.clone(), player.id);
        }

        Ok(Self {
            ledger,
            names,
            ids,
            games: Vec::new(),
        })
    }

    pub fn ledger(&self) -> &RatingLedger {
        &self.ledger
    }

    fn player_id(&self, name: &str) -> Result<PlayerId> {
        self.ids
            .get(name)
            .copied()
            .ok_or_else(|| anyhow!("Unknown player name in script: {}", name))
    }

    fn game_id(&self, game: usize) -> Result<MatchId> {
        self.games
            .get(game)
            .copied()
            .flatten()
            .ok_or_else(|| anyhow!("Script game {} is not a live match", game))
    }

    /// Run one step
    pub async fn run(&mut self, step: &Step) -> Result<()> {
        match step {
            Step::Commit { a, b, outcome, at } => {
                // Reserve the slot first so later indexes stay aligned
                let game = self.games.len();
                self.games.push(None);

                let (a, b) = (self.player_id(a)?, self.player_id(b)?);
                let record = match at {
                    Some(at) => self.ledger.commit_at(a, b, *outcome, *at).await?,
                    None => self.ledger.commit(a, b, *outcome).await?,
                };
                self.games[game] = Some(record.id());
            }
            Step::Reverse { game } => {
                self.ledger.reverse(self.game_id(*game)?).await?;
                self.games[*game] = None;
            }
            Step::Amend { game, outcome } => {
                let record = self.ledger.amend(self.game_id(*game)?, *outcome).await?;
                self.games[*game] = Some(record.id());
            }
            Step::Correct { player, correction } => {
                let id = self.player_id(player)?;
                self.ledger.correct_player(id, *correction).await?;
            }
            Step::Remove { player } => {
                let id = self.player_id(player)?;
                self.ledger.remove_player(id).await?;
            }
        }
        Ok(())
    }

    /// Run every step in order and return how many failed
    ///
    /// Without `keep_going` the first failure is returned as an error.
    pub async fn run_all(&mut self, steps: &[Step], keep_going: bool) -> Result<usize> {
        let mut failed = 0;
        for (index, step) in steps.iter().enumerate() {
            if let Err(e) = self.run(step).await {
                if !keep_going {
                    return Err(e.context(format!("Step {} failed", index)));
                }
                warn!("Step {} failed, continuing: {:#}", index, e);
                failed += 1;
            }
        }
        Ok(failed)
    }

    /// Named players that still exist and every stored match
    pub async fn report(&self) -> Result<Report> {
        let mut players = Vec::with_capacity(self.names.len());
        for (name, id) in &self.names {
            match self.ledger.player(*id).await {
                Ok(player) => players.push(NamedPlayer {
                    name: name.clone(),
                    player,
                }),
                Err(LedgerError::UnknownPlayer { .. }) => {}
                Err(err) => return Err(err.into()),
            }
        }

        Ok(Report {
            players,
            matches: self.ledger.matches().await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_script_steps() {
        let script = Script::from_json(
            r#"{
                "players": ["ann", "bob"],
                "steps": [
                    {"op": "commit", "a": "ann", "b": "bob", "outcome": "A_WIN"},
                    {"op": "amend", "game": 0, "outcome": "DRAW"},
                    {"op": "correct", "player": "bob", "rating": 1300, "wins": 1, "draws": 0, "losses": 2},
                    {"op": "reverse", "game": 0},
                    {"op": "remove", "player": "ann"}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(script.players, vec!["ann", "bob"]);
        assert_eq!(script.steps.len(), 5);
        assert!(matches!(
            &script.steps[0],
            Step::Commit { outcome: Outcome::AWin, at: None, .. }
        ));
        match &script.steps[2] {
            Step::Correct { player, correction } => {
                assert_eq!(player, "bob");
                assert_eq!(correction.rating, 1300);
                assert_eq!(correction.losses, 2);
            }
            other => panic!("unexpected step: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_outcome_is_rejected() {
        let parsed = Script::from_json(
            r#"{"players": ["ann", "bob"], "steps": [{"op": "commit", "a": "ann", "b": "bob", "outcome": "FORFEIT"}]}"#,
        );
        assert!(parsed.is_err());
    }
}
