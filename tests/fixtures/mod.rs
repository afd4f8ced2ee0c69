//! Test fixtures and mock implementations for integration testing

#![allow(dead_code)]

use anyhow::bail;
use async_trait::async_trait;
use rating_ledger::error::Result;
use rating_ledger::ledger::MatchDraft;
use rating_ledger::storage::{MatchStore, PlayerStore};
use rating_ledger::{
    EloRatingModel, InMemoryStore, MatchId, MatchRecord, Outcome, PlayerAggregate, PlayerId,
    Rating, RatingLedger, RatingModel, StatCorrection, UnitOfWork, UnitOfWorkProvider,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Ledger over a fresh in-memory store with the default Elo model
pub fn create_test_ledger() -> (RatingLedger, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    let ledger = RatingLedger::new(store.clone(), Arc::new(EloRatingModel::default()));
    (ledger, store)
}

/// Register one player per rating; ratings other than the default are set
/// through a manual correction with zeroed counters
pub async fn create_test_players(ledger: &RatingLedger, ratings: &[Rating]) -> Vec<PlayerId> {
    let mut ids = Vec::with_capacity(ratings.len());
    for &rating in ratings {
        let player = ledger.register_player().await.unwrap();
        if player.rating != rating {
            ledger
                .correct_player(
                    player.id,
                    StatCorrection {
                        rating,
                        wins: 0,
                        draws: 0,
                        losses: 0,
                    },
                )
                .await
                .unwrap();
        }
        ids.push(player.id);
    }
    ids
}

/// Rating, games, wins, draws, losses
pub fn stats(player: &PlayerAggregate) -> (Rating, u32, u32, u32, u32) {
    (
        player.rating,
        player.games_played,
        player.wins,
        player.draws,
        player.losses,
    )
}

/// Rating model that always returns the same deltas
#[derive(Debug, Clone)]
pub struct FixedDeltaModel {
    pub deltas: (Rating, Rating),
}

impl RatingModel for FixedDeltaModel {
    fn game_deltas(&self, _rating_a: Rating, _rating_b: Rating, _outcome: Outcome) -> (Rating, Rating) {
        self.deltas
    }

    fn initial_rating(&self) -> Rating {
        1200
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

/// Storage wrapper whose match inserts can be made to fail mid unit of work
pub struct FailingMatchSaves {
    inner: Arc<InMemoryStore>,
    failing: Arc<AtomicBool>,
}

impl FailingMatchSaves {
    pub fn new(inner: Arc<InMemoryStore>) -> Self {
        Self {
            inner,
            failing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl UnitOfWorkProvider for FailingMatchSaves {
    async fn begin<'p>(&'p self) -> Result<Box<dyn UnitOfWork<'p> + 'p>> {
        Ok(Box::new(FailingUnitOfWork {
            inner: self.inner.begin().await?,
            failing: self.failing.clone(),
        }))
    }
}

struct FailingUnitOfWork<'a> {
    inner: Box<dyn UnitOfWork<'a> + 'a>,
    failing: Arc<AtomicBool>,
}

#[async_trait]
impl<'a> UnitOfWork<'a> for FailingUnitOfWork<'a> {
    fn players(&self) -> Arc<dyn PlayerStore + 'a> {
        self.inner.players()
    }

    fn matches(&self) -> Arc<dyn MatchStore + 'a> {
        Arc::new(FailingMatches {
            inner: self.inner.matches(),
            failing: self.failing.clone(),
        })
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.inner.rollback().await
    }
}

struct FailingMatches<'a> {
    inner: Arc<dyn MatchStore + 'a>,
    failing: Arc<AtomicBool>,
}

#[async_trait]
impl MatchStore for FailingMatches<'_> {
    async fn save(&self, draft: &MatchDraft) -> Result<MatchId> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("match table unavailable");
        }
        self.inner.save(draft).await
    }

    async fn load(&self, id: MatchId) -> Result<Option<MatchRecord>> {
        self.inner.load(id).await
    }

    async fn delete(&self, id: MatchId) -> Result<bool> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("match table unavailable");
        }
        self.inner.delete(id).await
    }

    async fn list_for_player(&self, player_id: PlayerId) -> Result<Vec<MatchRecord>> {
        self.inner.list_for_player(player_id).await
    }

    async fn list(&self) -> Result<Vec<MatchRecord>> {
        self.inner.list().await
    }
}
