//! Rating ledger
//!
//! Commits, reversals, amendments and manual corrections each run as one
//! unit of work while holding the locks of the players they touch. From the
//! caller's side an operation either fully happened or did not happen.

use crate::error::{LedgerError, LedgerResult};
use crate::ledger::locks::PlayerLocks;
use crate::ledger::player::{PlayerAggregate, StatCorrection};
use crate::ledger::record::{MatchDraft, MatchRecord};
use crate::metrics::LedgerMetrics;
use crate::rating::{performance_rating, RatingModel};
use crate::storage::{UnitOfWork, UnitOfWorkProvider};
use crate::types::{MatchId, Outcome, PlayerId, Rating, Side};
use crate::utils::{generate_player_id, Clock, SystemClock};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Orchestrates rating updates over the player and match stores
pub struct RatingLedger {
    storage: Arc<dyn UnitOfWorkProvider>,
    model: Arc<dyn RatingModel>,
    clock: Arc<dyn Clock>,
    metrics: Option<Arc<LedgerMetrics>>,
    locks: PlayerLocks,
}

impl RatingLedger {
    /// Create a ledger over `storage` using `model` for new matches
    pub fn new(storage: Arc<dyn UnitOfWorkProvider>, model: Arc<dyn RatingModel>) -> Self {
        Self {
            storage,
            model,
            clock: Arc::new(SystemClock),
            metrics: None,
            locks: PlayerLocks::new(),
        }
    }

    /// Use `clock` for match timestamps
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Record operation metrics into `metrics`
    pub fn with_metrics(mut self, metrics: Arc<LedgerMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Register a new player at the model's initial rating
    pub async fn register_player(&self) -> LedgerResult<PlayerAggregate> {
        let started = Instant::now();
        let result = self.register_inner().await;
        self.observe("register", started, &result);
        result
    }

    /// Remove a player; match records that reference it are kept
    pub async fn remove_player(&self, player_id: PlayerId) -> LedgerResult<bool> {
        let started = Instant::now();
        let result = self.remove_inner(player_id).await;
        self.observe("remove_player", started, &result);
        result
    }

    /// Record a match timestamped by the ledger's clock
    pub async fn commit(
        &self,
        side_a: PlayerId,
        side_b: PlayerId,
        outcome: Outcome,
    ) -> LedgerResult<MatchRecord> {
        self.commit_at(side_a, side_b, outcome, self.clock.now())
            .await
    }

    /// Record a match played at `timestamp`
    pub async fn commit_at(
        &self,
        side_a: PlayerId,
        side_b: PlayerId,
        outcome: Outcome,
        timestamp: DateTime<Utc>,
    ) -> LedgerResult<MatchRecord> {
        let started = Instant::now();
        let result = self.commit_inner(side_a, side_b, outcome, timestamp).await;
        self.observe("commit", started, &result);
        result
    }

    /// Undo a match using its stored deltas and delete the record
    pub async fn reverse(&self, match_id: MatchId) -> LedgerResult<()> {
        let started = Instant::now();
        let result = self.reverse_inner(match_id).await;
        self.observe("reverse", started, &result);
        result
    }

    /// Replace a match's outcome: reverse it and commit the new result
    ///
    /// The replacement keeps the original timestamp and gets a new id. Both
    /// players must still exist.
    pub async fn amend(&self, match_id: MatchId, outcome: Outcome) -> LedgerResult<MatchRecord> {
        let started = Instant::now();
        let result = self.amend_inner(match_id, outcome).await;
        self.observe("amend", started, &result);
        result
    }

    /// Overwrite a player's rating and counters by hand
    pub async fn correct_player(
        &self,
        player_id: PlayerId,
        correction: StatCorrection,
    ) -> LedgerResult<PlayerAggregate> {
        let started = Instant::now();
        let result = self.correct_inner(player_id, correction).await;
        self.observe("correct", started, &result);
        result
    }

    /// Get one player's aggregate
    pub async fn player(&self, player_id: PlayerId) -> LedgerResult<PlayerAggregate> {
        let uow = self.storage.begin().await?;
        let result = load_player(uow.as_ref(), player_id).await;
        finish_read(uow, result).await
    }

    /// Get every player's aggregate
    pub async fn players(&self) -> LedgerResult<Vec<PlayerAggregate>> {
        let uow = self.storage.begin().await?;
        let result = uow.players().list().await.map_err(LedgerError::from);
        finish_read(uow, result).await
    }

    /// Get one match record
    pub async fn match_record(&self, match_id: MatchId) -> LedgerResult<MatchRecord> {
        let uow = self.storage.begin().await?;
        let result = load_match(uow.as_ref(), match_id).await;
        finish_read(uow, result).await
    }

    /// Get every match record, oldest id first
    pub async fn matches(&self) -> LedgerResult<Vec<MatchRecord>> {
        let uow = self.storage.begin().await?;
        let result = uow.matches().list().await.map_err(LedgerError::from);
        finish_read(uow, result).await
    }

    /// Get every match involving `player_id`, oldest id first
    pub async fn history(&self, player_id: PlayerId) -> LedgerResult<Vec<MatchRecord>> {
        let uow = self.storage.begin().await?;
        let result = uow
            .matches()
            .list_for_player(player_id)
            .await
            .map_err(LedgerError::from);
        finish_read(uow, result).await
    }

    /// Performance rating of a player over its recorded matches
    ///
    /// Uses the current ratings of the opponents; matches against removed
    /// players are left out. `None` when no match qualifies.
    pub async fn performance(&self, player_id: PlayerId) -> LedgerResult<Option<Rating>> {
        let uow = self.storage.begin().await?;
        let result = performance_in(uow.as_ref(), player_id).await;
        finish_read(uow, result).await
    }

    async fn register_inner(&self) -> LedgerResult<PlayerAggregate> {
        let player = PlayerAggregate::new(generate_player_id(), self.model.initial_rating());

        let uow = self.storage.begin().await?;
        let result = uow.players().create(&player).await.map_err(LedgerError::from);
        finish(uow, result).await?;

        info!("Registered player {} at rating {}", player.id, player.rating);
        Ok(player)
    }

    async fn remove_inner(&self, player_id: PlayerId) -> LedgerResult<bool> {
        let _locks = self.locks.acquire(&[player_id]).await;

        let uow = self.storage.begin().await?;
        let result = uow.players().delete(player_id).await.map_err(LedgerError::from);
        let removed = finish(uow, result).await?;

        if removed {
            info!("Removed player {}", player_id);
        }
        Ok(removed)
    }

    async fn commit_inner(
        &self,
        side_a: PlayerId,
        side_b: PlayerId,
        outcome: Outcome,
        timestamp: DateTime<Utc>,
    ) -> LedgerResult<MatchRecord> {
        if side_a == side_b {
            return Err(LedgerError::SamePlayer { player_id: side_a });
        }

        let _locks = self.locks.acquire(&[side_a, side_b]).await;
        let uow = self.storage.begin().await?;
        let result = self
            .apply_match(uow.as_ref(), side_a, side_b, outcome, timestamp)
            .await;
        let record = finish(uow, result).await?;

        if let Some(metrics) = &self.metrics {
            metrics.record_deltas(record.delta_a(), record.delta_b());
        }
        info!(
            "Committed match {}: {} vs {} {} ({:+}, {:+})",
            record.id(),
            side_a,
            side_b,
            outcome,
            record.delta_a(),
            record.delta_b()
        );
        Ok(record)
    }

    async fn reverse_inner(&self, match_id: MatchId) -> LedgerResult<()> {
        let record = self.match_record(match_id).await?;
        let _locks = self
            .locks
            .acquire(&[record.side_a(), record.side_b()])
            .await;

        let uow = self.storage.begin().await?;
        let result = self.unapply_match(uow.as_ref(), match_id).await;
        let (_, skipped) = finish(uow, result).await?;

        if let Some(metrics) = &self.metrics {
            metrics.record_skipped_sides(skipped);
        }
        info!("Reversed match {}", match_id);
        Ok(())
    }

    async fn amend_inner(&self, match_id: MatchId, outcome: Outcome) -> LedgerResult<MatchRecord> {
        let record = self.match_record(match_id).await?;
        let (side_a, side_b) = (record.side_a(), record.side_b());
        let _locks = self.locks.acquire(&[side_a, side_b]).await;

        let uow = self.storage.begin().await?;
        let result = match self.unapply_match(uow.as_ref(), match_id).await {
            Ok((reversed, _)) => {
                self.apply_match(uow.as_ref(), side_a, side_b, outcome, reversed.timestamp())
                    .await
            }
            Err(err) => Err(err),
        };
        let amended = finish(uow, result).await?;

        info!(
            "Amended match {} to {} as match {}",
            match_id,
            outcome,
            amended.id()
        );
        Ok(amended)
    }

    async fn correct_inner(
        &self,
        player_id: PlayerId,
        correction: StatCorrection,
    ) -> LedgerResult<PlayerAggregate> {
        let _locks = self.locks.acquire(&[player_id]).await;

        let uow = self.storage.begin().await?;
        let result = correct_in(uow.as_ref(), player_id, correction).await;
        let player = finish(uow, result).await?;

        info!(
            "Corrected player {}: rating {}, {}/{}/{}",
            player_id, player.rating, player.wins, player.draws, player.losses
        );
        Ok(player)
    }

    async fn apply_match(
        &self,
        uow: &dyn UnitOfWork<'_>,
        side_a: PlayerId,
        side_b: PlayerId,
        outcome: Outcome,
        timestamp: DateTime<Utc>,
    ) -> LedgerResult<MatchRecord> {
        let mut player_a = load_player(uow, side_a).await?;
        let mut player_b = load_player(uow, side_b).await?;

        let (delta_a, delta_b) = self
            .model
            .game_deltas(player_a.rating, player_b.rating, outcome);
        debug!(
            "{} deltas for {} vs {} at {}/{}: {:+}/{:+}",
            self.model.name(),
            side_a,
            side_b,
            player_a.rating,
            player_b.rating,
            delta_a,
            delta_b
        );

        player_a.apply_result(delta_a, outcome.result_for(Side::A))?;
        player_b.apply_result(delta_b, outcome.result_for(Side::B))?;

        let players = uow.players();
        players.save(&player_a).await?;
        players.save(&player_b).await?;

        let draft = MatchDraft::new(side_a, side_b, outcome, timestamp, delta_a, delta_b);
        let id = uow.matches().save(&draft).await?;
        Ok(draft.into_record(id))
    }

    /// Reverse a stored match inside `uow` and delete it
    ///
    /// Returns the record and how many of its sides were skipped.
    async fn unapply_match(
        &self,
        uow: &dyn UnitOfWork<'_>,
        match_id: MatchId,
    ) -> LedgerResult<(MatchRecord, u64)> {
        // Re-read under the locks: a concurrent reverse may have won
        let record = load_match(uow, match_id).await?;
        let players = uow.players();
        let mut skipped = 0;

        for side in [Side::A, Side::B] {
            let (player_id, delta, result) = record.side(side);
            match players.load(player_id).await? {
                Some(mut player) => {
                    player.reverse_result(delta, result)?;
                    players.save(&player).await?;
                }
                None => {
                    skipped += 1;
                    warn!(
                        "Player {} from match {} no longer exists, skipping its reversal",
                        player_id, match_id
                    );
                }
            }
        }

        uow.matches().delete(match_id).await?;
        Ok((record, skipped))
    }

    fn observe<T>(&self, operation: &str, started: Instant, result: &LedgerResult<T>) {
        if let Err(err) = result {
            warn!("Ledger {} failed: {}", operation, err);
        }
        if let Some(metrics) = &self.metrics {
            let status = match result {
                Ok(_) => "ok",
                Err(err) => err.kind(),
            };
            metrics.record_operation(operation, status, started.elapsed());
        }
    }
}

async fn load_player(uow: &dyn UnitOfWork<'_>, player_id: PlayerId) -> LedgerResult<PlayerAggregate> {
    uow.players()
        .load(player_id)
        .await?
        .ok_or(LedgerError::UnknownPlayer { player_id })
}

async fn load_match(uow: &dyn UnitOfWork<'_>, match_id: MatchId) -> LedgerResult<MatchRecord> {
    uow.matches()
        .load(match_id)
        .await?
        .ok_or(LedgerError::UnknownMatch { match_id })
}

async fn correct_in(
    uow: &dyn UnitOfWork<'_>,
    player_id: PlayerId,
    correction: StatCorrection,
) -> LedgerResult<PlayerAggregate> {
    let mut player = load_player(uow, player_id).await?;
    player.correct(correction)?;
    uow.players().save(&player).await?;
    Ok(player)
}

/// Performance rating from `player_id`'s matches as seen by `uow`
async fn performance_in(
    uow: &dyn UnitOfWork<'_>,
    player_id: PlayerId,
) -> LedgerResult<Option<Rating>> {
    load_player(uow, player_id).await?;
    let players = uow.players();

    let mut opponent_total: i64 = 0;
    let mut score = 0.0;
    let mut games: u32 = 0;
    for record in uow.matches().list_for_player(player_id).await? {
        let Some(side) = record.side_of(player_id) else {
            continue;
        };
        let (_, _, result) = record.side(side);
        let (opponent_id, _, _) = record.side(side.opponent());
        if let Some(opponent) = players.load(opponent_id).await? {
            opponent_total += i64::from(opponent.rating);
            score += result.score();
            games += 1;
        }
    }

    if games == 0 {
        return Ok(None);
    }
    let average = (opponent_total as f64 / f64::from(games)).round() as Rating;
    Ok(performance_rating(average, score, games))
}

/// End a read-only unit of work; reads never need a commit
async fn finish_read<T>(
    uow: Box<dyn UnitOfWork<'_> + '_>,
    result: LedgerResult<T>,
) -> LedgerResult<T> {
    if let Err(err) = uow.rollback().await {
        warn!("Rollback of read failed: {:#}", err);
    }
    result
}

/// Commit `uow` if `result` is Ok, roll it back otherwise
async fn finish<T>(uow: Box<dyn UnitOfWork<'_> + '_>, result: LedgerResult<T>) -> LedgerResult<T> {
    match result {
        Ok(value) => {
            uow.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = uow.rollback().await {
                warn!("Rollback failed: {:#}", rollback_err);
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rating::EloRatingModel;
    use crate::storage::InMemoryStore;
    use crate::utils::MockClock;
    use chrono::TimeZone;

    fn create_test_ledger(store: Arc<InMemoryStore>) -> RatingLedger {
        RatingLedger::new(store, Arc::new(EloRatingModel::default()))
    }

    #[tokio::test]
    async fn test_commit_uses_clock_timestamp() {
        let played_at = Utc.with_ymd_and_hms(2024, 3, 9, 19, 30, 0).unwrap();
        let mut clock = MockClock::new();
        clock.expect_now().times(1).return_const(played_at);

        let ledger = create_test_ledger(Arc::new(InMemoryStore::new())).with_clock(Arc::new(clock));
        let a = ledger.register_player().await.unwrap();
        let b = ledger.register_player().await.unwrap();

        let record = ledger.commit(a.id, b.id, Outcome::Draw).await.unwrap();
        assert_eq!(record.timestamp(), played_at);
        assert_eq!(ledger.match_record(record.id()).await.unwrap().timestamp(), played_at);
    }

    #[tokio::test]
    async fn test_same_player_is_rejected_before_loading() {
        let store = Arc::new(InMemoryStore::new());
        let ledger = create_test_ledger(store.clone());
        let ghost = generate_player_id();

        // The id does not exist, so any load would report UnknownPlayer
        let err = ledger.commit(ghost, ghost, Outcome::AWin).await.unwrap_err();
        assert!(matches!(err, LedgerError::SamePlayer { player_id } if player_id == ghost));
        assert_eq!(store.match_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_metrics_record_outcomes() {
        let metrics = Arc::new(LedgerMetrics::new().unwrap());
        let ledger = create_test_ledger(Arc::new(InMemoryStore::new())).with_metrics(metrics.clone());
        let a = ledger.register_player().await.unwrap();
        let b = ledger.register_player().await.unwrap();

        let record = ledger.commit(a.id, b.id, Outcome::AWin).await.unwrap();
        ledger.reverse(record.id()).await.unwrap();
        let _ = ledger.reverse(record.id()).await;

        assert_eq!(metrics.operation_count("register", "ok"), 2);
        assert_eq!(metrics.operation_count("commit", "ok"), 1);
        assert_eq!(metrics.operation_count("reverse", "ok"), 1);
        assert_eq!(metrics.operation_count("reverse", "unknown_match"), 1);
        assert_eq!(metrics.rating_delta.get_sample_count(), 2);
    }

    #[tokio::test]
    async fn test_reads_roll_back_instead_of_committing() {
        let store = Arc::new(InMemoryStore::new());
        let ledger = create_test_ledger(store.clone());
        let a = ledger.register_player().await.unwrap();
        let b = ledger.register_player().await.unwrap();
        let record = ledger.commit(a.id, b.id, Outcome::AWin).await.unwrap();

        store.fail_next_commits(1);
        ledger.player(a.id).await.unwrap();
        ledger.players().await.unwrap();
        ledger.match_record(record.id()).await.unwrap();
        ledger.matches().await.unwrap();
        ledger.history(a.id).await.unwrap();
        ledger.performance(a.id).await.unwrap();

        // The injected failure is still pending for the next write
        let err = ledger.reverse(record.id()).await.unwrap_err();
        assert!(matches!(err, LedgerError::PersistenceFailure { .. }));
        ledger.reverse(record.id()).await.unwrap();
    }
}
