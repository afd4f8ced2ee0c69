//! Storage interfaces used by the rating ledger
//!
//! Every store call made by one ledger operation goes through a single
//! [`UnitOfWork`], so the player updates and the match insert or delete
//! either all become visible or none do.

pub mod memory;

use crate::error::Result;
use crate::ledger::{MatchDraft, MatchRecord, PlayerAggregate};
use crate::types::{MatchId, PlayerId};
use async_trait::async_trait;
use std::sync::Arc;

pub use memory::InMemoryStore;

/// Player aggregate storage scoped to a unit of work
#[async_trait]
pub trait PlayerStore: Send + Sync {
    /// Get a player's aggregate
    async fn load(&self, id: PlayerId) -> Result<Option<PlayerAggregate>>;

    /// Update an existing player's aggregate
    async fn save(&self, player: &PlayerAggregate) -> Result<()>;

    /// Insert a newly registered player
    async fn create(&self, player: &PlayerAggregate) -> Result<()>;

    /// Remove a player, returning whether it existed
    async fn delete(&self, id: PlayerId) -> Result<bool>;

    /// Get all players
    async fn list(&self) -> Result<Vec<PlayerAggregate>>;
}

/// Match record storage scoped to a unit of work
#[async_trait]
pub trait MatchStore: Send + Sync {
    /// Store a new match and return the id assigned to it
    async fn save(&self, draft: &MatchDraft) -> Result<MatchId>;

    /// Get a match record
    async fn load(&self, id: MatchId) -> Result<Option<MatchRecord>>;

    /// Remove a match record, returning whether it existed
    async fn delete(&self, id: MatchId) -> Result<bool>;

    /// Get every match involving `player_id`, ordered by id
    async fn list_for_player(&self, player_id: PlayerId) -> Result<Vec<MatchRecord>>;

    /// Get every match, ordered by id
    async fn list(&self) -> Result<Vec<MatchRecord>>;
}

/// A Unit of Work (UoW) works as a provider for stores that all operate
/// within a single transaction. Dropping it without calling `commit`
/// discards every staged write.
#[async_trait]
pub trait UnitOfWork<'a>: Send + Sync {
    fn players(&self) -> Arc<dyn PlayerStore + 'a>;
    fn matches(&self) -> Arc<dyn MatchStore + 'a>;

    // Consume self to ensure the UoW is not used after commit/rollback
    async fn commit(self: Box<Self>) -> Result<()>;
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// A factory for creating Unit of Work instances.
#[async_trait]
pub trait UnitOfWorkProvider: Send + Sync {
    /// Begin a new Unit of Work (transaction).
    async fn begin<'p>(&'p self) -> Result<Box<dyn UnitOfWork<'p> + 'p>>;
}
