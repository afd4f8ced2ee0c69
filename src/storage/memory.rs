//! In-memory storage backend
//!
//! Writes made through a unit of work are staged privately and applied to
//! the shared tables under a single write lock at commit. Commit validates
//! the staging first, so a conflicting unit of work is rejected as a whole.

use crate::error::Result;
use crate::ledger::{MatchDraft, MatchRecord, PlayerAggregate};
use crate::storage::{MatchStore, PlayerStore, UnitOfWork, UnitOfWorkProvider};
use crate::types::{MatchId, PlayerId};
use anyhow::{anyhow, bail};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct Tables {
    players: HashMap<PlayerId, PlayerAggregate>,
    matches: BTreeMap<MatchId, MatchRecord>,
}

#[derive(Debug, Clone)]
enum StagedPlayer {
    Created(PlayerAggregate),
    Updated(PlayerAggregate),
    Deleted,
}

/// Writes pending in one unit of work; `None` marks a deleted match
#[derive(Debug, Default)]
struct Staging {
    players: HashMap<PlayerId, StagedPlayer>,
    matches: BTreeMap<MatchId, Option<MatchRecord>>,
}

/// In-memory players and matches with unit-of-work semantics
#[derive(Debug)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    next_match_id: AtomicU64,
    failing_commits: AtomicUsize,
}

impl InMemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            next_match_id: AtomicU64::new(1),
            failing_commits: AtomicUsize::new(0),
        }
    }

    /// Make the next `count` commits fail without applying anything
    pub fn fail_next_commits(&self, count: usize) {
        self.failing_commits.store(count, Ordering::SeqCst);
    }

    /// Number of committed players
    pub fn player_count(&self) -> Result<usize> {
        Ok(self.read_tables()?.players.len())
    }

    /// Number of committed matches
    pub fn match_count(&self) -> Result<usize> {
        Ok(self.read_tables()?.matches.len())
    }

    fn read_tables(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| anyhow!("Failed to acquire tables read lock"))
    }

    fn write_tables(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| anyhow!("Failed to acquire tables write lock"))
    }

    fn take_injected_failure(&self) -> bool {
        self.failing_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn apply(&self, staging: Staging) -> Result<()> {
        if self.take_injected_failure() {
            warn!("Rejecting commit because of an injected failure");
            bail!("injected commit failure");
        }

        let mut tables = self.write_tables()?;

        // Validate everything before touching the tables
        for (id, staged) in &staging.players {
            match staged {
                StagedPlayer::Created(_) if tables.players.contains_key(id) => {
                    bail!("player {} already exists", id);
                }
                StagedPlayer::Updated(_) if !tables.players.contains_key(id) => {
                    bail!("player {} was removed before commit", id);
                }
                _ => {}
            }
        }
        for (id, staged) in &staging.matches {
            if staged.is_none() && !tables.matches.contains_key(id) {
                bail!("match {} was removed before commit", id);
            }
        }

        let player_writes = staging.players.len();
        let match_writes = staging.matches.len();

        for (id, staged) in staging.players {
            match staged {
                StagedPlayer::Created(player) | StagedPlayer::Updated(player) => {
                    tables.players.insert(id, player);
                }
                StagedPlayer::Deleted => {
                    tables.players.remove(&id);
                }
            }
        }
        for (id, staged) in staging.matches {
            match staged {
                Some(record) => {
                    tables.matches.insert(id, record);
                }
                None => {
                    tables.matches.remove(&id);
                }
            }
        }

        debug!(
            "Committed unit of work: {} player writes, {} match writes",
            player_writes, match_writes
        );
        Ok(())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UnitOfWorkProvider for InMemoryStore {
    async fn begin<'p>(&'p self) -> Result<Box<dyn UnitOfWork<'p> + 'p>> {
        Ok(Box::new(InMemoryUnitOfWork {
            store: self,
            staging: Arc::new(Mutex::new(Staging::default())),
        }))
    }
}

/// Unit of work over an [`InMemoryStore`]
pub struct InMemoryUnitOfWork<'a> {
    store: &'a InMemoryStore,
    staging: Arc<Mutex<Staging>>,
}

#[async_trait]
impl<'a> UnitOfWork<'a> for InMemoryUnitOfWork<'a> {
    fn players(&self) -> Arc<dyn PlayerStore + 'a> {
        Arc::new(StagedPlayers {
            store: self.store,
            staging: self.staging.clone(),
        })
    }

    fn matches(&self) -> Arc<dyn MatchStore + 'a> {
        Arc::new(StagedMatches {
            store: self.store,
            staging: self.staging.clone(),
        })
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let staging = std::mem::take(&mut *lock_staging(&self.staging)?);
        self.store.apply(staging)
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let staging = lock_staging(&self.staging)?;
        debug!(
            "Rolled back unit of work: discarded {} player writes, {} match writes",
            staging.players.len(),
            staging.matches.len()
        );
        Ok(())
    }
}

fn lock_staging(staging: &Mutex<Staging>) -> Result<MutexGuard<'_, Staging>> {
    staging
        .lock()
        .map_err(|_| anyhow!("Failed to acquire staging lock"))
}

struct StagedPlayers<'a> {
    store: &'a InMemoryStore,
    staging: Arc<Mutex<Staging>>,
}

impl StagedPlayers<'_> {
    fn current(&self, staging: &Staging, id: PlayerId) -> Result<Option<PlayerAggregate>> {
        match staging.players.get(&id) {
            Some(StagedPlayer::Created(player)) | Some(StagedPlayer::Updated(player)) => {
                Ok(Some(player.clone()))
            }
            Some(StagedPlayer::Deleted) => Ok(None),
            None => Ok(self.store.read_tables()?.players.get(&id).cloned()),
        }
    }
}

#[async_trait]
impl PlayerStore for StagedPlayers<'_> {
    async fn load(&self, id: PlayerId) -> Result<Option<PlayerAggregate>> {
        let staging = lock_staging(&self.staging)?;
        self.current(&staging, id)
    }

    async fn save(&self, player: &PlayerAggregate) -> Result<()> {
        let mut staging = lock_staging(&self.staging)?;
        if self.current(&staging, player.id)?.is_none() {
            bail!("player {} does not exist", player.id);
        }

        let staged = match staging.players.get(&player.id) {
            Some(StagedPlayer::Created(_)) => StagedPlayer::Created(player.clone()),
            _ => StagedPlayer::Updated(player.clone()),
        };
        staging.players.insert(player.id, staged);
        Ok(())
    }

    async fn create(&self, player: &PlayerAggregate) -> Result<()> {
        let mut staging = lock_staging(&self.staging)?;
        if self.current(&staging, player.id)?.is_some() {
            bail!("player {} already exists", player.id);
        }

        staging
            .players
            .insert(player.id, StagedPlayer::Created(player.clone()));
        Ok(())
    }

    async fn delete(&self, id: PlayerId) -> Result<bool> {
        let mut staging = lock_staging(&self.staging)?;
        if self.current(&staging, id)?.is_none() {
            return Ok(false);
        }

        if matches!(staging.players.get(&id), Some(StagedPlayer::Created(_))) {
            staging.players.remove(&id);
        } else {
            staging.players.insert(id, StagedPlayer::Deleted);
        }
        Ok(true)
    }

    async fn list(&self) -> Result<Vec<PlayerAggregate>> {
        let staging = lock_staging(&self.staging)?;
        let mut players = self.store.read_tables()?.players.clone();

        for (id, staged) in &staging.players {
            match staged {
                StagedPlayer::Created(player) | StagedPlayer::Updated(player) => {
                    players.insert(*id, player.clone());
                }
                StagedPlayer::Deleted => {
                    players.remove(id);
                }
            }
        }

        Ok(players.into_values().collect())
    }
}

struct StagedMatches<'a> {
    store: &'a InMemoryStore,
    staging: Arc<Mutex<Staging>>,
}

impl StagedMatches<'_> {
    fn current(&self, staging: &Staging, id: MatchId) -> Result<Option<MatchRecord>> {
        match staging.matches.get(&id) {
            Some(staged) => Ok(staged.clone()),
            None => Ok(self.store.read_tables()?.matches.get(&id).cloned()),
        }
    }

    /// Committed matches overlaid with this unit's staging, ordered by id
    fn records_where(&self, keep: impl Fn(&MatchRecord) -> bool) -> Result<Vec<MatchRecord>> {
        let staging = lock_staging(&self.staging)?;
        let mut records: BTreeMap<MatchId, MatchRecord> = self
            .store
            .read_tables()?
            .matches
            .iter()
            .filter(|(_, record)| keep(record))
            .map(|(id, record)| (*id, record.clone()))
            .collect();

        for (id, staged) in &staging.matches {
            match staged {
                Some(record) if keep(record) => {
                    records.insert(*id, record.clone());
                }
                _ => {
                    records.remove(id);
                }
            }
        }

        Ok(records.into_values().collect())
    }
}

#[async_trait]
impl MatchStore for StagedMatches<'_> {
    async fn save(&self, draft: &MatchDraft) -> Result<MatchId> {
        let mut staging = lock_staging(&self.staging)?;
        // Ids handed out by aborted units of work are never reused
        let id = self.store.next_match_id.fetch_add(1, Ordering::SeqCst);
        staging
            .matches
            .insert(id, Some(draft.clone().into_record(id)));
        Ok(id)
    }

    async fn load(&self, id: MatchId) -> Result<Option<MatchRecord>> {
        let staging = lock_staging(&self.staging)?;
        self.current(&staging, id)
    }

    async fn delete(&self, id: MatchId) -> Result<bool> {
        let mut staging = lock_staging(&self.staging)?;
        if self.current(&staging, id)?.is_none() {
            return Ok(false);
        }

        if self.store.read_tables()?.matches.contains_key(&id) {
            staging.matches.insert(id, None);
        } else {
            staging.matches.remove(&id);
        }
        Ok(true)
    }

    async fn list_for_player(&self, player_id: PlayerId) -> Result<Vec<MatchRecord>> {
        self.records_where(|record| record.involves(player_id))
    }

    async fn list(&self) -> Result<Vec<MatchRecord>> {
        self.records_where(|_| true)
    }
}
