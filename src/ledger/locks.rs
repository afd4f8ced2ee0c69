//! Per-player lock table
//!
//! Each ledger operation holds the locks of every player it touches for its
//! whole load/compute/persist cycle. Locks are taken in sorted id order so
//! two operations over the same pair cannot deadlock.

use crate::types::PlayerId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

type LockTable = Mutex<HashMap<PlayerId, Arc<AsyncMutex<()>>>>;

/// Lock table keyed by player id
#[derive(Debug, Default)]
pub struct PlayerLocks {
    table: Arc<LockTable>,
}

/// Held locks for a set of players; released on drop
#[derive(Debug)]
pub struct PlayerLockGuard {
    guards: Vec<OwnedMutexGuard<()>>,
    ids: Vec<PlayerId>,
    table: Arc<LockTable>,
}

impl PlayerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to every player in `ids`
    pub async fn acquire(&self, ids: &[PlayerId]) -> PlayerLockGuard {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let mutexes: Vec<Arc<AsyncMutex<()>>> = {
            let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
            ids.iter()
                .map(|id| table.entry(*id).or_default().clone())
                .collect()
        };

        let mut guards = Vec::with_capacity(mutexes.len());
        for mutex in mutexes {
            guards.push(mutex.lock_owned().await);
        }
        debug!("Acquired player locks for {:?}", ids);

        PlayerLockGuard {
            guards,
            ids,
            table: self.table.clone(),
        }
    }

    /// Number of players with a live lock entry
    pub fn tracked(&self) -> usize {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Drop for PlayerLockGuard {
    fn drop(&mut self) {
        self.guards.clear();

        // Entries nobody else holds or waits on can go
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        for id in &self.ids {
            if table
                .get(id)
                .is_some_and(|mutex| Arc::strong_count(mutex) == 1)
            {
                table.remove(id);
            }
        }
    }
}
