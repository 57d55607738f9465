//! Per-path lock table
//!
//! Serialises mutations that target the same normalised path. Entries are
//! created on demand and dropped once no task holds or waits on them.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Default)]
pub struct PathLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

/// Held for the duration of one mutation; releases and prunes on drop.
pub struct PathGuard {
    key: String,
    table: Arc<PathLocks>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl PathLocks {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Wait for exclusive access to `relative`.
    pub async fn acquire(self: &Arc<Self>, relative: &str) -> PathGuard {
        let lock = {
            let mut locks = self.locks.lock();
            Arc::clone(locks.entry(relative.to_string()).or_default())
        };
        let guard = lock.lock_owned().await;
        PathGuard {
            key: relative.to_string(),
            table: Arc::clone(self),
            guard: Some(guard),
        }
    }

    /// Number of paths currently tracked.
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for PathGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.table.locks.lock();
        // Only the table itself references an idle lock
        if let Some(lock) = locks.get(&self.key) {
            if Arc::strong_count(lock) == 1 {
                locks.remove(&self.key);
            }
        }
    }
}
