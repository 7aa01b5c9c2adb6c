//! Locks - Advisory name-based locks held for a single mutation
//!
//! Sibling resources writing to the same parent take the lock on the parent's
//! ID so their mutations serialize. Keys compare case-insensitively.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// Registry of named locks
#[derive(Debug, Default)]
pub struct LockRegistry {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Held lock; released on drop
#[derive(Debug)]
pub struct LockGuard {
    key: String,
    _guard: OwnedMutexGuard<()>,
}

impl LockGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        debug!("unlocking {:?}", self.key);
    }
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock on a resource ID
    pub async fn by_id(&self, id: &str) -> LockGuard {
        self.acquire(id.to_lowercase()).await
    }

    async fn acquire(&self, key: String) -> LockGuard {
        let mutex = self.locks.entry(key.clone()).or_default().clone();
        debug!("locking {:?}", key);
        let guard = mutex.lock_owned().await;
        LockGuard { key, _guard: guard }
    }
}
