//! Per-key asynchronous mutual exclusion.
//!
//! Each key owns its own mutex, so holders of unrelated keys never contend.
//! The shared map is touched only briefly to look up or create a slot.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Guard proving exclusive access to one key. Released on drop.
pub type KeyGuard = OwnedMutexGuard<()>;

/// A map of independent async mutexes, created lazily per key.
#[derive(Debug)]
pub struct KeyedLocks<K> {
    slots: Mutex<HashMap<K, Arc<AsyncMutex<()>>>>,
}

impl<K> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<K> KeyedLocks<K>
where
    K: Eq + Hash + Clone,
{
    /// Creates an empty lock map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &K) -> Arc<AsyncMutex<()>> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            slots
                .entry(key.clone())
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        )
    }

    /// Waits until `key` is free and locks it.
    pub async fn acquire(&self, key: &K) -> KeyGuard {
        self.slot(key).lock_owned().await
    }

    /// Locks `key` if it is free, without waiting.
    ///
    /// Returns `None` when another holder owns the key.
    #[must_use]
    pub fn try_acquire(&self, key: &K) -> Option<KeyGuard> {
        self.slot(key).try_lock_owned().ok()
    }

    /// Returns `true` while some guard for `key` is alive.
    #[must_use]
    pub fn is_locked(&self, key: &K) -> bool {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots
            .get(key)
            .is_some_and(|slot| slot.try_lock().is_err())
    }
}
