//! Per-task execution locks.

use crate::job::domain::TaskKey;
use crate::keyed_lock::{KeyGuard, KeyedLocks};
use std::sync::Arc;

/// Process-wide registry of execution locks, one per task key.
#[derive(Debug, Clone, Default)]
pub struct ExecutionLockRegistry {
    locks: Arc<KeyedLocks<TaskKey>>,
}

impl ExecutionLockRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the lock for `key` without waiting.
    ///
    /// Returns `None` when an execution of the task already holds it.
    #[must_use]
    pub fn try_acquire(&self, key: &TaskKey) -> Option<ExecutionLease> {
        self.locks.try_acquire(key).map(|guard| ExecutionLease {
            key: key.clone(),
            _guard: guard,
        })
    }

    /// Returns `true` while an execution of `key` holds its lock.
    #[must_use]
    pub fn is_locked(&self, key: &TaskKey) -> bool {
        self.locks.is_locked(key)
    }

    /// Acquires the locks of every key, or none of them.
    ///
    /// Returns `None` when any key is already held; locks taken before the
    /// conflict are released again.
    #[must_use]
    pub fn try_acquire_all<'a, I>(&self, keys: I) -> Option<Vec<ExecutionLease>>
    where
        I: IntoIterator<Item = &'a TaskKey>,
    {
        keys.into_iter().map(|key| self.try_acquire(key)).collect()
    }
}

/// Exclusive right to execute one task. Dropping it releases the lock.
#[derive(Debug)]
pub struct ExecutionLease {
    key: TaskKey,
    _guard: KeyGuard,
}

impl ExecutionLease {
    /// Returns the locked task.
    #[must_use]
    pub const fn key(&self) -> &TaskKey {
        &self.key
    }
}
