//! Per-task capped log buffers.

use super::{LogEntry, LogLevel};
use crate::job::domain::{ExecutionId, JobId, TaskKey};
use mockable::Clock;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Default number of entries retained per task.
pub const DEFAULT_LOG_CAPACITY: usize = 1000;

#[derive(Debug)]
struct LogBuffer {
    entries: VecDeque<LogEntry>,
    next_sequence: u64,
}

impl LogBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            next_sequence: 1,
        }
    }
}

type SharedBuffer = Arc<Mutex<LogBuffer>>;

/// Process-wide log store keyed by task.
pub struct ExecutionLogStore {
    capacity: usize,
    clock: Arc<dyn Clock + Send + Sync>,
    buffers: RwLock<HashMap<TaskKey, SharedBuffer>>,
}

impl std::fmt::Debug for ExecutionLogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionLogStore")
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

impl ExecutionLogStore {
    /// Creates an empty store retaining at most `capacity` entries per task.
    ///
    /// A zero capacity is raised to one.
    #[must_use]
    pub fn new(capacity: usize, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self {
            capacity: capacity.max(1),
            clock,
            buffers: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the per-task capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    fn buffer(&self, key: &TaskKey) -> Option<SharedBuffer> {
        let buffers = self.buffers.read().unwrap_or_else(PoisonError::into_inner);
        buffers.get(key).cloned()
    }

    fn buffer_or_create(&self, key: &TaskKey) -> SharedBuffer {
        if let Some(existing) = self.buffer(key) {
            return existing;
        }
        let mut buffers = self.buffers.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            buffers
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(LogBuffer::new(self.capacity)))),
        )
    }

    /// Appends an entry, evicting the oldest one when the buffer is full.
    pub fn append(
        &self,
        key: &TaskKey,
        level: LogLevel,
        execution_id: Option<ExecutionId>,
        message: impl Into<String>,
    ) {
        let shared = self.buffer_or_create(key);
        let mut buffer = shared.lock().unwrap_or_else(PoisonError::into_inner);
        let sequence = buffer.next_sequence;
        buffer.next_sequence = sequence.saturating_add(1);
        if buffer.entries.len() >= self.capacity {
            buffer.entries.pop_front();
        }
        buffer.entries.push_back(LogEntry {
            sequence,
            timestamp: self.clock.utc(),
            level,
            execution_id,
            message: message.into(),
        });
    }

    /// Returns a snapshot of every retained entry for `key`, oldest first.
    #[must_use]
    pub fn logs(&self, key: &TaskKey) -> Vec<LogEntry> {
        self.logs_since(key, 0)
    }

    /// Returns retained entries with a sequence greater than `after`.
    #[must_use]
    pub fn logs_since(&self, key: &TaskKey, after: u64) -> Vec<LogEntry> {
        let Some(shared) = self.buffer(key) else {
            return Vec::new();
        };
        let buffer = shared.lock().unwrap_or_else(PoisonError::into_inner);
        buffer
            .entries
            .iter()
            .filter(|entry| entry.sequence > after)
            .cloned()
            .collect()
    }

    /// Drops every buffer belonging to `job_id`.
    pub fn forget_job(&self, job_id: JobId) {
        let mut buffers = self.buffers.write().unwrap_or_else(PoisonError::into_inner);
        buffers.retain(|key, _| key.job_id != job_id);
    }
}

/// Destination for human-readable execution trace lines.
pub trait LogSink: Send + Sync {
    /// Records one line.
    fn log(&self, level: LogLevel, message: &str);
}

/// A [`LogSink`] bound to one task key and execution.
#[derive(Debug, Clone)]
pub struct TaskLog {
    store: Arc<ExecutionLogStore>,
    key: TaskKey,
    execution_id: Option<ExecutionId>,
}

impl TaskLog {
    /// Binds a sink to `key`, tagging entries with `execution_id`.
    #[must_use]
    pub const fn new(
        store: Arc<ExecutionLogStore>,
        key: TaskKey,
        execution_id: Option<ExecutionId>,
    ) -> Self {
        Self {
            store,
            key,
            execution_id,
        }
    }

    /// Records an info line.
    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    /// Records a warning line.
    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    /// Records an error line.
    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }
}

impl LogSink for TaskLog {
    fn log(&self, level: LogLevel, message: &str) {
        self.store
            .append(&self.key, level, self.execution_id, message);
    }
}
