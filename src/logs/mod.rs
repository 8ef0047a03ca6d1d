//! Execution log store and polling surface.
//!
//! Each task key owns a fixed-capacity FIFO buffer created lazily on first
//! append. Appends and reads lock only that key's buffer, so unrelated tasks
//! never contend. Buffers live for the lifetime of the process unless a job
//! is deleted.

mod entry;
mod store;

pub use entry::{LogEntry, LogLevel};
pub use store::{DEFAULT_LOG_CAPACITY, ExecutionLogStore, LogSink, TaskLog};

#[cfg(test)]
mod tests;
