//! Task execution orchestration.
//!
//! Ties the job store, task folders, prompt resolution, template rendering
//! and the process execution engine together behind one execute call:
//!
//! 1. acquire the task's execution lock or fail fast;
//! 2. move the task to `running`;
//! 3. prepare folders, snapshot the source and resolve the prompt sequence;
//! 4. render and run every prompt in order, stopping at hard failures;
//! 5. persist artifacts and record the execution in one task write.

pub mod adapters;
mod context;
mod error;
mod lock;
pub mod ports;
mod report;
mod service;

pub use context::{CREDENTIAL_KEY, ContextSources, TARGET_NAME_KEY, base_context, prompt_context};
pub use error::{ExecutionError, ExecutionResult};
pub use lock::{ExecutionLease, ExecutionLockRegistry};
pub use report::ExecutionReport;
pub use service::{DEFAULT_PROMPT_TIMEOUT, ExecutionComponents, TaskExecutionService};

#[cfg(test)]
mod tests;
