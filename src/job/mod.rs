//! Job hierarchy store: jobs, ordered stages and indexed tasks.
//!
//! A job pairs a source reference with target frameworks and decomposes into
//! stages of tasks, each assigned to one agent/capability pair. Stage status,
//! job status, progress and the current-stage pointer are derived from task
//! status on every write. The module follows the hexagonal layout:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
