//! Gropius: task execution orchestrator for AI-driven code migration.
//!
//! A migration job is decomposed into stages of tasks. Each task names an
//! agent and a capability, which resolve to an ordered sequence of prompt
//! files. Executing a task snapshots the job's source into an isolated
//! workspace, renders each prompt against the task context and drives an
//! external command-line tool over it, recording transcripts, logs and a
//! manifest per execution.
//!
//! # Architecture
//!
//! Gropius follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for external interactions
//! - **Adapters**: Concrete implementations of ports (files, processes, memory)
//!
//! # Modules
//!
//! - [`job`]: Job, stage and task hierarchy with derived status
//! - [`prompt`]: Prompt registry, sequence resolution and templating
//! - [`workspace`]: Per-task folders, input snapshots and artifacts
//! - [`logs`]: Bounded per-task execution logs
//! - [`execution`]: External tool supervision and stream decoding
//! - [`orchestration`]: The task execution service tying the above together
//! - [`config`]: Settings loaded from files and the environment

pub mod config;
pub mod execution;
mod fs_utils;
pub mod job;
pub(crate) mod keyed_lock;
pub mod logs;
pub mod orchestration;
pub mod prompt;
pub mod workspace;
