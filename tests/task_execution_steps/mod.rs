//! Step definitions for task execution scenarios.

mod given;
mod then;
mod when;
pub mod world;
