//! Adapter implementations for job persistence.

pub mod json_file;
pub mod memory;
