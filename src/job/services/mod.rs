//! Application services for the job hierarchy.

mod store;

pub use store::{JobStoreError, JobStoreResult, JobStoreService};
