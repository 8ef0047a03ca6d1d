//! In-memory job repository.

mod job;

pub use job::InMemoryJobRepository;
