//! JSON-file job repository.

mod job;

pub use job::JsonFileJobRepository;
