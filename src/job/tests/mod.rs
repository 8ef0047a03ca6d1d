//! Unit tests for the job hierarchy store.
