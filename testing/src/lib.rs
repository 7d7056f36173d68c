//! Shared test fixtures.
//!
//! Provides a single, shared Postgres testcontainer instance across all test
//! files, lazily initialized once per test process.

mod fixtures;

pub use fixtures::*;
