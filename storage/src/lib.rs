//! # Storage Layer
//!
//! Postgres-backed persistence for the `workflow` engine's five store
//! traits, for production and integration-test use. `workflow::store`
//! carries the in-memory implementations used by unit tests and
//! single-process/offline deployments.

pub mod error;
pub mod postgres;

pub use error::PostgresError;
pub use postgres::PostgresBackend;
