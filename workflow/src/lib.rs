//! # Screening Workflow Engine — Core
//!
//! The coordinator for the mobile eye-screening unit's multi-user workflow:
//! the session state machine, role/step permission matrix, approval
//! subsystem, lock subsystem, and append-only activity log.
//!
//! This crate has no knowledge of HTTP, databases, or any particular
//! identity provider — those live in `storage` and `api`. It expresses the
//! domain model and the `WorkflowEngine` coordinator behind small store
//! traits so either an in-memory or a Postgres-backed implementation can
//! satisfy them.

pub mod clock;
pub mod engine;
pub mod identity;
pub mod ids;
pub mod lock_registry;
pub mod model;
pub mod permission;
pub mod step_data;
pub mod store;

pub use engine::WorkflowEngine;
pub use errors::EngineError;
