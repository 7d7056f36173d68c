//! # Config
//!
//! Configuration for the screening workflow service: Postgres connection,
//! API bind address, engine tuning, and observability settings, loadable
//! from the environment.

pub mod config;
pub mod loader;

pub use config::{Config, EngineTuning, ObservabilityConfig, PostgresConfig, ServerConfig};
pub use loader::load_from_env;
