//! Configuration structures for the screening workflow service.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Top-level configuration aggregating the service's Postgres connection,
/// API bind address, engine tuning, and observability settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub postgres: PostgresConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub engine: EngineTuning,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// PostgreSQL connection settings.
///
/// - `host`/`port`/`database`/`username`/`password`: standard connection
///   parameters (default: localhost:5432/screening/postgres/"")
/// - `pool_size`: maximum connections in the pool (default: 10, range:
///   1-100)
/// - `timeout_seconds`: connection timeout (default: 30, range: 1-300)
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct PostgresConfig {
    #[serde(default = "default_postgres_host")]
    #[validate(length(min = 1, max = 255))]
    pub host: String,

    #[serde(default = "default_postgres_port")]
    #[validate(range(min = 1, max = 65535))]
    pub port: u16,

    #[serde(default = "default_postgres_database")]
    #[validate(length(min = 1, max = 63))]
    pub database: String,

    #[serde(default = "default_postgres_username")]
    #[validate(length(min = 1, max = 63))]
    pub username: String,

    #[serde(default)]
    pub password: String,

    #[serde(default = "default_postgres_pool_size")]
    #[validate(range(min = 1, max = 100))]
    pub pool_size: u32,

    #[serde(default = "default_postgres_timeout")]
    #[validate(range(min = 1, max = 300))]
    pub timeout_seconds: u64,
}

fn default_postgres_host() -> String {
    "localhost".to_string()
}
fn default_postgres_port() -> u16 {
    5432
}
fn default_postgres_database() -> String {
    "screening".to_string()
}
fn default_postgres_username() -> String {
    "postgres".to_string()
}
fn default_postgres_pool_size() -> u32 {
    10
}
fn default_postgres_timeout() -> u64 {
    30
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: default_postgres_host(),
            port: default_postgres_port(),
            database: default_postgres_database(),
            username: default_postgres_username(),
            password: String::new(),
            pool_size: default_postgres_pool_size(),
            timeout_seconds: default_postgres_timeout(),
        }
    }
}

impl PostgresConfig {
    pub fn connection_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database
        )
    }
}

/// The API server's bind address.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    #[validate(length(min = 1, max = 255))]
    pub host: String,

    #[serde(default = "default_server_port")]
    #[validate(range(min = 1, max = 65535))]
    pub port: u16,
}

fn default_server_host() -> String {
    "0.0.0.0".to_string()
}
fn default_server_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Tuning knobs for `WorkflowEngine`, mirrored here so they can be loaded
/// from the environment and converted into `workflow::engine::EngineConfig`
/// at startup.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct EngineTuning {
    /// How long a write waits for another writer's per-session lock before
    /// failing with `BUSY` (default: 10000, range: 100-60000).
    #[serde(default = "default_session_lock_deadline_ms")]
    #[validate(range(min = 100, max = 60_000))]
    pub session_lock_deadline_ms: u64,

    /// How long an opened approval request stays resolvable before it
    /// lazily expires (default: 24, range: 1-168).
    #[serde(default = "default_approval_expiry_hours")]
    #[validate(range(min = 1, max = 168))]
    pub default_approval_expiry_hours: i64,

    /// Default duration of a lock when the caller doesn't specify one
    /// (default: 24, range: 1-168).
    #[serde(default = "default_lock_duration_hours")]
    #[validate(range(min = 1, max = 168))]
    pub default_lock_duration_hours: i64,

    /// How long a user stays listed in a session's active-users set without
    /// activity before being pruned (default: 30, range: 1-1440).
    #[serde(default = "default_active_user_staleness_minutes")]
    #[validate(range(min = 1, max = 1440))]
    pub active_user_staleness_minutes: i64,
}

fn default_session_lock_deadline_ms() -> u64 {
    10_000
}
fn default_approval_expiry_hours() -> i64 {
    24
}
fn default_lock_duration_hours() -> i64 {
    24
}
fn default_active_user_staleness_minutes() -> i64 {
    30
}

impl Default for EngineTuning {
    fn default() -> Self {
        Self {
            session_lock_deadline_ms: default_session_lock_deadline_ms(),
            default_approval_expiry_hours: default_approval_expiry_hours(),
            default_lock_duration_hours: default_lock_duration_hours(),
            active_user_staleness_minutes: default_active_user_staleness_minutes(),
        }
    }
}

impl EngineTuning {
    pub fn to_engine_config(&self) -> workflow::engine::EngineConfig {
        workflow::engine::EngineConfig {
            session_lock_deadline: std::time::Duration::from_millis(self.session_lock_deadline_ms),
            default_approval_expiry: chrono::Duration::hours(self.default_approval_expiry_hours),
            default_lock_duration: chrono::Duration::hours(self.default_lock_duration_hours),
            active_user_staleness: chrono::Duration::minutes(self.active_user_staleness_minutes),
        }
    }
}

/// Logging and metrics settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct ObservabilityConfig {
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,

    #[serde(default = "default_logging_level")]
    #[validate(custom(function = "validate_logging_level"))]
    pub logging_level: String,

    #[serde(default = "default_metrics_port")]
    #[validate(range(min = 1, max = 65535))]
    pub metrics_port: u16,
}

fn default_metrics_enabled() -> bool {
    true
}
fn default_logging_level() -> String {
    "info".to_string()
}
fn default_metrics_port() -> u16 {
    9090
}

fn validate_logging_level(value: &str) -> Result<(), validator::ValidationError> {
    match value {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(validator::ValidationError::new("invalid logging level")),
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: default_metrics_enabled(),
            logging_level: default_logging_level(),
            metrics_port: default_metrics_port(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_default_matches_documented_defaults() {
        let config = Config::default();
        assert_eq!(config.postgres.host, "localhost");
        assert_eq!(config.postgres.port, 5432);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.observability.logging_level, "info");
    }

    #[test]
    fn postgres_config_validation_rejects_empty_host() {
        let mut postgres = PostgresConfig::default();
        postgres.host = String::new();
        assert!(postgres.validate().is_err());
    }

    #[test]
    fn observability_config_validation_rejects_unknown_level() {
        let mut obs = ObservabilityConfig::default();
        obs.logging_level = "verbose".to_string();
        assert!(obs.validate().is_err());

        obs.logging_level = "debug".to_string();
        assert!(obs.validate().is_ok());
    }

    #[test]
    fn engine_tuning_converts_to_workflow_engine_config() {
        let tuning = EngineTuning::default();
        let engine_config = tuning.to_engine_config();
        assert_eq!(engine_config.default_approval_expiry, chrono::Duration::hours(24));
    }

    #[test]
    fn postgres_config_builds_connection_url() {
        let config = PostgresConfig::default();
        assert_eq!(config.connection_url(), "postgres://postgres:@localhost:5432/screening");
    }
}
