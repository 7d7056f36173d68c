//! # Environment Variable Loader
//!
//! Loads configuration from environment variables following 12-factor app
//! principles.
//!
//! ## Naming Convention
//! - `PG_*`: PostgreSQL settings
//! - `SRV_*`: API server settings
//! - `ENGINE_*`: Workflow engine tuning
//! - `OB_*`: Observability settings

use crate::config::{Config, EngineTuning, ObservabilityConfig, PostgresConfig, ServerConfig};
use std::env;

/// Load configuration from environment variables, falling back to the
/// documented defaults for anything unset.
///
/// ## Environment Variables
/// ### PostgreSQL Settings (`PG_*`)
/// - `PG_HOST`: Database host (default: "localhost")
/// - `PG_PORT`: Database port (default: 5432)
/// - `PG_DATABASE`: Database name (default: "screening")
/// - `PG_USERNAME`: Database user (default: "postgres")
/// - `PG_PASSWORD`: Database password (default: "")
/// - `PG_POOL_SIZE`: Connection pool size (default: 10)
/// - `PG_TIMEOUT_SECONDS`: Connection timeout in seconds (default: 30)
///
/// ### Server Settings (`SRV_*`)
/// - `SRV_HOST`: Bind host (default: "0.0.0.0")
/// - `SRV_PORT`: Bind port (default: 8080)
///
/// ### Engine Settings (`ENGINE_*`)
/// - `ENGINE_SESSION_LOCK_DEADLINE_MS`: Per-session write lock deadline
///   (default: 10000)
/// - `ENGINE_APPROVAL_EXPIRY_HOURS`: Default approval expiry (default: 24)
/// - `ENGINE_LOCK_DURATION_HOURS`: Default session lock duration (default:
///   24)
/// - `ENGINE_ACTIVE_USER_STALENESS_MINUTES`: Active-user pruning window
///   (default: 30)
///
/// ### Observability Settings (`OB_*`)
/// - `OB_METRICS_ENABLED`: Enable metrics (true/false, default: true)
/// - `OB_LOGGING_LEVEL`: Logging level (trace/debug/info/warn/error,
///   default: "info")
/// - `OB_METRICS_PORT`: Metrics server port (default: 9090)
pub fn load_from_env() -> Result<Config, Box<dyn std::error::Error>> {
    Ok(Config {
        postgres: load_postgres_from_env()?,
        server: load_server_from_env()?,
        engine: load_engine_from_env()?,
        observability: load_observability_from_env()?,
    })
}

fn load_postgres_from_env() -> Result<PostgresConfig, Box<dyn std::error::Error>> {
    Ok(PostgresConfig {
        host: env::var("PG_HOST").unwrap_or_else(|_| "localhost".to_string()),
        port: parse_env("PG_PORT").unwrap_or(5432),
        database: env::var("PG_DATABASE").unwrap_or_else(|_| "screening".to_string()),
        username: env::var("PG_USERNAME").unwrap_or_else(|_| "postgres".to_string()),
        password: env::var("PG_PASSWORD").unwrap_or_default(),
        pool_size: parse_env("PG_POOL_SIZE").unwrap_or(10),
        timeout_seconds: parse_env("PG_TIMEOUT_SECONDS").unwrap_or(30),
    })
}

fn load_server_from_env() -> Result<ServerConfig, Box<dyn std::error::Error>> {
    Ok(ServerConfig {
        host: env::var("SRV_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
        port: parse_env("SRV_PORT").unwrap_or(8080),
    })
}

fn load_engine_from_env() -> Result<EngineTuning, Box<dyn std::error::Error>> {
    Ok(EngineTuning {
        session_lock_deadline_ms: parse_env("ENGINE_SESSION_LOCK_DEADLINE_MS").unwrap_or(10_000),
        default_approval_expiry_hours: parse_env("ENGINE_APPROVAL_EXPIRY_HOURS").unwrap_or(24),
        default_lock_duration_hours: parse_env("ENGINE_LOCK_DURATION_HOURS").unwrap_or(24),
        active_user_staleness_minutes: parse_env("ENGINE_ACTIVE_USER_STALENESS_MINUTES")
            .unwrap_or(30),
    })
}

fn load_observability_from_env() -> Result<ObservabilityConfig, Box<dyn std::error::Error>> {
    Ok(ObservabilityConfig {
        metrics_enabled: parse_env("OB_METRICS_ENABLED").unwrap_or(true),
        logging_level: env::var("OB_LOGGING_LEVEL").unwrap_or_else(|_| "info".to_string()),
        metrics_port: parse_env("OB_METRICS_PORT").unwrap_or(9090),
    })
}

fn parse_env<T>(key: &str) -> Result<T, Box<dyn std::error::Error>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(s) => s
            .parse::<T>()
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error>),
        Err(e) => Err(Box::new(e) as Box<dyn std::error::Error>),
    }
}
