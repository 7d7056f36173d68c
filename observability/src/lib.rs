//! # Observability
//!
//! Logging and metrics initialization for the screening workflow service:
//! a `tracing` subscriber wired to `RUST_LOG`, and a Prometheus metrics
//! exporter serving the counters/histograms the engine and API layer emit.

use std::net::SocketAddr;

use thiserror::Error;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Debug, Error)]
pub enum ObservabilityError {
    #[error("failed to install metrics exporter: {reason}")]
    MetricsInstall { reason: String },

    #[error("failed to install tracing subscriber: {reason}")]
    TracingInstall { reason: String },
}

/// Install a `tracing` subscriber that logs to stdout, honoring `RUST_LOG`
/// and falling back to `default_level` when it's unset.
pub fn init_tracing(default_level: &str) -> Result<(), ObservabilityError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.to_string()));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .try_init()
        .map_err(|err| ObservabilityError::TracingInstall {
            reason: err.to_string(),
        })
}

/// Start the Prometheus metrics exporter on `addr`, serving everything
/// recorded through the `metrics` crate's macros.
pub fn init_metrics(addr: SocketAddr) -> Result<(), ObservabilityError> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|err| ObservabilityError::MetricsInstall {
            reason: err.to_string(),
        })
}
