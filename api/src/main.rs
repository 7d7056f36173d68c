use std::sync::Arc;

use api::identity::IdentityState;
use api::AppState;
use config::Config;
use storage::PostgresBackend;
use tracing::info;
use workflow::clock::SystemClock;
use workflow::engine::WorkflowEngine;
use workflow::identity::StaticIdentityProvider;
use workflow::store::{ActivityLogStore, ApprovalStore, GrantStore, LockStore, SessionStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::load_from_env().unwrap_or_else(|err| {
        eprintln!("falling back to default configuration: {err}");
        Config::default()
    });

    observability::init_tracing(&config.observability.logging_level)?;
    info!("starting screening workflow service");

    if config.observability.metrics_enabled {
        let metrics_addr = format!("0.0.0.0:{}", config.observability.metrics_port).parse()?;
        observability::init_metrics(metrics_addr)?;
        info!(%metrics_addr, "metrics exporter listening");
    }

    let backend = PostgresBackend::new(&config.postgres.connection_url()).await?;
    backend.initialize_schema().await?;
    let backend = Arc::new(backend);

    let engine = Arc::new(WorkflowEngine::new(
        backend.clone() as Arc<dyn SessionStore>,
        backend.clone() as Arc<dyn ActivityLogStore>,
        backend.clone() as Arc<dyn ApprovalStore>,
        backend.clone() as Arc<dyn LockStore>,
        backend.clone() as Arc<dyn GrantStore>,
        Arc::new(SystemClock),
        config.engine.to_engine_config(),
    ));

    // The identity provider is a placeholder until a real directory service
    // is wired in; production deployments must replace this before go-live.
    let identity_state = Arc::new(IdentityState {
        provider: Arc::new(StaticIdentityProvider::new()),
    });

    let app_state = Arc::new(AppState {
        engine,
        patient_lookup: Arc::new(workflow::identity::StaticPatientLookup::new()),
    });

    let router = api::build_router(app_state, identity_state);

    let addr = config.server.bind_addr();
    info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
