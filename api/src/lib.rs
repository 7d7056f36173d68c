//! # API
//!
//! HTTP front end for the screening workflow engine. Thin: handlers parse
//! a request, call one `WorkflowEngine` method, and re-serialize whatever
//! came back. All policy decisions (permissions, locking, approval
//! lifecycle) live in `workflow::engine`.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod identity;

use std::sync::Arc;

use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use workflow::engine::WorkflowEngine;
use workflow::identity::PatientLookup;

use crate::identity::{identity_middleware, IdentityState};

pub struct AppState {
    pub engine: Arc<WorkflowEngine>,
    pub patient_lookup: Arc<dyn PatientLookup>,
}

pub fn build_router(state: Arc<AppState>, identity_state: Arc<IdentityState>) -> Router {
    let resource_routes = Router::new()
        .route("/sessions", post(handlers::sessions::create_session))
        .route("/sessions/{id}", get(handlers::sessions::get_session))
        .route("/sessions/{id}/steps/{step}", put(handlers::steps::update_step))
        .route(
            "/sessions/{id}/activity-logs",
            get(handlers::activity::list_activity),
        )
        .route(
            "/sessions/{id}/approval-requests",
            post(handlers::approvals::request_approval),
        )
        .route(
            "/approval-requests/{req_id}",
            put(handlers::approvals::resolve_approval),
        )
        .route(
            "/sessions/{id}/lock",
            post(handlers::locks::lock_session).delete(handlers::locks::unlock_session),
        )
        .with_state(state)
        .layer(axum::middleware::from_fn_with_state(
            identity_state,
            identity_middleware,
        ));

    Router::new()
        .route("/health", get(health_handler))
        .merge(resource_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn health_handler() -> &'static str {
    "OK"
}
