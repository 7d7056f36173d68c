use std::sync::Arc;

use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde_json::json;
use uuid::Uuid;
use workflow::identity::Identity;

use crate::dto::CreateSessionRequest;
use crate::error::ApiError;
use crate::AppState;

pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Json(body): Json<CreateSessionRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let display_name = match body.patient_display_name {
        Some(name) => name,
        None => match state.patient_lookup.lookup(&body.patient_id).await {
            Some(record) => record.display_name,
            None => format!("Patient-{}", body.patient_id),
        },
    };

    let session = state
        .engine
        .create_session(
            &identity,
            body.patient_id,
            display_name,
            body.initial_step,
            body.metadata,
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "session created",
        "session": session,
    })))
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let session = state.engine.get_session(&identity, session_id.into()).await?;

    Ok(Json(json!({
        "success": true,
        "message": "ok",
        "session": session,
    })))
}
