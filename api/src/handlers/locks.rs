use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde_json::json;
use uuid::Uuid;
use workflow::identity::Identity;

use crate::dto::{LockSessionRequest, UnlockQuery};
use crate::error::ApiError;
use crate::AppState;

pub async fn lock_session(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(session_id): Path<Uuid>,
    Json(body): Json<LockSessionRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let lock = state
        .engine
        .lock_session(
            &identity,
            session_id.into(),
            body.step,
            body.lock_type,
            body.reason,
            body.duration_hours,
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "session locked",
        "lock": lock,
    })))
}

pub async fn unlock_session(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(session_id): Path<Uuid>,
    Query(query): Query<UnlockQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let status = state
        .engine
        .unlock_session(&identity, session_id.into(), query.reason)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "session unlocked",
        "overall_status": status,
    })))
}
