use std::sync::Arc;

use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde_json::json;
use uuid::Uuid;
use workflow::identity::Identity;
use workflow::model::Step;

use crate::dto::UpdateStepRequest;
use crate::error::ApiError;
use crate::AppState;

pub async fn update_step(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path((session_id, step)): Path<(Uuid, Step)>,
    Json(body): Json<UpdateStepRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let session = state
        .engine
        .update_step(
            &identity,
            session_id.into(),
            step,
            body.data,
            body.complete,
            body.request_approval,
            body.comments,
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "step updated",
        "session": session,
    })))
}
