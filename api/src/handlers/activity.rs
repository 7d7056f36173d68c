use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde_json::json;
use uuid::Uuid;
use workflow::identity::Identity;

use crate::dto::ListActivityQuery;
use crate::error::ApiError;
use crate::AppState;

pub async fn list_activity(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(session_id): Path<Uuid>,
    Query(query): Query<ListActivityQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let entries = state
        .engine
        .list_activity(
            &identity,
            session_id.into(),
            query.step,
            query.action,
            query.user_id,
            query.skip,
            query.limit,
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "ok",
        "activity_logs": entries,
    })))
}
