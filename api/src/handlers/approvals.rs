use std::sync::Arc;

use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde_json::json;
use uuid::Uuid;
use workflow::identity::Identity;

use crate::dto::{RequestApprovalRequest, ResolveApprovalRequest};
use crate::error::ApiError;
use crate::AppState;

pub async fn request_approval(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(session_id): Path<Uuid>,
    Json(body): Json<RequestApprovalRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let request = state
        .engine
        .request_approval(
            &identity,
            session_id.into(),
            body.step,
            body.reason,
            body.data_snapshot,
            body.priority,
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "approval request created",
        "approval_request": request,
    })))
}

pub async fn resolve_approval(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(request_id): Path<Uuid>,
    Json(body): Json<ResolveApprovalRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let request = state
        .engine
        .resolve_approval(&identity, request_id.into(), body.approve, body.reason)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": if request.status == workflow::model::ApprovalStatus::Approved {
            "approved"
        } else {
            "rejected"
        },
        "approval_request": request,
    })))
}
