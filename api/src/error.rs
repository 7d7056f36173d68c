use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use errors::EngineError;
use serde_json::json;

/// Wraps `EngineError` so the handlers' `Result<_, ApiError>` can be turned
/// into a response via `?` without an orphan-rule `impl IntoResponse for
/// EngineError` in the `errors` crate.
pub struct ApiError(pub EngineError);

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            EngineError::Unauthenticated => StatusCode::UNAUTHORIZED,
            EngineError::Forbidden { .. } => StatusCode::FORBIDDEN,
            EngineError::NotFound { .. } => StatusCode::NOT_FOUND,
            EngineError::Conflict { .. } => StatusCode::CONFLICT,
            EngineError::Locked { .. } => StatusCode::LOCKED,
            EngineError::StepNotReachable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::Expired { .. } => StatusCode::GONE,
            EngineError::Busy { .. } => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::ValidationError { .. } => StatusCode::BAD_REQUEST,
            EngineError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "detail": self.0.kind(), "message": self.0.to_string() }));
        (status, body).into_response()
    }
}
