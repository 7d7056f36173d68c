//! Error types for the screening workflow engine.
//!
//! Follows the project's pragmatic Rust guidelines:
//! - Uses `thiserror` for structured error definitions
//! - Named fields only, never positional (`{field}`, not `{0}`)
//! - Carries enough context to build the `{ detail }` envelope at the API
//!   boundary without inspecting store internals

use thiserror::Error;

/// Errors surfaced by the Workflow Engine.
///
/// Every variant corresponds to one of the error kinds in the engine's
/// design: the kind name returned to callers is the variant name in
/// `SCREAMING_SNAKE_CASE` (see `EngineError::kind`).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("no valid identity on the request")]
    Unauthenticated,

    #[error("user {user_id} lacks permission for {action} on step {step}: {reason}")]
    Forbidden {
        user_id: String,
        step: String,
        action: String,
        reason: String,
    },

    #[error("{resource} not found: {id}")]
    NotFound { resource: String, id: String },

    #[error("conflict: {reason}")]
    Conflict { reason: String },

    #[error("session or step is locked: {reason}")]
    Locked { reason: String },

    #[error("step {step} is not reachable from current step {current_step}")]
    StepNotReachable { step: String, current_step: String },

    #[error("{resource} {id} has expired")]
    Expired { resource: String, id: String },

    #[error("per-session lock could not be acquired within {deadline_ms}ms")]
    Busy { deadline_ms: u64 },

    #[error("validation error: {message}")]
    ValidationError { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl EngineError {
    /// Stable, machine-readable error kind, as referenced in the API design
    /// (`{ detail: <error kind> }`).
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Unauthenticated => "UNAUTHENTICATED",
            EngineError::Forbidden { .. } => "FORBIDDEN",
            EngineError::NotFound { .. } => "NOT_FOUND",
            EngineError::Conflict { .. } => "CONFLICT",
            EngineError::Locked { .. } => "LOCKED",
            EngineError::StepNotReachable { .. } => "STEP_NOT_REACHABLE",
            EngineError::Expired { .. } => "EXPIRED",
            EngineError::Busy { .. } => "BUSY",
            EngineError::ValidationError { .. } => "VALIDATION_ERROR",
            EngineError::Internal { .. } => "INTERNAL",
        }
    }

    pub fn not_found(resource: impl Into<String>, id: impl Into<String>) -> Self {
        EngineError::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        EngineError::Conflict {
            reason: reason.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        EngineError::ValidationError {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        EngineError::Internal {
            message: message.into(),
        }
    }
}
