//! Bearer-token identity resolution middleware.
//!
//! Pulls the `Authorization: Bearer <token>` header, resolves it through
//! the configured `IdentityProvider`, and stashes the resulting `Identity`
//! as a request extension for handlers to pick up. Missing or unresolvable
//! tokens fail the request before it reaches a handler — `update_step` and
//! friends never see an unauthenticated caller.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header::AUTHORIZATION, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use workflow::identity::{Identity, IdentityProvider};

#[derive(Clone)]
pub struct IdentityState {
    pub provider: Arc<dyn IdentityProvider>,
}

pub async fn identity_middleware(
    State(state): State<Arc<IdentityState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let identity: Identity = state
        .provider
        .resolve(token)
        .await
        .ok_or(StatusCode::UNAUTHORIZED)?;

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}
