use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use edgeguard_auth::AuthError;
use std::sync::Arc;

use crate::handlers::error_response;
use crate::state::AppState;

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AuthError::InvalidToken("missing Authorization header".to_string()))?
        .to_str()
        .map_err(|_| AuthError::InvalidToken("Authorization header is not ASCII".to_string()))?;
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AuthError::InvalidToken("expected Bearer scheme".to_string()))
}

/// Reject requests without a live session; otherwise attach the validated
/// [`TokenClaims`](edgeguard_auth::TokenClaims) to the request extensions.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let claims = match bearer_token(request.headers()).and_then(|t| state.auth.validate_token(t)) {
        Ok(claims) => claims,
        Err(err) => return error_response(&err).into_response(),
    };
    request.extensions_mut().insert(claims);
    next.run(request).await
}
