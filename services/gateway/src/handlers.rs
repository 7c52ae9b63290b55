use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    Extension,
};
use chrono::Utc;
use edgeguard_auth::{
    AuthError, AuthResponse, ChallengeRequest, ChallengeResponse, TokenClaims, VerifyRequest,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, warn};

use crate::middleware::bearer_token;
use crate::state::AppState;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<AuthResponse>)>;

/// Map an internal error to its uniform client response. The precise cause
/// is only logged.
pub fn error_response(err: &AuthError) -> (StatusCode, Json<AuthResponse>) {
    let status = match err {
        AuthError::LockedOut { .. } => StatusCode::TOO_MANY_REQUESTS,
        AuthError::LicenseDenied(_) => StatusCode::FORBIDDEN,
        e if e.is_internal() => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::UNAUTHORIZED,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!(error = %err, "Request failed");
    } else {
        warn!(error = %err, status = status.as_u16(), "Request rejected");
    }
    (status, Json(AuthResponse::failure(err.client_message())))
}

fn bad_request(rejection: JsonRejection) -> (StatusCode, Json<AuthResponse>) {
    warn!(error = %rejection.body_text(), "Malformed request body");
    (
        StatusCode::BAD_REQUEST,
        Json(AuthResponse::failure("invalid request")),
    )
}

fn internal(message: &str) -> (StatusCode, Json<AuthResponse>) {
    error_response(&AuthError::Internal(message.to_string()))
}

pub async fn challenge(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChallengeRequest>, JsonRejection>,
) -> ApiResult<ChallengeResponse> {
    let Json(request) = payload.map_err(bad_request)?;
    let auth = Arc::clone(&state.auth);
    let challenge = tokio::task::spawn_blocking(move || auth.generate_challenge(&request.device_id))
        .await
        .map_err(|_| internal("challenge task failed"))?
        .map_err(|e| error_response(&e))?;
    Ok(Json(ChallengeResponse::from(&challenge)))
}

pub async fn verify(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> ApiResult<AuthResponse> {
    let Json(request) = payload.map_err(bad_request)?;
    let auth = Arc::clone(&state.auth);
    // Pairing checks are CPU-bound; keep them off the async workers.
    let session = tokio::task::spawn_blocking(move || auth.verify_request(&request))
        .await
        .map_err(|_| internal("verification task failed"))?
        .map_err(|e| error_response(&e))?;
    Ok(Json(AuthResponse::from(&session)))
}

pub async fn refresh(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<AuthResponse> {
    let token = bearer_token(&headers)
        .map_err(|e| error_response(&e))?
        .to_string();
    let auth = Arc::clone(&state.auth);
    let session = tokio::task::spawn_blocking(move || auth.refresh_session(&token))
        .await
        .map_err(|_| internal("refresh task failed"))?
        .map_err(|e| error_response(&e))?;
    Ok(Json(AuthResponse::from(&session)))
}

pub async fn revoke(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<AuthResponse> {
    let token = bearer_token(&headers)
        .map_err(|e| error_response(&e))?
        .to_string();
    let auth = Arc::clone(&state.auth);
    let claims = tokio::task::spawn_blocking(move || {
        let claims = auth.validate_token(&token)?;
        auth.revoke_session(&claims.session_id)?;
        Ok::<_, AuthError>(claims)
    })
    .await
    .map_err(|_| internal("revoke task failed"))?
    .map_err(|e| error_response(&e))?;
    Ok(Json(AuthResponse {
        success: true,
        session_id: Some(claims.session_id),
        token: None,
        expires_at: None,
        message: None,
    }))
}

pub async fn session(Extension(claims): Extension<TokenClaims>) -> Json<Value> {
    Json(json!({
        "device_id": claims.device_id,
        "session_id": claims.session_id,
        "expires_at": claims.exp,
    }))
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let license = state.license.as_ref().map(|l| l.status());
    let storage = if state.config.storage.database_path.is_some() {
        "sqlite"
    } else {
        "memory"
    };
    Json(json!({
        "status": "healthy",
        "service": "edgeguard-gateway",
        "verifier": state.auth.verifier_backend(),
        "storage": storage,
        "ephemeral_secret": state.auth.sessions().is_ephemeral(),
        "license": license,
        "timestamp": Utc::now().to_rfc3339()
    }))
}
