//! Health and session endpoints.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use super::{AppState, AuthUser};
use crate::auth::bearer_token;
use crate::error::ApiError;

#[derive(Debug, Default, Deserialize)]
struct SessionRequest {
    token: Option<String>,
    #[serde(rename = "idToken")]
    id_token: Option<String>,
    name: Option<String>,
}

/// GET /api/health
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}

/// POST /api/auth/session
///
/// Exchanges an ID token (body `token`/`idToken`, or the bearer header) for
/// the local user record, creating it on first sign-in.
async fn create_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let request: SessionRequest = if body.is_empty() {
        SessionRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?
    };

    let header_token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .map(str::to_string);
    let token = request
        .token
        .or(request.id_token)
        .filter(|t| !t.is_empty())
        .or(header_token)
        .ok_or_else(|| ApiError::BadRequest("ID token required".to_string()))?;

    let identity = state.verifier.verify(&token).await.map_err(|e| {
        debug!(error = %e, "Session token rejected");
        ApiError::InvalidToken
    })?;

    let name = request
        .name
        .filter(|n| !n.is_empty())
        .or(identity.name);
    let user = state
        .db
        .get_or_create_user(
            &identity.uid,
            identity.email.as_deref().unwrap_or_default(),
            name.as_deref(),
        )
        .await?;

    info!(user_id = %user.id, "Session established");
    Ok(Json(json!({ "user": user })))
}

/// GET /api/auth/me
async fn me(State(state): State<AppState>, AuthUser(user): AuthUser) -> Result<Json<Value>, ApiError> {
    let user = state
        .db
        .get_user(user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    Ok(Json(json!({ "user": user })))
}

/// Build the health and session routes.
pub fn account_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/session", post(create_session))
        .route("/api/auth/me", get(me))
        .with_state(state)
}
