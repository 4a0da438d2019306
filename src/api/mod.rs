//! HTTP API: axum routes over the store, the verifier, and the coach.

pub mod account;
pub mod coach;
pub mod tracking;

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::extract::rejection::JsonRejection;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tracing::debug;

use crate::auth::{IdentityVerifier, bearer_token};
use crate::coach::CoachEngine;
use crate::error::ApiError;
use crate::model::User;
use crate::store::Database;

/// Shared state for every route.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn Database>,
    pub verifier: Arc<dyn IdentityVerifier>,
    pub coach: Arc<CoachEngine>,
}

impl AppState {
    pub fn new(
        db: Arc<dyn Database>,
        verifier: Arc<dyn IdentityVerifier>,
        coach: CoachEngine,
    ) -> Self {
        Self {
            db,
            verifier,
            coach: Arc::new(coach),
        }
    }
}

/// Build the full API router with permissive CORS.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(account::account_routes(state.clone()))
        .merge(tracking::tracking_routes(state.clone()))
        .merge(coach::coach_routes(state))
        .layer(CorsLayer::permissive())
}

// ── Extractors ──────────────────────────────────────────────────────

/// The caller, resolved from a verified bearer token.
///
/// First sight of a uid creates the user record.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(bearer_token)
            .ok_or(ApiError::MissingToken)?;

        let identity = state.verifier.verify(token).await.map_err(|e| {
            debug!(error = %e, "Rejected bearer token");
            ApiError::InvalidToken
        })?;

        let user = state
            .db
            .get_or_create_user(
                &identity.uid,
                identity.email.as_deref().unwrap_or_default(),
                identity.name.as_deref(),
            )
            .await?;
        Ok(AuthUser(user))
    }
}

/// Unwrap a JSON body, turning axum's rejection into our error shape.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}
