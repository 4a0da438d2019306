//! Chat and onboarding endpoints.

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use chrono::Utc;
use serde_json::{Value, json};
use tracing::info;

use super::{AppState, AuthUser, json_body};
use crate::coach::{CoachTurn, Intent, OnboardingStep, apply_answer, classify, current_step};
use crate::error::ApiError;
use crate::progress;

/// Check-ins passed to the coach as recent activity.
const CHAT_ACTIVITY: usize = 7;

#[derive(Debug, Deserialize)]
struct MessageRequest {
    #[serde(default)]
    message: String,
}

/// POST /api/chat
///
/// A check-in message from an onboarded user is also logged as a progress
/// entry, after the reply is generated.
async fn chat(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    payload: Result<Json<MessageRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let request = json_body(payload)?;
    let prefs = state.db.get_preferences(user.id).await?;
    let stats = state.db.get_stats(user.id).await?;
    let recent = state.db.list_progress_entries(user.id, CHAT_ACTIVITY).await?;

    let turn = CoachTurn::new(&request.message)
        .with_preferences(prefs.as_ref())
        .with_stats(stats.as_ref())
        .with_activity(&recent);
    let response = state.coach.generate_reply(&turn).await;

    let onboarded = prefs.as_ref().is_some_and(|p| p.onboarding_complete);
    if onboarded && classify(&request.message) == Intent::CheckIn {
        let today = Utc::now().date_naive();
        let check_in = progress::record_check_in(
            state.db.as_ref(),
            user.id,
            today,
            Some(request.message.trim().to_string()),
            None,
            today,
        )
        .await?;
        info!(user_id = %user.id, streak = check_in.stats.streak, "Logged check-in from chat");
    }
    Ok(Json(json!({ "response": response })))
}

/// GET /api/onboarding/status
///
/// The next question to ask, or `complete: true` once the interview is over.
async fn onboarding_status(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Value>, ApiError> {
    let prefs = state.db.get_preferences(user.id).await?.unwrap_or_default();
    let step = current_step(&prefs);
    let pending = match step {
        OnboardingStep::Pending(field) if !prefs.onboarding_complete => Some(field),
        _ => None,
    };
    Ok(Json(json!({
        "complete": pending.is_none(),
        "step": pending,
        "prompt": pending.map(|f| f.prompt()),
    })))
}

/// POST /api/onboarding/answer
///
/// Records the message as the answer to the outstanding question.
async fn onboarding_answer(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    payload: Result<Json<MessageRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let request = json_body(payload)?;
    let prefs = state.db.get_preferences(user.id).await?.unwrap_or_default();
    if prefs.onboarding_complete {
        return Ok(Json(json!({ "preferences": prefs, "complete": true })));
    }

    let updated = apply_answer(&prefs, &request.message);
    state.db.upsert_preferences(user.id, &updated).await?;
    if updated.onboarding_complete {
        info!(user_id = %user.id, "Onboarding complete");
    }
    Ok(Json(json!({
        "preferences": updated,
        "complete": updated.onboarding_complete,
    })))
}

/// Build the coach routes.
pub fn coach_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/api/onboarding/status", get(onboarding_status))
        .route("/api/onboarding/answer", post(onboarding_answer))
        .with_state(state)
}
