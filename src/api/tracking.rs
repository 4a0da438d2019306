//! Preferences, check-ins, stats, and meal plans.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{AppState, AuthUser, json_body};
use crate::error::ApiError;
use crate::model::{Preferences, Stats, parse_date};
use crate::progress;

/// Entries returned by GET /api/progress.
const PROGRESS_PAGE: usize = 30;

#[derive(Debug, Deserialize)]
struct CheckInRequest {
    date: Option<String>,
    meals_logged: Option<String>,
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MealPlanRequest {
    week_start_date: Option<String>,
    #[serde(default)]
    plan_data: Value,
}

#[derive(Debug, Deserialize)]
struct MealPlanQuery {
    week_start_date: Option<String>,
}

fn required_date(field: &str, raw: Option<&str>) -> Result<NaiveDate, ApiError> {
    let raw = raw
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("{field} is required")))?;
    parse_date(raw).map_err(|e| ApiError::BadRequest(format!("Invalid {field} {raw:?}: {e}")))
}

// ── Preferences ─────────────────────────────────────────────────────

async fn get_preferences(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Value>, ApiError> {
    let prefs = state.db.get_preferences(user.id).await?;
    Ok(Json(json!({ "preferences": prefs })))
}

async fn save_preferences(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    payload: Result<Json<Preferences>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let prefs = json_body(payload)?.normalized();
    state.db.upsert_preferences(user.id, &prefs).await?;
    Ok(Json(json!({ "success": true, "preferences": prefs })))
}

// ── Progress ────────────────────────────────────────────────────────

async fn check_in(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    payload: Result<Json<CheckInRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let request = json_body(payload)?;
    let today = Utc::now().date_naive();
    let date = match request.date.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => required_date("date", Some(raw))?,
        None => today,
    };

    progress::record_check_in(
        state.db.as_ref(),
        user.id,
        date,
        request.meals_logged,
        request.notes,
        today,
    )
    .await?;
    Ok(Json(json!({ "success": true })))
}

async fn list_progress(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Value>, ApiError> {
    let entries = state.db.list_progress_entries(user.id, PROGRESS_PAGE).await?;
    Ok(Json(json!({ "entries": entries })))
}

async fn get_stats(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Value>, ApiError> {
    let stats = state.db.get_stats(user.id).await?.unwrap_or_else(Stats::default);
    let badges = state.db.list_badges(user.id).await?;
    Ok(Json(json!({ "stats": stats, "badges": badges })))
}

// ── Meal plans ──────────────────────────────────────────────────────

async fn save_meal_plan(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    payload: Result<Json<MealPlanRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let request = json_body(payload)?;
    let week = required_date("week_start_date", request.week_start_date.as_deref())?;
    state.db.save_meal_plan(user.id, week, &request.plan_data).await?;
    Ok(Json(json!({ "success": true })))
}

async fn get_meal_plan(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<MealPlanQuery>,
) -> Result<Json<Value>, ApiError> {
    let week = required_date("week_start_date", query.week_start_date.as_deref())?;
    let plan = state.db.get_meal_plan(user.id, week).await?;
    Ok(Json(json!({ "plan": plan })))
}

/// Build the tracking routes.
pub fn tracking_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/preferences", get(get_preferences).post(save_preferences))
        .route("/api/progress", get(list_progress).post(check_in))
        .route("/api/stats", get(get_stats))
        .route("/api/meal-plans", get(get_meal_plan).post(save_meal_plan))
        .with_state(state)
}
