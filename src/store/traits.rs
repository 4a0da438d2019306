//! Unified `Database` trait, the single async interface for all persistence.

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::model::{Badge, MealPlan, Preferences, ProgressEntry, Stats, User};

/// Backend-agnostic database trait covering users, preferences, check-ins,
/// stats, badges, and meal plans. Every user-scoped call takes the internal
/// user id, never the identity provider's uid.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Users ───────────────────────────────────────────────────────

    /// Look up a user by identity-provider uid, creating it (with zeroed
    /// stats) on first sight. Existing users are returned unchanged.
    async fn get_or_create_user(
        &self,
        firebase_uid: &str,
        email: &str,
        name: Option<&str>,
    ) -> Result<User, DatabaseError>;

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, DatabaseError>;

    // ── Preferences ─────────────────────────────────────────────────

    async fn get_preferences(&self, user_id: Uuid) -> Result<Option<Preferences>, DatabaseError>;

    /// Replace the user's preference record. Empty strings are stored as NULL.
    async fn upsert_preferences(
        &self,
        user_id: Uuid,
        preferences: &Preferences,
    ) -> Result<(), DatabaseError>;

    // ── Progress ────────────────────────────────────────────────────

    async fn add_progress_entry(
        &self,
        user_id: Uuid,
        entry: &ProgressEntry,
    ) -> Result<(), DatabaseError>;

    /// Newest first (by date, then insertion), at most `limit`.
    async fn list_progress_entries(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<ProgressEntry>, DatabaseError>;

    // ── Stats ───────────────────────────────────────────────────────

    async fn get_stats(&self, user_id: Uuid) -> Result<Option<Stats>, DatabaseError>;

    /// Create a zeroed stats row if none exists.
    async fn initialize_stats(&self, user_id: Uuid) -> Result<(), DatabaseError>;

    /// Overwrite the stats row, creating it if needed.
    async fn update_stats(&self, user_id: Uuid, stats: &Stats) -> Result<(), DatabaseError>;

    // ── Badges ──────────────────────────────────────────────────────

    /// Most recently earned first.
    async fn list_badges(&self, user_id: Uuid) -> Result<Vec<Badge>, DatabaseError>;

    /// Award a badge by name. Returns `false` if the user already holds it.
    async fn award_badge(
        &self,
        user_id: Uuid,
        badge_name: &str,
        badge_description: Option<&str>,
    ) -> Result<bool, DatabaseError>;

    // ── Meal plans ──────────────────────────────────────────────────

    async fn save_meal_plan(
        &self,
        user_id: Uuid,
        week_start_date: NaiveDate,
        plan_data: &serde_json::Value,
    ) -> Result<MealPlan, DatabaseError>;

    /// The most recently saved plan for the given week.
    async fn get_meal_plan(
        &self,
        user_id: Uuid,
        week_start_date: NaiveDate,
    ) -> Result<Option<MealPlan>, DatabaseError>;
}
