//! libSQL implementation of the async `Database` trait.
//!
//! Supports local file and in-memory databases. Ids are stored as UUID text,
//! calendar dates as `YYYY-MM-DD`, and timestamps as RFC 3339 with
//! microseconds so they sort lexically.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::model::{self, Badge, MealPlan, Preferences, ProgressEntry, Stats, User};
use crate::store::migrations;
use crate::store::traits::Database;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    _db: LibSqlDatabase,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db)?;
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let backend = Self::from_database(db)?;
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        Ok(Self { _db: db, conn })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    async fn find_user_by_uid(&self, firebase_uid: &str) -> Result<Option<User>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE firebase_uid = ?1"),
                params![firebase_uid],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("find_user_by_uid: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_user(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("find_user_by_uid row: {e}"))),
        }
    }
}

// ── Helper functions ────────────────────────────────────────────────

fn now_str() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn date_str(date: NaiveDate) -> String {
    date.format(model::DATE_FORMAT).to_string()
}

fn opt_text(s: Option<&str>) -> libsql::Value {
    match s.filter(|s| !s.is_empty()) {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

fn parse_uuid(raw: &str, column: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(raw).map_err(|e| DatabaseError::Query(format!("{column} parse: {e}")))
}

fn parse_date_column(raw: &str, column: &str) -> Result<NaiveDate, DatabaseError> {
    model::parse_date(raw).map_err(|e| DatabaseError::Query(format!("{column} parse: {e}")))
}

fn text(row: &libsql::Row, idx: i32, column: &str) -> Result<String, DatabaseError> {
    row.get::<String>(idx)
        .map_err(|e| DatabaseError::Query(format!("{column}: {e}")))
}

/// Nullable text column; NULL and empty both read as `None`.
fn opt_column(row: &libsql::Row, idx: i32) -> Option<String> {
    row.get::<String>(idx).ok().filter(|s| !s.is_empty())
}

const USER_COLUMNS: &str = "id, firebase_uid, email, name";

fn row_to_user(row: &libsql::Row) -> Result<User, DatabaseError> {
    Ok(User {
        id: parse_uuid(&text(row, 0, "users.id")?, "users.id")?,
        firebase_uid: text(row, 1, "users.firebase_uid")?,
        email: row.get::<String>(2).unwrap_or_default(),
        name: opt_column(row, 3),
    })
}

const PREFERENCE_COLUMNS: &str = "food_allergies, foods_dislike, foods_like, meals_per_day, \
     meal_preference, goals, bad_habits, body_scan_info, onboarding_complete";

fn row_to_preferences(row: &libsql::Row) -> Preferences {
    Preferences {
        food_allergies: opt_column(row, 0),
        foods_dislike: opt_column(row, 1),
        foods_like: opt_column(row, 2),
        meals_per_day: row
            .get::<i64>(3)
            .ok()
            .and_then(|n| u32::try_from(n).ok()),
        meal_preference: opt_column(row, 4),
        goals: opt_column(row, 5),
        bad_habits: opt_column(row, 6),
        body_scan_info: opt_column(row, 7),
        onboarding_complete: row.get::<i64>(8).unwrap_or(0) != 0,
    }
}

fn row_to_entry(row: &libsql::Row) -> Result<ProgressEntry, DatabaseError> {
    Ok(ProgressEntry {
        id: parse_uuid(&text(row, 0, "progress_entries.id")?, "progress_entries.id")?,
        date: parse_date_column(&text(row, 1, "progress_entries.date")?, "progress_entries.date")?,
        meals_logged: opt_column(row, 2),
        notes: opt_column(row, 3),
    })
}

fn row_to_badge(row: &libsql::Row) -> Result<Badge, DatabaseError> {
    Ok(Badge {
        id: parse_uuid(&text(row, 0, "badges.id")?, "badges.id")?,
        badge_name: text(row, 1, "badges.badge_name")?,
        badge_description: opt_column(row, 2),
        earned_at: parse_datetime(&text(row, 3, "badges.earned_at")?),
    })
}

fn row_to_meal_plan(row: &libsql::Row) -> Result<MealPlan, DatabaseError> {
    let raw = text(row, 2, "meal_plans.plan_data")?;
    Ok(MealPlan {
        id: parse_uuid(&text(row, 0, "meal_plans.id")?, "meal_plans.id")?,
        week_start_date: parse_date_column(
            &text(row, 1, "meal_plans.week_start_date")?,
            "meal_plans.week_start_date",
        )?,
        plan_data: serde_json::from_str(&raw)
            .map_err(|e| DatabaseError::Serialization(format!("meal_plans.plan_data: {e}")))?,
        created_at: parse_datetime(&text(row, 3, "meal_plans.created_at")?),
    })
}

// ── Database impl ───────────────────────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Users ───────────────────────────────────────────────────────

    async fn get_or_create_user(
        &self,
        firebase_uid: &str,
        email: &str,
        name: Option<&str>,
    ) -> Result<User, DatabaseError> {
        let id = Uuid::new_v4();
        let inserted = self
            .conn()
            .execute(
                "INSERT INTO users (id, firebase_uid, email, name, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(firebase_uid) DO NOTHING",
                params![
                    id.to_string(),
                    firebase_uid,
                    email,
                    opt_text(name),
                    now_str()
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_or_create_user insert: {e}")))?;

        if inserted > 0 {
            self.initialize_stats(id).await?;
            info!(user_id = %id, "Created user");
        }

        self.find_user_by_uid(firebase_uid)
            .await?
            .ok_or_else(|| DatabaseError::NotFound {
                entity: "user".to_string(),
                id: firebase_uid.to_string(),
            })
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_user: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_user(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_user row: {e}"))),
        }
    }

    // ── Preferences ─────────────────────────────────────────────────

    async fn get_preferences(&self, user_id: Uuid) -> Result<Option<Preferences>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {PREFERENCE_COLUMNS} FROM user_preferences WHERE user_id = ?1"),
                params![user_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_preferences: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_preferences(&row))),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_preferences row: {e}"))),
        }
    }

    async fn upsert_preferences(
        &self,
        user_id: Uuid,
        preferences: &Preferences,
    ) -> Result<(), DatabaseError> {
        let p = preferences;
        let meals: libsql::Value = match p.meals_per_day {
            Some(n) => libsql::Value::Integer(i64::from(n)),
            None => libsql::Value::Null,
        };
        self.conn()
            .execute(
                "INSERT INTO user_preferences (
                    user_id, food_allergies, foods_dislike, foods_like, meals_per_day,
                    meal_preference, goals, bad_habits, body_scan_info, onboarding_complete, updated_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 ON CONFLICT(user_id) DO UPDATE SET
                    food_allergies = excluded.food_allergies,
                    foods_dislike = excluded.foods_dislike,
                    foods_like = excluded.foods_like,
                    meals_per_day = excluded.meals_per_day,
                    meal_preference = excluded.meal_preference,
                    goals = excluded.goals,
                    bad_habits = excluded.bad_habits,
                    body_scan_info = excluded.body_scan_info,
                    onboarding_complete = excluded.onboarding_complete,
                    updated_at = excluded.updated_at",
                params![
                    user_id.to_string(),
                    opt_text(p.food_allergies.as_deref()),
                    opt_text(p.foods_dislike.as_deref()),
                    opt_text(p.foods_like.as_deref()),
                    meals,
                    opt_text(p.meal_preference.as_deref()),
                    opt_text(p.goals.as_deref()),
                    opt_text(p.bad_habits.as_deref()),
                    opt_text(p.body_scan_info.as_deref()),
                    i64::from(p.onboarding_complete),
                    now_str()
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("upsert_preferences: {e}")))?;
        debug!(%user_id, complete = p.onboarding_complete, "Preferences saved");
        Ok(())
    }

    // ── Progress ────────────────────────────────────────────────────

    async fn add_progress_entry(
        &self,
        user_id: Uuid,
        entry: &ProgressEntry,
    ) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO progress_entries (id, user_id, date, meals_logged, notes, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    entry.id.to_string(),
                    user_id.to_string(),
                    date_str(entry.date),
                    opt_text(entry.meals_logged.as_deref()),
                    opt_text(entry.notes.as_deref()),
                    now_str()
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("add_progress_entry: {e}")))?;
        Ok(())
    }

    async fn list_progress_entries(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<ProgressEntry>, DatabaseError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut rows = self
            .conn()
            .query(
                "SELECT id, date, meals_logged, notes FROM progress_entries
                 WHERE user_id = ?1 ORDER BY date DESC, created_at DESC LIMIT ?2",
                params![user_id.to_string(), limit],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_progress_entries: {e}")))?;

        let mut entries = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            entries.push(row_to_entry(&row)?);
        }
        Ok(entries)
    }

    // ── Stats ───────────────────────────────────────────────────────

    async fn get_stats(&self, user_id: Uuid) -> Result<Option<Stats>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT points, streak, last_check_in_date FROM user_stats WHERE user_id = ?1",
                params![user_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_stats: {e}")))?;

        let row = match rows.next().await {
            Ok(Some(row)) => row,
            Ok(None) => return Ok(None),
            Err(e) => return Err(DatabaseError::Query(format!("get_stats row: {e}"))),
        };

        let last_check_in_date = match opt_column(&row, 2) {
            Some(raw) => Some(parse_date_column(&raw, "user_stats.last_check_in_date")?),
            None => None,
        };
        Ok(Some(Stats {
            points: u32::try_from(row.get::<i64>(0).unwrap_or(0)).unwrap_or(0),
            streak: u32::try_from(row.get::<i64>(1).unwrap_or(0)).unwrap_or(0),
            last_check_in_date,
        }))
    }

    async fn initialize_stats(&self, user_id: Uuid) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT OR IGNORE INTO user_stats (user_id, points, streak, updated_at)
                 VALUES (?1, 0, 0, ?2)",
                params![user_id.to_string(), now_str()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("initialize_stats: {e}")))?;
        Ok(())
    }

    async fn update_stats(&self, user_id: Uuid, stats: &Stats) -> Result<(), DatabaseError> {
        let last: libsql::Value = match stats.last_check_in_date {
            Some(d) => libsql::Value::Text(date_str(d)),
            None => libsql::Value::Null,
        };
        self.conn()
            .execute(
                "INSERT INTO user_stats (user_id, points, streak, last_check_in_date, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(user_id) DO UPDATE SET
                    points = excluded.points,
                    streak = excluded.streak,
                    last_check_in_date = excluded.last_check_in_date,
                    updated_at = excluded.updated_at",
                params![
                    user_id.to_string(),
                    i64::from(stats.points),
                    i64::from(stats.streak),
                    last,
                    now_str()
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_stats: {e}")))?;
        Ok(())
    }

    // ── Badges ──────────────────────────────────────────────────────

    async fn list_badges(&self, user_id: Uuid) -> Result<Vec<Badge>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, badge_name, badge_description, earned_at FROM badges
                 WHERE user_id = ?1 ORDER BY earned_at DESC",
                params![user_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_badges: {e}")))?;

        let mut badges = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            badges.push(row_to_badge(&row)?);
        }
        Ok(badges)
    }

    async fn award_badge(
        &self,
        user_id: Uuid,
        badge_name: &str,
        badge_description: Option<&str>,
    ) -> Result<bool, DatabaseError> {
        let inserted = self
            .conn()
            .execute(
                "INSERT OR IGNORE INTO badges (id, user_id, badge_name, badge_description, earned_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    Uuid::new_v4().to_string(),
                    user_id.to_string(),
                    badge_name,
                    opt_text(badge_description),
                    now_str()
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("award_badge: {e}")))?;
        Ok(inserted > 0)
    }

    // ── Meal plans ──────────────────────────────────────────────────

    async fn save_meal_plan(
        &self,
        user_id: Uuid,
        week_start_date: NaiveDate,
        plan_data: &serde_json::Value,
    ) -> Result<MealPlan, DatabaseError> {
        let plan = MealPlan {
            id: Uuid::new_v4(),
            week_start_date,
            plan_data: plan_data.clone(),
            created_at: Utc::now(),
        };
        let data = serde_json::to_string(plan_data)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        self.conn()
            .execute(
                "INSERT INTO meal_plans (id, user_id, week_start_date, plan_data, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    plan.id.to_string(),
                    user_id.to_string(),
                    date_str(week_start_date),
                    data,
                    plan.created_at.to_rfc3339_opts(SecondsFormat::Micros, true)
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("save_meal_plan: {e}")))?;
        Ok(plan)
    }

    async fn get_meal_plan(
        &self,
        user_id: Uuid,
        week_start_date: NaiveDate,
    ) -> Result<Option<MealPlan>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, week_start_date, plan_data, created_at FROM meal_plans
                 WHERE user_id = ?1 AND week_start_date = ?2
                 ORDER BY created_at DESC LIMIT 1",
                params![user_id.to_string(), date_str(week_start_date)],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_meal_plan: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_meal_plan(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_meal_plan row: {e}"))),
        }
    }
}
