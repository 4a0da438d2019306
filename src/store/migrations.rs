//! Schema versions for the meal coach database.
//!
//! `_schema_versions` records every applied step; startup applies whatever
//! is missing, oldest first.

use libsql::Connection;

use crate::error::DatabaseError;

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// Append only.
static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "initial_schema",
        sql: r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                firebase_uid TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL DEFAULT '',
                name TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS user_preferences (
                user_id TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                food_allergies TEXT,
                foods_dislike TEXT,
                foods_like TEXT,
                meals_per_day INTEGER,
                meal_preference TEXT,
                goals TEXT,
                bad_habits TEXT,
                body_scan_info TEXT,
                onboarding_complete INTEGER NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS progress_entries (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                date TEXT NOT NULL,
                meals_logged TEXT,
                notes TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_progress_user_date ON progress_entries(user_id, date);

            CREATE TABLE IF NOT EXISTS user_stats (
                user_id TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                points INTEGER NOT NULL DEFAULT 0,
                streak INTEGER NOT NULL DEFAULT 0,
                last_check_in_date TEXT,
                updated_at TEXT NOT NULL
            );
        "#,
    },
    Migration {
        version: 2,
        name: "badges_and_meal_plans",
        sql: r#"
            CREATE TABLE IF NOT EXISTS badges (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                badge_name TEXT NOT NULL,
                badge_description TEXT,
                earned_at TEXT NOT NULL,
                UNIQUE(user_id, badge_name)
            );

            CREATE TABLE IF NOT EXISTS meal_plans (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                week_start_date TEXT NOT NULL,
                plan_data TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_meal_plans_user_week ON meal_plans(user_id, week_start_date);
        "#,
    },
];

const VERSIONS_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS _schema_versions (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
)";

fn migration_err(context: &str, e: libsql::Error) -> DatabaseError {
    DatabaseError::Migration(format!("{context}: {e}"))
}

/// Bring the schema up to the newest version.
pub async fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute(VERSIONS_TABLE_SQL, ())
        .await
        .map_err(|e| migration_err("creating _schema_versions", e))?;

    let applied = get_current_version(conn).await?;
    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > applied).collect();
    if pending.is_empty() {
        tracing::debug!(version = applied, "Schema up to date");
        return Ok(());
    }

    for step in pending {
        tracing::info!(version = step.version, name = step.name, "Upgrading schema");
        conn.execute_batch(step.sql)
            .await
            .map_err(|e| migration_err(&format!("V{} {}", step.version, step.name), e))?;
        seed_version(conn, step.version, step.name).await?;
    }
    let version = get_current_version(conn).await?;
    tracing::info!(version, "Schema upgraded");
    Ok(())
}

/// Newest applied version; 0 for a fresh database.
async fn get_current_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let mut rows = conn
        .query("SELECT MAX(version) FROM _schema_versions", ())
        .await
        .map_err(|e| migration_err("reading schema version", e))?;
    let Some(row) = rows
        .next()
        .await
        .map_err(|e| migration_err("reading schema version", e))?
    else {
        return Ok(0);
    };
    match row.get_value(0).map_err(|e| migration_err("reading schema version", e))? {
        libsql::Value::Integer(v) => Ok(v),
        _ => Ok(0),
    }
}

async fn seed_version(conn: &Connection, version: i64, name: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT OR IGNORE INTO _schema_versions (version, name) VALUES (?1, ?2)",
        libsql::params![version, name],
    )
    .await
    .map(|_| ())
    .map_err(|e| migration_err(&format!("recording V{version}"), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_conn() -> Connection {
        let db = libsql::Builder::new_local(":memory:").build().await.unwrap();
        db.connect().unwrap()
    }

    async fn table_exists(conn: &Connection, table: &str) -> bool {
        let mut rows = conn
            .query(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                libsql::params![table],
            )
            .await
            .unwrap();
        rows.next().await.unwrap().is_some()
    }

    #[tokio::test]
    async fn fresh_database_gets_every_table() {
        let conn = memory_conn().await;
        run_migrations(&conn).await.unwrap();
        for table in [
            "_schema_versions",
            "users",
            "user_preferences",
            "progress_entries",
            "user_stats",
            "badges",
            "meal_plans",
        ] {
            assert!(table_exists(&conn, table).await, "missing table {table}");
        }
    }

    #[tokio::test]
    async fn upgrade_future_is_send() {
        fn assert_send<T: Send>(value: T) -> T {
            value
        }
        let conn = memory_conn().await;
        assert_send(run_migrations(&conn)).await.unwrap();
        assert_eq!(get_current_version(&conn).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn second_run_is_a_no_op() {
        let conn = memory_conn().await;
        run_migrations(&conn).await.unwrap();
        run_migrations(&conn).await.unwrap();

        let newest = MIGRATIONS.iter().map(|m| m.version).max().unwrap();
        assert_eq!(get_current_version(&conn).await.unwrap(), newest);
    }

    #[tokio::test]
    async fn v1_database_is_upgraded_to_v2() {
        let conn = memory_conn().await;
        conn.execute(VERSIONS_TABLE_SQL, ()).await.unwrap();
        conn.execute_batch(MIGRATIONS[0].sql).await.unwrap();
        seed_version(&conn, 1, MIGRATIONS[0].name).await.unwrap();
        assert!(!table_exists(&conn, "badges").await);

        run_migrations(&conn).await.unwrap();
        assert_eq!(get_current_version(&conn).await.unwrap(), 2);
        assert!(table_exists(&conn, "badges").await);
    }
}
