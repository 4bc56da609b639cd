//! Database initialization
//!
//! Creates the survey database on first run and opens it with the pragmas
//! the engine relies on (foreign keys, WAL, busy timeout). Schema creation
//! is idempotent and exposed separately so tests can run against
//! `sqlite::memory:` pools.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // Enable foreign keys
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL allows concurrent readers with one writer; respondents submit
    // answers while authors read aggregations
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    init_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables and indices (idempotent - safe to call multiple times)
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    create_surveys_table(pool).await?;
    create_groups_table(pool).await?;
    create_questions_table(pool).await?;
    create_choice_options_table(pool).await?;
    create_answers_table(pool).await?;
    Ok(())
}

async fn create_surveys_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS surveys (
            guid TEXT PRIMARY KEY,
            handle TEXT UNIQUE NOT NULL,
            title TEXT NOT NULL,
            description TEXT,
            published INTEGER NOT NULL DEFAULT 0,
            creator_id TEXT,
            ai_instructions TEXT,
            ai_approved INTEGER NOT NULL DEFAULT 0,
            ai_retry_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_groups_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS survey_groups (
            guid TEXT PRIMARY KEY,
            survey_id TEXT NOT NULL,
            group_number INTEGER NOT NULL,
            name TEXT NOT NULL DEFAULT '',
            next_group_id INTEGER,
            submit_after_group INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(survey_id, group_number)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_questions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS questions (
            guid TEXT PRIMARY KEY,
            survey_id TEXT NOT NULL,
            group_number INTEGER NOT NULL DEFAULT 0,
            question_number INTEGER NOT NULL,
            text TEXT NOT NULL,
            required INTEGER NOT NULL DEFAULT 0,
            kind TEXT NOT NULL,
            branch_on_true INTEGER,
            branch_on_false INTEGER,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_questions_survey ON questions(survey_id, question_number)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_choice_options_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS choice_options (
            guid TEXT PRIMARY KEY,
            question_id TEXT NOT NULL,
            text TEXT NOT NULL,
            option_order INTEGER NOT NULL,
            branch_target INTEGER,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_options_question ON choice_options(question_id, option_order)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_answers_table(pool: &SqlitePool) -> Result<()> {
    // Uniqueness per (question, respondent) is enforced by the upsert path,
    // not a UNIQUE index: the two respondent key shapes (account vs
    // anonymous+ip) key different column subsets
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS answers (
            guid TEXT PRIMARY KEY,
            question_id TEXT NOT NULL,
            respondent_id TEXT NOT NULL,
            origin_ip TEXT,
            complete INTEGER NOT NULL DEFAULT 0,
            kind TEXT NOT NULL,
            text_value TEXT,
            bool_value INTEGER,
            option_id TEXT,
            selections TEXT,
            rating INTEGER,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_answers_respondent ON answers(question_id, respondent_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn schema_creation_is_idempotent() {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory database");

        init_schema(&pool).await.expect("First schema creation failed");
        init_schema(&pool).await.expect("Second schema creation failed");

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();

        assert!(tables.contains(&"surveys".to_string()));
        assert!(tables.contains(&"survey_groups".to_string()));
        assert!(tables.contains(&"questions".to_string()));
        assert!(tables.contains(&"choice_options".to_string()));
        assert!(tables.contains(&"answers".to_string()));
    }

    #[tokio::test]
    async fn init_database_creates_file_and_parent_dirs() {
        let temp = tempfile::TempDir::new().unwrap();
        let db_path = temp.path().join("nested").join("canvass.db");

        let pool = init_database(&db_path).await.expect("init_database failed");
        assert!(db_path.exists());

        // Foreign keys should be on
        let fk: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(fk, 1);
    }
}
