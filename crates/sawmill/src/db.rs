//! SQLite database connection management and schema migrations.
//!
//! Provides a connection pool to the SQLite database with WAL mode
//! enabled for concurrent read/write performance. The database file and
//! its parent directories are created automatically if they don't exist.
//!
//! # Write-Ahead Logging (WAL)
//!
//! WAL mode is enabled for all connections, which allows concurrent
//! readers and a single writer without blocking. This matters because
//! different projects' pipelines run fully in parallel against the same
//! database file.

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::config::Config;

/// Create a connection pool to the configured SQLite database.
///
/// - Creates the database file and parent directories if they don't exist.
/// - Enables WAL journal mode for concurrent read/write.
/// - Returns a pool with up to 5 connections.
pub async fn connect(config: &Config) -> Result<SqlitePool> {
    let db_path = &config.db.path;

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Create all tables and indexes. Idempotent — safe to run repeatedly.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS summaries (
            project_id      TEXT NOT NULL,
            group_key       TEXT NOT NULL,
            id              TEXT NOT NULL,
            service         TEXT NOT NULL,
            severity        TEXT NOT NULL,
            signature       TEXT NOT NULL,
            pattern         TEXT NOT NULL,
            count           INTEGER NOT NULL,
            first_seen      INTEGER NOT NULL,
            last_seen       INTEGER NOT NULL,
            samples_json    TEXT NOT NULL,
            updated_at      INTEGER NOT NULL,
            PRIMARY KEY (project_id, group_key)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_summaries_last_seen ON summaries(project_id, last_seen)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS summary_vectors (
            project_id      TEXT NOT NULL,
            group_key       TEXT NOT NULL,
            embedding       BLOB NOT NULL,
            model           TEXT NOT NULL,
            dims            INTEGER NOT NULL,
            updated_at      INTEGER NOT NULL,
            PRIMARY KEY (project_id, group_key)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
