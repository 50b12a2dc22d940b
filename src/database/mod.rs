//! Database module for the SQLite task store

use std::path::Path;
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::error::{Error, Result};

/// Task store connection and schema management
///
/// The store is a log of durable checkpoints, not a mirror of content:
/// three small tables, one writer, every mutation committed before control
/// returns to the engine.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

/// Expected columns per table, used by [`Database::ensure_schema`] to
/// absorb columns added in newer releases.
const SCHEMA: &[(&str, &str, &[(&str, &str)])] = &[
    (
        "sync_tasks",
        "origin_chat_id INTEGER PRIMARY KEY",
        &[
            ("origin_chat_title", "TEXT NOT NULL DEFAULT ''"),
            ("destination_chat_id", "INTEGER"),
            ("cloning_strategy", "TEXT NOT NULL DEFAULT 'forward'"),
            ("last_synced_message_id", "INTEGER NOT NULL DEFAULT 0"),
            ("created_at", "TEXT NOT NULL DEFAULT (datetime('now'))"),
            ("updated_at", "TEXT NOT NULL DEFAULT (datetime('now'))"),
        ],
    ),
    (
        "download_tasks",
        "origin_chat_id INTEGER PRIMARY KEY",
        &[
            ("origin_chat_title", "TEXT NOT NULL DEFAULT ''"),
            ("last_downloaded_message_id", "INTEGER NOT NULL DEFAULT 0"),
            ("total_videos", "INTEGER NOT NULL DEFAULT 0"),
            ("downloaded_videos", "INTEGER NOT NULL DEFAULT 0"),
            ("created_at", "TEXT NOT NULL DEFAULT (datetime('now'))"),
            ("updated_at", "TEXT NOT NULL DEFAULT (datetime('now'))"),
        ],
    ),
    (
        "publish_tasks",
        "source_folder_path TEXT PRIMARY KEY",
        &[
            ("project_name", "TEXT NOT NULL DEFAULT ''"),
            ("destination_chat_id", "INTEGER"),
            ("current_step", "TEXT NOT NULL DEFAULT 'init'"),
            ("status", "TEXT NOT NULL DEFAULT 'pending'"),
            ("is_started", "INTEGER NOT NULL DEFAULT 0"),
            ("is_zipped", "INTEGER NOT NULL DEFAULT 0"),
            ("is_reported", "INTEGER NOT NULL DEFAULT 0"),
            ("is_reencode_auth", "INTEGER NOT NULL DEFAULT 0"),
            ("is_reencoded", "INTEGER NOT NULL DEFAULT 0"),
            ("is_joined", "INTEGER NOT NULL DEFAULT 0"),
            ("is_timestamped", "INTEGER NOT NULL DEFAULT 0"),
            ("is_upload_auth", "INTEGER NOT NULL DEFAULT 0"),
            ("is_published", "INTEGER NOT NULL DEFAULT 0"),
            ("last_uploaded_file", "TEXT"),
            ("created_at", "TEXT NOT NULL DEFAULT (datetime('now'))"),
            ("updated_at", "TEXT NOT NULL DEFAULT (datetime('now'))"),
        ],
    ),
];

impl Database {
    /// Open (creating if missing) the store at `path`.
    pub async fn connect(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Open an in-memory store (tests).
    pub async fn connect_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(Error::Database)?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    /// Get the underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create missing tables and absorb missing columns.
    ///
    /// Idempotent and forward-compatible: a column present in [`SCHEMA`]
    /// but absent on disk is added with `ALTER TABLE`; nothing is ever
    /// dropped or rewritten.
    pub async fn ensure_schema(&self) -> Result<()> {
        for (table, primary_key, columns) in SCHEMA {
            let column_defs: Vec<String> = columns
                .iter()
                .map(|(name, ty)| format!("{} {}", name, ty))
                .collect();
            let create = format!(
                "CREATE TABLE IF NOT EXISTS {} ({}, {})",
                table,
                primary_key,
                column_defs.join(", ")
            );
            sqlx::query(&create).execute(&self.pool).await?;

            let existing: Vec<String> =
                sqlx::query_scalar(&format!("SELECT name FROM pragma_table_info('{}')", table))
                    .fetch_all(&self.pool)
                    .await?;

            for (name, ty) in *columns {
                if !existing.iter().any(|c| c == name) {
                    tracing::info!(table, column = name, "absorbing new schema column");
                    sqlx::query(&format!("ALTER TABLE {} ADD COLUMN {} {}", table, name, ty))
                        .execute(&self.pool)
                        .await?;
                }
            }
        }

        Ok(())
    }
}
