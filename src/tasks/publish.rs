//! Store operations for publish tasks

use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::{Error, Result};
use crate::tasks::models::{PublishStep, PublishTask, TaskStatus};

const COLUMNS: &str = "source_folder_path, project_name, destination_chat_id, current_step, status,
    is_started, is_zipped, is_reported, is_reencode_auth, is_reencoded, is_joined,
    is_timestamped, is_upload_auth, is_published, last_uploaded_file, created_at, updated_at";

/// Fetch a publish task by its canonical source folder path.
pub async fn get(pool: &SqlitePool, source_folder_path: &str) -> Result<Option<PublishTask>> {
    let task = sqlx::query_as::<_, PublishTask>(&format!(
        "SELECT {} FROM publish_tasks WHERE source_folder_path = $1",
        COLUMNS
    ))
    .bind(source_folder_path)
    .fetch_optional(pool)
    .await?;

    Ok(task)
}

/// Insert a publish task; an existing row is left untouched.
pub async fn upsert(pool: &SqlitePool, task: &PublishTask) -> Result<()> {
    sqlx::query(
        "INSERT INTO publish_tasks
           (source_folder_path, project_name, current_step, status, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $5)
         ON CONFLICT(source_folder_path) DO NOTHING",
    )
    .bind(&task.source_folder_path)
    .bind(&task.project_name)
    .bind(task.current_step)
    .bind(task.status)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

/// Latch a completed stage and advance `current_step` in one commit.
///
/// The caller must only invoke this once the stage's artefacts exist on
/// disk; a crash before this commit leaves the latch unset and the stage
/// is repeated on resume.
pub async fn complete_step(pool: &SqlitePool, source_folder_path: &str, step: PublishStep) -> Result<()> {
    let next = step
        .next()
        .ok_or_else(|| Error::InvalidInput("done has no next stage".into()))?;

    // Latch column names come from the PublishStep enum, never from input.
    let query = match step.latch_column() {
        Some(latch) => format!(
            "UPDATE publish_tasks SET {} = 1, current_step = $1, updated_at = $2
             WHERE source_folder_path = $3",
            latch
        ),
        None => "UPDATE publish_tasks SET current_step = $1, updated_at = $2
                 WHERE source_folder_path = $3"
            .to_string(),
    };

    sqlx::query(&query)
        .bind(next)
        .bind(Utc::now())
        .bind(source_folder_path)
        .execute(pool)
        .await?;

    Ok(())
}

/// Update the run status.
pub async fn set_status(pool: &SqlitePool, source_folder_path: &str, status: TaskStatus) -> Result<()> {
    sqlx::query(
        "UPDATE publish_tasks SET status = $1, updated_at = $2 WHERE source_folder_path = $3",
    )
    .bind(status)
    .bind(Utc::now())
    .bind(source_folder_path)
    .execute(pool)
    .await?;

    Ok(())
}

/// Record the destination channel once created or reused.
pub async fn set_destination(pool: &SqlitePool, source_folder_path: &str, chat_id: i64) -> Result<()> {
    sqlx::query(
        "UPDATE publish_tasks SET destination_chat_id = $1, updated_at = $2
         WHERE source_folder_path = $3",
    )
    .bind(chat_id)
    .bind(Utc::now())
    .bind(source_folder_path)
    .execute(pool)
    .await?;

    Ok(())
}

/// Advance the upload resumption marker after an acknowledged send.
pub async fn set_last_uploaded_file(
    pool: &SqlitePool,
    source_folder_path: &str,
    relative_path: &str,
) -> Result<()> {
    sqlx::query(
        "UPDATE publish_tasks SET last_uploaded_file = $1, updated_at = $2
         WHERE source_folder_path = $3",
    )
    .bind(relative_path)
    .bind(Utc::now())
    .bind(source_folder_path)
    .execute(pool)
    .await?;

    Ok(())
}

/// Remove a publish task (only on explicit `--restart`).
pub async fn delete(pool: &SqlitePool, source_folder_path: &str) -> Result<()> {
    sqlx::query("DELETE FROM publish_tasks WHERE source_folder_path = $1")
        .bind(source_folder_path)
        .execute(pool)
        .await?;

    Ok(())
}
