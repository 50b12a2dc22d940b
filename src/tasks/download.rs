//! Store operations for bulk-download tasks

use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::Result;
use crate::tasks::models::DownloadTask;

/// Fetch a download task by origin chat id.
pub async fn get(pool: &SqlitePool, origin_chat_id: i64) -> Result<Option<DownloadTask>> {
    let task = sqlx::query_as::<_, DownloadTask>(
        "SELECT origin_chat_id, origin_chat_title, last_downloaded_message_id,
                total_videos, downloaded_videos, created_at, updated_at
         FROM download_tasks WHERE origin_chat_id = $1",
    )
    .bind(origin_chat_id)
    .fetch_optional(pool)
    .await?;

    Ok(task)
}

/// Insert or refresh a download task; an existing row keeps its progress.
pub async fn upsert(pool: &SqlitePool, task: &DownloadTask) -> Result<()> {
    sqlx::query(
        "INSERT INTO download_tasks
           (origin_chat_id, origin_chat_title, last_downloaded_message_id,
            total_videos, downloaded_videos, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $6)
         ON CONFLICT(origin_chat_id) DO UPDATE SET
           origin_chat_title = excluded.origin_chat_title,
           updated_at = excluded.updated_at",
    )
    .bind(task.origin_chat_id)
    .bind(&task.origin_chat_title)
    .bind(task.last_downloaded_message_id)
    .bind(task.total_videos)
    .bind(task.downloaded_videos)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

/// Advance the video checkpoint and bump the downloaded counter.
/// The checkpoint is monotonic; a lower id is ignored.
pub async fn advance(pool: &SqlitePool, origin_chat_id: i64, message_id: i64) -> Result<()> {
    sqlx::query(
        "UPDATE download_tasks
         SET last_downloaded_message_id = MAX(last_downloaded_message_id, $1),
             downloaded_videos = downloaded_videos + 1,
             updated_at = $2
         WHERE origin_chat_id = $3",
    )
    .bind(message_id)
    .bind(Utc::now())
    .bind(origin_chat_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Overwrite the checkpoint, including downward (`--message-id M`).
pub async fn set_checkpoint(pool: &SqlitePool, origin_chat_id: i64, message_id: i64) -> Result<()> {
    sqlx::query(
        "UPDATE download_tasks
         SET last_downloaded_message_id = $1, updated_at = $2
         WHERE origin_chat_id = $3",
    )
    .bind(message_id)
    .bind(Utc::now())
    .bind(origin_chat_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Refresh the total-videos counter (may be stale between ticks).
pub async fn set_total_videos(pool: &SqlitePool, origin_chat_id: i64, total: i64) -> Result<()> {
    sqlx::query(
        "UPDATE download_tasks SET total_videos = $1, updated_at = $2 WHERE origin_chat_id = $3",
    )
    .bind(total)
    .bind(Utc::now())
    .bind(origin_chat_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Remove a download task (only on explicit `--restart`).
pub async fn delete(pool: &SqlitePool, origin_chat_id: i64) -> Result<()> {
    sqlx::query("DELETE FROM download_tasks WHERE origin_chat_id = $1")
        .bind(origin_chat_id)
        .execute(pool)
        .await?;

    Ok(())
}
