//! Store operations for clone tasks

use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::Result;
use crate::tasks::models::{CloningStrategy, SyncTask};

/// Fetch a clone task by origin chat id.
pub async fn get(pool: &SqlitePool, origin_chat_id: i64) -> Result<Option<SyncTask>> {
    let task = sqlx::query_as::<_, SyncTask>(
        "SELECT origin_chat_id, origin_chat_title, destination_chat_id, cloning_strategy,
                last_synced_message_id, created_at, updated_at
         FROM sync_tasks WHERE origin_chat_id = $1",
    )
    .bind(origin_chat_id)
    .fetch_optional(pool)
    .await?;

    Ok(task)
}

/// Insert or update a clone task.
///
/// Creation is idempotent: an existing row keeps its checkpoint and
/// strategy (strategy is sticky once chosen), but title and destination
/// are refreshed.
pub async fn upsert(pool: &SqlitePool, task: &SyncTask) -> Result<()> {
    sqlx::query(
        "INSERT INTO sync_tasks
           (origin_chat_id, origin_chat_title, destination_chat_id, cloning_strategy,
            last_synced_message_id, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $6)
         ON CONFLICT(origin_chat_id) DO UPDATE SET
           origin_chat_title = excluded.origin_chat_title,
           destination_chat_id = COALESCE(excluded.destination_chat_id, destination_chat_id),
           updated_at = excluded.updated_at",
    )
    .bind(task.origin_chat_id)
    .bind(&task.origin_chat_title)
    .bind(task.destination_chat_id)
    .bind(task.cloning_strategy)
    .bind(task.last_synced_message_id)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

/// Advance the checkpoint. Monotonic: a lower id is ignored.
pub async fn advance(pool: &SqlitePool, origin_chat_id: i64, message_id: i64) -> Result<()> {
    sqlx::query(
        "UPDATE sync_tasks
         SET last_synced_message_id = MAX(last_synced_message_id, $1), updated_at = $2
         WHERE origin_chat_id = $3",
    )
    .bind(message_id)
    .bind(Utc::now())
    .bind(origin_chat_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Record the destination chat once it is created or supplied.
pub async fn set_destination(pool: &SqlitePool, origin_chat_id: i64, destination: i64) -> Result<()> {
    sqlx::query(
        "UPDATE sync_tasks SET destination_chat_id = $1, updated_at = $2 WHERE origin_chat_id = $3",
    )
    .bind(destination)
    .bind(Utc::now())
    .bind(origin_chat_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Record the one allowed strategy transition (forward -> download_upload
/// on restricted content).
pub async fn set_strategy(
    pool: &SqlitePool,
    origin_chat_id: i64,
    strategy: CloningStrategy,
) -> Result<()> {
    sqlx::query(
        "UPDATE sync_tasks SET cloning_strategy = $1, updated_at = $2 WHERE origin_chat_id = $3",
    )
    .bind(strategy)
    .bind(Utc::now())
    .bind(origin_chat_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Remove a clone task (only on explicit `--restart`).
pub async fn delete(pool: &SqlitePool, origin_chat_id: i64) -> Result<()> {
    sqlx::query("DELETE FROM sync_tasks WHERE origin_chat_id = $1")
        .bind(origin_chat_id)
        .execute(pool)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;

    async fn test_db() -> Database {
        let db = Database::connect_in_memory().await.unwrap();
        db.ensure_schema().await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let db = test_db().await;
        let task = SyncTask::new(-100123, "My Channel", CloningStrategy::Forward);
        upsert(db.pool(), &task).await.unwrap();

        let loaded = get(db.pool(), -100123).await.unwrap().unwrap();
        assert_eq!(loaded.origin_chat_title, "My Channel");
        assert_eq!(loaded.cloning_strategy, CloningStrategy::Forward);
        assert_eq!(loaded.last_synced_message_id, 0);
    }

    #[tokio::test]
    async fn test_upsert_preserves_checkpoint_and_strategy() {
        let db = test_db().await;
        let task = SyncTask::new(-1, "a", CloningStrategy::DownloadUpload);
        upsert(db.pool(), &task).await.unwrap();
        advance(db.pool(), -1, 42).await.unwrap();

        // Re-creating the same task must not reset progress or strategy
        let again = SyncTask::new(-1, "renamed", CloningStrategy::Forward);
        upsert(db.pool(), &again).await.unwrap();

        let loaded = get(db.pool(), -1).await.unwrap().unwrap();
        assert_eq!(loaded.last_synced_message_id, 42);
        assert_eq!(loaded.cloning_strategy, CloningStrategy::DownloadUpload);
        assert_eq!(loaded.origin_chat_title, "renamed");
    }

    #[tokio::test]
    async fn test_advance_is_monotonic() {
        let db = test_db().await;
        upsert(db.pool(), &SyncTask::new(-1, "a", CloningStrategy::Forward))
            .await
            .unwrap();

        advance(db.pool(), -1, 10).await.unwrap();
        advance(db.pool(), -1, 7).await.unwrap();

        let loaded = get(db.pool(), -1).await.unwrap().unwrap();
        assert_eq!(loaded.last_synced_message_id, 10);
    }

    #[tokio::test]
    async fn test_delete() {
        let db = test_db().await;
        upsert(db.pool(), &SyncTask::new(-1, "a", CloningStrategy::Forward))
            .await
            .unwrap();
        delete(db.pool(), -1).await.unwrap();
        assert!(get(db.pool(), -1).await.unwrap().is_none());
    }
}
