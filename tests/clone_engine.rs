//! Clone engine end-to-end scenarios against the scripted platform mock.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use clonechat::error::Error;
use clonechat::sync::{SyncEngine, SyncOptions};
use clonechat::tasks::{self, CloningStrategy};
use common::{test_config, test_db, text_message, video_message, Fail, MockMedia, MockTelegram};

const ORIGIN: i64 = -1001234567890;

fn engine_for(
    mock: Arc<MockTelegram>,
    media: Arc<MockMedia>,
    db: clonechat::database::Database,
    config: clonechat::Config,
) -> SyncEngine {
    SyncEngine::new(mock, media, db, config, CancellationToken::new())
}

fn options(origin: &str) -> SyncOptions {
    SyncOptions {
        origin: origin.to_string(),
        ..SyncOptions::default()
    }
}

#[tokio::test]
async fn fresh_clone_of_forwardable_source_delivers_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let messages = (1..=50).map(|id| text_message(ORIGIN, id)).collect();
    let mock = Arc::new(MockTelegram::new().with_source(ORIGIN, "My Channel", messages));
    let db = test_db().await;

    let engine = engine_for(
        mock.clone(),
        Arc::new(MockMedia::new()),
        db.clone(),
        test_config(dir.path()),
    );
    let report = engine.run(&options(&ORIGIN.to_string())).await.unwrap();

    assert_eq!(report.delivered, 50);
    assert_eq!(report.checkpoint, 50);

    // Strict ascending source-id order at the destination
    let delivered: Vec<i64> = mock
        .forwarded
        .lock()
        .unwrap()
        .iter()
        .map(|(_, id, _)| *id)
        .collect();
    assert_eq!(delivered, (1..=50).collect::<Vec<i64>>());

    let task = tasks::sync::get(db.pool(), ORIGIN).await.unwrap().unwrap();
    assert_eq!(task.last_synced_message_id, 50);
    assert_eq!(task.cloning_strategy, CloningStrategy::Forward);
    assert!(task.destination_chat_id.is_some());
}

#[tokio::test]
async fn rerun_after_completion_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let messages = (1..=10).map(|id| text_message(ORIGIN, id)).collect();
    let mock = Arc::new(MockTelegram::new().with_source(ORIGIN, "Chan", messages));
    let db = test_db().await;

    let engine = engine_for(
        mock.clone(),
        Arc::new(MockMedia::new()),
        db.clone(),
        test_config(dir.path()),
    );
    engine.run(&options(&ORIGIN.to_string())).await.unwrap();
    let first_count = mock.forwarded.lock().unwrap().len();

    let report = engine.run(&options(&ORIGIN.to_string())).await.unwrap();
    assert_eq!(report.delivered, 0);
    assert_eq!(mock.forwarded.lock().unwrap().len(), first_count);

    // Link file gained exactly two lines for the one real clone
    let links = std::fs::read_to_string(dir.path().join("links_canais.txt")).unwrap();
    assert_eq!(links.lines().count(), 2);
}

#[tokio::test]
async fn restricted_source_uses_download_upload_with_audio_extraction() {
    let dir = tempfile::tempdir().unwrap();
    let messages = (1..=10).map(|id| video_message(ORIGIN, id)).collect();
    let mock = Arc::new(MockTelegram::new().with_source(ORIGIN, "Protected", messages));
    mock.mark_restricted(ORIGIN);
    let media = Arc::new(MockMedia::new());
    let db = test_db().await;

    let engine = engine_for(mock.clone(), media.clone(), db.clone(), test_config(dir.path()));
    let report = engine
        .run(&SyncOptions {
            origin: ORIGIN.to_string(),
            extract_audio: true,
            ..SyncOptions::default()
        })
        .await
        .unwrap();

    assert_eq!(report.delivered, 10);
    assert!(mock.forwarded.lock().unwrap().is_empty());
    assert_eq!(mock.sent_media.lock().unwrap().len(), 10);

    let task = tasks::sync::get(db.pool(), ORIGIN).await.unwrap().unwrap();
    assert_eq!(task.cloning_strategy, CloningStrategy::DownloadUpload);

    // MP3 siblings survive; the staged videos were cleaned up after upload
    let extracted = media.extracted.lock().unwrap();
    assert_eq!(extracted.len(), 10);
    for audio in extracted.iter() {
        assert!(audio.exists(), "missing audio file {}", audio.display());
        assert!(!audio.with_extension("mp4").exists());
    }
}

#[tokio::test]
async fn no_audio_extraction_without_the_flag() {
    let dir = tempfile::tempdir().unwrap();
    let messages = (1..=3).map(|id| video_message(ORIGIN, id)).collect();
    let mock = Arc::new(MockTelegram::new().with_source(ORIGIN, "Protected", messages));
    mock.mark_restricted(ORIGIN);
    let media = Arc::new(MockMedia::new());
    let db = test_db().await;

    let engine = engine_for(mock, media.clone(), db, test_config(dir.path()));
    engine.run(&options(&ORIGIN.to_string())).await.unwrap();

    assert!(media.extracted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn crash_mid_clone_resumes_without_duplicates_or_gaps() {
    let dir = tempfile::tempdir().unwrap();
    let messages: Vec<_> = (1..=10).map(|id| text_message(ORIGIN, id)).collect();
    let mock = Arc::new(MockTelegram::new().with_source(ORIGIN, "Chan", messages));
    // Die on the 8th delivery, after 7 acknowledged
    mock.forward_failures.lock().unwrap().insert(8, Fail::Permanent);
    let db = test_db().await;

    let engine = engine_for(
        mock.clone(),
        Arc::new(MockMedia::new()),
        db.clone(),
        test_config(dir.path()),
    );
    let err = engine.run(&options(&ORIGIN.to_string())).await.unwrap_err();
    assert!(matches!(err, Error::Permanent(_)));

    let task = tasks::sync::get(db.pool(), ORIGIN).await.unwrap().unwrap();
    assert_eq!(task.last_synced_message_id, 7);

    // Restart: exactly 8..10 are delivered, nothing re-sent
    engine.run(&options(&ORIGIN.to_string())).await.unwrap();

    let delivered: Vec<i64> = mock
        .forwarded
        .lock()
        .unwrap()
        .iter()
        .map(|(_, id, _)| *id)
        .collect();
    assert_eq!(delivered, (1..=10).collect::<Vec<i64>>());

    let task = tasks::sync::get(db.pool(), ORIGIN).await.unwrap().unwrap();
    assert_eq!(task.last_synced_message_id, 10);
}

#[tokio::test]
async fn hidden_restriction_downgrades_strategy_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let messages = (1..=5).map(|id| video_message(ORIGIN, id)).collect();
    // Chat metadata looks forwardable; the restriction only surfaces on
    // the first forward attempt.
    let mock = Arc::new(MockTelegram::new().with_source(ORIGIN, "Sneaky", messages));
    mock.restricted_chats.lock().unwrap().insert(ORIGIN);
    let db = test_db().await;

    let engine = engine_for(
        mock.clone(),
        Arc::new(MockMedia::new()),
        db.clone(),
        test_config(dir.path()),
    );
    let report = engine.run(&options(&ORIGIN.to_string())).await.unwrap();

    assert_eq!(report.delivered, 5);
    assert!(mock.forwarded.lock().unwrap().is_empty());
    assert_eq!(mock.sent_media.lock().unwrap().len(), 5);

    let task = tasks::sync::get(db.pool(), ORIGIN).await.unwrap().unwrap();
    assert_eq!(task.cloning_strategy, CloningStrategy::DownloadUpload);
}

#[tokio::test(start_paused = true)]
async fn rate_limit_storm_is_absorbed_by_the_adapter() {
    let dir = tempfile::tempdir().unwrap();
    let messages = (1..=10).map(|id| text_message(ORIGIN, id)).collect();
    let mock = Arc::new(MockTelegram::new().with_source(ORIGIN, "Stormy", messages));
    *mock.flood_every.lock().unwrap() = Some((3, 5));
    let db = test_db().await;

    let start = tokio::time::Instant::now();
    let engine = engine_for(
        mock.clone(),
        Arc::new(MockMedia::new()),
        db,
        test_config(dir.path()),
    );
    let report = engine.run(&options(&ORIGIN.to_string())).await.unwrap();

    // No failure surfaced and nothing was lost
    assert_eq!(report.delivered, 10);

    // Every third call slept at least the instructed five seconds
    let floods = mock.calls_made() / 3;
    assert!(floods > 0);
    assert!(start.elapsed() >= Duration::from_secs(5) * floods as u32);
}

#[tokio::test]
async fn pins_are_replicated_oldest_first() {
    let dir = tempfile::tempdir().unwrap();
    let messages = (1..=5).map(|id| text_message(ORIGIN, id)).collect();
    let mock = Arc::new(MockTelegram::new().with_source(ORIGIN, "Pinned", messages));
    // Platform order is newest-first
    *mock.source_pins.lock().unwrap() = vec![4, 2];
    let db = test_db().await;

    let engine = engine_for(
        mock.clone(),
        Arc::new(MockMedia::new()),
        db,
        test_config(dir.path()),
    );
    let report = engine.run(&options(&ORIGIN.to_string())).await.unwrap();

    // Mock hands out destination ids 1..=n in delivery order, so source
    // id k maps to destination id k here.
    let pins = mock.pins_made.lock().unwrap().clone();
    assert_eq!(
        pins,
        vec![(report.destination_chat_id, 2), (report.destination_chat_id, 4)]
    );
}

#[tokio::test]
async fn batch_skips_bad_identifiers_and_completes_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let first = 12345i64;
    let second = 67890i64;
    let mock = Arc::new(
        MockTelegram::new()
            .with_source(first, "First", (1..=3).map(|id| text_message(first, id)).collect())
            .with_source(second, "Second", (1..=4).map(|id| text_message(second, id)).collect()),
    );
    let db = test_db().await;

    let batch_file = dir.path().join("batch.txt");
    std::fs::write(&batch_file, "12345\nnot-a-chat\n67890\n").unwrap();

    let engine = engine_for(
        mock.clone(),
        Arc::new(MockMedia::new()),
        db.clone(),
        test_config(dir.path()),
    );
    engine
        .run_batch(&batch_file, &SyncOptions::default())
        .await
        .unwrap();

    let first_task = tasks::sync::get(db.pool(), first).await.unwrap().unwrap();
    let second_task = tasks::sync::get(db.pool(), second).await.unwrap().unwrap();
    assert_eq!(first_task.last_synced_message_id, 3);
    assert_eq!(second_task.last_synced_message_id, 4);
    assert_eq!(mock.forwarded.lock().unwrap().len(), 7);
}

#[tokio::test]
async fn leave_origin_and_publish_link_side_effects() {
    let dir = tempfile::tempdir().unwrap();
    let announce = -1009999i64;
    let mock = Arc::new(
        MockTelegram::new()
            .with_source(ORIGIN, "Chan", (1..=2).map(|id| text_message(ORIGIN, id)).collect())
            .with_source(announce, "Announcements", Vec::new()),
    );
    let db = test_db().await;

    let engine = engine_for(
        mock.clone(),
        Arc::new(MockMedia::new()),
        db,
        test_config(dir.path()),
    );
    engine
        .run(&SyncOptions {
            origin: ORIGIN.to_string(),
            leave_origin: true,
            publish_to: Some(announce.to_string()),
            topic: Some(7),
            ..SyncOptions::default()
        })
        .await
        .unwrap();

    assert_eq!(mock.left_chats.lock().unwrap().as_slice(), &[ORIGIN]);
    let texts = mock.sent_texts.lock().unwrap();
    let announcement = texts.iter().find(|(chat, _, _)| *chat == announce).unwrap();
    assert!(announcement.1.contains("https://t.me/c/"));
    assert_eq!(announcement.2, Some(7));
}
