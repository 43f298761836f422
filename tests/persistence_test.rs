//! Integration tests for the translation/SRS persistence layer, exercised
//! through the `hanzi_tutor` library crate against an in-memory SQLite pool.
//! Grounded in `AuroraMackenzie-Xenobot`'s `crates/api/tests/database_test.rs`
//! (static `Migrator`, `SqlitePoolOptions`, `#[tokio::test]`).

use sqlx::migrate::Migrator;
use sqlx::sqlite::SqlitePoolOptions;

use hanzi_tutor::domain::{Grade, SegmentResult, TranslationStatus, VocabStatus};
use hanzi_tutor::store::Store;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

async fn setup_store() -> Store {
  let pool = SqlitePoolOptions::new()
    .max_connections(1)
    .connect("sqlite::memory:")
    .await
    .expect("in-memory pool");
  MIGRATOR.run(&pool).await.expect("run migrations");
  Store { pool }
}

#[tokio::test]
async fn create_translation_starts_pending_with_zero_progress() {
  let store = setup_store().await;
  let t = store.create_translation("你好，世界。", "paste").await.unwrap();
  assert_eq!(t.status, TranslationStatus::Pending);
  assert_eq!(t.progress, 0);
  assert_eq!(t.total, 0);
}

#[tokio::test]
async fn claim_job_excludes_concurrent_claimants() {
  let store = setup_store().await;
  let t = store.create_translation("你好", "paste").await.unwrap();
  let lease = chrono::Duration::seconds(30);

  let first = store.claim_job(&t.id, lease).await.unwrap();
  let second = store.claim_job(&t.id, lease).await.unwrap();
  assert!(first, "first claimant should win the lease");
  assert!(!second, "second claimant must be excluded while the lease is live");
}

#[tokio::test]
async fn add_progress_segment_is_atomic_and_ordered() {
  let store = setup_store().await;
  let t = store.create_translation("你好世界", "paste").await.unwrap();
  store.set_processing(&t.id, 2, 1).await.unwrap();

  for (i, (segment, pinyin, english)) in
    [("你好", "nǐ hǎo", "hello"), ("世界", "shì jiè", "world")].into_iter().enumerate()
  {
    let result = SegmentResult {
      translation_id: t.id.clone(),
      index: i as i64,
      sentence_index: 0,
      segment: segment.into(),
      pinyin: pinyin.into(),
      english: english.into(),
    };
    let (progress, total) = store.add_progress_segment(&t.id, &result, 0).await.unwrap();
    assert_eq!(progress, i as i64 + 1);
    assert_eq!(total, 2);
  }

  let snapshot = store.get_progress_snapshot(&t.id).await.unwrap().unwrap();
  assert_eq!(snapshot.results.len(), 2);
  assert_eq!(snapshot.results[0].segment, "你好");
  assert_eq!(snapshot.results[1].segment, "世界");
}

#[tokio::test]
async fn list_restartable_excludes_terminal_translations() {
  let store = setup_store().await;
  let pending = store.create_translation("你好", "paste").await.unwrap();
  let done = store.create_translation("再见", "paste").await.unwrap();
  store.complete_translation(&done.id, Some("goodbye")).await.unwrap();

  let restartable = store.list_restartable().await.unwrap();
  assert!(restartable.contains(&pending.id));
  assert!(!restartable.contains(&done.id));
}

#[tokio::test]
async fn save_vocab_is_idempotent_and_seeds_default_srs_state() {
  let store = setup_store().await;
  let (id1, deduped1) = store.save_vocab("你好", "nǐ hǎo", "hello", None, VocabStatus::Learning).await.unwrap();
  let (id2, deduped2) = store.save_vocab("你好", "nǐ hǎo", "hello", None, VocabStatus::Learning).await.unwrap();
  assert_eq!(id1, id2);
  assert!(!deduped1);
  assert!(deduped2);

  let state = store.get_srs_state(&id1).await.unwrap().unwrap();
  assert_eq!(state.repetitions, 0);
  assert_eq!(state.ease_factor, 2.5);
}

#[tokio::test]
async fn answering_good_advances_schedule_and_due_queue() {
  let store = setup_store().await;
  let (id, _) = store.save_vocab("谢谢", "xiè xie", "thanks", None, VocabStatus::Learning).await.unwrap();

  assert_eq!(store.due_count().await.unwrap(), 1);
  let (state, remaining) = store.answer(&id, Grade::Good).await.unwrap();
  assert_eq!(state.repetitions, 1);
  assert_eq!(state.interval_days, 1);
  // The next due_at is now in the future, so it drops out of the due queue.
  assert_eq!(remaining, 0);
}
