//! Integration tests for `JobManager` against an in-memory store, exercised
//! through the `hanzi_tutor` library crate. Grounded in
//! `AuroraMackenzie-Xenobot`'s `crates/api/tests/database_test.rs` pattern
//! for pool setup; no provider is wired (no corpus precedent exists for
//! mocking the upstream LLM), so these cover the deterministic parts of the
//! pipeline: lease claiming, the no-provider failure path, and the
//! crash-recovery resume sweep.

use std::sync::Arc;

use sqlx::migrate::Migrator;
use sqlx::sqlite::SqlitePoolOptions;

use hanzi_tutor::config::{AppConfig, PromptConfig};
use hanzi_tutor::dictionary::Dictionary;
use hanzi_tutor::domain::TranslationStatus;
use hanzi_tutor::jobs::JobManager;
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

fn test_config() -> Arc<AppConfig> {
  Arc::new(AppConfig {
    port: 0,
    llm_base_url: "https://api.openai.com/v1".into(),
    llm_api_key: String::new(),
    llm_model: "gpt-4o-mini".into(),
    session_secret: "test-secret".into(),
    app_password: String::new(),
    db_path: ":memory:".into(),
    cedict_path: "/nonexistent/cedict.u8".into(),
    debug: true,
    session_ttl_hours: 1,
    lease_seconds: 30,
    segment_pause_ms: 0,
    provider_timeout_secs: 5,
    prompts: PromptConfig::default(),
  })
}

fn test_manager(store: Store) -> JobManager {
  let dictionary = Arc::new(Dictionary::load("/nonexistent/cedict.u8"));
  JobManager::new(store, dictionary, None, test_config())
}

#[tokio::test]
async fn start_processing_without_a_provider_fails_the_job() {
  let store = setup_store().await;
  let manager = test_manager(store.clone());

  let t = store.create_translation("你好世界", "paste").await.unwrap();
  manager.start_processing(t.id.clone()).await;

  // start_processing spawns the worker; give it a tick to run.
  tokio::time::sleep(std::time::Duration::from_millis(50)).await;

  let updated = store.get_translation(&t.id).await.unwrap().unwrap();
  assert_eq!(updated.status, TranslationStatus::Failed);
  assert_eq!(updated.error_message.as_deref(), Some("translation provider is not configured"));
}

#[tokio::test]
async fn start_processing_is_a_no_op_for_a_terminal_translation() {
  let store = setup_store().await;
  let manager = test_manager(store.clone());

  let t = store.create_translation("你好", "paste").await.unwrap();
  store.complete_translation(&t.id, Some("hello")).await.unwrap();

  manager.start_processing(t.id.clone()).await;
  tokio::time::sleep(std::time::Duration::from_millis(20)).await;

  let updated = store.get_translation(&t.id).await.unwrap().unwrap();
  assert_eq!(updated.status, TranslationStatus::Completed);
  assert_eq!(updated.full_translation.as_deref(), Some("hello"));
}

#[tokio::test]
async fn resume_restartable_jobs_sweeps_every_pending_row() {
  let store = setup_store().await;
  let manager = test_manager(store.clone());

  let a = store.create_translation("你好", "paste").await.unwrap();
  let b = store.create_translation("再见", "paste").await.unwrap();

  manager.resume_restartable_jobs().await;
  tokio::time::sleep(std::time::Duration::from_millis(50)).await;

  for id in [a.id, b.id] {
    let updated = store.get_translation(&id).await.unwrap().unwrap();
    assert_eq!(updated.status, TranslationStatus::Failed);
  }
}

#[tokio::test]
async fn start_update_without_a_provider_fails_the_job_like_start_processing() {
  let store = setup_store().await;
  let manager = test_manager(store.clone());

  let t = store.create_translation("你好。世界。", "paste").await.unwrap();
  manager.start_update(t.id.clone(), 1).await;

  tokio::time::sleep(std::time::Duration::from_millis(50)).await;

  let updated = store.get_translation(&t.id).await.unwrap().unwrap();
  assert_eq!(updated.status, TranslationStatus::Failed);
  assert_eq!(updated.error_message.as_deref(), Some("translation provider is not configured"));
}
