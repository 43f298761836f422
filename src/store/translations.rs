//! Translation + SegmentResult persistence operations (spec §4.D).

use chrono::{DateTime, Utc};
use sqlx::{FromRow, Row};

use crate::domain::{SegmentResult, Translation, TranslationStatus};
use crate::error::StoreError;

use super::Store;

#[derive(FromRow)]
struct TranslationRow {
  id: String,
  input_text: String,
  source_type: String,
  status: String,
  progress: i64,
  total: i64,
  sentence_count: i64,
  full_translation: Option<String>,
  error_message: Option<String>,
  lease_expires_at: Option<DateTime<Utc>>,
  created_at: DateTime<Utc>,
  updated_at: DateTime<Utc>,
}

impl From<TranslationRow> for Translation {
  fn from(r: TranslationRow) -> Self {
    Translation {
      id: r.id,
      input_text: r.input_text,
      source_type: r.source_type,
      status: TranslationStatus::from_str(&r.status),
      progress: r.progress,
      total: r.total,
      sentence_count: r.sentence_count,
      full_translation: r.full_translation,
      error_message: r.error_message,
      lease_expires_at: r.lease_expires_at,
      created_at: r.created_at,
      updated_at: r.updated_at,
    }
  }
}

#[derive(FromRow)]
struct SegmentRow {
  translation_id: String,
  idx: i64,
  sentence_index: i64,
  segment: String,
  pinyin: String,
  english: String,
}

impl From<SegmentRow> for SegmentResult {
  fn from(r: SegmentRow) -> Self {
    SegmentResult {
      translation_id: r.translation_id,
      index: r.idx,
      sentence_index: r.sentence_index,
      segment: r.segment,
      pinyin: r.pinyin,
      english: r.english,
    }
  }
}

/// Snapshot used by the Progress stream and the detail endpoint.
pub struct ProgressSnapshot {
  pub status: TranslationStatus,
  pub current: i64,
  pub total: i64,
  pub results: Vec<SegmentResult>,
  pub error: Option<String>,
  pub full_translation: Option<String>,
}

impl Store {
  #[tracing::instrument(level = "info", target = "persistence", skip(self, input_text))]
  pub async fn create_translation(&self, input_text: &str, source_type: &str) -> Result<Translation, StoreError> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = Utc::now();
    sqlx::query(
      "INSERT INTO translations (id, input_text, source_type, status, progress, total, sentence_count, created_at, updated_at)
       VALUES (?, ?, ?, 'pending', 0, 0, 0, ?, ?)",
    )
    .bind(&id)
    .bind(input_text)
    .bind(source_type)
    .bind(now)
    .bind(now)
    .execute(&self.pool)
    .await?;

    self.get_translation(&id).await?.ok_or(StoreError::NotFound)
  }

  pub async fn get_translation(&self, id: &str) -> Result<Option<Translation>, StoreError> {
    let row = sqlx::query_as::<_, TranslationRow>("SELECT * FROM translations WHERE id = ?")
      .bind(id)
      .fetch_optional(&self.pool)
      .await?;
    Ok(row.map(Translation::from))
  }

  pub async fn list_translations(&self, limit: i64) -> Result<Vec<Translation>, StoreError> {
    let rows = sqlx::query_as::<_, TranslationRow>("SELECT * FROM translations ORDER BY created_at DESC LIMIT ?")
      .bind(limit)
      .fetch_all(&self.pool)
      .await?;
    Ok(rows.into_iter().map(Translation::from).collect())
  }

  pub async fn delete_translation(&self, id: &str) -> Result<(), StoreError> {
    sqlx::query("DELETE FROM translations WHERE id = ?").bind(id).execute(&self.pool).await?;
    Ok(())
  }

  /// Any row with `status ∈ {pending, processing}` and an absent or expired
  /// lease (spec §4.D / §4.E crash recovery).
  pub async fn list_restartable(&self) -> Result<Vec<String>, StoreError> {
    let rows = sqlx::query(
      "SELECT id FROM translations
       WHERE status IN ('pending', 'processing')
         AND (lease_expires_at IS NULL OR lease_expires_at < ?)",
    )
    .bind(Utc::now())
    .fetch_all(&self.pool)
    .await?;
    Ok(rows.into_iter().map(|r| r.get::<String, _>("id")).collect())
  }

  /// Atomic conditional write: sets `lease_expires_at = now + d` only if the
  /// current lease is absent or expired. At most one concurrent caller
  /// observes `claimed = true` for a given id (spec §4.D, §8 claim
  /// exclusion).
  #[tracing::instrument(level = "info", target = "persistence", skip(self))]
  pub async fn claim_job(&self, id: &str, lease_duration: chrono::Duration) -> Result<bool, StoreError> {
    let now = Utc::now();
    let expires = now + lease_duration;
    let result = sqlx::query(
      "UPDATE translations
       SET lease_expires_at = ?, updated_at = ?
       WHERE id = ?
         AND status IN ('pending', 'processing')
         AND (lease_expires_at IS NULL OR lease_expires_at < ?)",
    )
    .bind(expires)
    .bind(now)
    .bind(id)
    .bind(now)
    .execute(&self.pool)
    .await?;
    Ok(result.rows_affected() == 1)
  }

  pub async fn set_processing(&self, id: &str, total: i64, sentence_count: i64) -> Result<(), StoreError> {
    sqlx::query(
      "UPDATE translations SET status = 'processing', total = ?, sentence_count = ?, updated_at = ? WHERE id = ?",
    )
    .bind(total)
    .bind(sentence_count)
    .bind(Utc::now())
    .bind(id)
    .execute(&self.pool)
    .await?;
    Ok(())
  }

  /// Atomically inserts the segment row, increments `progress`, and reads
  /// back `(progress, total)` within a single transaction (spec §4.D
  /// atomicity contract).
  #[tracing::instrument(level = "info", target = "persistence", skip(self, result), fields(%id, sentence_index))]
  pub async fn add_progress_segment(
    &self,
    id: &str,
    result: &SegmentResult,
    sentence_index: i64,
  ) -> Result<(i64, i64), StoreError> {
    let mut tx = self.pool.begin().await?;

    sqlx::query(
      "INSERT INTO segment_results (translation_id, idx, sentence_index, segment, pinyin, english)
       VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(result.index)
    .bind(sentence_index)
    .bind(&result.segment)
    .bind(&result.pinyin)
    .bind(&result.english)
    .execute(&mut *tx)
    .await?;

    sqlx::query("UPDATE translations SET progress = progress + 1, updated_at = ? WHERE id = ?")
      .bind(Utc::now())
      .bind(id)
      .execute(&mut *tx)
      .await?;

    let row = sqlx::query("SELECT progress, total FROM translations WHERE id = ?")
      .bind(id)
      .fetch_one(&mut *tx)
      .await?;
    let progress: i64 = row.get("progress");
    let total: i64 = row.get("total");

    tx.commit().await?;
    Ok((progress, total))
  }

  pub async fn complete_translation(&self, id: &str, full_translation: Option<&str>) -> Result<(), StoreError> {
    sqlx::query("UPDATE translations SET status = 'completed', full_translation = ?, updated_at = ? WHERE id = ?")
      .bind(full_translation)
      .bind(Utc::now())
      .bind(id)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  pub async fn fail_translation(&self, id: &str, msg: &str) -> Result<(), StoreError> {
    sqlx::query("UPDATE translations SET status = 'failed', error_message = ?, updated_at = ? WHERE id = ?")
      .bind(msg)
      .bind(Utc::now())
      .bind(id)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  pub async fn get_progress_snapshot(&self, id: &str) -> Result<Option<ProgressSnapshot>, StoreError> {
    let t = match self.get_translation(id).await? {
      Some(t) => t,
      None => return Ok(None),
    };
    let rows = sqlx::query_as::<_, SegmentRow>(
      "SELECT * FROM segment_results WHERE translation_id = ? ORDER BY idx ASC",
    )
    .bind(id)
    .fetch_all(&self.pool)
    .await?;
    Ok(Some(ProgressSnapshot {
      status: t.status,
      current: t.progress,
      total: t.total,
      results: rows.into_iter().map(SegmentResult::from).collect(),
      error: t.error_message,
      full_translation: t.full_translation,
    }))
  }

  /// Counts the segment rows belonging to sentences before `sentence_index`,
  /// i.e. the global base index a replacement for that sentence must start
  /// from to keep `index` "global, 0-based, dense" (spec §3) instead of
  /// colliding with an earlier sentence's rows under `(translation_id, idx)`.
  pub async fn count_segments_before_sentence(&self, id: &str, sentence_index: i64) -> Result<i64, StoreError> {
    let row = sqlx::query("SELECT COUNT(*) AS c FROM segment_results WHERE translation_id = ? AND sentence_index < ?")
      .bind(id)
      .bind(sentence_index)
      .fetch_one(&self.pool)
      .await?;
    Ok(row.get("c"))
  }

  /// Atomically replaces all segment rows for one `sentence_index`, used by
  /// a full-paragraph re-translate or a PATCH append.
  #[tracing::instrument(level = "info", target = "persistence", skip(self, results), fields(%id, sentence_index, count = results.len()))]
  pub async fn update_segments_for_sentence(
    &self,
    id: &str,
    sentence_index: i64,
    results: &[SegmentResult],
  ) -> Result<(), StoreError> {
    let mut tx = self.pool.begin().await?;

    sqlx::query("DELETE FROM segment_results WHERE translation_id = ? AND sentence_index = ?")
      .bind(id)
      .bind(sentence_index)
      .execute(&mut *tx)
      .await?;

    for r in results {
      sqlx::query(
        "INSERT INTO segment_results (translation_id, idx, sentence_index, segment, pinyin, english)
         VALUES (?, ?, ?, ?, ?, ?)",
      )
      .bind(id)
      .bind(r.index)
      .bind(sentence_index)
      .bind(&r.segment)
      .bind(&r.pinyin)
      .bind(&r.english)
      .execute(&mut *tx)
      .await?;
    }

    tx.commit().await?;
    Ok(())
  }

  /// Stores (or replaces) the fingerprint used to detect no-op PATCH edits.
  pub async fn set_sentence_fingerprint(&self, id: &str, sentence_index: i64, fingerprint: &str) -> Result<(), StoreError> {
    sqlx::query(
      "INSERT INTO sentence_hashes (translation_id, sentence_index, fingerprint) VALUES (?, ?, ?)
       ON CONFLICT (translation_id, sentence_index) DO UPDATE SET fingerprint = excluded.fingerprint",
    )
    .bind(id)
    .bind(sentence_index)
    .bind(fingerprint)
    .execute(&self.pool)
    .await?;
    Ok(())
  }

  pub async fn get_sentence_fingerprints(&self, id: &str) -> Result<Vec<(i64, String)>, StoreError> {
    let rows = sqlx::query("SELECT sentence_index, fingerprint FROM sentence_hashes WHERE translation_id = ? ORDER BY sentence_index ASC")
      .bind(id)
      .fetch_all(&self.pool)
      .await?;
    Ok(rows.into_iter().map(|r| (r.get("sentence_index"), r.get("fingerprint"))).collect())
  }

  /// Deletes every persisted segment row (and fingerprint) for
  /// `sentence_index >= from`, then sets `progress` to the number of rows
  /// that remain, atomically. Used by a PATCH edit that only touches
  /// sentences from `from` onward: the job manager can then resume tail
  /// processing at exactly this offset without re-deriving it (spec §4.D
  /// `UpdateSegmentsForSentence` / §8 scenario 4 "prior segments untouched
  /// for unchanged sentences").
  #[tracing::instrument(level = "info", target = "persistence", skip(self), fields(%id, from))]
  pub async fn truncate_from_sentence(&self, id: &str, from: i64) -> Result<i64, StoreError> {
    let mut tx = self.pool.begin().await?;

    sqlx::query("DELETE FROM segment_results WHERE translation_id = ? AND sentence_index >= ?")
      .bind(id)
      .bind(from)
      .execute(&mut *tx)
      .await?;
    sqlx::query("DELETE FROM sentence_hashes WHERE translation_id = ? AND sentence_index >= ?")
      .bind(id)
      .bind(from)
      .execute(&mut *tx)
      .await?;

    let row = sqlx::query("SELECT COUNT(*) AS c FROM segment_results WHERE translation_id = ?").bind(id).fetch_one(&mut *tx).await?;
    let remaining: i64 = row.get("c");

    sqlx::query("UPDATE translations SET progress = ?, updated_at = ? WHERE id = ?")
      .bind(remaining)
      .bind(Utc::now())
      .bind(id)
      .execute(&mut *tx)
      .await?;

    tx.commit().await?;
    Ok(remaining)
  }

  /// Resets a translation to `pending` so the job manager re-enters the
  /// pipeline from scratch, used by `update_source` when the diff touches
  /// at least one sentence.
  pub async fn reset_to_pending(&self, id: &str, new_input_text: &str) -> Result<(), StoreError> {
    sqlx::query(
      "UPDATE translations SET status = 'pending', input_text = ?, lease_expires_at = NULL, updated_at = ? WHERE id = ?",
    )
    .bind(new_input_text)
    .bind(Utc::now())
    .bind(id)
    .execute(&self.pool)
    .await?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::test_store;

  #[tokio::test]
  async fn create_and_get_roundtrip() {
    let store = test_store().await;
    let t = store.create_translation("你好世界", "paste").await.unwrap();
    assert_eq!(t.status, TranslationStatus::Pending);
    let fetched = store.get_translation(&t.id).await.unwrap().unwrap();
    assert_eq!(fetched.input_text, "你好世界");
  }

  #[tokio::test]
  async fn claim_job_is_exclusive() {
    let store = test_store().await;
    let t = store.create_translation("你好", "paste").await.unwrap();
    let lease = chrono::Duration::seconds(30);
    let first = store.claim_job(&t.id, lease).await.unwrap();
    let second = store.claim_job(&t.id, lease).await.unwrap();
    assert!(first);
    assert!(!second);
  }

  #[tokio::test]
  async fn add_progress_segment_increments_atomically() {
    let store = test_store().await;
    let t = store.create_translation("你好世界", "paste").await.unwrap();
    store.set_processing(&t.id, 2, 1).await.unwrap();

    let r0 = SegmentResult {
      translation_id: t.id.clone(),
      index: 0,
      sentence_index: 0,
      segment: "你好".into(),
      pinyin: "nǐ hǎo".into(),
      english: "hello".into(),
    };
    let (progress, total) = store.add_progress_segment(&t.id, &r0, 0).await.unwrap();
    assert_eq!(progress, 1);
    assert_eq!(total, 2);
  }

  #[tokio::test]
  async fn truncate_from_sentence_keeps_prefix_and_resets_progress() {
    let store = test_store().await;
    let t = store.create_translation("你好。世界。", "paste").await.unwrap();
    store.set_processing(&t.id, 2, 2).await.unwrap();

    let r0 = SegmentResult { translation_id: t.id.clone(), index: 0, sentence_index: 0, segment: "你好".into(), pinyin: "nǐ hǎo".into(), english: "hello".into() };
    store.add_progress_segment(&t.id, &r0, 0).await.unwrap();
    let r1 = SegmentResult { translation_id: t.id.clone(), index: 1, sentence_index: 1, segment: "世界".into(), pinyin: "shì jiè".into(), english: "world".into() };
    store.add_progress_segment(&t.id, &r1, 1).await.unwrap();

    let remaining = store.truncate_from_sentence(&t.id, 1).await.unwrap();
    assert_eq!(remaining, 1);

    let snapshot = store.get_progress_snapshot(&t.id).await.unwrap().unwrap();
    assert_eq!(snapshot.results.len(), 1);
    assert_eq!(snapshot.results[0].segment, "你好");
    assert_eq!(snapshot.current, 1);
  }

  #[tokio::test]
  async fn list_restartable_finds_pending_and_processing() {
    let store = test_store().await;
    let t = store.create_translation("你好", "paste").await.unwrap();
    let restartable = store.list_restartable().await.unwrap();
    assert!(restartable.contains(&t.id));
  }
}
