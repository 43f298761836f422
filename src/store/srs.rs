//! SRS persistence operations (spec §4.D "SRS:" operations list).

use chrono::{DateTime, Utc};
use sqlx::{FromRow, Row};

use crate::domain::{Grade, ReviewCard, SrsState, VocabItem, VocabStatus};
use crate::error::StoreError;
use crate::srs;

use super::Store;

#[derive(FromRow)]
struct VocabRow {
  id: String,
  headword: String,
  pinyin: String,
  english: String,
  snippet: Option<String>,
  status: String,
  created_at: DateTime<Utc>,
}

impl From<VocabRow> for VocabItem {
  fn from(r: VocabRow) -> Self {
    VocabItem {
      id: r.id,
      headword: r.headword,
      pinyin: r.pinyin,
      english: r.english,
      snippet: r.snippet,
      status: VocabStatus::from_str(&r.status),
      created_at: r.created_at,
    }
  }
}

#[derive(FromRow)]
struct SrsRow {
  vocab_item_id: String,
  ease_factor: f64,
  interval_days: i64,
  repetitions: i64,
  due_at: DateTime<Utc>,
  last_grade: Option<i64>,
  last_reviewed_at: Option<DateTime<Utc>>,
  lookup_count: i64,
  last_lookup_at: Option<DateTime<Utc>>,
}

impl From<SrsRow> for SrsState {
  fn from(r: SrsRow) -> Self {
    SrsState {
      vocab_item_id: r.vocab_item_id,
      ease_factor: r.ease_factor,
      interval_days: r.interval_days,
      repetitions: r.repetitions,
      due_at: r.due_at,
      last_grade: r.last_grade,
      last_reviewed_at: r.last_reviewed_at,
      lookup_count: r.lookup_count,
      last_lookup_at: r.last_lookup_at,
    }
  }
}

/// Bulk projection used by `GET /api/vocab/srs-info`.
pub struct SrsInfo {
  pub headword: String,
  pub pinyin: String,
  pub english: String,
  pub status: VocabStatus,
  pub opacity: f64,
  pub is_struggling: bool,
}

impl Store {
  /// Saves a headword. `status` defaults to `learning` on first save. Returns
  /// `(vocab_item_id, deduplicated)`.
  #[tracing::instrument(level = "info", target = "persistence", skip(self, pinyin, english, snippet), fields(%headword))]
  pub async fn save_vocab(
    &self,
    headword: &str,
    pinyin: &str,
    english: &str,
    snippet: Option<&str>,
    status: VocabStatus,
  ) -> Result<(String, bool), StoreError> {
    if let Some(existing) = self.get_vocab_by_headword(headword).await? {
      return Ok((existing.id, true));
    }

    let id = uuid::Uuid::new_v4().to_string();
    let now = Utc::now();
    sqlx::query("INSERT INTO vocab_items (id, headword, pinyin, english, snippet, status, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)")
      .bind(&id)
      .bind(headword)
      .bind(pinyin)
      .bind(english)
      .bind(snippet)
      .bind(status.as_str())
      .bind(now)
      .execute(&self.pool)
      .await?;

    sqlx::query(
      "INSERT INTO srs_states (vocab_item_id, ease_factor, interval_days, repetitions, due_at, lookup_count)
       VALUES (?, 2.5, 0, 0, ?, 0)",
    )
    .bind(&id)
    .bind(now)
    .execute(&self.pool)
    .await?;

    Ok((id, false))
  }

  pub async fn get_vocab_by_headword(&self, headword: &str) -> Result<Option<VocabItem>, StoreError> {
    let row = sqlx::query_as::<_, VocabRow>("SELECT * FROM vocab_items WHERE headword = ?")
      .bind(headword)
      .fetch_optional(&self.pool)
      .await?;
    Ok(row.map(VocabItem::from))
  }

  pub async fn get_vocab(&self, id: &str) -> Result<Option<VocabItem>, StoreError> {
    let row = sqlx::query_as::<_, VocabRow>("SELECT * FROM vocab_items WHERE id = ?")
      .bind(id)
      .fetch_optional(&self.pool)
      .await?;
    Ok(row.map(VocabItem::from))
  }

  pub async fn get_srs_state(&self, vocab_item_id: &str) -> Result<Option<SrsState>, StoreError> {
    let row = sqlx::query_as::<_, SrsRow>("SELECT * FROM srs_states WHERE vocab_item_id = ?")
      .bind(vocab_item_id)
      .fetch_optional(&self.pool)
      .await?;
    Ok(row.map(SrsState::from))
  }

  /// `learning <-> known` on explicit user action; `known` zeroes opacity
  /// (via `srs::opacity`'s status check), re-entering `learning` restores
  /// default opacity=1 by clearing the struggling/decay signals that would
  /// otherwise carry over from before the item was marked known (spec §4.G
  /// status transitions).
  pub async fn set_status(&self, vocab_item_id: &str, status: VocabStatus) -> Result<(), StoreError> {
    sqlx::query("UPDATE vocab_items SET status = ? WHERE id = ?")
      .bind(status.as_str())
      .bind(vocab_item_id)
      .execute(&self.pool)
      .await?;

    if status == VocabStatus::Learning {
      sqlx::query(
        "UPDATE srs_states SET lookup_count = 0, last_lookup_at = NULL, last_grade = NULL, last_reviewed_at = NULL
         WHERE vocab_item_id = ?",
      )
      .bind(vocab_item_id)
      .execute(&self.pool)
      .await?;
    }
    Ok(())
  }

  /// Appends to the lookup log and recomputes opacity/struggling without
  /// touching SM-2 scheduling.
  #[tracing::instrument(level = "info", target = "persistence", skip(self))]
  pub async fn record_lookup(&self, vocab_item_id: &str) -> Result<(f64, bool), StoreError> {
    let now = Utc::now();
    sqlx::query("INSERT INTO vocab_lookups (vocab_item_id, looked_up_at) VALUES (?, ?)")
      .bind(vocab_item_id)
      .bind(now)
      .execute(&self.pool)
      .await?;

    let count: i64 = sqlx::query("SELECT COUNT(*) AS c FROM vocab_lookups WHERE vocab_item_id = ?")
      .bind(vocab_item_id)
      .fetch_one(&self.pool)
      .await?
      .get("c");

    sqlx::query("UPDATE srs_states SET lookup_count = ?, last_lookup_at = ? WHERE vocab_item_id = ?")
      .bind(count)
      .bind(now)
      .bind(vocab_item_id)
      .execute(&self.pool)
      .await?;

    let item = self.get_vocab(vocab_item_id).await?.ok_or(StoreError::NotFound)?;
    let state = self.get_srs_state(vocab_item_id).await?.ok_or(StoreError::NotFound)?;
    let opacity = srs::opacity(&item.status, &state);
    let is_struggling = srs::is_struggling(&state);
    Ok((opacity, is_struggling))
  }

  /// Bulk opacity/status projection for `GET /api/vocab/srs-info`.
  pub async fn get_srs_info(&self, headwords: &[String]) -> Result<Vec<SrsInfo>, StoreError> {
    let mut out = Vec::with_capacity(headwords.len());
    for hw in headwords {
      let item = match self.get_vocab_by_headword(hw).await? {
        Some(i) => i,
        None => continue,
      };
      let state = self.get_srs_state(&item.id).await?.unwrap_or_default();
      out.push(SrsInfo {
        headword: item.headword.clone(),
        pinyin: item.pinyin.clone(),
        english: item.english.clone(),
        opacity: srs::opacity(&item.status, &state),
        is_struggling: srs::is_struggling(&state),
        status: item.status,
      });
    }
    Ok(out)
  }

  /// Up to `limit` rows where `status=learning ∧ due_at ≤ now`, ascending by
  /// `due_at` (spec §4.G due-queue projection).
  pub async fn due_queue(&self, limit: i64) -> Result<Vec<ReviewCard>, StoreError> {
    let rows = sqlx::query(
      "SELECT v.id, v.headword, v.pinyin, v.english, v.snippet, s.due_at
       FROM vocab_items v JOIN srs_states s ON s.vocab_item_id = v.id
       WHERE v.status = 'learning' AND s.due_at <= ?
       ORDER BY s.due_at ASC
       LIMIT ?",
    )
    .bind(Utc::now())
    .bind(limit)
    .fetch_all(&self.pool)
    .await?;

    Ok(
      rows
        .into_iter()
        .map(|r| ReviewCard {
          vocab_item_id: r.get("id"),
          headword: r.get("headword"),
          pinyin: r.get("pinyin"),
          english: r.get("english"),
          snippet: r.get("snippet"),
          due_at: r.get("due_at"),
        })
        .collect(),
    )
  }

  pub async fn due_count(&self) -> Result<i64, StoreError> {
    let count: i64 = sqlx::query(
      "SELECT COUNT(*) AS c FROM vocab_items v JOIN srs_states s ON s.vocab_item_id = v.id
       WHERE v.status = 'learning' AND s.due_at <= ?",
    )
    .bind(Utc::now())
    .fetch_one(&self.pool)
    .await?
    .get("c");
    Ok(count)
  }

  /// Runs the SM-2 update (spec §4.G) and persists the new schedule.
  #[tracing::instrument(level = "info", target = "persistence", skip(self))]
  pub async fn answer(&self, vocab_item_id: &str, grade: Grade) -> Result<(SrsState, i64), StoreError> {
    let current = self.get_srs_state(vocab_item_id).await?.ok_or(StoreError::NotFound)?;
    let next = srs::answer(&current, grade);

    sqlx::query(
      "UPDATE srs_states SET ease_factor = ?, interval_days = ?, repetitions = ?, due_at = ?, last_grade = ?, last_reviewed_at = ?
       WHERE vocab_item_id = ?",
    )
    .bind(next.ease_factor)
    .bind(next.interval_days)
    .bind(next.repetitions)
    .bind(next.due_at)
    .bind(next.last_grade)
    .bind(next.last_reviewed_at)
    .bind(vocab_item_id)
    .execute(&self.pool)
    .await?;

    let remaining_due = self.due_count().await?;
    Ok((next, remaining_due))
  }

  /// Idempotent insert by headword for an accepted chat review card; returns
  /// `deduplicated=true` if the vocab item already existed.
  pub async fn accept_review_card(&self, headword: &str, pinyin: &str, english: &str) -> Result<(String, bool), StoreError> {
    self.save_vocab(headword, pinyin, english, None, VocabStatus::Learning).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::test_store;

  #[tokio::test]
  async fn save_vocab_is_idempotent_by_headword() {
    let store = test_store().await;
    let (id1, dedup1) = store.save_vocab("你好", "nǐ hǎo", "hello", None, VocabStatus::Learning).await.unwrap();
    let (id2, dedup2) = store.save_vocab("你好", "nǐ hǎo", "hello", None, VocabStatus::Learning).await.unwrap();
    assert_eq!(id1, id2);
    assert!(!dedup1);
    assert!(dedup2);
  }

  #[tokio::test]
  async fn re_entering_learning_restores_full_opacity() {
    let store = test_store().await;
    let (id, _) = store.save_vocab("谢谢", "xiè xie", "thanks", None, VocabStatus::Learning).await.unwrap();
    store.answer(&id, Grade::Good).await.unwrap();
    store.set_status(&id, VocabStatus::Known).await.unwrap();
    store.set_status(&id, VocabStatus::Learning).await.unwrap();

    let item = store.get_vocab(&id).await.unwrap().unwrap();
    let state = store.get_srs_state(&id).await.unwrap().unwrap();
    assert_eq!(srs::opacity(&item.status, &state), 1.0);
  }

  #[tokio::test]
  async fn answer_persists_new_schedule() {
    let store = test_store().await;
    let (id, _) = store.save_vocab("你好", "nǐ hǎo", "hello", None, VocabStatus::Learning).await.unwrap();
    let (state, _remaining) = store.answer(&id, Grade::Good).await.unwrap();
    assert_eq!(state.repetitions, 1);
    assert_eq!(state.interval_days, 1);
  }
}
