//! HTTP request/response DTOs (spec §6). Kept small and serde-ready so the
//! frontend contract stays stable independent of internal domain types.

use serde::{Deserialize, Serialize};

use crate::domain::{Grade, SegmentResult, Translation};

#[derive(Serialize)]
pub struct HealthOut {
  pub ok: bool,
}

#[derive(Deserialize)]
pub struct LoginIn {
  pub password: String,
}

#[derive(Deserialize)]
pub struct CreateTranslationIn {
  pub input_text: String,
  #[serde(default = "default_source_type")]
  pub source_type: String,
}

fn default_source_type() -> String {
  "paste".to_string()
}

#[derive(Serialize)]
pub struct TranslationOut {
  pub id: String,
  pub input_text: String,
  pub source_type: String,
  pub status: String,
  pub progress: i64,
  pub total: i64,
  pub sentence_count: i64,
  pub full_translation: Option<String>,
  pub error_message: Option<String>,
  pub created_at: chrono::DateTime<chrono::Utc>,
  pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<Translation> for TranslationOut {
  fn from(t: Translation) -> Self {
    TranslationOut {
      id: t.id,
      input_text: t.input_text,
      source_type: t.source_type,
      status: t.status.as_str().to_string(),
      progress: t.progress,
      total: t.total,
      sentence_count: t.sentence_count,
      full_translation: t.full_translation,
      error_message: t.error_message,
      created_at: t.created_at,
      updated_at: t.updated_at,
    }
  }
}

/// Compact status projection for `GET /api/translations/{id}/status`, used by
/// clients that only need to poll progress without the full segment list.
#[derive(Serialize)]
pub struct TranslationStatusOut {
  pub id: String,
  pub status: String,
  pub progress: i64,
  pub total: i64,
  pub error_message: Option<String>,
}

#[derive(Deserialize)]
pub struct ListTranslationsQuery {
  #[serde(default = "default_list_limit")]
  pub limit: i64,
}

fn default_list_limit() -> i64 {
  50
}

#[derive(Serialize)]
pub struct SegmentResultOut {
  pub index: i64,
  pub sentence_index: i64,
  pub segment: String,
  pub pinyin: String,
  pub english: String,
}

impl From<SegmentResult> for SegmentResultOut {
  fn from(r: SegmentResult) -> Self {
    SegmentResultOut { index: r.index, sentence_index: r.sentence_index, segment: r.segment, pinyin: r.pinyin, english: r.english }
  }
}

#[derive(Serialize)]
pub struct TranslationDetailOut {
  #[serde(flatten)]
  pub translation: TranslationOut,
  pub segments: Vec<SegmentResultOut>,
}

#[derive(Deserialize)]
pub struct UpdateTranslationIn {
  pub input_text: String,
}

#[derive(Serialize)]
pub struct UpdateTranslationOut {
  pub status: String,
  pub sentences_changed: usize,
}

#[derive(Deserialize)]
pub struct TranslateBatchIn {
  pub segments: Vec<String>,
  #[serde(default)]
  pub context: String,
  #[serde(default)]
  pub translation_id: Option<String>,
  #[serde(default)]
  pub sentence_idx: Option<i64>,
}

#[derive(Serialize)]
pub struct SegmentTranslationOut {
  pub segment: String,
  pub pinyin: String,
  pub english: String,
}

#[derive(Serialize)]
pub struct TranslateBatchOut {
  pub translations: Vec<SegmentTranslationOut>,
}

#[derive(Deserialize)]
pub struct SaveVocabIn {
  pub headword: String,
  #[serde(default)]
  pub pinyin: String,
  #[serde(default)]
  pub english: String,
  #[serde(default)]
  pub snippet: Option<String>,
}

#[derive(Serialize)]
pub struct SaveVocabOut {
  pub vocab_item_id: String,
  pub deduplicated: bool,
}

#[derive(Deserialize)]
pub struct VocabStatusIn {
  pub vocab_item_id: String,
  pub status: String,
}

#[derive(Serialize)]
pub struct VocabStatusOut {
  pub status: String,
}

#[derive(Deserialize)]
pub struct VocabLookupIn {
  pub vocab_item_id: String,
}

#[derive(Serialize)]
pub struct VocabLookupOut {
  pub opacity: f64,
  pub is_struggling: bool,
}

#[derive(Deserialize)]
pub struct SrsInfoQuery {
  pub headwords: String,
}

#[derive(Serialize)]
pub struct SrsInfoEntry {
  pub headword: String,
  pub pinyin: String,
  pub english: String,
  pub status: String,
  pub opacity: f64,
  pub is_struggling: bool,
}

#[derive(Serialize)]
pub struct SrsInfoOut {
  pub entries: Vec<SrsInfoEntry>,
}

#[derive(Deserialize)]
pub struct ReviewQueueQuery {
  #[serde(default = "default_review_limit")]
  pub limit: i64,
}

fn default_review_limit() -> i64 {
  20
}

#[derive(Serialize)]
pub struct ReviewCardOut {
  pub vocab_item_id: String,
  pub headword: String,
  pub pinyin: String,
  pub english: String,
  pub snippet: Option<String>,
  pub due_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Serialize)]
pub struct ReviewQueueOut {
  pub cards: Vec<ReviewCardOut>,
}

#[derive(Serialize)]
pub struct ReviewCountOut {
  pub due_count: i64,
}

#[derive(Deserialize)]
pub struct ReviewAnswerIn {
  pub vocab_item_id: String,
  pub grade: GradeIn,
}

/// Mirrors `Grade` with serde so malformed grades surface as 400s through
/// normal deserialization failure rather than a runtime `from_i64` check.
#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradeIn {
  Again,
  Hard,
  Good,
  Easy,
}

impl From<GradeIn> for Grade {
  fn from(g: GradeIn) -> Self {
    match g {
      GradeIn::Again => Grade::Again,
      GradeIn::Hard => Grade::Hard,
      GradeIn::Good => Grade::Good,
      GradeIn::Easy => Grade::Easy,
    }
  }
}

#[derive(Serialize)]
pub struct ReviewAnswerOut {
  pub ease_factor: f64,
  pub interval_days: i64,
  pub repetitions: i64,
  pub due_at: chrono::DateTime<chrono::Utc>,
  pub remaining_due: i64,
}
