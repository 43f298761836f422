//! Core domain types shared across persistence, jobs, provider, and routes.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TranslationStatus {
  Pending,
  Processing,
  Completed,
  Failed,
}

impl Default for TranslationStatus {
  fn default() -> Self { TranslationStatus::Pending }
}

impl TranslationStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      TranslationStatus::Pending => "pending",
      TranslationStatus::Processing => "processing",
      TranslationStatus::Completed => "completed",
      TranslationStatus::Failed => "failed",
    }
  }

  pub fn from_str(s: &str) -> Self {
    match s {
      "processing" => TranslationStatus::Processing,
      "completed" => TranslationStatus::Completed,
      "failed" => TranslationStatus::Failed,
      _ => TranslationStatus::Pending,
    }
  }

  pub fn is_restartable(&self) -> bool {
    matches!(self, TranslationStatus::Pending | TranslationStatus::Processing)
  }

  pub fn is_terminal(&self) -> bool {
    matches!(self, TranslationStatus::Completed | TranslationStatus::Failed)
  }
}

/// A user-submitted text and its translation job. Mirrors the `Translation`
/// entity in the data model; owned exclusively by the persistence layer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Translation {
  pub id: String,
  pub input_text: String,
  pub source_type: String,
  pub status: TranslationStatus,
  pub progress: i64,
  pub total: i64,
  pub sentence_count: i64,
  pub full_translation: Option<String>,
  pub error_message: Option<String>,
  pub lease_expires_at: Option<chrono::DateTime<chrono::Utc>>,
  pub created_at: chrono::DateTime<chrono::Utc>,
  pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// One translated chunk, appended only (except for a full-sentence replace).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SegmentResult {
  pub translation_id: String,
  pub index: i64,
  pub sentence_index: i64,
  pub segment: String,
  pub pinyin: String,
  pub english: String,
}

/// A vocab item's review/status; `Unknown` is only used transiently for
/// passive-lookup projections of words never explicitly saved.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VocabStatus {
  Unknown,
  Learning,
  Known,
}

impl Default for VocabStatus {
  fn default() -> Self { VocabStatus::Unknown }
}

impl VocabStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      VocabStatus::Unknown => "unknown",
      VocabStatus::Learning => "learning",
      VocabStatus::Known => "known",
    }
  }

  pub fn from_str(s: &str) -> Self {
    match s {
      "learning" => VocabStatus::Learning,
      "known" => VocabStatus::Known,
      _ => VocabStatus::Unknown,
    }
  }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VocabItem {
  pub id: String,
  pub headword: String,
  pub pinyin: String,
  pub english: String,
  pub snippet: Option<String>,
  pub status: VocabStatus,
  pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Per-vocab-item SM-2 scheduling state; 1:1 with a `VocabItem`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SrsState {
  pub vocab_item_id: String,
  pub ease_factor: f64,
  pub interval_days: i64,
  pub repetitions: i64,
  pub due_at: chrono::DateTime<chrono::Utc>,
  pub last_grade: Option<i64>,
  pub last_reviewed_at: Option<chrono::DateTime<chrono::Utc>>,
  pub lookup_count: i64,
  pub last_lookup_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Default for SrsState {
  fn default() -> Self {
    let now = chrono::Utc::now();
    SrsState {
      vocab_item_id: String::new(),
      ease_factor: 2.5,
      interval_days: 0,
      repetitions: 0,
      due_at: now,
      last_grade: None,
      last_reviewed_at: None,
      lookup_count: 0,
      last_lookup_at: None,
    }
  }
}

/// A due item projected for the review UI.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReviewCard {
  pub vocab_item_id: String,
  pub headword: String,
  pub pinyin: String,
  pub english: String,
  pub snippet: Option<String>,
  pub due_at: chrono::DateTime<chrono::Utc>,
}

/// Answer grade for the SM-2 scheduler: `Again=0, Hard=1, Good=2, Easy=3`
/// per spec §4.G, mapped internally to the classic 0-5 `q` scale inside
/// `srs::answer`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Grade {
  Again,
  Hard,
  Good,
  Easy,
}

impl Grade {
  pub fn from_i64(v: i64) -> Option<Self> {
    match v {
      0 => Some(Grade::Again),
      1 => Some(Grade::Hard),
      2 => Some(Grade::Good),
      3 => Some(Grade::Easy),
      _ => None,
    }
  }

  pub fn as_i64(&self) -> i64 {
    match self {
      Grade::Again => 0,
      Grade::Hard => 1,
      Grade::Good => 2,
      Grade::Easy => 3,
    }
  }

  /// Classic SM-2 `q` (0-5 quality) mapping used by the ease-factor formula.
  pub(crate) fn q_value(&self) -> f64 {
    match self {
      Grade::Again => 0.0,
      Grade::Hard => 3.0,
      Grade::Good => 4.0,
      Grade::Easy => 5.0,
    }
  }
}

/// A CC-CEDICT entry: one parsed dictionary line.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DictEntry {
  pub traditional: String,
  pub simplified: String,
  pub pinyin_numbered: String,
  pub pinyin: String,
  pub definition: String,
}

/// A single produced translation segment, before persistence assigns it an
/// `index`/`sentence_index`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawSegmentTranslation {
  pub segment: String,
  pub pinyin: String,
  pub english: String,
}
