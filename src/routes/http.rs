//! HTTP endpoint handlers (spec §6). Each handler is instrumented and thin —
//! it validates input, calls the store/provider/job manager, and maps the
//! result onto the DTOs in `protocol.rs`.

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use tracing::{info, instrument};

use crate::domain::{SegmentResult, VocabStatus};
use crate::error::AppError;
use crate::jobs::{sentence_fingerprint, split_sentences};
use crate::protocol::*;
use crate::state::AppState;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse {
  Json(HealthOut { ok: true })
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_login(State(state): State<AppState>, Json(body): Json<LoginIn>) -> impl IntoResponse {
  if body.password != state.config.app_password {
    return crate::error::unauthenticated_response(false, false);
  }
  let cookie = format!(
    "{}={}; Path=/; HttpOnly; Max-Age={}",
    crate::auth::SESSION_COOKIE,
    state.config.session_secret,
    state.config.session_ttl_hours * 3600,
  );
  let mut res = StatusCode::OK.into_response();
  res.headers_mut().insert(header::SET_COOKIE, cookie.parse().expect("valid cookie header"));
  res
}

#[instrument(level = "info")]
pub async fn http_logout() -> impl IntoResponse {
  let cookie = format!("{}=; Path=/; HttpOnly; Max-Age=0", crate::auth::SESSION_COOKIE);
  let mut res = StatusCode::OK.into_response();
  res.headers_mut().insert(header::SET_COOKIE, cookie.parse().expect("valid cookie header"));
  res
}

#[instrument(level = "info", skip(state, body), fields(text_len = body.input_text.len()))]
pub async fn http_create_translation(
  State(state): State<AppState>,
  Json(body): Json<CreateTranslationIn>,
) -> Result<impl IntoResponse, AppError> {
  if body.input_text.trim().is_empty() {
    return Err(AppError::InvalidInput("input_text must not be blank".into()));
  }
  let translation = state.store.create_translation(&body.input_text, &body.source_type).await?;
  let id = translation.id.clone();
  info!(target: "hanzi_tutor", %id, "translation created");
  state.jobs.start_processing(id).await;
  Ok(Json(TranslationOut::from(translation)))
}

#[instrument(level = "info", skip(state))]
pub async fn http_list_translations(
  State(state): State<AppState>,
  Query(q): Query<ListTranslationsQuery>,
) -> Result<impl IntoResponse, AppError> {
  let items = state.store.list_translations(q.limit).await?;
  Ok(Json(items.into_iter().map(TranslationOut::from).collect::<Vec<_>>()))
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_get_translation(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, AppError> {
  let translation = state.store.get_translation(&id).await?.ok_or(crate::error::StoreError::NotFound)?;
  let snapshot = state.store.get_progress_snapshot(&id).await?.ok_or(crate::error::StoreError::NotFound)?;
  Ok(Json(TranslationDetailOut {
    translation: TranslationOut::from(translation),
    segments: snapshot.results.into_iter().map(SegmentResultOut::from).collect(),
  }))
}

pub use crate::routes::stream::stream_progress as http_stream_translation;

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_translation_status(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, AppError> {
  let translation = state.store.get_translation(&id).await?.ok_or(crate::error::StoreError::NotFound)?;
  Ok(Json(TranslationStatusOut {
    id: translation.id,
    status: translation.status.as_str().to_string(),
    progress: translation.progress,
    total: translation.total,
    error_message: translation.error_message,
  }))
}

#[instrument(level = "info", skip(state, body), fields(%id, text_len = body.input_text.len()))]
pub async fn http_update_translation(
  State(state): State<AppState>,
  Path(id): Path<String>,
  Json(body): Json<UpdateTranslationIn>,
) -> Result<impl IntoResponse, AppError> {
  if body.input_text.trim().is_empty() {
    return Err(AppError::InvalidInput("input_text must not be blank".into()));
  }
  let current = state.store.get_translation(&id).await?.ok_or(crate::error::StoreError::NotFound)?;

  let new_sentences = split_sentences(&body.input_text);
  let old_fingerprints = state.store.get_sentence_fingerprints(&id).await?;

  // Longest unchanged prefix: the boundary up to which a sentence at the same
  // index carries the same fingerprint it had before the edit (spec §4.D
  // `UpdateSegmentsForSentence`). Everything from here on is new or shifted
  // and gets rebuilt; everything before it is left untouched.
  let mut preserve_from = 0usize;
  while preserve_from < new_sentences.len() && preserve_from < old_fingerprints.len() {
    let new_fp = sentence_fingerprint(&new_sentences[preserve_from]);
    let (old_idx, old_fp) = &old_fingerprints[preserve_from];
    if *old_idx != preserve_from as i64 || *old_fp != new_fp {
      break;
    }
    preserve_from += 1;
  }

  let unchanged = preserve_from == new_sentences.len() && preserve_from == old_fingerprints.len();
  let sentences_changed = new_sentences.len().saturating_sub(preserve_from);

  let status = if unchanged {
    current.status.as_str().to_string()
  } else {
    state.store.reset_to_pending(&id, &body.input_text).await?;
    state.jobs.start_update(id.clone(), preserve_from as i64).await;
    "pending".to_string()
  };

  Ok(Json(UpdateTranslationOut { status, sentences_changed }))
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_delete_translation(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, AppError> {
  state.store.delete_translation(&id).await?;
  Ok(StatusCode::NO_CONTENT)
}

#[instrument(level = "info", skip(state, body), fields(count = body.segments.len()))]
pub async fn http_translate_batch(
  State(state): State<AppState>,
  Json(body): Json<TranslateBatchIn>,
) -> Result<impl IntoResponse, AppError> {
  let provider = state.provider.clone().ok_or_else(|| AppError::InvalidInput("translation provider is not configured".into()))?;
  let raw = provider.translate_segments(&body.segments, &body.context, &state.dictionary).await;

  if let (Some(translation_id), Some(sentence_idx)) = (&body.translation_id, body.sentence_idx) {
    // `index` is global and dense (spec §3), not batch-local — base it on
    // how many segments belong to earlier sentences so it neither collides
    // with their rows nor breaks index density.
    let base = state.store.count_segments_before_sentence(translation_id, sentence_idx).await?;
    let results: Vec<SegmentResult> = raw
      .iter()
      .enumerate()
      .map(|(i, r)| SegmentResult {
        translation_id: translation_id.clone(),
        index: base + i as i64,
        sentence_index: sentence_idx,
        segment: r.segment.clone(),
        pinyin: r.pinyin.clone(),
        english: r.english.clone(),
      })
      .collect();
    state.store.update_segments_for_sentence(translation_id, sentence_idx, &results).await?;
  }

  Ok(Json(TranslateBatchOut {
    translations: raw.into_iter().map(|r| SegmentTranslationOut { segment: r.segment, pinyin: r.pinyin, english: r.english }).collect(),
  }))
}

#[instrument(level = "info", skip(state, body), fields(%body.headword))]
pub async fn http_save_vocab(State(state): State<AppState>, Json(body): Json<SaveVocabIn>) -> Result<impl IntoResponse, AppError> {
  if body.headword.trim().is_empty() {
    return Err(AppError::InvalidInput("headword must not be blank".into()));
  }
  let (vocab_item_id, deduplicated) =
    state.store.save_vocab(&body.headword, &body.pinyin, &body.english, body.snippet.as_deref(), VocabStatus::Learning).await?;
  Ok(Json(SaveVocabOut { vocab_item_id, deduplicated }))
}

#[instrument(level = "info", skip(state, body), fields(%body.vocab_item_id, %body.status))]
pub async fn http_vocab_status(State(state): State<AppState>, Json(body): Json<VocabStatusIn>) -> Result<impl IntoResponse, AppError> {
  let status = match body.status.as_str() {
    "learning" => VocabStatus::Learning,
    "known" => VocabStatus::Known,
    _ => return Err(AppError::InvalidInput("status must be learning or known".into())),
  };
  state.store.set_status(&body.vocab_item_id, status.clone()).await?;
  Ok(Json(VocabStatusOut { status: status.as_str().to_string() }))
}

#[instrument(level = "info", skip(state, body), fields(%body.vocab_item_id))]
pub async fn http_vocab_lookup(State(state): State<AppState>, Json(body): Json<VocabLookupIn>) -> Result<impl IntoResponse, AppError> {
  let (opacity, is_struggling) = state.store.record_lookup(&body.vocab_item_id).await?;
  Ok(Json(VocabLookupOut { opacity, is_struggling }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_srs_info(State(state): State<AppState>, Query(q): Query<SrsInfoQuery>) -> Result<impl IntoResponse, AppError> {
  let headwords: Vec<String> = q.headwords.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
  let entries = state.store.get_srs_info(&headwords).await?;
  Ok(Json(SrsInfoOut {
    entries: entries
      .into_iter()
      .map(|e| SrsInfoEntry {
        headword: e.headword,
        pinyin: e.pinyin,
        english: e.english,
        status: e.status.as_str().to_string(),
        opacity: e.opacity,
        is_struggling: e.is_struggling,
      })
      .collect(),
  }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_review_queue(State(state): State<AppState>, Query(q): Query<ReviewQueueQuery>) -> Result<impl IntoResponse, AppError> {
  let cards = state.store.due_queue(q.limit).await?;
  Ok(Json(ReviewQueueOut {
    cards: cards
      .into_iter()
      .map(|c| ReviewCardOut { vocab_item_id: c.vocab_item_id, headword: c.headword, pinyin: c.pinyin, english: c.english, snippet: c.snippet, due_at: c.due_at })
      .collect(),
  }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_review_count(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
  let due_count = state.store.due_count().await?;
  Ok(Json(ReviewCountOut { due_count }))
}

#[instrument(level = "info", skip(state, body), fields(%body.vocab_item_id))]
pub async fn http_review_answer(State(state): State<AppState>, Json(body): Json<ReviewAnswerIn>) -> Result<impl IntoResponse, AppError> {
  let (state_out, remaining_due) = state.store.answer(&body.vocab_item_id, body.grade.into()).await?;
  Ok(Json(ReviewAnswerOut {
    ease_factor: state_out.ease_factor,
    interval_days: state_out.interval_days,
    repetitions: state_out.repetitions,
    due_at: state_out.due_at,
    remaining_due,
  }))
}

/// Out of core (spec §6): admin profile store and OCR extraction have no
/// implementation here, only the stable 501 contract so the frontend can
/// detect "not available on this backend" without a connection error.
#[instrument(level = "info")]
pub async fn http_not_implemented() -> impl IntoResponse {
  (StatusCode::NOT_IMPLEMENTED, Json(serde_json::json!({ "detail": "not implemented in this deployment" })))
}
