//! Progress stream (spec §4.F): a single SSE handler implementing
//! replay-then-tail ordering — the current snapshot is replayed as `start`
//! plus one `progress` per already-persisted segment, then new segments are
//! polled and emitted in order until the job reaches a terminal status.
//!
//! Grounded on Xenobot's `events.rs` `Sse::new(stream).keep_alive(...)`
//! shape; the replay-then-tail polling loop itself has no corpus precedent
//! and is built directly from the spec.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use serde_json::json;
use tokio::time::sleep;

use crate::domain::TranslationStatus;
use crate::state::AppState;

/// Interval between snapshot polls while a job is still running.
const POLL_INTERVAL: Duration = Duration::from_millis(300);

#[derive(serde::Serialize)]
struct ParagraphStart {
  segment_count: usize,
  indent: String,
  separator: String,
}

#[derive(serde::Serialize)]
struct SegmentView<'a> {
  segment: &'a str,
  pinyin: &'a str,
  english: &'a str,
}

#[derive(serde::Serialize)]
struct ParagraphComplete<'a> {
  translations: Vec<SegmentView<'a>>,
  indent: String,
  separator: String,
}

pub async fn stream_progress(
  State(state): State<AppState>,
  Path(id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
  let body = async_stream::stream! {
    let first = match state.store.get_progress_snapshot(&id).await {
      Ok(Some(s)) => s,
      Ok(None) => {
        yield Ok(Event::default().data(json!({"type": "error", "message": "translation not found"}).to_string()));
        return;
      }
      Err(e) => {
        yield Ok(Event::default().data(json!({"type": "error", "message": e.to_string()}).to_string()));
        return;
      }
    };

    let paragraphs: Vec<ParagraphStart> = group_by_sentence(&first.results)
      .into_iter()
      .map(|g| ParagraphStart { segment_count: g.len(), indent: String::new(), separator: " ".to_string() })
      .collect();

    yield Ok(Event::default().data(
      json!({
        "type": "start",
        "translation_id": id,
        "total": first.total,
        "paragraphs": paragraphs,
        "fullTranslation": first.full_translation,
      })
      .to_string(),
    ));

    let mut emitted = 0usize;
    for r in &first.results {
      yield Ok(Event::default().data(
        json!({
          "type": "progress",
          "current": emitted + 1,
          "total": first.total,
          "result": {"segment": r.segment, "pinyin": r.pinyin, "english": r.english, "index": r.index, "sentence_index": r.sentence_index},
        })
        .to_string(),
      ));
      emitted += 1;
    }

    let mut status = first.status.clone();
    let mut error = first.error.clone();
    let mut full_translation = first.full_translation.clone();
    let mut last_results = first.results;

    while !matches!(status, TranslationStatus::Completed | TranslationStatus::Failed) {
      sleep(POLL_INTERVAL).await;
      let snapshot = match state.store.get_progress_snapshot(&id).await {
        Ok(Some(s)) => s,
        Ok(None) => {
          yield Ok(Event::default().data(json!({"type": "error", "message": "translation not found"}).to_string()));
          return;
        }
        Err(e) => {
          yield Ok(Event::default().data(json!({"type": "error", "message": e.to_string()}).to_string()));
          return;
        }
      };

      for r in snapshot.results.iter().skip(emitted) {
        yield Ok(Event::default().data(
          json!({
            "type": "progress",
            "current": emitted + 1,
            "total": snapshot.total,
            "result": {"segment": r.segment, "pinyin": r.pinyin, "english": r.english, "index": r.index, "sentence_index": r.sentence_index},
          })
          .to_string(),
        ));
        emitted += 1;
      }

      status = snapshot.status;
      error = snapshot.error;
      full_translation = snapshot.full_translation;
      last_results = snapshot.results;
    }

    match status {
      TranslationStatus::Completed => {
        let paragraphs: Vec<ParagraphComplete> = group_by_sentence(&last_results)
          .into_iter()
          .map(|g| ParagraphComplete {
            translations: g.iter().map(|r| SegmentView { segment: &r.segment, pinyin: &r.pinyin, english: &r.english }).collect(),
            indent: String::new(),
            separator: " ".to_string(),
          })
          .collect();
        yield Ok(Event::default().data(
          json!({"type": "complete", "paragraphs": paragraphs, "fullTranslation": full_translation}).to_string(),
        ));
      }
      TranslationStatus::Failed => {
        yield Ok(Event::default().data(
          json!({"type": "error", "message": error.unwrap_or_else(|| "translation failed".to_string())}).to_string(),
        ));
      }
      _ => unreachable!("loop only exits on a terminal status"),
    }
  };

  Sse::new(body).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("keep-alive"))
}

fn group_by_sentence(results: &[crate::domain::SegmentResult]) -> Vec<Vec<&crate::domain::SegmentResult>> {
  let mut groups: Vec<Vec<&crate::domain::SegmentResult>> = Vec::new();
  for r in results {
    let idx = r.sentence_index as usize;
    while groups.len() <= idx {
      groups.push(Vec::new());
    }
    groups[idx].push(r);
  }
  groups
}
