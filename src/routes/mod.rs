//! Router assembly: HTTP endpoints (spec §6), CORS, and HTTP tracing.
//! Generalizes the teacher's `build_router` shape; drops the WebSocket
//! upgrade and static-file fallback, neither of which this spec's [MODULE]
//! list covers (frontend and static assets are out of core, spec §1).

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod stream;

/// Builds the application router. A single `TimeoutLayer` wraps every route
/// except the SSE stream, which is nested outside it (spec §5 "the SSE
/// handler itself has no timeout; all other handlers share a single
/// wrapping timeout").
pub fn build_router(state: AppState) -> Router {
  let public = Router::new()
    .route("/health", get(http::http_health))
    .route("/api/auth/login", post(http::http_login))
    .route("/api/auth/logout", post(http::http_logout));

  let stream_only = Router::new().route("/api/translations/:id/stream", get(http::http_stream_translation));

  let protected = Router::new()
    .route("/api/translations", post(http::http_create_translation).get(http::http_list_translations))
    .route("/api/translations/:id", get(http::http_get_translation).patch(http::http_update_translation).delete(http::http_delete_translation))
    .route("/api/translations/:id/status", get(http::http_translation_status))
    .route("/api/segments/translate-batch", post(http::http_translate_batch))
    .route("/api/vocab/save", post(http::http_save_vocab))
    .route("/api/vocab/status", post(http::http_vocab_status))
    .route("/api/vocab/lookup", post(http::http_vocab_lookup))
    .route("/api/vocab/srs-info", get(http::http_srs_info))
    .route("/api/review/queue", get(http::http_review_queue))
    .route("/api/review/count", get(http::http_review_count))
    .route("/api/review/answer", post(http::http_review_answer))
    .route("/api/admin/profile", get(http::http_not_implemented).post(http::http_not_implemented))
    .route("/api/admin/progress/export", get(http::http_not_implemented))
    .route("/api/admin/progress/import", post(http::http_not_implemented))
    .route("/api/extract-text", post(http::http_not_implemented))
    .layer(TimeoutLayer::new(std::time::Duration::from_secs(30)));

  Router::new()
    .merge(public)
    .merge(stream_only.layer(middleware::from_fn_with_state(state.clone(), crate::auth::require_session)))
    .merge(protected.layer(middleware::from_fn_with_state(state.clone(), crate::auth::require_session)))
    .with_state(state)
    .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
    .layer(
      TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO)),
    )
}
