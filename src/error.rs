//! Crate-level error types. The provider and job pipeline keep using
//! `Result<T, String>` internally for segment-level messages (matching the
//! teacher's `openai.rs` style), but persistence and HTTP handlers use these
//! typed enums per spec §4.C / §7's failure taxonomy.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Errors surfaced by the translation provider facade (spec §4.C).
#[derive(thiserror::Error, Debug, Clone)]
pub enum ProviderError {
  #[error("provider unavailable: {0}")]
  Unavailable(String),
  #[error("provider returned malformed output: {0}")]
  Malformed(String),
  #[error("provider returned no usable output")]
  Empty,
}

/// Errors surfaced by the persistence layer (spec §4.D).
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
  #[error("database error: {0}")]
  Sqlx(#[from] sqlx::Error),
  #[error("migration error: {0}")]
  Migration(#[from] sqlx::migrate::MigrateError),
  #[error("not found")]
  NotFound,
  #[error("conflict: {0}")]
  Conflict(String),
}

/// Top-level error type used by HTTP handlers' `IntoResponse` impl.
#[derive(thiserror::Error, Debug)]
pub enum AppError {
  #[error("invalid input: {0}")]
  InvalidInput(String),
  #[error("not authenticated")]
  NotAuthenticated,
  #[error(transparent)]
  Store(#[from] StoreError),
  #[error(transparent)]
  Provider(#[from] ProviderError),
}

impl AppError {
  fn status_code(&self) -> StatusCode {
    match self {
      AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
      AppError::NotAuthenticated => StatusCode::UNAUTHORIZED,
      AppError::Store(StoreError::NotFound) => StatusCode::NOT_FOUND,
      AppError::Store(StoreError::Conflict(_)) => StatusCode::CONFLICT,
      AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
      AppError::Provider(_) => StatusCode::BAD_GATEWAY,
    }
  }
}

/// Spec §6's exact unauthenticated-response contract:
/// JSON request -> `401 {"detail":"Not authenticated"}`;
/// `HX-Request: true` -> `401` + `HX-Redirect: /login`;
/// `Accept: text/html` -> `303` to `/login`.
pub fn unauthenticated_response(is_htmx: bool, wants_html: bool) -> Response {
  if is_htmx {
    let mut res = StatusCode::UNAUTHORIZED.into_response();
    res.headers_mut().insert("HX-Redirect", header::HeaderValue::from_static("/login"));
    res
  } else if wants_html {
    let mut res = StatusCode::SEE_OTHER.into_response();
    res.headers_mut().insert(header::LOCATION, header::HeaderValue::from_static("/login"));
    res
  } else {
    (StatusCode::UNAUTHORIZED, axum::Json(json!({ "detail": "Not authenticated" }))).into_response()
  }
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    if matches!(self, AppError::NotAuthenticated) {
      return unauthenticated_response(false, false);
    }
    let status = self.status_code();
    let body = json!({ "detail": self.to_string() });
    (status, axum::Json(body)).into_response()
  }
}
