//! Minimal session-cookie check. Spec §1 lists session-cookie authentication
//! as an external collaborator — "contracts stated in §6 only" — so this is
//! a deliberately thin stand-in: a single shared-secret cookie, not a signed
//! or per-user session store. It exists only so the router is runnable end
//! to end and `unauthenticated_response` (spec §6) has a real caller.

use axum::extract::State;
use axum::http::{header, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::state::AppState;

pub const SESSION_COOKIE: &str = "session";

fn cookie_value<'a>(cookie_header: &'a str, name: &str) -> Option<&'a str> {
  cookie_header.split(';').find_map(|kv| {
    let kv = kv.trim();
    let (k, v) = kv.split_once('=')?;
    (k == name).then_some(v)
  })
}

fn is_authenticated(req: &Request<axum::body::Body>, expected: &str) -> bool {
  req
    .headers()
    .get(header::COOKIE)
    .and_then(|v| v.to_str().ok())
    .and_then(|c| cookie_value(c, SESSION_COOKIE))
    .map(|v| v == expected)
    .unwrap_or(false)
}

/// Rejects requests without the session cookie using spec §6's exact
/// unauthenticated-response contract (JSON / HX-Request / Accept:text/html).
pub async fn require_session(
  State(state): State<AppState>,
  req: Request<axum::body::Body>,
  next: Next,
) -> Response {
  if is_authenticated(&req, &state.config.session_secret) {
    return next.run(req).await;
  }

  let is_htmx = req.headers().get("HX-Request").is_some();
  let wants_html = req
    .headers()
    .get(header::ACCEPT)
    .and_then(|v| v.to_str().ok())
    .map(|v| v.contains("text/html"))
    .unwrap_or(false);

  crate::error::unauthenticated_response(is_htmx, wants_html)
}
