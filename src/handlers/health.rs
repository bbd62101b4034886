//! Liveness endpoint.
//!
//! `/health` answers `200 OK` with body `OK` for any method. It does not touch
//! the allowlist, so probes succeed from any address.

use axum::http::StatusCode;
use tracing::instrument;

/// Health check endpoint.
#[instrument]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}
