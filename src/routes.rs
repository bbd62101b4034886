//! Application routing configuration with middleware stack.
//!
//! # Middleware Stack
//!
//! ```text
//! Request
//!    │
//!    ▼
//! ┌──────────────────┐
//! │  Set Request ID  │ ← generates x-request-id if absent
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │ Propagate Req ID │ ← copies x-request-id onto the response
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │     Tracing      │ ← HTTP request/response logging
//! └────────┬─────────┘
//!          ▼
//!      Handler
//! ```
//!
//! # Routes
//!
//! - `/health` (any method) - liveness, bypasses the allowlist
//! - `/` and every other path (any method) - forward-auth decision

use axum::Router;
use axum::http::Request;
use axum::routing::any;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::info_span;

use crate::handlers;
use crate::state::AppState;

/// Build the application router with all routes and middleware configured.
///
/// Serve it with `into_make_service_with_connect_info::<SocketAddr>()` so the
/// forward-auth handler can fall back to the peer address.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", any(handlers::health_check))
        .route("/", any(handlers::forward_auth))
        // Proxies may forward the original path; judge those too
        .fallback(handlers::forward_auth)
        .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<_>| {
            let request_id = req
                .headers()
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown");
            info_span!(
                "request",
                method = %req.method(),
                uri = %req.uri(),
                request_id = %request_id,
            )
        }))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}
