//! Forward-auth endpoint.
//!
//! The edge proxy sends each inbound request here (method, path and headers
//! preserved) and forwards it to the backend only on a 2xx answer.
//!
//! - `200 OK`, empty body: client address is in the allowlist
//! - `403 Forbidden`, body `Forbidden`: anything else
//!
//! Traefik example:
//!
//! ```yaml
//! http:
//!   middlewares:
//!     ip-allowlist:
//!       forwardAuth:
//!         address: "http://ip-allowlist:8080/"
//! ```

use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::{ConnectInfo, Request, State};
use axum::response::{IntoResponse, Response};
use tracing::instrument;

use crate::decision::decide;
use crate::metrics;
use crate::state::AppState;

/// Judge the request's client address.
///
/// The peer address is read from `ConnectInfo`, which is only present when the
/// server is started with `into_make_service_with_connect_info`. Without it,
/// requests lacking forwarding headers are denied.
#[instrument(skip_all, fields(method = %req.method(), uri = %req.uri()))]
pub async fn forward_auth(State(state): State<AppState>, req: Request) -> Response {
    let started = Instant::now();
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let (decision, source) = decide(
        req.headers(),
        peer,
        &state.allowlist,
        &state.trusted_proxies,
    );

    metrics::record_decision(&decision, source, started.elapsed().as_secs_f64());

    decision.into_response()
}
