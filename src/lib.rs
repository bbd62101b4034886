//! # IP Allowlist
//!
//! A forward-auth service for reverse proxies such as Traefik. The proxy asks
//! this service about every inbound request; the answer is `200 OK` when the
//! client address is inside a configured allowlist and `403 Forbidden`
//! otherwise.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum HTTP Server                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Middleware (Request ID → Trace)                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Handlers (forward_auth, health)                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Decision (extract client address → judge)                  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Allowlist (compiled once at startup, immutable)            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::net::SocketAddr;
//!
//! use ip_allowlist::{Allowlist, AppState, TrustedProxies, build_router};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let allowlist = Allowlist::compile("10.0.0.0/8, 192.168.1.5, 2001:db8::/32")?;
//!     let state = AppState::new(allowlist, TrustedProxies::default());
//!     let app = build_router(state);
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//!     axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! ```bash
//! ALLOWED_IPS="10.0.0.0/8, 192.168.1.5" PORT=8080 cargo run
//! ```
//!
//! Restrict which peers may supply `X-Forwarded-For` / `X-Real-IP`:
//! ```bash
//! TRUSTED_PROXIES="172.16.0.0/12" ALLOWED_IPS="10.0.0.0/8" cargo run
//! ```

pub mod allowlist;
pub mod client_ip;
pub mod config;
pub mod decision;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod routes;
pub mod state;
pub mod utils;

// Re-exports for convenience
pub use allowlist::{Allowlist, NetworkRange};
pub use client_ip::TrustedProxies;
pub use config::Config;
pub use decision::{Decision, DenyReason};
pub use error::{AppError, AppResult};
pub use routes::build_router;
pub use state::AppState;
