//! Shared application state for Axum handlers.
//!
//! Everything in here is built before the listener is bound and never
//! mutated afterwards, so handlers read it without locks.

use std::sync::Arc;
use std::time::Instant;

use crate::allowlist::Allowlist;
use crate::client_ip::TrustedProxies;

/// Shared application state for Axum handlers.
///
/// Cloned per request; the contents live behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Compiled allowlist
    pub allowlist: Arc<Allowlist>,
    /// Proxies whose forwarding headers are believed
    pub trusted_proxies: Arc<TrustedProxies>,
    /// Timestamp when the application started
    pub started_at: Instant,
}

impl AppState {
    pub fn new(allowlist: Allowlist, trusted_proxies: TrustedProxies) -> Self {
        Self {
            allowlist: Arc::new(allowlist),
            trusted_proxies: Arc::new(trusted_proxies),
            started_at: Instant::now(),
        }
    }

    /// Get uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
