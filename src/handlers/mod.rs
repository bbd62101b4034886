//! HTTP request handlers.

pub mod forward_auth;
pub mod health;

pub use forward_auth::forward_auth;
pub use health::health_check;
