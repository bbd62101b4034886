//! Application configuration loaded from environment variables.
//!
//! Configuration is read once at startup. A `.env` file in the working
//! directory is loaded first if present; real environment variables win.
//!
//! # Variables
//!
//! - `ALLOWED_IPS` (required): comma-separated IPs and CIDRs
//! - `PORT`: listen port (default: 8080, also used when set but empty)
//! - `HOST`: listen address (default: `0.0.0.0`)
//! - `TRUSTED_PROXIES`: CIDRs whose forwarding headers are believed (default: trust all)
//! - `METRICS_PORT`: Prometheus exporter port (default: 0 = disabled)
//! - `LOG_FORMAT`: `pretty` or `json` (default: `pretty`)
//! - `RUST_LOG`: tracing filter (default: `info`)

use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::allowlist::ALLOWED_IPS_VAR;
use crate::client_ip::TRUSTED_PROXIES_VAR;
use crate::error::{AppError, AppResult};

/// Default listen port.
pub const DEFAULT_PORT: u16 = 8080;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable, one line per event
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}' (expected pretty or json)")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Pretty => f.write_str("pretty"),
            LogFormat::Json => f.write_str("json"),
        }
    }
}

/// Application configuration loaded from environment variables.
///
/// The allowlist is kept as the raw string here; it is compiled by
/// [`Allowlist::compile`](crate::allowlist::Allowlist::compile).
#[derive(Debug, Clone)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Server host address (default: "0.0.0.0")
    pub host: String,

    /// Server port (default: 8080)
    pub port: u16,

    // =========================================================================
    // Access Configuration
    // =========================================================================
    /// Raw `ALLOWED_IPS` value. Never empty.
    pub allowed_ips: String,

    /// Raw `TRUSTED_PROXIES` value, `None` when unset or empty.
    pub trusted_proxies: Option<String>,

    // =========================================================================
    // Observability Configuration
    // =========================================================================
    /// Log output format
    pub log_format: LogFormat,

    /// Port for Prometheus metrics endpoint (default: 0 = disabled)
    pub metrics_port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// - `AppError::MissingAllowlist` if `ALLOWED_IPS` is unset or empty
    /// - `AppError::ConfigError` for non-numeric ports or an unknown log format
    pub fn from_env() -> AppResult<Self> {
        // Load an .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let config = Self {
            host: non_empty("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: Self::parse_var("PORT", non_empty("PORT"), DEFAULT_PORT)?,
            allowed_ips: non_empty(ALLOWED_IPS_VAR).ok_or(AppError::MissingAllowlist)?,
            trusted_proxies: non_empty(TRUSTED_PROXIES_VAR),
            log_format: Self::parse_var("LOG_FORMAT", non_empty("LOG_FORMAT"), LogFormat::Pretty)?,
            metrics_port: Self::parse_var("METRICS_PORT", non_empty("METRICS_PORT"), 0)?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values for consistency and correctness.
    fn validate(&self) -> AppResult<()> {
        if self.metrics_port != 0 && self.metrics_port == self.port {
            return Err(AppError::ConfigError(format!(
                "METRICS_PORT ({}) must differ from PORT",
                self.metrics_port
            )));
        }

        Ok(())
    }

    /// Get the full server address for binding.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if Prometheus metrics export is enabled.
    pub fn metrics_enabled(&self) -> bool {
        self.metrics_port > 0
    }

    /// Get the metrics endpoint address.
    ///
    /// Returns `None` if metrics are disabled (port = 0).
    pub fn metrics_addr(&self) -> Option<SocketAddr> {
        self.metrics_enabled()
            .then(|| SocketAddr::from(([0, 0, 0, 0], self.metrics_port)))
    }

    /// Parse an optional variable value, using `default` when absent.
    fn parse_var<T>(name: &str, value: Option<String>, default: T) -> AppResult<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match value {
            Some(val) => val
                .trim()
                .parse()
                .map_err(|e| AppError::ConfigError(format!("Invalid {name}: {e}"))),
            None => Ok(default),
        }
    }
}

/// Configuration for tests, allowing loopback only.
impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            allowed_ips: "127.0.0.1, ::1".to_string(),
            trusted_proxies: None,
            log_format: LogFormat::Pretty,
            metrics_port: 0,
        }
    }
}
