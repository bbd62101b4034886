use thiserror::Error;

/// Startup errors. Any of these stops the process before a listener is bound.
///
/// Per-request failures are never errors in this sense; they resolve to a
/// [`Decision::Deny`](crate::decision::Decision::Deny) instead.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("ALLOWED_IPS environment variable is required")]
    MissingAllowlist,

    #[error("Invalid IP address in {var}: {entry}")]
    InvalidAddress {
        var: &'static str,
        entry: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("Invalid CIDR in {var}: {entry} ({source})")]
    InvalidCidr {
        var: &'static str,
        entry: String,
        #[source]
        source: ipnet::AddrParseError,
    },

    #[error("No valid IPs or CIDRs found in {0}")]
    EmptyAllowlist(&'static str),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl AppError {
    /// The configuration entry that caused the error, if it concerns a single entry.
    pub fn offending_entry(&self) -> Option<&str> {
        match self {
            AppError::InvalidAddress { entry, .. } | AppError::InvalidCidr { entry, .. } => {
                Some(entry)
            }
            _ => None,
        }
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
