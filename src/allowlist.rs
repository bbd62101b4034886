//! Allowlist compilation and membership.
//!
//! The allowlist is built once from the `ALLOWED_IPS` string and is read-only
//! afterwards. There is no mutation API: the only way to obtain an
//! [`Allowlist`] is [`Allowlist::compile`], and every handler shares it through
//! an `Arc`.
//!
//! # Entry Format
//!
//! Comma-separated, surrounding whitespace ignored, empty entries skipped:
//!
//! ```text
//! 10.0.0.0/8, 192.168.1.5, 2001:db8::/32,
//! ```
//!
//! - Entries with a `/` are CIDR ranges. Host bits are cleared, so
//!   `10.1.2.3/8` is stored as `10.0.0.0/8`.
//! - Entries without a `/` are single addresses, stored as `/32` (IPv4) or
//!   `/128` (IPv6).
//!
//! A single malformed entry rejects the whole string.

use std::fmt;
use std::net::IpAddr;

use ipnet::IpNet;
use tracing::info;

use crate::error::{AppError, AppResult};

/// Environment variable the allowlist is read from.
pub const ALLOWED_IPS_VAR: &str = "ALLOWED_IPS";

/// A network in canonical form: no bits set past the prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetworkRange(IpNet);

impl NetworkRange {
    /// Wrap a network, clearing its host bits.
    pub fn new(net: IpNet) -> Self {
        Self(net.trunc())
    }

    /// A range covering exactly one address (`/32` or `/128`).
    pub fn single(addr: IpAddr) -> Self {
        Self(IpNet::from(addr))
    }

    /// Parse one configuration entry.
    ///
    /// `var` names the environment variable the entry came from, for diagnostics.
    pub fn parse(entry: &str, var: &'static str) -> AppResult<Self> {
        if entry.contains('/') {
            entry
                .parse::<IpNet>()
                .map(Self::new)
                .map_err(|source| AppError::InvalidCidr {
                    var,
                    entry: entry.to_string(),
                    source,
                })
        } else {
            entry
                .parse::<IpAddr>()
                .map(Self::single)
                .map_err(|source| AppError::InvalidAddress {
                    var,
                    entry: entry.to_string(),
                    source,
                })
        }
    }

    /// Check whether `addr` is inside this range.
    ///
    /// Families never mix: an IPv4 address is not inside an IPv6 range and
    /// vice versa. Callers canonicalize IPv4-mapped addresses first.
    #[inline]
    pub fn contains(&self, addr: &IpAddr) -> bool {
        self.0.contains(addr)
    }

    pub fn network(&self) -> IpAddr {
        self.0.network()
    }

    pub fn prefix_len(&self) -> u8 {
        self.0.prefix_len()
    }

    pub fn is_ipv4(&self) -> bool {
        matches!(self.0, IpNet::V4(_))
    }
}

impl fmt::Display for NetworkRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Split, trim and parse a comma-separated list of addresses and CIDRs.
///
/// Empty entries are skipped. The result may be empty; callers decide whether
/// that is acceptable.
pub(crate) fn parse_entries(raw: &str, var: &'static str) -> AppResult<Vec<NetworkRange>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| NetworkRange::parse(entry, var))
        .collect()
}

/// The compiled, immutable set of permitted networks.
///
/// Ranges keep configuration order. Order only matters for logging since
/// membership is an "any range matches" test.
#[derive(Debug, Clone)]
pub struct Allowlist {
    ranges: Vec<NetworkRange>,
}

impl Allowlist {
    /// Compile the raw `ALLOWED_IPS` value.
    ///
    /// # Errors
    ///
    /// - [`AppError::InvalidAddress`] / [`AppError::InvalidCidr`] naming the
    ///   first malformed entry
    /// - [`AppError::EmptyAllowlist`] if no entries remain after trimming
    pub fn compile(raw: &str) -> AppResult<Self> {
        let ranges = parse_entries(raw, ALLOWED_IPS_VAR)?;

        if ranges.is_empty() {
            return Err(AppError::EmptyAllowlist(ALLOWED_IPS_VAR));
        }

        for range in &ranges {
            info!(range = %range, "Added to allowlist");
        }

        Ok(Self { ranges })
    }

    /// Return the first range containing `addr`, if any.
    pub fn find(&self, addr: &IpAddr) -> Option<&NetworkRange> {
        self.ranges.iter().find(|range| range.contains(addr))
    }

    /// Check whether `addr` is permitted.
    pub fn contains(&self, addr: &IpAddr) -> bool {
        self.find(addr).is_some()
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NetworkRange> {
        self.ranges.iter()
    }
}
