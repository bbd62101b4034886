//! Client address extraction.
//!
//! Finds the address a request should be judged by. Sources are tried in
//! trust order and the first non-empty one wins:
//!
//! 1. `X-Forwarded-For`: the left-most entry of the hop chain
//! 2. `X-Real-IP`: the whole value
//! 3. the transport peer of the connection (`ConnectInfo<SocketAddr>`)
//!
//! Values are returned as strings. Parsing into an address happens in
//! [`decision`](crate::decision), so an unparsable header still counts as the
//! chosen source and is denied rather than skipped.
//!
//! # Security Warning: IP Spoofing Risk
//!
//! The left-most `X-Forwarded-For` entry is whatever the client sent unless the
//! edge proxy overwrites it. Behind an appending proxy a client can claim any
//! address. Two deployment options:
//!
//! - Configure the edge to overwrite the header:
//!
//!   ```nginx
//!   proxy_set_header X-Real-IP $remote_addr;
//!   proxy_set_header X-Forwarded-For $remote_addr;
//!   ```
//!
//! - Set `TRUSTED_PROXIES`. Forwarding headers are then only read when the
//!   immediate peer is inside one of those ranges. Requests from any other
//!   peer are judged by the peer address alone.
//!
//! With `TRUSTED_PROXIES` unset, headers are trusted from every peer.

use std::borrow::Cow;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use axum::http::HeaderMap;
use thiserror::Error;
use tracing::{debug, info};

use crate::allowlist::{NetworkRange, parse_entries};
use crate::error::AppResult;

/// Multi-hop forwarding header, `client, proxy1, proxy2`.
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Single-hop forwarding header.
pub const REAL_IP_HEADER: &str = "x-real-ip";

/// Environment variable the trusted proxy ranges are read from.
pub const TRUSTED_PROXIES_VAR: &str = "TRUSTED_PROXIES";

/// Where a candidate address came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrSource {
    ForwardedFor,
    RealIp,
    Peer,
}

impl AddrSource {
    /// Stable label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            AddrSource::ForwardedFor => "x-forwarded-for",
            AddrSource::RealIp => "x-real-ip",
            AddrSource::Peer => "peer",
        }
    }
}

impl fmt::Display for AddrSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The string a request will be judged by, and where it was found.
///
/// Header values are borrowed from the request; the peer address is owned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate<'a> {
    pub addr: Cow<'a, str>,
    pub source: AddrSource,
}

/// No source produced a candidate.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractError {
    #[error("no usable forwarding header and no peer address on the connection")]
    MissingPeer,
}

/// Ranges of proxies whose forwarding headers may be believed.
///
/// Empty means trust every peer.
#[derive(Debug, Clone, Default)]
pub struct TrustedProxies {
    ranges: Vec<NetworkRange>,
}

impl TrustedProxies {
    /// Parse the optional `TRUSTED_PROXIES` value.
    ///
    /// Unlike the allowlist, an absent or empty value is valid and disables
    /// peer validation. Malformed entries are still fatal.
    pub fn parse(raw: Option<&str>) -> AppResult<Self> {
        let ranges = match raw {
            Some(raw) => parse_entries(raw, TRUSTED_PROXIES_VAR)?,
            None => Vec::new(),
        };

        for range in &ranges {
            info!(range = %range, "Added to trusted proxies");
        }

        Ok(Self { ranges })
    }

    /// Check if trusted proxy validation is enabled (any ranges configured).
    pub fn is_enabled(&self) -> bool {
        !self.ranges.is_empty()
    }

    /// Whether forwarding headers from this peer may be read.
    ///
    /// Always true when validation is disabled. When enabled, an unknown peer
    /// is not trusted.
    pub fn trusts(&self, peer: Option<IpAddr>) -> bool {
        if !self.is_enabled() {
            return true;
        }

        peer.is_some_and(|ip| self.ranges.iter().any(|range| range.contains(&ip)))
    }
}

/// Left-most `X-Forwarded-For` entry, trimmed, if non-empty.
#[inline]
fn forwarded_for(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(FORWARDED_FOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|first| !first.is_empty())
}

/// Trimmed `X-Real-IP` value, if non-empty.
#[inline]
fn real_ip(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(REAL_IP_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Pick the candidate client address for a request.
///
/// Later sources are never consulted once an earlier one yields a value.
/// Header values that are not visible ASCII are treated as absent.
///
/// # Errors
///
/// [`ExtractError::MissingPeer`] when neither header applies and the
/// connection carried no peer address.
pub fn extract_candidate<'a>(
    headers: &'a HeaderMap,
    peer: Option<SocketAddr>,
    trusted: &TrustedProxies,
) -> Result<Candidate<'a>, ExtractError> {
    // Dual-stack listeners report IPv4 peers as `::ffff:a.b.c.d`
    let peer_ip = peer.map(|addr| addr.ip().to_canonical());

    if trusted.trusts(peer_ip) {
        if let Some(addr) = forwarded_for(headers) {
            return Ok(Candidate {
                addr: Cow::Borrowed(addr),
                source: AddrSource::ForwardedFor,
            });
        }

        if let Some(addr) = real_ip(headers) {
            return Ok(Candidate {
                addr: Cow::Borrowed(addr),
                source: AddrSource::RealIp,
            });
        }
    } else if headers.contains_key(FORWARDED_FOR_HEADER) || headers.contains_key(REAL_IP_HEADER) {
        debug!(
            peer = ?peer_ip,
            "Ignoring forwarding headers from untrusted peer"
        );
    }

    let ip = peer_ip.ok_or(ExtractError::MissingPeer)?;
    Ok(Candidate {
        addr: Cow::Owned(ip.to_string()),
        source: AddrSource::Peer,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    fn peer(s: &str) -> Option<SocketAddr> {
        Some(s.parse().unwrap())
    }

    fn trusted(raw: &str) -> TrustedProxies {
        TrustedProxies::parse(Some(raw)).unwrap()
    }

    fn extract<'a>(map: &'a HeaderMap, peer: Option<SocketAddr>) -> Candidate<'a> {
        extract_candidate(map, peer, &TrustedProxies::default()).unwrap()
    }

    #[test]
    fn test_xff_first_entry_trimmed() {
        let map = headers(&[("x-forwarded-for", "  203.0.113.7 , 10.0.0.1")]);
        let candidate = extract(&map, peer("10.0.0.1:443"));

        assert_eq!(candidate.addr, "203.0.113.7");
        assert_eq!(candidate.source, AddrSource::ForwardedFor);
        // Borrowed straight from the header
        assert!(matches!(candidate.addr, Cow::Borrowed(_)));
    }

    #[test]
    fn test_xff_priority_over_real_ip() {
        let map = headers(&[
            ("x-forwarded-for", "10.0.0.1"),
            ("x-real-ip", "192.168.1.1"),
        ]);

        assert_eq!(extract(&map, None).addr, "10.0.0.1");
    }

    #[test]
    fn test_real_ip_used_without_xff() {
        let map = headers(&[("x-real-ip", " 2001:db8::1 ")]);
        let candidate = extract(&map, peer("127.0.0.1:1"));

        assert_eq!(candidate.addr, "2001:db8::1");
        assert_eq!(candidate.source, AddrSource::RealIp);
    }

    #[test]
    fn test_empty_xff_falls_through() {
        let map = headers(&[("x-forwarded-for", "   "), ("x-real-ip", "192.0.2.4")]);
        assert_eq!(extract(&map, None).source, AddrSource::RealIp);

        let map = headers(&[("x-forwarded-for", " , 10.0.0.1")]);
        assert_eq!(extract(&map, peer("198.51.100.9:1")).source, AddrSource::Peer);
    }

    #[test]
    fn test_empty_real_ip_falls_through() {
        let map = headers(&[("x-real-ip", "")]);
        let candidate = extract(&map, peer("198.51.100.9:54321"));

        assert_eq!(candidate.addr, "198.51.100.9");
        assert_eq!(candidate.source, AddrSource::Peer);
    }

    #[test]
    fn test_peer_fallback_strips_port() {
        let map = HeaderMap::new();
        let candidate = extract(&map, peer("[2001:db8::9]:8443"));

        assert_eq!(candidate.addr, "2001:db8::9");
        assert!(matches!(candidate.addr, Cow::Owned(_)));
    }

    #[test]
    fn test_no_sources_is_error() {
        let map = HeaderMap::new();
        let result = extract_candidate(&map, None, &TrustedProxies::default());
        assert_eq!(result, Err(ExtractError::MissingPeer));
    }

    #[test]
    fn test_malformed_header_value_is_returned_as_is() {
        // Parsing is the judge's job; the header still wins
        let map = headers(&[("x-forwarded-for", "not-an-ip, 10.0.0.1")]);
        assert_eq!(extract(&map, peer("10.0.0.1:1")).addr, "not-an-ip");
    }

    #[test]
    fn test_non_ascii_header_treated_as_absent() {
        let mut map = HeaderMap::new();
        map.insert(
            "x-forwarded-for",
            HeaderValue::from_bytes(b"\xff\xfe").unwrap(),
        );
        map.insert("x-real-ip", HeaderValue::from_static("192.0.2.1"));

        assert_eq!(extract(&map, None).addr, "192.0.2.1");
    }

    #[test]
    fn test_long_proxy_chain() {
        let chain = (0..100)
            .map(|i| format!("10.0.0.{}", i % 256))
            .collect::<Vec<_>>()
            .join(", ");
        let map = headers(&[("x-forwarded-for", chain.as_str())]);

        assert_eq!(extract(&map, None).addr, "10.0.0.0");
    }

    #[test]
    fn test_mapped_peer_matches_ipv4_proxy_range() {
        let map = headers(&[("x-forwarded-for", "192.0.2.1")]);
        let proxies = trusted("10.0.0.0/8");

        let candidate = extract_candidate(&map, peer("[::ffff:10.1.1.1]:1"), &proxies).unwrap();
        assert_eq!(candidate.addr, "192.0.2.1");
        assert_eq!(candidate.source, AddrSource::ForwardedFor);
    }

    #[test]
    fn test_mapped_peer_fallback_is_dotted_ipv4() {
        let headers = HeaderMap::new();
        let candidate = extract(&headers, peer("[::ffff:198.51.100.9]:54321"));

        assert_eq!(candidate.addr, "198.51.100.9");
        assert_eq!(candidate.source, AddrSource::Peer);
    }

    #[test]
    fn test_untrusted_peer_headers_ignored() {
        let map = headers(&[("x-forwarded-for", "192.0.2.1"), ("x-real-ip", "192.0.2.2")]);
        let proxies = trusted("10.0.0.0/8");

        let candidate = extract_candidate(&map, peer("198.51.100.9:1"), &proxies).unwrap();
        assert_eq!(candidate.addr, "198.51.100.9");
        assert_eq!(candidate.source, AddrSource::Peer);
    }

    #[test]
    fn test_trusted_peer_headers_used() {
        let map = headers(&[("x-forwarded-for", "192.0.2.1")]);
        let proxies = trusted("10.0.0.0/8, ::1");

        let candidate = extract_candidate(&map, peer("10.1.1.1:1"), &proxies).unwrap();
        assert_eq!(candidate.addr, "192.0.2.1");

        let candidate = extract_candidate(&map, peer("[::1]:1"), &proxies).unwrap();
        assert_eq!(candidate.source, AddrSource::ForwardedFor);
    }

    #[test]
    fn test_trust_requires_known_peer() {
        let map = headers(&[("x-forwarded-for", "192.0.2.1")]);
        let proxies = trusted("10.0.0.0/8");

        let result = extract_candidate(&map, None, &proxies);
        assert_eq!(result, Err(ExtractError::MissingPeer));
    }

    #[test]
    fn test_trusted_proxies_disabled_when_blank() {
        assert!(!TrustedProxies::parse(None).unwrap().is_enabled());
        assert!(!TrustedProxies::parse(Some(" , ")).unwrap().is_enabled());
        assert!(TrustedProxies::default().trusts(None));
    }

    #[test]
    fn test_trusted_proxies_invalid_entry_is_fatal() {
        let err = TrustedProxies::parse(Some("10.0.0.0/8, proxy.local")).unwrap_err();
        assert_eq!(err.offending_entry(), Some("proxy.local"));
        assert!(err.to_string().contains(TRUSTED_PROXIES_VAR));
    }
}
