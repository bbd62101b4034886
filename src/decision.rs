//! Allow/deny decisions.
//!
//! A decision is a pure function of the extracted candidate and the compiled
//! allowlist. The only side effects are one audit log record and a metrics
//! sample per decision.
//!
//! ```text
//! headers + peer ──extract──▶ candidate ──parse──▶ IpAddr ──match──▶ Allow
//!                     │                     │                 │
//!                     ▼                     ▼                 ▼
//!                 Unresolved            Unparsable        NotAllowed  ──▶ Deny (403)
//! ```

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::{info, warn};

use crate::allowlist::{Allowlist, NetworkRange};
use crate::client_ip::{AddrSource, ExtractError, TrustedProxies, extract_candidate};

/// Body of every denial. Callers only look at the status code.
pub const FORBIDDEN_BODY: &str = "Forbidden";

/// Why a request was denied.
///
/// Never shown to the caller; used for logs and metrics only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    /// No source produced a candidate address.
    Unresolved(ExtractError),
    /// The candidate is not an IP address.
    Unparsable(String),
    /// A valid address outside every allowed range.
    NotAllowed(IpAddr),
}

impl DenyReason {
    /// Stable label for metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::Unresolved(_) => "unresolved",
            DenyReason::Unparsable(_) => "unparsable",
            DenyReason::NotAllowed(_) => "not_allowed",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::Unresolved(e) => write!(f, "client address unresolved: {e}"),
            DenyReason::Unparsable(candidate) => {
                write!(f, "candidate is not an IP address: {candidate:?}")
            }
            DenyReason::NotAllowed(ip) => write!(f, "{ip} is not in the allowlist"),
        }
    }
}

/// Outcome of judging one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow { client: IpAddr, range: NetworkRange },
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow { .. })
    }

    /// Label for metrics (`allow` / `deny`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Allow { .. } => "allow",
            Decision::Deny(_) => "deny",
        }
    }

    /// Deny reason label, or `matched` for allowed requests.
    pub fn reason(&self) -> &'static str {
        match self {
            Decision::Allow { .. } => "matched",
            Decision::Deny(reason) => reason.as_str(),
        }
    }
}

impl IntoResponse for Decision {
    fn into_response(self) -> Response {
        match self {
            Decision::Allow { .. } => StatusCode::OK.into_response(),
            Decision::Deny(_) => (StatusCode::FORBIDDEN, FORBIDDEN_BODY).into_response(),
        }
    }
}

/// Judge a candidate address string against the allowlist.
///
/// Anything that does not parse as an IP address is denied. An IPv4-mapped
/// IPv6 address (`::ffff:10.0.0.1`) is judged as the IPv4 address it carries,
/// so it matches IPv4 ranges only.
pub fn judge(candidate: &str, allowlist: &Allowlist) -> Decision {
    let client = match candidate.parse::<IpAddr>() {
        Ok(ip) => ip.to_canonical(),
        Err(_) => return Decision::Deny(DenyReason::Unparsable(candidate.to_string())),
    };

    match allowlist.find(&client) {
        Some(range) => Decision::Allow {
            client,
            range: *range,
        },
        None => Decision::Deny(DenyReason::NotAllowed(client)),
    }
}

/// Extract the client address from a request and judge it.
///
/// Writes one audit record per call. Extraction and parse failures are logged
/// at `warn` so they stand apart from ordinary denials.
pub fn decide(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    allowlist: &Allowlist,
    trusted: &TrustedProxies,
) -> (Decision, Option<AddrSource>) {
    let candidate = match extract_candidate(headers, peer, trusted) {
        Ok(candidate) => candidate,
        Err(e) => {
            warn!(error = %e, peer = ?peer, "Error extracting client IP");
            return (Decision::Deny(DenyReason::Unresolved(e)), None);
        }
    };

    let decision = judge(&candidate.addr, allowlist);

    match &decision {
        Decision::Allow { client, range } => {
            info!(client_ip = %client, source = %candidate.source, range = %range, "Allowed");
        }
        Decision::Deny(DenyReason::NotAllowed(client)) => {
            info!(client_ip = %client, source = %candidate.source, "Denied");
        }
        Decision::Deny(reason) => {
            warn!(
                candidate = %candidate.addr,
                source = %candidate.source,
                reason = %reason,
                "Denied"
            );
        }
    }

    (decision, Some(candidate.source))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn allowlist(raw: &str) -> Allowlist {
        Allowlist::compile(raw).unwrap()
    }

    #[test]
    fn test_judge_allows_member() {
        let list = allowlist("203.0.113.0/24");
        let decision = judge("203.0.113.7", &list);

        assert!(decision.is_allowed());
        assert_eq!(decision.reason(), "matched");
        match decision {
            Decision::Allow { client, range } => {
                assert_eq!(client, "203.0.113.7".parse::<IpAddr>().unwrap());
                assert_eq!(range.to_string(), "203.0.113.0/24");
            }
            Decision::Deny(_) => unreachable!(),
        }
    }

    #[test]
    fn test_judge_denies_non_member() {
        let list = allowlist("10.0.0.0/8");
        assert_eq!(
            judge("198.51.100.9", &list),
            Decision::Deny(DenyReason::NotAllowed("198.51.100.9".parse().unwrap()))
        );
    }

    #[test]
    fn test_judge_denies_garbage() {
        let list = allowlist("0.0.0.0/0, ::/0");
        for candidate in ["", "unknown", "10.0.0.1:8080", "[::1]", "10.0.0.256", "fe80::1%eth0"] {
            let decision = judge(candidate, &list);
            assert_eq!(decision.reason(), "unparsable", "{candidate:?}");
        }
    }

    #[test]
    fn test_judge_family_isolation() {
        let v6 = allowlist("::/0");
        assert!(!judge("10.0.0.1", &v6).is_allowed());

        let v4 = allowlist("0.0.0.0/0");
        assert!(!judge("2001:db8::1", &v4).is_allowed());
    }

    #[test]
    fn test_judge_mapped_candidate_is_ipv4() {
        let v4 = allowlist("192.0.2.0/24");
        match judge("::ffff:192.0.2.1", &v4) {
            Decision::Allow { client, range } => {
                assert_eq!(client, "192.0.2.1".parse::<IpAddr>().unwrap());
                assert_eq!(range.to_string(), "192.0.2.0/24");
            }
            Decision::Deny(reason) => panic!("expected allow, got {reason}"),
        }

        for v6_only in ["::/0", "::ffff:0:0/96"] {
            let list = allowlist(v6_only);
            assert_eq!(
                judge("::ffff:192.0.2.1", &list),
                Decision::Deny(DenyReason::NotAllowed("192.0.2.1".parse().unwrap())),
                "{v6_only}"
            );
        }
    }

    #[test]
    fn test_decide_uses_left_most_forwarded_entry() {
        let list = allowlist("203.0.113.0/24");
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );

        let (decision, source) = decide(&headers, None, &list, &TrustedProxies::default());
        assert!(decision.is_allowed());
        assert_eq!(source, Some(AddrSource::ForwardedFor));
    }

    #[test]
    fn test_decide_peer_not_in_allowlist() {
        let list = allowlist("10.0.0.0/8");
        let peer = Some("198.51.100.9:54321".parse().unwrap());

        let (decision, source) = decide(&HeaderMap::new(), peer, &list, &TrustedProxies::default());
        assert_eq!(decision.reason(), "not_allowed");
        assert_eq!(source, Some(AddrSource::Peer));
    }

    #[test]
    fn test_decide_without_any_source_denies() {
        let list = allowlist("0.0.0.0/0");
        let (decision, source) = decide(&HeaderMap::new(), None, &list, &TrustedProxies::default());

        assert_eq!(
            decision,
            Decision::Deny(DenyReason::Unresolved(ExtractError::MissingPeer))
        );
        assert_eq!(source, None);
    }

    #[test]
    fn test_decide_unparsable_header_is_not_skipped() {
        // The header wins even though the peer would have been allowed
        let list = allowlist("127.0.0.1");
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("garbage"));
        let peer = Some("127.0.0.1:1234".parse().unwrap());

        let (decision, _) = decide(&headers, peer, &list, &TrustedProxies::default());
        assert_eq!(decision.reason(), "unparsable");
    }

    #[test]
    fn test_deny_reason_display() {
        let reason = DenyReason::Unparsable("nope".to_string());
        assert!(reason.to_string().contains("\"nope\""));
        assert_eq!(
            DenyReason::Unresolved(ExtractError::MissingPeer).as_str(),
            "unresolved"
        );
    }
}
