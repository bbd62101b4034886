//! Fuzz testing for allowlist compilation and address judging.
//!
//! Checks that neither the compiler nor the decision path panics on arbitrary
//! input, and that an unparsable candidate is never allowed.
//!
//! ```bash
//! cargo +nightly fuzz run fuzz_allowlist -- -max_total_time=60
//! ```

#![no_main]

use axum::http::{HeaderMap, HeaderValue};
use ip_allowlist::decision::{decide, judge};
use ip_allowlist::{Allowlist, TrustedProxies};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };

    // The input as an allowlist
    let _ = Allowlist::compile(s);

    // The input as a candidate against a permissive list
    let Ok(everything) = Allowlist::compile("0.0.0.0/0, ::/0") else {
        return;
    };
    let decision = judge(s, &everything);
    if s.parse::<std::net::IpAddr>().is_err() {
        assert!(!decision.is_allowed());
    }

    // The input as a forwarding header
    if let Ok(value) = HeaderValue::from_str(s) {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", value);
        let _ = decide(&headers, None, &everything, &TrustedProxies::default());
    }
});
