//! CIDR range matching.
//!
//! Stateless helpers for testing an address literal against a CIDR range
//! string. The public contract is a plain boolean that never panics and
//! never returns an error: malformed input counts as "no match". The
//! internal outcome keeps the malformed cases distinguishable for logging.

use ipnet::IpNet;
use std::net::IpAddr;

/// Internal match outcome, so logs can tell "did not match" apart from
/// "input was malformed". The outward contract stays boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CidrMatch {
    Matched,
    NotMatched,
    /// Range is not `network/prefix` or does not parse
    MalformedRange,
    /// Address literal does not parse
    MalformedAddress,
    /// IPv4 address against IPv6 range, or vice versa
    FamilyMismatch,
}

impl CidrMatch {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            CidrMatch::Matched => "matched",
            CidrMatch::NotMatched => "not-matched",
            CidrMatch::MalformedRange => "malformed-range",
            CidrMatch::MalformedAddress => "malformed-address",
            CidrMatch::FamilyMismatch => "family-mismatch",
        }
    }
}

/// Test whether `address` falls inside `range`.
///
/// `range` must be `network/prefixLength` notation; host bits set in the
/// network part are ignored. Returns `false` for malformed input of any
/// kind, including an address-family mismatch between the two arguments.
///
/// # Examples
/// ```
/// use geogate::cidr;
///
/// assert!(cidr::matches("192.168.1.5", "192.168.0.0/16"));
/// assert!(!cidr::matches("192.168.1.5", "10.0.0.0/8"));
/// assert!(!cidr::matches("192.168.1.5", "not-a-range"));
/// ```
pub fn matches(address: &str, range: &str) -> bool {
    match match_cidr(address, range) {
        CidrMatch::Matched => true,
        CidrMatch::NotMatched => false,
        outcome => {
            log::debug!(
                "CIDR check skipped ({}): address={:?} range={:?}",
                outcome.as_str(),
                address,
                range
            );
            false
        }
    }
}

pub(crate) fn match_cidr(address: &str, range: &str) -> CidrMatch {
    let range = range.trim();
    if range.split('/').count() != 2 {
        return CidrMatch::MalformedRange;
    }

    let net = match range.parse::<IpNet>() {
        Ok(net) => net,
        Err(_) => return CidrMatch::MalformedRange,
    };

    let ip = match address.trim().parse::<IpAddr>() {
        Ok(ip) => ip,
        Err(_) => return CidrMatch::MalformedAddress,
    };

    let contained = match (net, ip) {
        (IpNet::V4(net), IpAddr::V4(v4)) => net.contains(&v4),
        (IpNet::V6(net), IpAddr::V6(v6)) => net.contains(&v6),
        _ => return CidrMatch::FamilyMismatch,
    };

    if contained {
        CidrMatch::Matched
    } else {
        CidrMatch::NotMatched
    }
}
