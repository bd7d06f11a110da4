//! Security policy and per-request overrides.

use ahash::AHashSet;
use serde::Deserialize;
use std::sync::Arc;

/// Private, loopback and link-local ranges treated as local by default.
pub const DEFAULT_LOCAL_IP_RANGES: &[&str] = &[
    "127.0.0.0/8",    // Loopback
    "10.0.0.0/8",     // Private
    "172.16.0.0/12",  // Private
    "192.168.0.0/16", // Private
    "169.254.0.0/16", // Link-local
    "::1/128",        // Loopback
    "fc00::/7",       // Unique local
    "fe80::/10",      // Link-local
];

/// Access policy evaluated against every request.
///
/// Country codes are upper-cased before storage; comparisons elsewhere rely
/// on that. A request-scoped variant may be derived via
/// [`PolicyOverride::merge`] and is discarded after the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityPolicy {
    /// Short-circuit allow for addresses inside `local_ip_ranges`
    pub ignore_local_ips: bool,
    /// CIDR ranges considered local, checked in order
    pub local_ip_ranges: Vec<String>,
    /// Block when no country can be resolved (fail closed)
    pub block_unknown: bool,
    /// When non-empty, only these countries are allowed
    pub allowed_countries: AHashSet<String>,
    /// Countries blocked outright; wins over the allowlist
    pub blocked_countries: AHashSet<String>,
}

impl SecurityPolicy {
    /// Create a policy with normalized (upper-cased) country sets.
    pub fn new(
        ignore_local_ips: bool,
        local_ip_ranges: Vec<String>,
        block_unknown: bool,
        allowed_countries: impl IntoIterator<Item = String>,
        blocked_countries: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            ignore_local_ips,
            local_ip_ranges,
            block_unknown,
            allowed_countries: normalize_countries(allowed_countries),
            blocked_countries: normalize_countries(blocked_countries),
        }
    }
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self {
            ignore_local_ips: true,
            local_ip_ranges: DEFAULT_LOCAL_IP_RANGES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            block_unknown: true,
            allowed_countries: AHashSet::new(),
            blocked_countries: AHashSet::new(),
        }
    }
}

/// Upper-case and collect country codes into a set.
pub(crate) fn normalize_countries(codes: impl IntoIterator<Item = String>) -> AHashSet<String> {
    codes.into_iter().map(|c| c.to_uppercase()).collect()
}

/// Split a raw comma-separated list into tokens.
///
/// Tokens are trimmed, empty tokens dropped, and upper-cased when
/// `uppercase` is set (country codes yes, CIDR ranges no).
pub(crate) fn parse_list(raw: &str, uppercase: bool) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| {
            if uppercase {
                token.to_uppercase()
            } else {
                token.to_string()
            }
        })
        .collect()
}

/// Per-request policy override, each field independently present-or-absent.
///
/// List fields are raw comma-separated strings as received from the caller.
/// A present-but-empty string is distinct from absent: it replaces the base
/// list with an empty one rather than keeping it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PolicyOverride {
    pub ignore_local_ips: Option<bool>,
    pub block_unknown: Option<bool>,
    pub local_ip_ranges: Option<String>,
    pub allowed_countries: Option<String>,
    pub blocked_countries: Option<String>,
}

impl PolicyOverride {
    /// Whether every field is absent.
    pub fn is_empty(&self) -> bool {
        self.ignore_local_ips.is_none()
            && self.block_unknown.is_none()
            && self.local_ip_ranges.is_none()
            && self.allowed_countries.is_none()
            && self.blocked_countries.is_none()
    }

    /// Produce the effective policy for one request.
    ///
    /// With every field absent this returns the base unchanged (same
    /// allocation, no copy). Otherwise list fields present in the override
    /// replace the base wholesale, booleans likewise; everything else is
    /// inherited.
    pub fn merge(&self, base: &Arc<SecurityPolicy>) -> Arc<SecurityPolicy> {
        if self.is_empty() {
            return Arc::clone(base);
        }

        let local_ip_ranges = match &self.local_ip_ranges {
            Some(raw) => parse_list(raw, false),
            None => base.local_ip_ranges.clone(),
        };
        let allowed_countries = match &self.allowed_countries {
            Some(raw) => parse_list(raw, true).into_iter().collect(),
            None => base.allowed_countries.clone(),
        };
        let blocked_countries = match &self.blocked_countries {
            Some(raw) => parse_list(raw, true).into_iter().collect(),
            None => base.blocked_countries.clone(),
        };

        Arc::new(SecurityPolicy {
            ignore_local_ips: self.ignore_local_ips.unwrap_or(base.ignore_local_ips),
            block_unknown: self.block_unknown.unwrap_or(base.block_unknown),
            local_ip_ranges,
            allowed_countries,
            blocked_countries,
        })
    }
}
