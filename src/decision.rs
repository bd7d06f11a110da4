//! Decision inputs and outputs.

use serde::Serialize;
use std::fmt;

use crate::country::Country;
use crate::policy::PolicyOverride;

/// Why a request was allowed or blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessReason {
    /// No client address was available or it did not parse
    NoIp,
    /// Address matched a configured local range
    LocalIp,
    /// No source could resolve a country
    UnknownCountry,
    /// Resolved country is on the blocklist
    InBlocklist,
    /// Allowlist is active and the resolved country is not on it
    NotInAllowlist,
    /// Country checks passed
    GeoAllowed,
    /// Evaluation failed internally; the configured default applied
    SystemError,
}

impl AccessReason {
    /// Get the label used in headers, logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessReason::NoIp => "no-ip",
            AccessReason::LocalIp => "local-ip",
            AccessReason::UnknownCountry => "unknown-country",
            AccessReason::InBlocklist => "in-blocklist",
            AccessReason::NotInAllowlist => "not-in-allowlist",
            AccessReason::GeoAllowed => "geo-allowed",
            AccessReason::SystemError => "system-error",
        }
    }
}

impl fmt::Display for AccessReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One inbound request as seen by the decision core.
///
/// The client address is whatever the header-inspection layer resolved; the
/// remaining fields are passed through to the decision record untouched.
#[derive(Debug, Clone, Default)]
pub struct AccessRequest {
    pub client_address: Option<String>,
    pub host: String,
    pub uri: String,
    pub user_agent: String,
    pub overrides: PolicyOverride,
}

impl AccessRequest {
    /// Create a request carrying only a client address.
    pub fn from_address(address: impl Into<String>) -> Self {
        Self {
            client_address: Some(address.into()),
            ..Default::default()
        }
    }
}

/// Immutable outcome of evaluating one request.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionRecord {
    pub blocked: bool,
    pub country: Country,
    pub reason: AccessReason,
    pub host: String,
    pub uri: String,
    pub user_agent: String,
}

impl DecisionRecord {
    pub(crate) fn new(
        blocked: bool,
        country: Country,
        reason: AccessReason,
        request: &AccessRequest,
    ) -> Self {
        Self {
            blocked,
            country,
            reason,
            host: request.host.clone(),
            uri: request.uri.clone(),
            user_agent: request.user_agent.clone(),
        }
    }

    /// Whether the request is allowed.
    pub fn allowed(&self) -> bool {
        !self.blocked
    }

    /// The access label surfaced to the presentation layer.
    pub fn access_label(&self) -> &'static str {
        if self.blocked {
            "blocked"
        } else {
            "allowed"
        }
    }
}
