//! The access decision state machine.

use std::net::IpAddr;

use crate::cidr;
use crate::country::Country;
use crate::decision::{AccessReason, AccessRequest, DecisionRecord};
use crate::policy::SecurityPolicy;
use crate::resolver::CountryResolver;

/// Evaluates requests against an effective policy.
///
/// Rules short-circuit in a fixed order: missing address, local address,
/// unresolvable country, blocklist, allowlist, allow. The blocklist is
/// always consulted before the allowlist, so a country present on both is
/// blocked. Evaluation itself never fails; the engine maps panics at its
/// boundary.
pub struct AccessPolicyEvaluator {
    resolver: CountryResolver,
}

impl AccessPolicyEvaluator {
    pub fn new(resolver: CountryResolver) -> Self {
        Self { resolver }
    }

    /// The resolver backing this evaluator.
    pub fn resolver(&self) -> &CountryResolver {
        &self.resolver
    }

    /// Evaluate one request against the effective policy.
    pub fn evaluate(&self, request: &AccessRequest, policy: &SecurityPolicy) -> DecisionRecord {
        let address = request
            .client_address
            .as_deref()
            .map(str::trim)
            .filter(|a| a.parse::<IpAddr>().is_ok());

        let address = match address {
            Some(address) => address,
            None => {
                log::debug!("no usable client address, block_unknown={}", policy.block_unknown);
                return DecisionRecord::new(
                    policy.block_unknown,
                    Country::Absent,
                    AccessReason::NoIp,
                    request,
                );
            }
        };

        if policy.ignore_local_ips
            && policy
                .local_ip_ranges
                .iter()
                .any(|range| cidr::matches(address, range))
        {
            return DecisionRecord::new(false, Country::Local, AccessReason::LocalIp, request);
        }

        let code = match self.resolver.resolve(address) {
            Some(code) => code,
            None => {
                return DecisionRecord::new(
                    policy.block_unknown,
                    Country::Unknown,
                    AccessReason::UnknownCountry,
                    request,
                );
            }
        };

        if !policy.blocked_countries.is_empty() && policy.blocked_countries.contains(code.as_str())
        {
            return DecisionRecord::new(
                true,
                Country::Code(code),
                AccessReason::InBlocklist,
                request,
            );
        }

        if !policy.allowed_countries.is_empty() && !policy.allowed_countries.contains(code.as_str())
        {
            return DecisionRecord::new(
                true,
                Country::Code(code),
                AccessReason::NotInAllowlist,
                request,
            );
        }

        DecisionRecord::new(false, Country::Code(code), AccessReason::GeoAllowed, request)
    }
}
