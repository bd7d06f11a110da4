//! Remote fallback country lookup.
//!
//! One HTTP GET per lookup against a templated URL, used when the local
//! database cannot resolve an address. Every failure category is logged and
//! counted separately, but the caller only ever sees `Option<String>`: the
//! lookup never raises.

use std::sync::Arc;
use std::time::Duration;

use crate::metrics::{FallbackOutcome, MetricsSink};

/// Placeholder substituted with the address in the URL template.
pub const URL_PLACEHOLDER: &str = "{ip}";

/// Default lookup endpoint (plain-text country code responses).
pub const DEFAULT_FALLBACK_URL: &str = "https://ipapi.co/{ip}/country/";

/// Default per-lookup timeout.
pub const DEFAULT_FALLBACK_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for the remote country lookup endpoint.
pub struct FallbackLookupClient {
    agent: ureq::Agent,
    url_template: String,
    metrics: Arc<dyn MetricsSink>,
}

impl FallbackLookupClient {
    /// Create a client with the default timeout.
    ///
    /// `url_template` must contain [`URL_PLACEHOLDER`] exactly once.
    pub fn new(url_template: &str, metrics: Arc<dyn MetricsSink>) -> Self {
        Self::with_timeout(url_template, DEFAULT_FALLBACK_TIMEOUT, metrics)
    }

    /// Create a client with a custom timeout.
    ///
    /// The timeout bounds the whole call (connect, send, read) and is the
    /// only cancellation boundary of the decision core.
    pub fn with_timeout(
        url_template: &str,
        timeout: Duration,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            url_template: url_template.to_string(),
            metrics,
        }
    }

    /// The configured URL template.
    pub fn url_template(&self) -> &str {
        &self.url_template
    }

    /// Look up the country code for an address.
    ///
    /// Returns `None` for every failure category; an empty or literal
    /// `"nil"` body means the remote has no answer, which is not a
    /// transport failure. A successful body is trimmed and upper-cased.
    pub fn lookup(&self, address: &str) -> Option<String> {
        if self.url_template.matches(URL_PLACEHOLDER).count() != 1 {
            log::error!(
                "fallback URL template must contain {:?} exactly once: {:?}",
                URL_PLACEHOLDER,
                self.url_template
            );
            self.metrics.record_fallback(FallbackOutcome::BadTemplate);
            return None;
        }

        let url = self.url_template.replace(URL_PLACEHOLDER, address);

        match self.agent.get(&url).call() {
            Ok(response) => self.read_body(response, address),
            Err(ureq::Error::Status(code, _)) => {
                log::warn!("fallback lookup for {} returned HTTP {}", address, code);
                self.metrics.record_fallback(FallbackOutcome::HttpStatus);
                None
            }
            Err(ureq::Error::Transport(transport)) => {
                let outcome = classify_transport(&transport);
                log::warn!(
                    "fallback lookup for {} failed ({}): {}",
                    address,
                    outcome.as_str(),
                    transport
                );
                self.metrics.record_fallback(outcome);
                None
            }
        }
    }

    fn read_body(&self, response: ureq::Response, address: &str) -> Option<String> {
        let body = match response.into_string() {
            Ok(body) => body,
            Err(e) => {
                let outcome = match e.kind() {
                    std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
                        FallbackOutcome::Timeout
                    }
                    _ => FallbackOutcome::Transport,
                };
                log::warn!(
                    "fallback lookup for {} failed reading body ({}): {}",
                    address,
                    outcome.as_str(),
                    e
                );
                self.metrics.record_fallback(outcome);
                return None;
            }
        };

        let code = body.trim();
        if code.is_empty() || code.eq_ignore_ascii_case("nil") {
            log::debug!("fallback lookup for {} returned no result", address);
            self.metrics.record_fallback(FallbackOutcome::EmptyBody);
            return None;
        }

        self.metrics.record_fallback(FallbackOutcome::Success);
        Some(code.to_uppercase())
    }
}

fn classify_transport(transport: &ureq::Transport) -> FallbackOutcome {
    let message = transport.to_string().to_lowercase();
    if message.contains("timed out") || message.contains("timeout") {
        FallbackOutcome::Timeout
    } else {
        FallbackOutcome::Transport
    }
}
