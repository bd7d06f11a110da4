//! Injected metrics collection.
//!
//! Components report per-category outcomes to a [`MetricsSink`] passed in at
//! construction time, so they stay testable without a process-wide registry.
//! The embedding service wires the sink to its own metrics pipeline;
//! [`NoopMetrics`] discards everything and [`CounterMetrics`] keeps plain
//! atomic counters.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::decision::AccessReason;

/// Outcome of a resolution-cache probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    /// Entry present and within its TTL
    Hit,
    /// Entry absent or expired
    Miss,
}

impl CacheOutcome {
    /// Get the label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheOutcome::Hit => "hit",
            CacheOutcome::Miss => "miss",
        }
    }
}

/// Outcome of a local database lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseOutcome {
    /// Database resolved a country code
    Hit,
    /// Database loaded but has no record for the address
    Miss,
    /// No database handle loaded
    NotReady,
}

impl DatabaseOutcome {
    /// Get the label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseOutcome::Hit => "hit",
            DatabaseOutcome::Miss => "miss",
            DatabaseOutcome::NotReady => "not-ready",
        }
    }
}

/// Outcome of a remote fallback lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackOutcome {
    /// Remote returned a usable country code
    Success,
    /// Connect or read deadline elapsed
    Timeout,
    /// Non-success HTTP status
    HttpStatus,
    /// Empty or literal "nil" body
    EmptyBody,
    /// Transport or body-read failure
    Transport,
    /// URL template missing its placeholder; no network attempt made
    BadTemplate,
}

impl FallbackOutcome {
    /// Get the label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackOutcome::Success => "success",
            FallbackOutcome::Timeout => "timeout",
            FallbackOutcome::HttpStatus => "http-status",
            FallbackOutcome::EmptyBody => "empty-body",
            FallbackOutcome::Transport => "transport",
            FallbackOutcome::BadTemplate => "bad-template",
        }
    }
}

/// Sink for observability events emitted by the decision core.
///
/// All methods have empty default bodies; implementors override what they
/// care about. Implementations must be cheap and non-blocking, they are
/// called on the request path.
pub trait MetricsSink: Send + Sync {
    /// A resolution-cache probe completed.
    fn record_cache(&self, outcome: CacheOutcome) {
        let _ = outcome;
    }

    /// A local database lookup completed.
    fn record_database(&self, outcome: DatabaseOutcome) {
        let _ = outcome;
    }

    /// A remote fallback lookup completed.
    fn record_fallback(&self, outcome: FallbackOutcome) {
        let _ = outcome;
    }

    /// A request decision was produced.
    fn record_decision(&self, blocked: bool, country: Option<&str>, reason: AccessReason) {
        let _ = (blocked, country, reason);
    }
}

/// Sink that discards all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {}

/// Sink backed by plain atomic counters.
///
/// Useful for embedders that scrape counters on their own schedule, and for
/// asserting component behavior in tests.
#[derive(Debug, Default)]
pub struct CounterMetrics {
    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,
    pub database_hits: AtomicU64,
    pub database_misses: AtomicU64,
    pub database_not_ready: AtomicU64,
    pub fallback_success: AtomicU64,
    pub fallback_timeout: AtomicU64,
    pub fallback_http_status: AtomicU64,
    pub fallback_empty_body: AtomicU64,
    pub fallback_transport: AtomicU64,
    pub fallback_bad_template: AtomicU64,
    pub decisions_allowed: AtomicU64,
    pub decisions_blocked: AtomicU64,
}

impl CounterMetrics {
    /// Create a sink with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total fallback calls across all categories.
    pub fn fallback_total(&self) -> u64 {
        self.fallback_success.load(Ordering::Relaxed)
            + self.fallback_timeout.load(Ordering::Relaxed)
            + self.fallback_http_status.load(Ordering::Relaxed)
            + self.fallback_empty_body.load(Ordering::Relaxed)
            + self.fallback_transport.load(Ordering::Relaxed)
            + self.fallback_bad_template.load(Ordering::Relaxed)
    }
}

impl MetricsSink for CounterMetrics {
    fn record_cache(&self, outcome: CacheOutcome) {
        let counter = match outcome {
            CacheOutcome::Hit => &self.cache_hits,
            CacheOutcome::Miss => &self.cache_misses,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn record_database(&self, outcome: DatabaseOutcome) {
        let counter = match outcome {
            DatabaseOutcome::Hit => &self.database_hits,
            DatabaseOutcome::Miss => &self.database_misses,
            DatabaseOutcome::NotReady => &self.database_not_ready,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn record_fallback(&self, outcome: FallbackOutcome) {
        let counter = match outcome {
            FallbackOutcome::Success => &self.fallback_success,
            FallbackOutcome::Timeout => &self.fallback_timeout,
            FallbackOutcome::HttpStatus => &self.fallback_http_status,
            FallbackOutcome::EmptyBody => &self.fallback_empty_body,
            FallbackOutcome::Transport => &self.fallback_transport,
            FallbackOutcome::BadTemplate => &self.fallback_bad_template,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn record_decision(&self, blocked: bool, _country: Option<&str>, _reason: AccessReason) {
        let counter = if blocked {
            &self.decisions_blocked
        } else {
            &self.decisions_allowed
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}
