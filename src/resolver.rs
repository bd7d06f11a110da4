//! Cache-aside country resolution.
//!
//! The resolver consults a concurrent cache first, then the local database,
//! then the remote fallback. Positive resolutions are cached with a fixed
//! TTL; negative ones are returned but never cached, so a permanently
//! unresolvable address repeats the full two-stage lookup on every call.
//!
//! Concurrent misses for the same key are not de-duplicated: two racing
//! requests may both run the local-then-fallback chain. Results are
//! idempotent, so this is wasted work, not a correctness hazard.

use quick_cache::sync::Cache;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::database::LocalDatabaseManager;
use crate::fallback::FallbackLookupClient;
use crate::metrics::{CacheOutcome, MetricsSink};

/// Default maximum number of cached resolutions.
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

/// Default time-to-live of one cached resolution (24h).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// One cached resolution.
#[derive(Clone)]
struct CachedCountry {
    code: String,
    inserted_at: Instant,
}

/// Cache statistics.
#[derive(Debug, Clone, Copy)]
pub struct CacheStats {
    /// Maximum cache capacity.
    pub capacity: usize,
    /// Current number of entries in the cache.
    pub len: usize,
}

/// Country resolver orchestrating cache, local database and fallback.
pub struct CountryResolver {
    cache: Cache<String, CachedCountry>,
    capacity: usize,
    ttl: Duration,
    database: LocalDatabaseManager,
    fallback: FallbackLookupClient,
    metrics: Arc<dyn MetricsSink>,
}

impl CountryResolver {
    /// Create a resolver with the default cache capacity and TTL.
    pub fn new(
        database: LocalDatabaseManager,
        fallback: FallbackLookupClient,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self::with_cache(
            database,
            fallback,
            metrics,
            DEFAULT_CACHE_CAPACITY,
            DEFAULT_CACHE_TTL,
        )
    }

    /// Create a resolver with a custom cache capacity and TTL.
    pub fn with_cache(
        database: LocalDatabaseManager,
        fallback: FallbackLookupClient,
        metrics: Arc<dyn MetricsSink>,
        capacity: usize,
        ttl: Duration,
    ) -> Self {
        Self {
            cache: Cache::new(capacity),
            capacity,
            ttl,
            database,
            fallback,
            metrics,
        }
    }

    /// Resolve the country code for an address string.
    ///
    /// The cache is keyed by the raw address string. Entries past their TTL
    /// count as misses and are overwritten by the next positive resolution.
    pub fn resolve(&self, address: &str) -> Option<String> {
        if let Some(entry) = self.cache.get(address) {
            if entry.inserted_at.elapsed() < self.ttl {
                self.metrics.record_cache(CacheOutcome::Hit);
                return Some(entry.code);
            }
        }
        self.metrics.record_cache(CacheOutcome::Miss);

        // Local database first, remote fallback second
        let resolved = address
            .parse::<IpAddr>()
            .ok()
            .and_then(|ip| self.database.lookup(ip))
            .or_else(|| self.fallback.lookup(address));

        let code = resolved?.to_uppercase();
        self.cache.insert(
            address.to_string(),
            CachedCountry {
                code: code.clone(),
                inserted_at: Instant::now(),
            },
        );
        Some(code)
    }

    /// Current cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            capacity: self.capacity,
            len: self.cache.len(),
        }
    }

    /// Drop all cached resolutions.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// The local database manager backing this resolver.
    pub fn database(&self) -> &LocalDatabaseManager {
        &self.database
    }
}
