//! Engine facade wiring the decision pipeline together.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::country::Country;
use crate::database::{LocalDatabaseManager, WatchGuard};
use crate::decision::{AccessReason, AccessRequest, DecisionRecord};
use crate::error::Result;
use crate::evaluator::AccessPolicyEvaluator;
use crate::fallback::FallbackLookupClient;
use crate::metrics::MetricsSink;
use crate::policy::SecurityPolicy;
use crate::resolver::CountryResolver;

/// The access decision engine.
///
/// Holds the base policy and the evaluator; per request it merges any
/// overrides into an effective policy, evaluates, and emits one decision
/// metric. Evaluation runs behind a panic boundary: an internal failure
/// produces the configured fail-open/fail-closed default instead of
/// propagating.
pub struct AccessEngine {
    base_policy: Arc<SecurityPolicy>,
    evaluator: AccessPolicyEvaluator,
    metrics: Arc<dyn MetricsSink>,
}

impl AccessEngine {
    /// Create an engine from pre-built parts.
    pub fn new(
        base_policy: SecurityPolicy,
        evaluator: AccessPolicyEvaluator,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            base_policy: Arc::new(base_policy),
            evaluator,
            metrics,
        }
    }

    /// Build the whole pipeline from configuration.
    ///
    /// Attempts an initial database load; a missing or unreadable database
    /// leaves the engine in degraded fallback-only mode rather than failing
    /// construction.
    pub fn from_config(config: &EngineConfig, metrics: Arc<dyn MetricsSink>) -> Self {
        let database = LocalDatabaseManager::new(&config.database_path, metrics.clone());
        // reload logs failures; the engine starts degraded in that case
        let _ = database.reload();

        let fallback = FallbackLookupClient::with_timeout(
            &config.fallback_url,
            config.fallback_timeout(),
            metrics.clone(),
        );
        let resolver = CountryResolver::with_cache(
            database,
            fallback,
            metrics.clone(),
            config.cache_capacity,
            config.cache_ttl(),
        );

        Self::new(config.policy(), AccessPolicyEvaluator::new(resolver), metrics)
    }

    /// The configured base policy.
    pub fn base_policy(&self) -> &Arc<SecurityPolicy> {
        &self.base_policy
    }

    /// The database manager backing the resolver.
    pub fn database(&self) -> &LocalDatabaseManager {
        self.evaluator.resolver().database()
    }

    /// Start watching the database file for hot reloads.
    pub fn watch_database(&self) -> Result<WatchGuard> {
        self.database().watch()
    }

    /// Decide one request.
    pub fn decide(&self, request: &AccessRequest) -> DecisionRecord {
        let policy = request.overrides.merge(&self.base_policy);

        let record = panic::catch_unwind(AssertUnwindSafe(|| {
            self.evaluator.evaluate(request, &policy)
        }))
        .unwrap_or_else(|_| {
            log::error!(
                "evaluation failed internally, applying default (block_unknown={})",
                policy.block_unknown
            );
            DecisionRecord::new(
                policy.block_unknown,
                Country::Absent,
                AccessReason::SystemError,
                request,
            )
        });

        self.metrics
            .record_decision(record.blocked, record.country.as_str(), record.reason);
        log::debug!(
            "decision: {} country={} reason={}",
            record.access_label(),
            record.country,
            record.reason
        );

        record
    }
}
