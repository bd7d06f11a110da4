//! Geogate - a country-based access decision engine.
//!
//! This crate decides, per inbound request, whether to allow or block
//! traffic based on the requester's country, private/local-address status,
//! and a dynamically overridable policy.
//!
//! # Features
//!
//! - **CIDR local-address detection**: IPv4 and IPv6 range matching that
//!   never raises on malformed input
//! - **Layered country resolution**: concurrent TTL cache over a local
//!   GeoIP database, with a templated remote lookup as fallback
//! - **Hot reload**: the database file is watched and atomically swapped
//!   in without interrupting lookups
//! - **Deterministic precedence**: blocklist always wins over allowlist
//! - **Per-request overrides**: any policy field can be replaced for a
//!   single request, including clearing a list
//! - **Injected metrics**: every cache, database, fallback and decision
//!   outcome is reported to a caller-supplied sink
//!
//! # Quick Start
//!
//! ```ignore
//! use geogate::{AccessEngine, AccessRequest, EngineConfig, NoopMetrics};
//! use std::sync::Arc;
//!
//! let config = EngineConfig::load("geogate.yaml")?;
//! let engine = AccessEngine::from_config(&config, Arc::new(NoopMetrics));
//!
//! // Keep the database fresh while the guard is alive
//! let _watch = engine.watch_database()?;
//!
//! let record = engine.decide(&AccessRequest::from_address("203.0.113.7"));
//! if record.blocked {
//!     println!("blocked: {} ({})", record.country, record.reason);
//! }
//! ```
//!
//! # Decision Order
//!
//! Rules short-circuit in a fixed order:
//! 1. No usable client address - apply `block_unknown`
//! 2. Address in a configured local range - allow
//! 3. Country unresolvable - apply `block_unknown`
//! 4. Country on the blocklist - block
//! 5. Allowlist active and country not on it - block
//! 6. Otherwise - allow
//!
//! Internal evaluation failures are caught at the engine boundary and
//! mapped to the `block_unknown` default with reason `system-error`.

mod config;
mod country;
mod decision;
mod engine;
mod error;
mod evaluator;
mod fallback;
mod metrics;
mod policy;
mod resolver;

pub mod cidr;
pub mod database;

// Re-export core types
pub use error::{Error, Result};

// Re-export decision types
pub use country::Country;
pub use decision::{AccessReason, AccessRequest, DecisionRecord};

// Re-export policy types
pub use policy::{PolicyOverride, SecurityPolicy, DEFAULT_LOCAL_IP_RANGES};

// Re-export the engine and its parts
pub use config::EngineConfig;
pub use database::{CountryDatabase, DatabaseHandle, LocalDatabaseManager, WatchGuard};
pub use engine::AccessEngine;
pub use evaluator::AccessPolicyEvaluator;
pub use fallback::{FallbackLookupClient, DEFAULT_FALLBACK_URL, URL_PLACEHOLDER};
pub use resolver::{CacheStats, CountryResolver};

// Re-export metrics capability
pub use metrics::{
    CacheOutcome, CounterMetrics, DatabaseOutcome, FallbackOutcome, MetricsSink, NoopMetrics,
};
