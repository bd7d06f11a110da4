//! Engine configuration loading.
//!
//! The embedding process hands the engine one [`EngineConfig`], typically
//! deserialized from a YAML file. Every field has a default, so a partial
//! file (or none at all) yields a working fail-closed configuration.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::fallback::{DEFAULT_FALLBACK_TIMEOUT, DEFAULT_FALLBACK_URL};
use crate::policy::{SecurityPolicy, DEFAULT_LOCAL_IP_RANGES};
use crate::resolver::{DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL};

/// Static configuration for the access decision engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Allow local/private addresses without country resolution
    pub ignore_local_ips: bool,
    /// CIDR ranges considered local
    pub local_ip_ranges: Vec<String>,
    /// Block requests whose country cannot be resolved
    pub block_unknown: bool,
    /// Allowlist of ISO country codes (empty = allow all)
    pub allowed_countries: Vec<String>,
    /// Blocklist of ISO country codes
    pub blocked_countries: Vec<String>,
    /// Path to the local country database (`.mmdb`, optionally `.gz`)
    pub database_path: PathBuf,
    /// Fallback lookup URL template containing the `{ip}` placeholder
    pub fallback_url: String,
    /// Timeout for one fallback lookup, in seconds
    pub fallback_timeout_secs: u64,
    /// Maximum number of cached resolutions
    pub cache_capacity: usize,
    /// Time-to-live of one cached resolution, in seconds
    pub cache_ttl_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ignore_local_ips: true,
            local_ip_ranges: DEFAULT_LOCAL_IP_RANGES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            block_unknown: true,
            allowed_countries: Vec::new(),
            blocked_countries: Vec::new(),
            database_path: PathBuf::from("GeoLite2-Country.mmdb"),
            fallback_url: DEFAULT_FALLBACK_URL.to_string(),
            fallback_timeout_secs: DEFAULT_FALLBACK_TIMEOUT.as_secs(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            cache_ttl_secs: DEFAULT_CACHE_TTL.as_secs(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Build the normalized base policy from this configuration.
    pub fn policy(&self) -> SecurityPolicy {
        SecurityPolicy::new(
            self.ignore_local_ips,
            self.local_ip_ranges.clone(),
            self.block_unknown,
            self.allowed_countries.iter().cloned(),
            self.blocked_countries.iter().cloned(),
        )
    }

    /// Fallback lookup timeout as a [`Duration`].
    pub fn fallback_timeout(&self) -> Duration {
        Duration::from_secs(self.fallback_timeout_secs)
    }

    /// Cache entry TTL as a [`Duration`].
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}
