use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::criteria::Weights;

/// Top-level configuration for provintel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProvintelConfig {
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub status: StatusConfig,
    #[serde(default)]
    pub intelligence: IntelligenceConfig,
    #[serde(default)]
    pub selection_weights: Weights,
}

/// Where and how to reach the authoritative provider registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerConfig {
    /// Base URL of the ledger REST gateway, e.g. `https://api.akashnet.net`.
    pub rest_endpoint: String,
    /// HTTP client timeout for a single ledger query.
    #[serde(default = "default_ledger_timeout")]
    pub timeout_seconds: u64,
}

/// Settings for probing provider status endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusConfig {
    #[serde(default = "default_status_timeout")]
    pub timeout_seconds: u64,
    /// Providers commonly serve their status endpoint with self-signed certificates.
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_status_timeout(),
            accept_invalid_certs: false,
        }
    }
}

/// Fan-out, deadline and cache settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IntelligenceConfig {
    /// How long a fetched provider record stays fresh.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_seconds: u64,
    /// Maximum provider pipelines in flight across the whole process.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Interval between background sweeps of expired cache entries.
    #[serde(default = "default_health_check_interval")]
    pub health_check_interval_seconds: u64,
    /// Budget for one provider's ledger query plus status probe.
    #[serde(default = "default_provider_timeout")]
    pub provider_timeout_seconds: u64,
    /// Budget for a whole fan-out batch.
    #[serde(default = "default_batch_timeout")]
    pub batch_timeout_seconds: u64,
    /// Upper bound on cached provider records.
    #[serde(default = "default_cache_max_capacity")]
    pub cache_max_capacity: u64,
}

impl Default for IntelligenceConfig {
    fn default() -> Self {
        Self {
            cache_ttl_seconds: default_cache_ttl(),
            max_concurrent: default_max_concurrent(),
            health_check_interval_seconds: default_health_check_interval(),
            provider_timeout_seconds: default_provider_timeout(),
            batch_timeout_seconds: default_batch_timeout(),
            cache_max_capacity: default_cache_max_capacity(),
        }
    }
}

impl IntelligenceConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_seconds)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_seconds)
    }

    pub fn batch_timeout(&self) -> Duration {
        Duration::from_secs(self.batch_timeout_seconds)
    }
}

fn default_ledger_timeout() -> u64 {
    8
}
fn default_status_timeout() -> u64 {
    3
}
fn default_cache_ttl() -> u64 {
    300
}
fn default_max_concurrent() -> usize {
    10
}
fn default_health_check_interval() -> u64 {
    30
}
fn default_provider_timeout() -> u64 {
    8
}
fn default_batch_timeout() -> u64 {
    15
}
fn default_cache_max_capacity() -> u64 {
    10_000
}
