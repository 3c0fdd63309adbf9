//! provintel - Provider Intelligence Aggregation & Selection Engine
//!
//! Gathers per-provider intelligence from the ledger and each provider's
//! status endpoint, caches it, and ranks providers against caller-supplied
//! weights and priorities.
//!
//! # Library Usage
//!
//! ```rust,no_run
//! use provintel::models::{ProvintelConfig, SelectionCriteria};
//! use provintel::IntelligenceService;
//!
//! # async fn run(config: ProvintelConfig) -> Result<(), provintel::ServiceError> {
//! let service = IntelligenceService::from_config(config)?;
//! let ids = vec!["akash1provider".to_string()];
//! let selection = service
//!     .select_optimal_provider(&ids, SelectionCriteria::default())
//!     .await?;
//! println!("{}", selection.reasoning);
//! service.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub use provintel_cache as cache;
pub use provintel_fetch as fetch;
pub use provintel_models as models;
pub use provintel_select as select;

pub mod error;
pub mod tools;

pub use error::ServiceError;

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use provintel_cache::{CacheStats, CacheSweeper, IntelligenceCache};
use provintel_fetch::{
    Aggregator, FanOutSettings, HttpStatusClient, LedgerClient, RestLedgerClient, StatusClient,
};
use provintel_models::{ProviderRecord, ProvintelConfig, SelectionCriteria};
use provintel_select::Selection;
use tokio::time::Instant;
use tracing::info;

/// Load and validate configuration from a TOML file.
pub fn load_config(path: impl AsRef<Path>) -> Result<ProvintelConfig, ServiceError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ServiceError::Config(format!("failed to read {}: {e}", path.display())))?;
    let config: ProvintelConfig = toml::from_str(&raw)
        .map_err(|e| ServiceError::Config(format!("failed to parse {}: {e}", path.display())))?;
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &ProvintelConfig) -> Result<(), ServiceError> {
    if config.ledger.rest_endpoint.trim().is_empty() {
        return Err(ServiceError::Config(
            "ledger.rest_endpoint must not be empty".to_string(),
        ));
    }
    if let Some(name) = config.selection_weights.first_invalid() {
        return Err(ServiceError::Config(format!(
            "selection_weights.{name} must be a finite, non-negative number"
        )));
    }
    Ok(())
}

/// The engine's front door: fan-out, cache and selection behind one handle.
///
/// Construction starts the background cache sweeper on the current tokio
/// runtime; `shutdown` stops it.
pub struct IntelligenceService {
    aggregator: Aggregator,
    cache: Arc<IntelligenceCache>,
    sweeper: Option<CacheSweeper>,
    config: ProvintelConfig,
}

impl IntelligenceService {
    /// Build a service talking to the configured ledger gateway over HTTP.
    pub fn from_config(config: ProvintelConfig) -> Result<Self, ServiceError> {
        validate_config(&config)?;
        let ledger = RestLedgerClient::new(
            &config.ledger.rest_endpoint,
            Duration::from_secs(config.ledger.timeout_seconds),
        )?;
        let status = HttpStatusClient::new(
            Duration::from_secs(config.status.timeout_seconds),
            config.status.accept_invalid_certs,
        )?;
        Ok(Self::with_clients(config, Arc::new(ledger), Arc::new(status)))
    }

    /// Build a service around caller-supplied clients.
    pub fn with_clients(
        config: ProvintelConfig,
        ledger: Arc<dyn LedgerClient>,
        status: Arc<dyn StatusClient>,
    ) -> Self {
        let intelligence = &config.intelligence;
        let cache = Arc::new(IntelligenceCache::new(
            intelligence.cache_max_capacity,
            intelligence.cache_ttl(),
        ));
        let settings = FanOutSettings::from_config(intelligence, &config.status);
        let aggregator = Aggregator::new(ledger, status, Arc::clone(&cache), settings);
        let sweeper = CacheSweeper::start(Arc::clone(&cache), intelligence.health_check_interval());

        info!(
            ttl_seconds = intelligence.cache_ttl_seconds,
            max_concurrent = intelligence.max_concurrent,
            "Intelligence service started"
        );

        Self {
            aggregator,
            cache,
            sweeper: Some(sweeper),
            config,
        }
    }

    pub fn config(&self) -> &ProvintelConfig {
        &self.config
    }

    /// One record per distinct address, in first-occurrence order.
    pub async fn get_provider_intelligence(
        &self,
        addresses: &[String],
    ) -> Result<Vec<Arc<ProviderRecord>>, ServiceError> {
        let addresses = normalize_addresses(addresses)?;
        Ok(self.aggregator.get_intelligence(&addresses).await)
    }

    /// Gather intelligence for `addresses` and pick the best provider.
    pub async fn select_optimal_provider(
        &self,
        addresses: &[String],
        criteria: SelectionCriteria,
    ) -> Result<Selection, ServiceError> {
        validate_criteria(&criteria)?;
        let start = Instant::now();

        let records = self.get_provider_intelligence(addresses).await?;
        let mut selection = provintel_select::select(records, &criteria)?;
        selection.query_time_ms = start.elapsed().as_millis() as u64;

        Ok(selection)
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    /// Stop the background sweeper and wait for it to exit.
    pub async fn shutdown(mut self) -> Result<(), ServiceError> {
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.shutdown().await?;
        }
        info!("Intelligence service stopped");
        Ok(())
    }
}

/// Trim, drop blanks and de-duplicate, keeping first occurrences.
fn normalize_addresses(addresses: &[String]) -> Result<Vec<String>, ServiceError> {
    let mut seen = HashSet::new();
    let normalized: Vec<String> = addresses
        .iter()
        .map(|a| a.trim())
        .filter(|a| !a.is_empty())
        .filter(|a| seen.insert(a.to_string()))
        .map(str::to_string)
        .collect();

    if normalized.is_empty() {
        return Err(ServiceError::InvalidInput(
            "no valid provider addresses provided".to_string(),
        ));
    }
    Ok(normalized)
}

fn validate_criteria(criteria: &SelectionCriteria) -> Result<(), ServiceError> {
    if let Some(name) = criteria.weights.first_invalid() {
        return Err(ServiceError::InvalidInput(format!(
            "weight '{name}' must be a finite, non-negative number"
        )));
    }
    if let Some(budget) = criteria.budget {
        if !budget.is_finite() || budget < 0.0 {
            return Err(ServiceError::InvalidInput(
                "budget must be a finite, non-negative number".to_string(),
            ));
        }
    }
    Ok(())
}
