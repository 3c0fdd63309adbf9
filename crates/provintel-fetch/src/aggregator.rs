use std::sync::Arc;
use std::time::Duration;

use provintel_cache::IntelligenceCache;
use provintel_models::{IntelligenceConfig, ProviderRecord, StatusConfig};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, warn};

use crate::error::FetchError;
use crate::health::health_score;
use crate::ledger::LedgerClient;
use crate::status::StatusClient;

/// Slack allowed past the batch deadline for tasks to hand back their
/// already-clamped results before they are aborted.
const JOIN_GRACE: Duration = Duration::from_millis(50);

/// Limits and deadlines for one fan-out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FanOutSettings {
    pub max_concurrent: usize,
    /// Budget for a provider's ledger query plus status probe.
    pub provider_timeout: Duration,
    /// Budget for the status probe alone, carved out of `provider_timeout`.
    pub status_timeout: Duration,
    pub batch_timeout: Duration,
    pub cache_ttl: Duration,
}

impl Default for FanOutSettings {
    fn default() -> Self {
        Self {
            max_concurrent: 10,
            provider_timeout: Duration::from_secs(8),
            status_timeout: Duration::from_secs(3),
            batch_timeout: Duration::from_secs(15),
            cache_ttl: Duration::from_secs(300),
        }
    }
}

impl FanOutSettings {
    pub fn from_config(intelligence: &IntelligenceConfig, status: &StatusConfig) -> Self {
        Self {
            max_concurrent: intelligence.max_concurrent,
            provider_timeout: intelligence.provider_timeout(),
            status_timeout: Duration::from_secs(status.timeout_seconds),
            batch_timeout: intelligence.batch_timeout(),
            cache_ttl: intelligence.cache_ttl(),
        }
    }
}

/// Fans provider lookups out across the ledger and status clients.
///
/// Fresh cache entries are served directly. Every other provider gets its own
/// task, gated by a semaphore shared with every clone of this aggregator, and
/// each outcome (degraded or not) is written to the cache before it is
/// returned. Results come back in request order.
#[derive(Clone)]
pub struct Aggregator {
    ledger: Arc<dyn LedgerClient>,
    status: Arc<dyn StatusClient>,
    cache: Arc<IntelligenceCache>,
    limiter: Arc<Semaphore>,
    settings: FanOutSettings,
}

impl Aggregator {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        status: Arc<dyn StatusClient>,
        cache: Arc<IntelligenceCache>,
        settings: FanOutSettings,
    ) -> Self {
        let limiter = Arc::new(Semaphore::new(settings.max_concurrent.max(1)));
        Self::with_limiter(ledger, status, cache, limiter, settings)
    }

    /// Build an aggregator around an existing limiter, so several aggregators
    /// share one concurrency budget.
    pub fn with_limiter(
        ledger: Arc<dyn LedgerClient>,
        status: Arc<dyn StatusClient>,
        cache: Arc<IntelligenceCache>,
        limiter: Arc<Semaphore>,
        settings: FanOutSettings,
    ) -> Self {
        Self {
            ledger,
            status,
            cache,
            limiter,
            settings,
        }
    }

    pub fn limiter(&self) -> Arc<Semaphore> {
        Arc::clone(&self.limiter)
    }

    pub fn cache(&self) -> Arc<IntelligenceCache> {
        Arc::clone(&self.cache)
    }

    pub fn settings(&self) -> &FanOutSettings {
        &self.settings
    }

    /// Gather intelligence for every address, one record per address in input order.
    ///
    /// Never fails as a whole: per-provider problems are carried on the record.
    pub async fn get_intelligence(&self, addresses: &[String]) -> Vec<Arc<ProviderRecord>> {
        let start = Instant::now();
        let deadline = start + self.settings.batch_timeout;

        let mut slots: Vec<Option<Arc<ProviderRecord>>> = vec![None; addresses.len()];
        let mut handles: Vec<(usize, JoinHandle<Arc<ProviderRecord>>)> = Vec::new();
        let mut cached = 0usize;

        for (i, address) in addresses.iter().enumerate() {
            if let Some(entry) = self.cache.lookup(address).await {
                debug!(provider = %address, "Serving provider from cache");
                slots[i] = Some(Arc::clone(&entry.record));
                cached += 1;
                continue;
            }

            let this = self.clone();
            let address = address.clone();
            handles.push((
                i,
                tokio::spawn(async move {
                    let record = Arc::new(this.fetch_one(&address, deadline).await);
                    this.cache
                        .put(&address, Arc::clone(&record), this.settings.cache_ttl)
                        .await;
                    record
                }),
            ));
        }
        let fetched = handles.len();

        // Collect results (graceful degradation)
        let join_deadline = deadline + JOIN_GRACE;
        for (i, mut handle) in handles {
            let outcome = match timeout_at(join_deadline, &mut handle).await {
                Ok(Ok(record)) => Ok(record),
                Ok(Err(e)) => {
                    error!(provider = %addresses[i], error = %e, "Provider task panicked");
                    Err(FetchError::TaskAborted(e.to_string()))
                }
                Err(_) => {
                    handle.abort();
                    warn!(provider = %addresses[i], "Provider task outlived the batch deadline");
                    Err(FetchError::BatchDeadlineExceeded)
                }
            };

            slots[i] = Some(match outcome {
                Ok(record) => record,
                Err(e) => {
                    let record = Arc::new(ProviderRecord::failed(&addresses[i], e.to_string()));
                    self.cache
                        .put(&addresses[i], Arc::clone(&record), self.settings.cache_ttl)
                        .await;
                    record
                }
            });
        }

        let records: Vec<Arc<ProviderRecord>> = slots
            .into_iter()
            .zip(addresses)
            .map(|(slot, address)| {
                slot.unwrap_or_else(|| {
                    Arc::new(ProviderRecord::failed(
                        address,
                        FetchError::BatchDeadlineExceeded.to_string(),
                    ))
                })
            })
            .collect();

        info!(
            total = addresses.len(),
            cached,
            fetched,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Provider intelligence gathered"
        );

        records
    }

    /// Run one provider's pipeline: permit, ledger query, status probe, score.
    async fn fetch_one(&self, address: &str, deadline: Instant) -> ProviderRecord {
        let _permit = match timeout_at(deadline, Arc::clone(&self.limiter).acquire_owned()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) | Err(_) => {
                warn!(provider = %address, "No fetch slot before the batch deadline");
                return ProviderRecord::failed(
                    address,
                    FetchError::ConcurrencyLimitExceeded.to_string(),
                );
            }
        };

        let provider_deadline = deadline.min(Instant::now() + self.settings.provider_timeout);

        let ledger_start = Instant::now();
        let ledger = timeout_at(provider_deadline, self.ledger.fetch_ledger_info(address)).await;
        let ledger_time = ledger_start.elapsed();

        let info = match ledger {
            Ok(Ok(info)) => info,
            Ok(Err(e)) => {
                warn!(provider = %address, error = %e, "Ledger query failed");
                return ProviderRecord::failed(address, e.to_string());
            }
            Err(_) => {
                let e = FetchError::LedgerQueryFailed(format!(
                    "timed out after {} ms",
                    ledger_time.as_millis()
                ));
                warn!(provider = %address, error = %e, "Ledger query timed out");
                return ProviderRecord::failed(address, e.to_string());
            }
        };
        debug!(provider = %address, elapsed_ms = ledger_time.as_millis() as u64, "Ledger query succeeded");

        let mut record = ProviderRecord::from_ledger(address, info, ledger_time);

        if !record.host_uri.is_empty() {
            let status_deadline =
                provider_deadline.min(Instant::now() + self.settings.status_timeout);
            let status_start = Instant::now();
            let status = timeout_at(status_deadline, self.status.fetch_status(&record.host_uri)).await;
            let status_time = status_start.elapsed();

            match status {
                Ok(Ok(snapshot)) => {
                    if !snapshot.parse_warnings.is_empty() {
                        debug!(
                            provider = %address,
                            warnings = snapshot.parse_warnings.len(),
                            "Status payload had undecodable fields"
                        );
                    }
                    record.cluster = Some(snapshot);
                    record.status_query_time = Some(status_time);
                }
                Ok(Err(e)) => {
                    warn!(provider = %address, error = %e, "Status probe failed");
                    record.status_query_time = Some(status_time);
                    record.error = Some(e.to_string());
                }
                Err(_) => {
                    let e = FetchError::StatusQueryFailed(format!(
                        "timed out after {} ms",
                        status_time.as_millis()
                    ));
                    warn!(provider = %address, error = %e, "Status probe timed out");
                    record.status_query_time = Some(status_time);
                    record.error = Some(e.to_string());
                }
            }
        }

        record.health_score = health_score(&record);
        record
    }
}
