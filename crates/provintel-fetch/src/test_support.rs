//! Mock ledger and status clients for exercising the aggregator without a
//! network. Shared with the integration suites of downstream crates.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use provintel_models::{ClusterSnapshot, LedgerInfo};

use crate::error::FetchError;
use crate::ledger::LedgerClient;
use crate::status::StatusClient;

/// Build a `LedgerInfo` from a host URI and attribute pairs.
pub fn ledger_info(host_uri: &str, attributes: &[(&str, &str)]) -> LedgerInfo {
    LedgerInfo {
        host_uri: host_uri.to_string(),
        attributes: attributes
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<BTreeMap<_, _>>(),
    }
}

/// A cluster snapshot with the given lease and node counts.
pub fn snapshot(active_leases: u64, available_nodes: usize) -> ClusterSnapshot {
    ClusterSnapshot {
        active_leases,
        available_nodes,
        ..ClusterSnapshot::default()
    }
}

/// Tracks how many calls are running at once.
#[derive(Default)]
struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlight {
    fn enter(&self) -> InFlightGuard<'_> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        InFlightGuard(self)
    }
}

struct InFlightGuard<'a>(&'a InFlight);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A ledger that answers from a fixed table.
///
/// Unknown addresses fail with `provider not found`.
#[derive(Default)]
pub struct MockLedgerClient {
    providers: HashMap<String, LedgerInfo>,
    failing: HashSet<String>,
    panicking: HashSet<String>,
    delay: Duration,
    delays: HashMap<String, Duration>,
    calls: AtomicUsize,
    in_flight: InFlight,
}

impl MockLedgerClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(mut self, address: &str, info: LedgerInfo) -> Self {
        self.providers.insert(address.to_string(), info);
        self
    }

    /// Make `address` fail even if it is registered.
    pub fn with_failure(mut self, address: &str) -> Self {
        self.failing.insert(address.to_string());
        self
    }

    /// Make the query for `address` panic.
    pub fn with_panic(mut self, address: &str) -> Self {
        self.panicking.insert(address.to_string());
        self
    }

    /// Delay every answer by `delay` (tokio time, so paused clocks apply).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Delay answers for `address` only; overrides `with_delay` for it.
    pub fn with_address_delay(mut self, address: &str, delay: Duration) -> Self {
        self.delays.insert(address.to_string(), delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of queries observed running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.in_flight.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerClient for MockLedgerClient {
    async fn fetch_ledger_info(&self, provider_address: &str) -> Result<LedgerInfo, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let _guard = self.in_flight.enter();

        let delay = self
            .delays
            .get(provider_address)
            .copied()
            .unwrap_or(self.delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.panicking.contains(provider_address) {
            panic!("mock ledger panicked for {provider_address}");
        }
        if self.failing.contains(provider_address) {
            return Err(FetchError::LedgerQueryFailed(format!(
                "registry returned 500 for {provider_address}"
            )));
        }
        self.providers
            .get(provider_address)
            .cloned()
            .ok_or_else(|| FetchError::LedgerQueryFailed("provider not found".to_string()))
    }
}

/// A status surface that answers from a fixed table keyed by host URI.
///
/// Unknown hosts fail with `connection refused`.
#[derive(Default)]
pub struct MockStatusClient {
    snapshots: HashMap<String, ClusterSnapshot>,
    delays: HashMap<String, Duration>,
    calls: AtomicUsize,
}

impl MockStatusClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, host_uri: &str, snapshot: ClusterSnapshot) -> Self {
        self.snapshots.insert(host_uri.to_string(), snapshot);
        self
    }

    /// Delay answers for `host_uri` by `delay`.
    pub fn with_delay(mut self, host_uri: &str, delay: Duration) -> Self {
        self.delays.insert(host_uri.to_string(), delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusClient for MockStatusClient {
    async fn fetch_status(&self, host_uri: &str) -> Result<ClusterSnapshot, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(host_uri) {
            tokio::time::sleep(*delay).await;
        }
        self.snapshots
            .get(host_uri)
            .cloned()
            .ok_or_else(|| FetchError::StatusQueryFailed(format!("connection refused: {host_uri}")))
    }
}
