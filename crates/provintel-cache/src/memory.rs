use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::future::Cache;
use moka::ops::compute::{CompResult, Op};
use provintel_models::ProviderRecord;
use serde::Serialize;

/// A cached provider record and its freshness window.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub record: Arc<ProviderRecord>,
    pub cached_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Diagnostic counters for the intelligence cache.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CacheStats {
    pub entry_count: u64,
    pub ttl_seconds: u64,
    pub valid_count: u64,
    pub expired_count: u64,
    pub last_update: Option<DateTime<Utc>>,
}

/// In-memory provider intelligence store backed by moka.
///
/// Entries carry their own `expires_at`; `lookup` only ever returns fresh
/// entries, and expired ones stay in place until `sweep_expired` removes them.
/// A write replaces the whole entry, so readers see either the old or the new
/// `Arc<CacheEntry>`.
pub struct IntelligenceCache {
    inner: Cache<String, Arc<CacheEntry>>,
    ttl: Duration,
    last_update_ms: AtomicI64,
}

impl IntelligenceCache {
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder().max_capacity(max_capacity).build(),
            ttl,
            last_update_ms: AtomicI64::new(0),
        }
    }

    /// The TTL applied by callers that do not pick their own.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the entry for `address` if it has not expired.
    pub async fn lookup(&self, address: &str) -> Option<Arc<CacheEntry>> {
        let entry = self.inner.get(address).await?;
        entry.is_valid_at(Utc::now()).then_some(entry)
    }

    /// Store `record` under `address`, replacing any existing entry.
    pub async fn put(
        &self,
        address: &str,
        record: Arc<ProviderRecord>,
        ttl: Duration,
    ) -> Arc<CacheEntry> {
        let cached_at = Utc::now();
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| cached_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let entry = Arc::new(CacheEntry {
            record,
            cached_at,
            expires_at,
        });
        self.inner
            .insert(address.to_string(), Arc::clone(&entry))
            .await;
        self.last_update_ms
            .store(cached_at.timestamp_millis(), Ordering::Relaxed);
        entry
    }

    /// Remove every entry whose expiry has passed. Returns the number removed.
    ///
    /// Each removal re-checks expiry under moka's per-key lock, so an entry
    /// refreshed between detection and removal is kept.
    pub async fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let expired: Vec<Arc<String>> = self
            .inner
            .iter()
            .filter(|(_, entry)| !entry.is_valid_at(now))
            .map(|(key, _)| key)
            .collect();

        let mut removed = 0;
        for key in expired {
            let result = self
                .inner
                .entry_by_ref(key.as_str())
                .and_compute_with(|current| {
                    let op = match current {
                        Some(entry) if !entry.value().is_valid_at(now) => Op::Remove,
                        _ => Op::Nop,
                    };
                    std::future::ready(op)
                })
                .await;
            if matches!(result, CompResult::Removed(_)) {
                removed += 1;
            }
        }

        if removed > 0 {
            self.inner.run_pending_tasks().await;
        }
        removed
    }

    pub async fn stats(&self) -> CacheStats {
        let now = Utc::now();
        let (mut valid, mut expired) = (0u64, 0u64);
        for (_, entry) in self.inner.iter() {
            if entry.is_valid_at(now) {
                valid += 1;
            } else {
                expired += 1;
            }
        }

        let last_update = match self.last_update_ms.load(Ordering::Relaxed) {
            0 => None,
            ms => DateTime::from_timestamp_millis(ms),
        };

        CacheStats {
            entry_count: valid + expired,
            ttl_seconds: self.ttl.as_secs(),
            valid_count: valid,
            expired_count: expired,
            last_update,
        }
    }

    /// Number of entries, fresh or not, after flushing moka's pending maintenance.
    pub async fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks().await;
        self.inner.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(address: &str) -> Arc<ProviderRecord> {
        Arc::new(ProviderRecord::failed(address, "test"))
    }

    #[tokio::test]
    async fn put_and_lookup() {
        let cache = IntelligenceCache::new(100, Duration::from_secs(60));
        let rec = record("akash1a");
        cache.put("akash1a", Arc::clone(&rec), cache.ttl()).await;

        let entry = cache.lookup("akash1a").await.unwrap();
        assert!(Arc::ptr_eq(&entry.record, &rec));
        assert!(entry.expires_at > entry.cached_at);
    }

    #[tokio::test]
    async fn lookup_missing() {
        let cache = IntelligenceCache::new(100, Duration::from_secs(60));
        assert!(cache.lookup("nonexistent").await.is_none());
    }

    #[tokio::test]
    async fn expired_entry_is_not_served() {
        let cache = IntelligenceCache::new(100, Duration::from_secs(60));
        cache.put("akash1a", record("akash1a"), Duration::ZERO).await;

        assert!(cache.lookup("akash1a").await.is_none());
        // Still physically present until swept.
        assert_eq!(cache.entry_count().await, 1);
    }

    #[tokio::test]
    async fn ttl_expiration() {
        let cache = IntelligenceCache::new(100, Duration::from_millis(50));
        cache.put("akash1a", record("akash1a"), cache.ttl()).await;
        assert!(cache.lookup("akash1a").await.is_some());

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(cache.lookup("akash1a").await.is_none());
    }

    #[tokio::test]
    async fn put_replaces_existing_entry() {
        let cache = IntelligenceCache::new(100, Duration::from_secs(60));
        let first = record("akash1a");
        let second = record("akash1a");
        cache.put("akash1a", Arc::clone(&first), cache.ttl()).await;
        cache.put("akash1a", Arc::clone(&second), cache.ttl()).await;

        let entry = cache.lookup("akash1a").await.unwrap();
        assert!(Arc::ptr_eq(&entry.record, &second));
        assert_eq!(cache.entry_count().await, 1);
    }

    #[tokio::test]
    async fn sweep_removes_only_expired() {
        let cache = IntelligenceCache::new(100, Duration::from_secs(60));
        cache.put("fresh", record("fresh"), cache.ttl()).await;
        cache.put("stale1", record("stale1"), Duration::ZERO).await;
        cache.put("stale2", record("stale2"), Duration::ZERO).await;

        assert_eq!(cache.sweep_expired().await, 2);
        assert_eq!(cache.entry_count().await, 1);
        assert!(cache.lookup("fresh").await.is_some());
    }

    #[tokio::test]
    async fn sweep_is_idempotent() {
        let cache = IntelligenceCache::new(100, Duration::from_secs(60));
        cache.put("fresh", record("fresh"), cache.ttl()).await;
        cache.put("stale", record("stale"), Duration::ZERO).await;

        assert_eq!(cache.sweep_expired().await, 1);
        assert_eq!(cache.sweep_expired().await, 0);
        assert_eq!(cache.entry_count().await, 1);
    }

    #[tokio::test]
    async fn sweep_keeps_refreshed_entry() {
        let cache = IntelligenceCache::new(100, Duration::from_secs(60));
        cache.put("akash1a", record("akash1a"), Duration::ZERO).await;
        cache.put("akash1a", record("akash1a"), cache.ttl()).await;

        assert_eq!(cache.sweep_expired().await, 0);
        assert!(cache.lookup("akash1a").await.is_some());
    }

    #[tokio::test]
    async fn stats_count_valid_and_expired() {
        let cache = IntelligenceCache::new(100, Duration::from_secs(300));
        let empty = cache.stats().await;
        assert_eq!(empty.entry_count, 0);
        assert!(empty.last_update.is_none());

        cache.put("a", record("a"), cache.ttl()).await;
        cache.put("b", record("b"), cache.ttl()).await;
        cache.put("c", record("c"), Duration::ZERO).await;

        let stats = cache.stats().await;
        assert_eq!(stats.entry_count, 3);
        assert_eq!(stats.valid_count, 2);
        assert_eq!(stats.expired_count, 1);
        assert_eq!(stats.ttl_seconds, 300);
        assert!(stats.last_update.is_some());
    }

    #[tokio::test]
    async fn concurrent_readers_and_writers() {
        let cache = Arc::new(IntelligenceCache::new(1_000, Duration::from_secs(60)));
        let mut handles = Vec::new();
        for i in 0..16 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move {
                let key = format!("akash1p{}", i % 4);
                for _ in 0..50 {
                    cache.put(&key, record(&key), cache.ttl()).await;
                    let entry = cache.lookup(&key).await.unwrap();
                    assert_eq!(entry.record.address, key);
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(cache.entry_count().await, 4);
    }
}
