//! Integration tests for the provider fan-out.
//!
//! Each test wires the aggregator to mock ledger and status clients and runs
//! on a paused tokio clock, so deadlines and response times are exact.

use std::sync::Arc;
use std::time::Duration;

use provintel_cache::IntelligenceCache;
use provintel_fetch::test_support::{ledger_info, snapshot, MockLedgerClient, MockStatusClient};
use provintel_fetch::{Aggregator, FanOutSettings};
use tokio::sync::Semaphore;

fn addresses(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("akash1p{i:02}")).collect()
}

fn host(address: &str) -> String {
    format!("https://{address}.example:8443")
}

/// A ledger and status surface where every address is healthy and busy.
fn healthy_mocks(addrs: &[String]) -> (MockLedgerClient, MockStatusClient) {
    let mut ledger = MockLedgerClient::new();
    let mut status = MockStatusClient::new();
    for address in addrs {
        ledger = ledger.with_provider(address, ledger_info(&host(address), &[("region", "us-west-1")]));
        status = status.with_status(&host(address), snapshot(150, 1));
    }
    (ledger, status)
}

fn build(
    ledger: &Arc<MockLedgerClient>,
    status: &Arc<MockStatusClient>,
    settings: FanOutSettings,
) -> Aggregator {
    let cache = Arc::new(IntelligenceCache::new(1_000, settings.cache_ttl));
    Aggregator::new(ledger.clone(), status.clone(), cache, settings)
}

#[tokio::test(start_paused = true)]
async fn healthy_provider_scores_full_marks() {
    let addrs = addresses(1);
    let (ledger, status) = healthy_mocks(&addrs);
    let status = status.with_delay(&host(&addrs[0]), Duration::from_millis(200));
    let (ledger, status) = (Arc::new(ledger), Arc::new(status));
    let aggregator = build(&ledger, &status, FanOutSettings::default());

    let records = aggregator.get_intelligence(&addrs).await;

    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert!(record.error.is_none());
    assert_eq!(record.active_leases(), Some(150));
    let status_time = record.status_query_time.unwrap();
    assert!(status_time >= Duration::from_millis(200) && status_time < Duration::from_millis(210));
    assert!((record.health_score - 1.0).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn cache_hit_within_ttl_skips_second_fetch() {
    let addrs = addresses(3);
    let (ledger, status) = healthy_mocks(&addrs);
    let (ledger, status) = (Arc::new(ledger), Arc::new(status));
    let aggregator = build(&ledger, &status, FanOutSettings::default());

    let first = aggregator.get_intelligence(&addrs).await;
    assert_eq!(ledger.calls(), 3);

    let second = aggregator.get_intelligence(&addrs).await;
    assert_eq!(ledger.calls(), 3);
    assert_eq!(status.calls(), 3);
    for (a, b) in first.iter().zip(&second) {
        assert!(Arc::ptr_eq(a, b));
    }
}

#[tokio::test(start_paused = true)]
async fn order_preserved_with_failing_provider() {
    let addrs = addresses(5);
    let (ledger, status) = healthy_mocks(&addrs);
    let ledger = ledger.with_failure(&addrs[2]);
    let (ledger, status) = (Arc::new(ledger), Arc::new(status));
    let aggregator = build(&ledger, &status, FanOutSettings::default());

    let records = aggregator.get_intelligence(&addrs).await;

    assert_eq!(records.len(), 5);
    for (record, address) in records.iter().zip(&addrs) {
        assert_eq!(&record.address, address);
    }
    assert!(records[2]
        .error
        .as_deref()
        .is_some_and(|e| e.starts_with("ledger query failed")));
    assert_eq!(records[2].health_score, 0.0);
    for i in [0, 1, 3, 4] {
        assert!(records[i].error.is_none());
        assert!(records[i].health_score > 0.9);
    }
}

#[tokio::test(start_paused = true)]
async fn failed_records_are_cached() {
    let addrs = vec!["akash1unknown".to_string()];
    let ledger = Arc::new(MockLedgerClient::new());
    let status = Arc::new(MockStatusClient::new());
    let aggregator = build(&ledger, &status, FanOutSettings::default());

    let first = aggregator.get_intelligence(&addrs).await;
    let second = aggregator.get_intelligence(&addrs).await;

    assert_eq!(ledger.calls(), 1);
    assert!(Arc::ptr_eq(&first[0], &second[0]));
    assert_eq!(
        first[0].error.as_deref(),
        Some("ledger query failed: provider not found")
    );
}

#[tokio::test(start_paused = true)]
async fn concurrency_bound_respected() {
    let addrs = addresses(50);
    let (ledger, status) = healthy_mocks(&addrs);
    let ledger = ledger.with_delay(Duration::from_millis(100));
    let (ledger, status) = (Arc::new(ledger), Arc::new(status));
    let settings = FanOutSettings {
        max_concurrent: 10,
        ..FanOutSettings::default()
    };
    let aggregator = build(&ledger, &status, settings);

    let records = aggregator.get_intelligence(&addrs).await;

    assert_eq!(records.len(), 50);
    assert!(records.iter().all(|r| r.error.is_none()));
    assert_eq!(ledger.calls(), 50);
    assert!(ledger.max_in_flight() <= 10, "peak {}", ledger.max_in_flight());
    assert!(ledger.max_in_flight() > 1);
}

#[tokio::test(start_paused = true)]
async fn limiter_is_shared_across_aggregators() {
    let addrs = addresses(20);
    let (ledger, status) = healthy_mocks(&addrs);
    let ledger = ledger.with_delay(Duration::from_millis(100));
    let (ledger, status) = (Arc::new(ledger), Arc::new(status));
    let settings = FanOutSettings {
        max_concurrent: 4,
        ..FanOutSettings::default()
    };
    let first = build(&ledger, &status, settings);
    let second = Aggregator::with_limiter(
        ledger.clone(),
        status.clone(),
        Arc::new(IntelligenceCache::new(1_000, settings.cache_ttl)),
        first.limiter(),
        settings,
    );

    let (a, b) = tokio::join!(
        first.get_intelligence(&addrs[..10]),
        second.get_intelligence(&addrs[10..])
    );

    assert_eq!(a.len() + b.len(), 20);
    assert!(ledger.max_in_flight() <= 4, "peak {}", ledger.max_in_flight());
}

#[tokio::test(start_paused = true)]
async fn slow_ledger_times_out() {
    let addrs = addresses(1);
    let (ledger, status) = healthy_mocks(&addrs);
    let ledger = ledger.with_delay(Duration::from_secs(10));
    let (ledger, status) = (Arc::new(ledger), Arc::new(status));
    let aggregator = build(&ledger, &status, FanOutSettings::default());

    let start = tokio::time::Instant::now();
    let records = aggregator.get_intelligence(&addrs).await;

    assert!(start.elapsed() >= Duration::from_secs(8));
    let record = &records[0];
    let error = record.error.as_deref().unwrap();
    assert!(error.starts_with("ledger query failed: timed out"), "{error}");
    assert_eq!(record.health_score, 0.0);
    assert!(record.ledger_query_time.is_none());
    assert_eq!(status.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn fast_ledger_failure_carries_no_response_time() {
    let ledger = Arc::new(MockLedgerClient::new().with_failure("akash1dead"));
    let status = Arc::new(MockStatusClient::new());
    let aggregator = build(&ledger, &status, FanOutSettings::default());

    let records = aggregator.get_intelligence(&["akash1dead".to_string()]).await;

    let record = &records[0];
    assert!(record.error.as_deref().is_some_and(|e| e.starts_with("ledger query failed")));
    assert!(record.ledger_query_time.is_none());
    assert!(record.status_query_time.is_none());
    assert_eq!(record.health_score, 0.0);
}

#[tokio::test(start_paused = true)]
async fn status_timeout_keeps_ledger_data() {
    let addrs = addresses(1);
    let (ledger, status) = healthy_mocks(&addrs);
    let status = status.with_delay(&host(&addrs[0]), Duration::from_secs(5));
    let (ledger, status) = (Arc::new(ledger), Arc::new(status));
    let aggregator = build(&ledger, &status, FanOutSettings::default());

    let records = aggregator.get_intelligence(&addrs).await;

    let record = &records[0];
    assert!(record.cluster.is_none());
    let status_time = record.status_query_time.unwrap();
    assert!(status_time >= Duration::from_secs(3) && status_time < Duration::from_millis(3010));
    assert!(record.answered_status_time().is_none());
    assert_eq!(record.host_uri, host(&addrs[0]));
    assert_eq!(record.region(), Some("us-west-1"));
    let error = record.error.as_deref().unwrap();
    assert!(error.starts_with("status query failed: timed out"), "{error}");
    // base + fast ledger + region - error
    assert!((record.health_score - 0.25).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn unreachable_status_gets_partial_score() {
    let ledger = Arc::new(MockLedgerClient::new().with_provider(
        "akash1b",
        ledger_info("https://down.example:8443", &[("tier", "enterprise")]),
    ));
    let status = Arc::new(MockStatusClient::new());
    let aggregator = build(&ledger, &status, FanOutSettings::default());

    let records = aggregator.get_intelligence(&["akash1b".to_string()]).await;

    let record = &records[0];
    assert!(record
        .error
        .as_deref()
        .is_some_and(|e| e.contains("connection refused")));
    assert!(record.status_query_time.is_some());
    // base + fast ledger + enterprise - error
    assert!((record.health_score - 0.30).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn provider_without_host_skips_status_probe() {
    let ledger = Arc::new(
        MockLedgerClient::new().with_provider("akash1c", ledger_info("", &[("region", "eu-west-1")])),
    );
    let status = Arc::new(MockStatusClient::new());
    let aggregator = build(&ledger, &status, FanOutSettings::default());

    let records = aggregator.get_intelligence(&["akash1c".to_string()]).await;

    assert_eq!(status.calls(), 0);
    assert!(records[0].error.is_none());
    assert!((records[0].health_score - 0.35).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn batch_deadline_clamps_provider_timeout() {
    let addrs = addresses(3);
    let (ledger, status) = healthy_mocks(&addrs);
    let ledger = ledger.with_delay(Duration::from_secs(5));
    let (ledger, status) = (Arc::new(ledger), Arc::new(status));
    let settings = FanOutSettings {
        batch_timeout: Duration::from_secs(2),
        ..FanOutSettings::default()
    };
    let aggregator = build(&ledger, &status, settings);

    let start = tokio::time::Instant::now();
    let records = aggregator.get_intelligence(&addrs).await;

    assert!(start.elapsed() < Duration::from_millis(2_100));
    assert_eq!(records.len(), 3);
    for record in &records {
        assert!(record
            .error
            .as_deref()
            .is_some_and(|e| e.starts_with("ledger query failed: timed out")));
    }
}

#[tokio::test(start_paused = true)]
async fn exhausted_limiter_degrades_to_concurrency_errors() {
    let addrs = addresses(2);
    let (ledger, status) = healthy_mocks(&addrs);
    let (ledger, status) = (Arc::new(ledger), Arc::new(status));
    let limiter = Arc::new(Semaphore::new(1));
    let settings = FanOutSettings {
        batch_timeout: Duration::from_secs(1),
        ..FanOutSettings::default()
    };
    let aggregator = Aggregator::with_limiter(
        ledger.clone(),
        status.clone(),
        Arc::new(IntelligenceCache::new(1_000, settings.cache_ttl)),
        Arc::clone(&limiter),
        settings,
    );

    let held = limiter.acquire().await.unwrap();
    let records = aggregator.get_intelligence(&addrs).await;
    drop(held);

    assert_eq!(ledger.calls(), 0);
    for record in &records {
        assert_eq!(record.error.as_deref(), Some("concurrency limit exceeded"));
        assert_eq!(record.health_score, 0.0);
    }
}

#[tokio::test(start_paused = true)]
async fn panicking_provider_is_contained() {
    let addrs = addresses(3);
    let (ledger, status) = healthy_mocks(&addrs);
    let ledger = ledger.with_panic(&addrs[1]);
    let (ledger, status) = (Arc::new(ledger), Arc::new(status));
    let aggregator = build(&ledger, &status, FanOutSettings::default());

    let records = aggregator.get_intelligence(&addrs).await;

    assert_eq!(records.len(), 3);
    assert!(records[0].error.is_none());
    assert!(records[2].error.is_none());
    assert!(records[1]
        .error
        .as_deref()
        .is_some_and(|e| e.starts_with("provider task aborted")));
    assert_eq!(records[1].health_score, 0.0);

    let cached = aggregator.cache().lookup(&addrs[1]).await.unwrap();
    assert!(Arc::ptr_eq(&cached.record, &records[1]));
}
