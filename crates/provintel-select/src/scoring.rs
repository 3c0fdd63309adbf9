use std::sync::Arc;
use std::time::Duration;

use provintel_models::{Capability, Priority, ProviderRecord, ScoreBreakdown, SelectionCriteria};
use serde::Serialize;

const GIB: i64 = 1024 * 1024 * 1024;

/// A provider with its combined score and the components behind it.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredProvider {
    pub address: String,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
    #[serde(skip)]
    pub record: Arc<ProviderRecord>,
}

/// Score one provider against the caller's weights and priority.
///
/// `health·reliability + performance·performance + geographic·geographic +
/// price·price + priority_bonus`. Weights are used as given.
pub fn score_provider(record: Arc<ProviderRecord>, criteria: &SelectionCriteria) -> ScoredProvider {
    let w = &criteria.weights;
    let breakdown = ScoreBreakdown {
        health: record.health_score,
        performance: performance_score(&record),
        geographic: geographic_score(&record),
        price: price_score(&record),
        priority_bonus: priority_bonus(&record, criteria.priority),
    };

    let score = breakdown.health * w.reliability
        + breakdown.performance * w.performance
        + breakdown.geographic * w.geographic
        + breakdown.price * w.price
        + breakdown.priority_bonus;

    ScoredProvider {
        address: record.address.clone(),
        score,
        breakdown,
        record,
    }
}

/// Responsiveness and spare capacity, roughly in `[0, 1]`.
pub fn performance_score(record: &ProviderRecord) -> f64 {
    let mut score = 0.0;

    if let Some(t) = record.answered_status_time() {
        score += match t.as_millis() {
            0..=299 => 0.5,
            300..=499 => 0.45,
            500..=999 => 0.4,
            1000..=1999 => 0.3,
            2000..=2999 => 0.2,
            _ => 0.1,
        };
    }

    if let Some(cluster) = &record.cluster {
        if cluster.available_nodes > 0 {
            score += 0.15;
        }
        if cluster.available_resources.cpu > 1000 {
            score += 0.075;
        }
        if cluster.available_resources.memory > GIB {
            score += 0.075;
        }
    }

    match record.ledger_query_time {
        Some(t) if t < Duration::from_secs(2) => score += 0.2,
        Some(t) if t < Duration::from_secs(5) => score += 0.1,
        _ => {}
    }

    score
}

/// Regional preference from the provider's `region` attribute.
pub fn geographic_score(record: &ProviderRecord) -> f64 {
    let mut score = match record.region() {
        Some("us-west-1" | "us-west-2") => 0.95,
        Some("us-east-1" | "us-east-2") => 0.9,
        Some("us-central-1") => 0.85,
        Some("eu-west-1" | "eu-central-1") => 0.75,
        Some("ap-southeast-1" | "ap-northeast-1") => 0.7,
        Some(_) => 0.6,
        None => 0.5,
    };
    if record.has(Capability::Datacenter) {
        score += 0.05;
    }
    score
}

/// Cost heuristic in `[0, 1]`; higher means cheaper.
///
/// Busy providers are assumed pricier and GPU providers pricier still.
pub fn price_score(record: &ProviderRecord) -> f64 {
    let mut score: f64 = match record.active_leases() {
        None => 0.5,
        Some(101..) => 0.4,
        Some(51..=100) => 0.45,
        Some(21..=50) => 0.5,
        Some(6..=20) => 0.55,
        Some(_) => 0.6,
    };
    if record.has(Capability::NvidiaGpu) {
        score -= 0.1;
    }
    score.clamp(0.0, 1.0)
}

pub fn priority_bonus(record: &ProviderRecord, priority: Priority) -> f64 {
    match priority {
        Priority::Reliability if record.health_score > 0.8 => 0.2,
        Priority::Reliability if record.health_score > 0.6 => 0.1,
        Priority::Performance => match record.answered_status_time() {
            Some(t) if t < Duration::from_millis(500) => 0.2,
            Some(t) if t < Duration::from_secs(1) => 0.1,
            _ => 0.0,
        },
        Priority::Cost => match record.active_leases() {
            Some(n) if n < 20 => 0.2,
            Some(n) if n < 50 => 0.1,
            _ => 0.0,
        },
        _ => 0.0,
    }
}
