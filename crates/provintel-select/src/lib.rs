pub mod error;
pub mod rationale;
pub mod scoring;
pub mod stats;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use provintel_models::{ProviderRecord, SelectionCriteria};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

pub use error::SelectError;
pub use rationale::{Margin, Rationale};
pub use scoring::{score_provider, ScoredProvider};
pub use stats::ProviderStats;

/// The outcome of ranking a set of providers.
#[derive(Debug, Clone, Serialize)]
pub struct Selection {
    pub id: Uuid,
    pub winner: String,
    pub score: f64,
    pub rationale: Rationale,
    /// `rationale` rendered as text.
    pub reasoning: String,
    /// Every provider, best first.
    pub ranked: Vec<ScoredProvider>,
    pub all_records: Vec<Arc<ProviderRecord>>,
    pub criteria: SelectionCriteria,
    pub stats: ProviderStats,
    pub decided_at: DateTime<Utc>,
    /// Filled in by the caller that timed the whole request.
    pub query_time_ms: u64,
}

/// Score and rank `records`, returning the best provider with its rationale.
///
/// Ranking is by descending score; exact ties go to the lexicographically
/// smaller address so the outcome is reproducible.
pub fn select(
    records: Vec<Arc<ProviderRecord>>,
    criteria: &SelectionCriteria,
) -> Result<Selection, SelectError> {
    let mut ranked: Vec<ScoredProvider> = records
        .iter()
        .map(|record| score_provider(Arc::clone(record), criteria))
        .collect();
    ranked.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.address.cmp(&b.address))
    });

    for scored in &ranked {
        debug!(provider = %scored.address, score = scored.score, "Scored provider");
    }

    let winner = ranked.first().ok_or(SelectError::NoProviderData)?;
    let rationale = Rationale::new(
        winner,
        ranked.get(1),
        ranked.len(),
        criteria.weights,
        criteria.priority,
    );
    let reasoning = rationale.render();

    info!(
        winner = %winner.address,
        score = winner.score,
        candidates = ranked.len(),
        priority = %criteria.priority,
        "Provider selected"
    );

    Ok(Selection {
        id: Uuid::new_v4(),
        winner: winner.address.clone(),
        score: winner.score,
        rationale,
        reasoning,
        stats: ProviderStats::from_records(&records),
        ranked,
        all_records: records,
        criteria: criteria.clone(),
        decided_at: Utc::now(),
        query_time_ms: 0,
    })
}
