use provintel_models::{Capability, Priority, ScoreBreakdown, Weights};
use serde::Serialize;

use crate::scoring::ScoredProvider;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// How far the winner is ahead of the runner-up.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct Margin {
    pub absolute: f64,
    /// Omitted when the runner-up scored zero.
    pub relative_pct: Option<f64>,
}

/// Structured explanation of a selection.
#[derive(Debug, Clone, Serialize)]
pub struct Rationale {
    pub winner: String,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
    pub weights: Weights,
    pub priority: Priority,
    /// Facts about the winner, e.g. `150 active leases`.
    pub observations: Vec<String>,
    pub rank: usize,
    pub field_size: usize,
    pub margin: Option<Margin>,
    /// The winner's own error, if its data is partial.
    pub note: Option<String>,
}

impl Rationale {
    pub fn new(
        winner: &ScoredProvider,
        runner_up: Option<&ScoredProvider>,
        field_size: usize,
        weights: Weights,
        priority: Priority,
    ) -> Self {
        let margin = runner_up.map(|second| {
            let absolute = winner.score - second.score;
            Margin {
                absolute,
                relative_pct: (second.score != 0.0).then(|| absolute / second.score * 100.0),
            }
        });

        Self {
            winner: winner.address.clone(),
            score: winner.score,
            breakdown: winner.breakdown,
            weights,
            priority,
            observations: observations(winner),
            rank: 1,
            field_size,
            margin,
            note: winner.record.error.clone(),
        }
    }

    /// Human-readable rendering.
    pub fn render(&self) -> String {
        let b = &self.breakdown;
        let w = &self.weights;
        let mut out = format!(
            "Selected provider {} with overall score {:.3}\n\n",
            self.winner, self.score
        );

        out.push_str("Score breakdown:\n");
        for (label, value, weight) in [
            ("Health/Reliability", b.health, w.reliability),
            ("Performance", b.performance, w.performance),
            ("Geographic", b.geographic, w.geographic),
            ("Price", b.price, w.price),
        ] {
            out.push_str(&format!(
                "  - {label}: {value:.3} (weight: {:.1}%)\n",
                weight * 100.0
            ));
        }
        if b.priority_bonus > 0.0 {
            out.push_str(&format!(
                "  - Priority bonus ({}): +{:.3}\n",
                self.priority, b.priority_bonus
            ));
        }

        if !self.observations.is_empty() {
            out.push_str("\nProvider details:\n");
            for line in &self.observations {
                out.push_str(&format!("  - {line}\n"));
            }
        }

        if self.field_size > 1 {
            out.push_str("\nCompetitive analysis:\n");
            out.push_str(&format!(
                "  - Ranked #{} out of {} providers\n",
                self.rank, self.field_size
            ));
            if let Some(margin) = &self.margin {
                match margin.relative_pct {
                    Some(pct) => out.push_str(&format!(
                        "  - Score advantage over #2: +{:.3} ({pct:.1}% better)\n",
                        margin.absolute
                    )),
                    None => out.push_str(&format!(
                        "  - Score advantage over #2: +{:.3}\n",
                        margin.absolute
                    )),
                }
            }
        }

        if let Some(note) = &self.note {
            out.push_str(&format!("\nNote: {note}\n"));
        }

        out
    }
}

fn observations(winner: &ScoredProvider) -> Vec<String> {
    let record = &winner.record;
    let mut lines = Vec::new();

    if let Some(cluster) = &record.cluster {
        lines.push(format!(
            "{} active {} (reliability indicator)",
            cluster.active_leases,
            plural(cluster.active_leases as usize, "lease", "leases")
        ));
    }
    if let Some(t) = record.answered_status_time() {
        lines.push(format!("{}ms status endpoint response time", t.as_millis()));
    }
    if let Some(t) = record.ledger_query_time {
        lines.push(format!("{}ms ledger query time", t.as_millis()));
    }
    if let Some(cluster) = record.cluster.as_ref().filter(|c| c.available_nodes > 0) {
        lines.push(format!(
            "{} available {}",
            cluster.available_nodes,
            plural(cluster.available_nodes, "node", "nodes")
        ));
    }
    if let Some(region) = record.region() {
        lines.push(format!("Located in {region} region"));
    }
    if record.has(Capability::NvidiaGpu) {
        lines.push("NVIDIA GPU capabilities available".to_string());
    }
    if let Some(cluster) = &record.cluster {
        let available = &cluster.available_resources;
        let mut parts = Vec::new();
        if available.cpu > 0 {
            parts.push(format!("CPU: {}", available.cpu));
        }
        if available.memory > 0 {
            parts.push(format!("Memory: {:.1}GB", available.memory as f64 / GIB));
        }
        if available.gpu > 0 {
            parts.push(format!("GPU: {}", available.gpu));
        }
        if !parts.is_empty() {
            lines.push(format!("Available resources: {}", parts.join(", ")));
        }
    }

    lines
}

fn plural(n: usize, one: &'static str, many: &'static str) -> &'static str {
    if n == 1 {
        one
    } else {
        many
    }
}
