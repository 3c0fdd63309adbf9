use std::time::Duration;

use provintel_models::{Capability, ClusterSnapshot, ProviderRecord};

const BASE: f64 = 0.20;

/// Compute a provider's health score in `[0, 1]`.
///
/// Records with a cluster snapshot are scored on responsiveness, lease volume
/// and node availability. Records without one fall back to ledger-only signals.
/// Records whose ledger query failed are never passed here; they score zero.
pub fn health_score(record: &ProviderRecord) -> f64 {
    let score = match &record.cluster {
        Some(cluster) => full_score(cluster, record.answered_status_time()),
        None => partial_score(record),
    };
    score.clamp(0.0, 1.0)
}

fn full_score(cluster: &ClusterSnapshot, status_time: Option<Duration>) -> f64 {
    let mut score = BASE;

    if let Some(t) = status_time {
        score += match t.as_millis() {
            0..=499 => 0.30,
            500..=999 => 0.25,
            1000..=1999 => 0.20,
            2000..=2999 => 0.15,
            _ => 0.10,
        };
    }

    score += match cluster.active_leases {
        101.. => 0.40,
        51..=100 => 0.35,
        21..=50 => 0.30,
        11..=20 => 0.25,
        6..=10 => 0.20,
        1..=5 => 0.10,
        0 => 0.0,
    };

    if cluster.available_nodes > 0 {
        score += 0.10;
    }

    score
}

fn partial_score(record: &ProviderRecord) -> f64 {
    let mut score = BASE;

    if record
        .ledger_query_time
        .is_some_and(|t| t < Duration::from_secs(2))
    {
        score += 0.10;
    }
    if record.has(Capability::EnterpriseTier) {
        score += 0.10;
    }
    if record.has(Capability::NvidiaGpu) {
        score += 0.05;
    }
    if record.has(Capability::Region) {
        score += 0.05;
    }
    if record.error.is_some() {
        score -= 0.10;
    }

    score.max(0.0)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use provintel_models::{LedgerInfo, NVIDIA_GPU_ATTRIBUTE};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    fn record(attrs: &[(&str, &str)]) -> ProviderRecord {
        let ledger = LedgerInfo {
            host_uri: "https://p.example:8443".to_string(),
            attributes: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
        };
        ProviderRecord::from_ledger("akash1p", ledger, Duration::from_millis(150))
    }

    fn cluster(leases: u64, nodes: usize) -> ClusterSnapshot {
        ClusterSnapshot {
            active_leases: leases,
            available_nodes: nodes,
            ..ClusterSnapshot::default()
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn busy_fast_provider_scores_full() {
        let mut rec = record(&[("region", "us-west-1")]);
        rec.cluster = Some(cluster(150, 1));
        rec.status_query_time = Some(Duration::from_millis(200));
        assert!(approx(health_score(&rec), 1.0));
    }

    #[test]
    fn status_time_bands() {
        let cases = [
            (499, 0.30),
            (500, 0.25),
            (1500, 0.20),
            (2500, 0.15),
            (3000, 0.10),
        ];
        for (ms, bonus) in cases {
            let mut rec = record(&[]);
            rec.cluster = Some(cluster(0, 0));
            rec.status_query_time = Some(Duration::from_millis(ms));
            assert!(approx(health_score(&rec), BASE + bonus), "status {ms}ms");
        }
    }

    #[test]
    fn lease_bands() {
        let cases = [
            (0, 0.0),
            (1, 0.10),
            (6, 0.20),
            (11, 0.25),
            (21, 0.30),
            (51, 0.35),
            (100, 0.35),
            (101, 0.40),
        ];
        for (leases, bonus) in cases {
            let mut rec = record(&[]);
            rec.cluster = Some(cluster(leases, 0));
            assert!(approx(health_score(&rec), BASE + bonus), "{leases} leases");
        }
    }

    #[test]
    fn partial_path_uses_ledger_signals() {
        let rec = record(&[
            ("tier", "enterprise"),
            ("region", "eu-west-1"),
            (NVIDIA_GPU_ATTRIBUTE, "true"),
        ]);
        // base + fast ledger + enterprise + gpu + region
        assert!(approx(health_score(&rec), 0.50));
    }

    #[test]
    fn partial_path_penalizes_errors() {
        let mut rec = record(&[]);
        rec.error = Some("status query failed: connection refused".to_string());
        assert!(approx(health_score(&rec), 0.20));

        rec.ledger_query_time = Some(Duration::from_secs(3));
        assert!(approx(health_score(&rec), 0.10));
    }

    #[test]
    fn randomized_records_stay_in_unit_interval() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..1000 {
            let mut attrs = Vec::new();
            if rng.random_bool(0.5) {
                attrs.push(("tier", "enterprise"));
            }
            if rng.random_bool(0.5) {
                attrs.push((NVIDIA_GPU_ATTRIBUTE, "true"));
            }
            if rng.random_bool(0.5) {
                attrs.push(("region", "us-east-1"));
            }
            let mut rec = record(&attrs);
            rec.ledger_query_time = Some(Duration::from_millis(rng.random_range(0..10_000)));
            if rng.random_bool(0.3) {
                rec.error = Some("status query failed".to_string());
            }
            if rng.random_bool(0.6) {
                rec.cluster = Some(cluster(
                    rng.random_range(0..10_000),
                    rng.random_range(0..64),
                ));
                if rng.random_bool(0.8) {
                    rec.status_query_time =
                        Some(Duration::from_millis(rng.random_range(0..10_000)));
                }
            }

            let score = health_score(&rec);
            assert!((0.0..=1.0).contains(&score), "score {score} for {rec:?}");
        }
    }
}
