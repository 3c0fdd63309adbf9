use std::collections::BTreeMap;
use std::sync::Arc;

use provintel_models::{Capability, ProviderRecord};
use serde::Serialize;

/// Summary of a set of provider records.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ProviderStats {
    pub total_providers: usize,
    /// Providers with a health score above 0.5.
    pub healthy_providers: usize,
    pub providers_with_status: usize,
    /// Mean status response time over providers that have one; 0 when none do.
    pub average_status_ms: u64,
    pub total_active_leases: u64,
    pub providers_by_region: BTreeMap<String, usize>,
    pub providers_with_gpu: usize,
}

impl ProviderStats {
    pub fn from_records(records: &[Arc<ProviderRecord>]) -> Self {
        let mut stats = ProviderStats {
            total_providers: records.len(),
            ..ProviderStats::default()
        };
        let (mut status_ms_total, mut status_count) = (0u128, 0u128);

        for record in records {
            if record.health_score > 0.5 {
                stats.healthy_providers += 1;
            }
            if let Some(cluster) = &record.cluster {
                stats.providers_with_status += 1;
                stats.total_active_leases += cluster.active_leases;
            }
            if let Some(t) = record.status_query_time {
                status_ms_total += t.as_millis();
                status_count += 1;
            }
            if let Some(region) = record.region() {
                *stats.providers_by_region.entry(region.to_string()).or_default() += 1;
            }
            if record.has(Capability::NvidiaGpu) {
                stats.providers_with_gpu += 1;
            }
        }

        if status_count > 0 {
            stats.average_status_ms = (status_ms_total / status_count) as u64;
        }
        stats
    }
}
