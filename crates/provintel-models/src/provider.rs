use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Attribute key a provider advertises when it offers NVIDIA GPUs.
pub const NVIDIA_GPU_ATTRIBUTE: &str = "capabilities/gpu/vendor/nvidia";
pub const REGION_ATTRIBUTE: &str = "region";
pub const TIER_ATTRIBUTE: &str = "tier";
pub const DATACENTER_ATTRIBUTE: &str = "datacenter";

/// Typed capabilities derived from a provider's ledger attributes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    NvidiaGpu,
    EnterpriseTier,
    Region,
    Datacenter,
}

impl Capability {
    /// Derive the capability set from a raw attribute map.
    pub fn from_attributes(attributes: &BTreeMap<String, String>) -> BTreeSet<Capability> {
        let mut caps = BTreeSet::new();
        if attributes.contains_key(NVIDIA_GPU_ATTRIBUTE) {
            caps.insert(Capability::NvidiaGpu);
        }
        if attributes.get(TIER_ATTRIBUTE).map(String::as_str) == Some("enterprise") {
            caps.insert(Capability::EnterpriseTier);
        }
        if attributes.contains_key(REGION_ATTRIBUTE) {
            caps.insert(Capability::Region);
        }
        if attributes.contains_key(DATACENTER_ATTRIBUTE) {
            caps.insert(Capability::Datacenter);
        }
        caps
    }
}

/// What the ledger knows about a provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LedgerInfo {
    pub host_uri: String,
    pub attributes: BTreeMap<String, String>,
}

/// Aggregate resource quantities across a provider's nodes.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceSummary {
    /// CPU in millicores.
    pub cpu: i64,
    /// Memory in bytes.
    pub memory: i64,
    /// Ephemeral storage in bytes.
    pub storage: i64,
    pub gpu: i64,
}

impl ResourceSummary {
    pub fn add(&mut self, other: &ResourceSummary) {
        self.cpu = self.cpu.saturating_add(other.cpu);
        self.memory = self.memory.saturating_add(other.memory);
        self.storage = self.storage.saturating_add(other.storage);
        self.gpu = self.gpu.saturating_add(other.gpu);
    }

    pub fn is_empty(&self) -> bool {
        self.cpu <= 0 && self.memory <= 0 && self.gpu <= 0
    }
}

/// A value in a status payload that could not be decoded and was treated as zero.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParseWarning {
    /// Dotted path of the offending field, e.g. `inventory.available.nodes[0].available.cpu`.
    pub field: String,
    /// The raw value as it appeared on the wire.
    pub raw: String,
}

/// Cluster health as reported by the provider's status endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClusterSnapshot {
    pub active_leases: u64,
    pub available_nodes: usize,
    pub total_resources: ResourceSummary,
    pub available_resources: ResourceSummary,
    pub public_hostname: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parse_warnings: Vec<ParseWarning>,
}

/// One provider's merged intelligence snapshot.
///
/// Immutable once produced. The cache hands out the same `Arc<ProviderRecord>`
/// to every reader until the entry is replaced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderRecord {
    pub address: String,
    pub host_uri: String,
    pub attributes: BTreeMap<String, String>,
    pub capabilities: BTreeSet<Capability>,
    pub cluster: Option<ClusterSnapshot>,
    #[serde(rename = "ledger_query_ms", with = "duration_ms", default)]
    pub ledger_query_time: Option<Duration>,
    #[serde(rename = "status_query_ms", with = "duration_ms", default)]
    pub status_query_time: Option<Duration>,
    pub last_seen: DateTime<Utc>,
    pub health_score: f64,
    pub error: Option<String>,
}

impl ProviderRecord {
    /// A record built from ledger data. Cluster data and score are filled in by the caller.
    pub fn from_ledger(address: &str, ledger: LedgerInfo, ledger_query_time: Duration) -> Self {
        let capabilities = Capability::from_attributes(&ledger.attributes);
        Self {
            address: address.to_string(),
            host_uri: ledger.host_uri,
            attributes: ledger.attributes,
            capabilities,
            cluster: None,
            ledger_query_time: Some(ledger_query_time),
            status_query_time: None,
            last_seen: Utc::now(),
            health_score: 0.0,
            error: None,
        }
    }

    /// A zero-score record for a provider whose pipeline failed outright.
    ///
    /// Carries no response times, so it earns no responsiveness credit.
    pub fn failed(address: &str, error: impl Into<String>) -> Self {
        Self {
            address: address.to_string(),
            host_uri: String::new(),
            attributes: BTreeMap::new(),
            capabilities: BTreeSet::new(),
            cluster: None,
            ledger_query_time: None,
            status_query_time: None,
            last_seen: Utc::now(),
            health_score: 0.0,
            error: Some(error.into()),
        }
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    pub fn region(&self) -> Option<&str> {
        self.attributes.get(REGION_ATTRIBUTE).map(String::as_str)
    }

    pub fn active_leases(&self) -> Option<u64> {
        self.cluster.as_ref().map(|c| c.active_leases)
    }

    /// Status response time, only when the status query returned a usable snapshot.
    pub fn answered_status_time(&self) -> Option<Duration> {
        self.cluster.as_ref().and(self.status_query_time)
    }
}

/// Serialize `Option<Duration>` as whole milliseconds.
pub mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}
