use std::time::Duration;

use async_trait::async_trait;
use provintel_models::{ClusterSnapshot, ParseWarning, ResourceSummary};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::FetchError;

const RAW_EXCERPT_LEN: usize = 64;

/// Probe of a provider's self-reported status surface. Mockable for testing.
#[async_trait]
pub trait StatusClient: Send + Sync {
    async fn fetch_status(&self, host_uri: &str) -> Result<ClusterSnapshot, FetchError>;
}

/// Status client issuing `GET <host_uri>/status`.
pub struct HttpStatusClient {
    client: Client,
}

impl HttpStatusClient {
    pub fn new(timeout: Duration, accept_invalid_certs: bool) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()
            .map_err(|e| FetchError::StatusQueryFailed(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

pub fn status_url(host_uri: &str) -> String {
    format!("{}/status", host_uri.trim_end_matches('/'))
}

#[async_trait]
impl StatusClient for HttpStatusClient {
    async fn fetch_status(&self, host_uri: &str) -> Result<ClusterSnapshot, FetchError> {
        let url = status_url(host_uri);
        debug!(url = %url, "Probing provider status");

        let response = self.client.get(&url).send().await.map_err(|e| {
            FetchError::StatusQueryFailed(format!("failed to query status endpoint {url}: {e}"))
        })?;

        if !response.status().is_success() {
            return Err(FetchError::StatusQueryFailed(format!(
                "status endpoint returned {} for {url}",
                response.status()
            )));
        }

        let body = response.bytes().await.map_err(|e| {
            FetchError::StatusQueryFailed(format!("failed to read status response from {url}: {e}"))
        })?;
        decode_status(&body).map_err(|e| {
            FetchError::StatusQueryFailed(format!("failed to decode status response from {url}: {e}"))
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct StatusDocument {
    #[serde(default)]
    cluster: Option<ClusterSection>,
    #[serde(default)]
    cluster_public_hostname: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ClusterSection {
    #[serde(default)]
    leases: Option<Quantity>,
    #[serde(default)]
    inventory: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct InventoryDocument {
    #[serde(default)]
    available: Option<AvailableSection>,
}

#[derive(Debug, Default, Deserialize)]
struct AvailableSection {
    #[serde(default)]
    nodes: Option<Vec<Value>>,
}

#[derive(Debug, Default, Deserialize)]
struct NodeDocument {
    #[serde(default)]
    available: Option<Resources>,
    #[serde(default)]
    allocatable: Option<Resources>,
}

#[derive(Debug, Default, Deserialize)]
struct Resources {
    #[serde(default)]
    cpu: Option<Quantity>,
    #[serde(default)]
    memory: Option<Quantity>,
    #[serde(default)]
    storage_ephemeral: Option<Quantity>,
    #[serde(default)]
    gpu: Option<Quantity>,
}

/// A resource quantity as it may appear on the wire.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Quantity {
    Integer(i64),
    Float(f64),
    Other(Value),
}

impl Quantity {
    /// Numbers are truncated to integers. Anything else, including
    /// string-encoded quantities such as "1000m", counts as zero and is recorded.
    fn resolve(&self, field: &str, warnings: &mut Vec<ParseWarning>) -> i64 {
        match self {
            Quantity::Integer(v) => *v,
            Quantity::Float(v) => *v as i64,
            Quantity::Other(Value::Null) => 0,
            Quantity::Other(raw) => {
                warnings.push(warning(field, raw));
                0
            }
        }
    }
}

impl Resources {
    fn summarize(&self, path: &str, warnings: &mut Vec<ParseWarning>) -> ResourceSummary {
        let mut field = |name: &str, q: &Option<Quantity>| {
            q.as_ref()
                .map(|q| q.resolve(&format!("{path}.{name}"), warnings))
                .unwrap_or(0)
        };
        ResourceSummary {
            cpu: field("cpu", &self.cpu),
            memory: field("memory", &self.memory),
            storage: field("storage_ephemeral", &self.storage_ephemeral),
            gpu: field("gpu", &self.gpu),
        }
    }
}

fn warning(field: &str, raw: &Value) -> ParseWarning {
    let mut raw = raw.to_string();
    if raw.len() > RAW_EXCERPT_LEN {
        let cut = (0..=RAW_EXCERPT_LEN)
            .rev()
            .find(|i| raw.is_char_boundary(*i))
            .unwrap_or(0);
        raw.truncate(cut);
        raw.push_str("...");
    }
    ParseWarning {
        field: field.to_string(),
        raw,
    }
}

/// Decode a status document into a cluster snapshot.
///
/// Fails only when the body is not a JSON object of the expected top-level
/// shape. Inventory problems degrade to zeros plus a parse warning.
pub fn decode_status(body: &[u8]) -> Result<ClusterSnapshot, serde_json::Error> {
    let doc: StatusDocument = serde_json::from_slice(body)?;
    let cluster = doc.cluster.unwrap_or_default();
    let mut warnings = Vec::new();

    let active_leases = cluster
        .leases
        .as_ref()
        .map(|q| q.resolve("cluster.leases", &mut warnings))
        .unwrap_or(0)
        .max(0) as u64;

    let mut snapshot = ClusterSnapshot {
        active_leases,
        public_hostname: doc.cluster_public_hostname.unwrap_or_default(),
        ..ClusterSnapshot::default()
    };

    if let Some(inventory) = cluster.inventory {
        summarize_inventory(inventory, &mut snapshot, &mut warnings);
    }

    snapshot.parse_warnings = warnings;
    Ok(snapshot)
}

fn summarize_inventory(
    inventory: Value,
    snapshot: &mut ClusterSnapshot,
    warnings: &mut Vec<ParseWarning>,
) {
    let inventory: InventoryDocument = match serde_json::from_value(inventory.clone()) {
        Ok(doc) => doc,
        Err(_) => {
            warnings.push(warning("cluster.inventory", &inventory));
            return;
        }
    };

    let nodes = inventory
        .available
        .and_then(|a| a.nodes)
        .unwrap_or_default();
    snapshot.available_nodes = nodes.len();

    for (i, node) in nodes.into_iter().enumerate() {
        let path = format!("cluster.inventory.available.nodes[{i}]");
        let node: NodeDocument = match serde_json::from_value(node.clone()) {
            Ok(doc) => doc,
            Err(_) => {
                warnings.push(warning(&path, &node));
                continue;
            }
        };
        if let Some(available) = &node.available {
            let summary = available.summarize(&format!("{path}.available"), warnings);
            snapshot.available_resources.add(&summary);
        }
        if let Some(allocatable) = &node.allocatable {
            let summary = allocatable.summarize(&format!("{path}.allocatable"), warnings);
            snapshot.total_resources.add(&summary);
        }
    }
}
