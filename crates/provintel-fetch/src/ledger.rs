use std::time::Duration;

use async_trait::async_trait;
use provintel_models::LedgerInfo;
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::debug;

use crate::error::FetchError;

/// Source of authoritative provider metadata. Mockable for testing.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn fetch_ledger_info(&self, provider_address: &str) -> Result<LedgerInfo, FetchError>;
}

/// Ledger client speaking to the chain's REST gateway.
pub struct RestLedgerClient {
    client: Client,
    endpoint: Url,
}

#[derive(Debug, Deserialize)]
struct ProviderResponse {
    provider: ProviderBody,
}

#[derive(Debug, Deserialize)]
struct ProviderBody {
    #[serde(default)]
    host_uri: String,
    #[serde(default)]
    attributes: Vec<AttributeBody>,
}

#[derive(Debug, Deserialize)]
struct AttributeBody {
    key: String,
    #[serde(default)]
    value: String,
}

impl RestLedgerClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::LedgerQueryFailed(format!("failed to build HTTP client: {e}")))?;
        let endpoint = Url::parse(endpoint.trim())
            .map_err(|e| FetchError::LedgerQueryFailed(format!("invalid ledger endpoint {endpoint}: {e}")))?;
        if endpoint.cannot_be_a_base() {
            return Err(FetchError::LedgerQueryFailed(format!(
                "invalid ledger endpoint {endpoint}: not a base URL"
            )));
        }
        Ok(Self { client, endpoint })
    }

    /// The provider lookup URL. The address is one percent-encoded path segment.
    fn provider_url(&self, provider_address: &str) -> Result<Url, FetchError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| {
                FetchError::LedgerQueryFailed(format!("invalid ledger endpoint {}", self.endpoint))
            })?
            .pop_if_empty()
            .extend(["akash", "provider", "v1beta3", "providers", provider_address]);
        Ok(url)
    }
}

#[async_trait]
impl LedgerClient for RestLedgerClient {
    async fn fetch_ledger_info(&self, provider_address: &str) -> Result<LedgerInfo, FetchError> {
        if provider_address.is_empty() {
            return Err(FetchError::LedgerQueryFailed(
                "empty provider address".to_string(),
            ));
        }

        let url = self.provider_url(provider_address)?;
        debug!(url = %url, "Querying ledger for provider");

        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            FetchError::LedgerQueryFailed(format!("failed to query {url}: {e}"))
        })?;

        if !response.status().is_success() {
            return Err(FetchError::LedgerQueryFailed(format!(
                "registry returned {} for {provider_address}",
                response.status()
            )));
        }

        let body: ProviderResponse = response.json().await.map_err(|e| {
            FetchError::LedgerQueryFailed(format!("invalid registry response for {provider_address}: {e}"))
        })?;

        Ok(LedgerInfo {
            host_uri: body.provider.host_uri,
            attributes: body
                .provider
                .attributes
                .into_iter()
                .map(|a| (a.key, a.value))
                .collect(),
        })
    }
}
