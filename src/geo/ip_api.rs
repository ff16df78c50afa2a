//! HTTP client for the ip-api.com JSON endpoint

use std::time::Duration;

use super::{GeoInfo, GeoLookup};
use crate::config::DiagConfig;
use crate::DiagError;

/// Geo lookups against `{endpoint}/{address}`.
///
/// No caching: every call goes to the service.
#[derive(Debug, Clone)]
pub struct IpApiClient {
    client: reqwest::Client,
    endpoint: String,
}

impl IpApiClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("netpath/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DiagError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &DiagConfig) -> crate::Result<Self> {
        Self::new(config.geo_endpoint.clone(), config.geo_timeout_duration())
    }

    /// Request URL for one address
    pub fn url_for(&self, address: &str) -> String {
        format!("{}/{}", self.endpoint, address)
    }
}

#[async_trait::async_trait]
impl GeoLookup for IpApiClient {
    async fn lookup(&self, address: &str) -> crate::Result<GeoInfo> {
        let url = self.url_for(address);
        log::debug!("Geo lookup: {}", url);

        let response = self.client.get(&url).send().await?.error_for_status()?;
        let body = response.text().await?;
        let info: GeoInfo = serde_json::from_str(&body)?;

        Ok(info)
    }
}
