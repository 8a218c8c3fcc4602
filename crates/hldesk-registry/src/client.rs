//! HTTP client for the venue's `/info` metadata endpoint.

use crate::error::{RegistryError, RegistryResult};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Default timeout for metadata requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Request body for the info endpoint.
#[derive(Debug, Serialize)]
struct InfoRequest {
    #[serde(rename = "type")]
    request_type: String,
    /// DEX name for builder-deployed perp metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    dex: Option<String>,
}

/// Thin client over `POST /info`.
pub struct InfoClient {
    client: Client,
    info_url: String,
}

impl InfoClient {
    /// `base_url` is the venue HTTP base (e.g. "https://api.hyperliquid.xyz").
    pub fn new(base_url: impl Into<String>) -> RegistryResult<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| RegistryError::HttpClient(format!("failed to create HTTP client: {e}")))?;

        let base = base_url.into();
        let info_url = format!("{}/info", base.trim_end_matches('/'));
        Ok(Self { client, info_url })
    }

    /// Fetch `{"type": "spotMeta"}`: spot tokens and trading-pair universe.
    pub async fn spot_meta(&self) -> RegistryResult<serde_json::Value> {
        self.post_info("spotMeta", None).await
    }

    /// Fetch `{"type": "perpDexs"}`: the perp DEX directory.
    ///
    /// Entry 0 is null (the main venue); builder DEXes follow in metadata
    /// order with at least a `name` field.
    pub async fn perp_dexs(&self) -> RegistryResult<serde_json::Value> {
        self.post_info("perpDexs", None).await
    }

    /// Fetch `{"type": "meta"}` scoped to one DEX (or the main venue when
    /// `dex` is `None`): `{ "universe": [{name, szDecimals, ...}] }`.
    pub async fn meta(&self, dex: Option<&str>) -> RegistryResult<serde_json::Value> {
        self.post_info("meta", dex).await
    }

    async fn post_info(
        &self,
        request_type: &str,
        dex: Option<&str>,
    ) -> RegistryResult<serde_json::Value> {
        debug!(url = %self.info_url, request_type, dex = ?dex, "Fetching venue metadata");

        let request = InfoRequest {
            request_type: request_type.to_string(),
            dex: dex.map(|s| s.to_string()),
        };

        let response = self
            .client
            .post(&self.info_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RegistryError::HttpClient(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RegistryError::HttpClient(format!("HTTP {status}: {body}")));
        }

        response
            .json()
            .await
            .map_err(|e| RegistryError::HttpClient(format!("failed to parse response: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_request_serialization() {
        let request = InfoRequest {
            request_type: "spotMeta".to_string(),
            dex: None,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"type":"spotMeta"}"#);
    }

    #[test]
    fn test_info_request_with_dex() {
        let request = InfoRequest {
            request_type: "meta".to_string(),
            dex: Some("xyz".to_string()),
        };
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"type":"meta","dex":"xyz"}"#);
    }

    #[test]
    fn test_info_url_built_from_base() {
        let client = InfoClient::new("https://api.example.com/").unwrap();
        assert_eq!(client.info_url, "https://api.example.com/info");
    }
}
