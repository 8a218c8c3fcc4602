//! Delegated-signing provider client.
//!
//! Some venues are fronted by a provider that holds the key server-side:
//! we send the raw action and get back a ready-to-post payload (action,
//! nonce, signature assembled by the provider). Payload structure and
//! signing are opaque here; this client only forwards.

use serde_json::{json, Value};
use tracing::debug;

use crate::dispatch::classify_http_failure;
use crate::error::{ExecutorError, ExecutorResult};

/// HTTP client for one delegated-signing provider.
pub struct DelegatedSigningClient {
    http: reqwest::Client,
    sign_url: String,
    api_key: String,
}

impl DelegatedSigningClient {
    pub fn new(base_url: &str, api_key: &str, timeout_secs: u64) -> ExecutorResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            http,
            sign_url: format!("{}/sign", base_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
        })
    }

    /// Exchange a raw action for a ready-to-post payload.
    pub async fn build_payload(&self, action: &Value) -> ExecutorResult<Value> {
        let response = self
            .http
            .post(&self.sign_url)
            .bearer_auth(&self.api_key)
            .json(&json!({ "action": action }))
            .send()
            .await?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(classify_http_failure(status.as_u16(), &content_type, &body));
        }

        let payload: Value = serde_json::from_str(&body)
            .map_err(|e| ExecutorError::Provider(format!("unparsable payload: {e}")))?;
        if !payload.is_object() {
            return Err(ExecutorError::Provider(
                "provider returned a non-object payload".to_string(),
            ));
        }

        debug!(url = %self.sign_url, "delegated signing payload ready");
        Ok(payload)
    }
}
