//! Exchange endpoint dispatch.
//!
//! Posts signed action payloads to the venue's `/exchange` endpoint and
//! normalizes failures. The venue edge sits behind a WAF: a blocked IP
//! gets an HTML page back, not JSON, and that case is reported separately
//! from real API errors because the operator fix is different (allow-list
//! the host, not debug the order).

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{ExecutorError, ExecutorResult};
use crate::signer::SignatureWire;

const BLOCKED_PREVIEW_CHARS: usize = 300;
const API_PREVIEW_CHARS: usize = 400;

/// HTTP client for the order endpoint of one venue.
pub struct ExchangeClient {
    http: reqwest::Client,
    exchange_url: String,
}

impl ExchangeClient {
    /// `base_url` is the venue's API root; the order endpoint lives at
    /// `{base}/exchange`.
    pub fn new(base_url: &str, timeout_secs: u64) -> ExecutorResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            http,
            exchange_url: format!("{}/exchange", base_url.trim_end_matches('/')),
        })
    }

    /// POST a ready payload and decode the JSON response.
    pub async fn post_action(&self, payload: &Value) -> ExecutorResult<Value> {
        let response = self.http.post(&self.exchange_url).json(payload).send().await?;

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

        let decoded: Value = serde_json::from_str(&body)?;
        if decoded.get("status").and_then(Value::as_str) == Some("err") {
            return Err(ExecutorError::Api {
                status: status.as_u16(),
                preview: truncate_chars(&body, API_PREVIEW_CHARS),
            });
        }

        debug!(url = %self.exchange_url, "exchange action accepted");
        Ok(decoded)
    }
}

/// Outer payload for a locally signed action.
pub fn exchange_payload<A: Serialize>(
    action: &A,
    nonce: u64,
    signature: &SignatureWire,
    vault_address: Option<&str>,
) -> ExecutorResult<Value> {
    let mut payload = serde_json::Map::new();
    payload.insert("action".to_string(), serde_json::to_value(action)?);
    payload.insert("nonce".to_string(), Value::from(nonce));
    payload.insert("signature".to_string(), serde_json::to_value(signature)?);
    if let Some(vault) = vault_address {
        payload.insert("vaultAddress".to_string(), Value::from(vault));
    }
    Ok(Value::Object(payload))
}

/// Distinguish an HTML/WAF block from a JSON API error.
pub fn classify_http_failure(status: u16, content_type: &str, body: &str) -> ExecutorError {
    let looks_html =
        content_type.contains("text/html") || body.trim_start().starts_with('<');
    if looks_html {
        ExecutorError::Blocked {
            status,
            preview: truncate_chars(body, BLOCKED_PREVIEW_CHARS),
        }
    } else {
        ExecutorError::Api {
            status,
            preview: truncate_chars(body, API_PREVIEW_CHARS),
        }
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Depth-first search for the first value under `key` anywhere in the
/// tree. Order responses nest the id at a depth that varies with fill
/// status; the responses are small, so unbounded recursion is safe.
pub fn find_key_deep<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => {
            if let Some(found) = map.get(key) {
                return Some(found);
            }
            map.values().find_map(|v| find_key_deep(v, key))
        }
        Value::Array(items) => items.iter().find_map(|v| find_key_deep(v, key)),
        _ => None,
    }
}

/// Pull the exchange order id out of an order response, wherever the
/// venue nested it.
pub fn extract_order_id(response: &Value) -> Option<u64> {
    find_key_deep(response, "oid").and_then(Value::as_u64)
}
