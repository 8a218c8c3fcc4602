//! Wire message model for the market stream.
//!
//! Outbound frames are fully typed so the encoded JSON is exact. Inbound
//! frames are decoded into a channel discriminator plus a raw payload;
//! the venue has drifted on payload shapes often enough that the state
//! layer parses them leniently.

use crate::error::{WsError, WsResult};
use hldesk_core::Scope;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Price stream channel.
pub const CHANNEL_MIDS: &str = "allMids";
/// Per-DEX account snapshot channel.
pub const CHANNEL_ACCOUNT: &str = "webData3";
/// Spot balance channel.
pub const CHANNEL_SPOT: &str = "spotState";
/// Per-coin asset context channel.
pub const CHANNEL_ASSET_CTX: &str = "activeAssetCtx";
/// Venue error channel.
pub const CHANNEL_ERROR: &str = "error";
/// Application-level pong channel.
pub const CHANNEL_PONG: &str = "pong";

/// One subscription, as sent on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSubscription {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coin: Option<String>,
}

impl StreamSubscription {
    /// Price stream for a scope. The main venue omits the dex field.
    pub fn all_mids(scope: &Scope) -> Self {
        Self {
            kind: CHANNEL_MIDS.to_string(),
            dex: scope.dex_name().map(str::to_string),
            user: None,
            coin: None,
        }
    }

    /// Account-state stream for an address.
    pub fn account_state(user: &str) -> Self {
        Self {
            kind: CHANNEL_ACCOUNT.to_string(),
            dex: None,
            user: Some(user.to_string()),
            coin: None,
        }
    }

    /// Spot-balance stream for an address.
    pub fn spot_state(user: &str) -> Self {
        Self {
            kind: CHANNEL_SPOT.to_string(),
            dex: None,
            user: Some(user.to_string()),
            coin: None,
        }
    }

    /// Per-coin asset-context stream. `coin` is the fully qualified
    /// name ("BTC" or "xyz:SILVER"); the dex rides inside it.
    pub fn active_asset_ctx(coin: &str) -> Self {
        Self {
            kind: CHANNEL_ASSET_CTX.to_string(),
            dex: None,
            user: None,
            coin: Some(coin.to_string()),
        }
    }

    /// Normalized identity key used for de-duplication.
    ///
    /// Case is folded so that "0xAB" and "0xab" describe the same stream.
    pub fn identity_key(&self) -> String {
        format!(
            "{}|u={}|d={}|c={}",
            self.kind,
            self.user.as_deref().unwrap_or("").to_lowercase(),
            self.dex.as_deref().unwrap_or("").to_lowercase(),
            self.coin.as_deref().unwrap_or("").to_uppercase(),
        )
    }
}

/// Outbound request envelope.
#[derive(Debug, Clone, Serialize)]
pub struct WsRequest {
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription: Option<StreamSubscription>,
}

impl WsRequest {
    pub fn subscribe(subscription: StreamSubscription) -> Self {
        Self {
            method: "subscribe".to_string(),
            subscription: Some(subscription),
        }
    }

    pub fn ping() -> Self {
        Self {
            method: "ping".to_string(),
            subscription: None,
        }
    }
}

/// Decoded inbound frame: channel name plus raw payload.
#[derive(Debug, Clone)]
pub struct InboundFrame {
    pub channel: String,
    pub data: Value,
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    channel: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    data: Value,
}

/// Parse one text frame.
///
/// Returns `Ok(None)` for frames without a channel discriminator; those
/// are logged and skipped by the caller, never treated as failures.
pub fn parse_frame(text: &str) -> WsResult<Option<InboundFrame>> {
    let envelope: RawEnvelope = serde_json::from_str(text)
        .map_err(|e| WsError::ParseError(format!("bad frame: {e}")))?;
    let channel = match envelope.channel.or(envelope.kind) {
        Some(ch) if !ch.is_empty() => ch,
        _ => return Ok(None),
    };
    Ok(Some(InboundFrame {
        channel,
        data: envelope.data,
    }))
}
