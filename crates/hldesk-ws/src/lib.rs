//! Market-data and account-state WebSocket client.
//!
//! Provides the always-on venue stream:
//! - automatic reconnection with capped, jittered exponential backoff
//! - subscription de-duplication per connection lifetime
//! - JSON keepalive ping and bounded read timeouts
//! - decoded caches: perp mids, spot pair prices, per-DEX account
//!   snapshots, spot balances

pub mod client;
pub mod codec;
pub mod error;
pub mod message;
pub mod state;
pub mod subscription;

pub use client::{ConnectionState, MarketStreamClient, StreamConfig};
pub use codec::{classify_mid_key, http_to_wss, MidKey};
pub use error::{WsError, WsResult};
pub use message::{parse_frame, InboundFrame, StreamSubscription, WsRequest};
pub use state::{DexAccountSnapshot, StreamState};
pub use subscription::SubscriptionManager;

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any WebSocket connections are made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
