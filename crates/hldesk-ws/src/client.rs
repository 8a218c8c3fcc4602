//! Market stream client: connection lifecycle and message dispatch.
//!
//! One client owns one WebSocket connection scoped to (DEX, optional
//! account address). The receive loop is strictly sequential; a keepalive
//! ping rides the same task through `tokio::select!`. Reconnects retry
//! forever with capped, jittered exponential backoff.

use crate::error::{WsError, WsResult};
use crate::message::{
    parse_frame, StreamSubscription, WsRequest, CHANNEL_ACCOUNT, CHANNEL_ASSET_CTX, CHANNEL_ERROR,
    CHANNEL_MIDS, CHANNEL_PONG, CHANNEL_SPOT,
};
use crate::state::StreamState;
use crate::subscription::SubscriptionManager;
use futures_util::{SinkExt, StreamExt};
use hldesk_core::Scope;
use hldesk_registry::SpotMetadataResolver;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Notify;
use tokio_tungstenite::{
    connect_async_tls_with_config, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

type WsSink = futures_util::stream::SplitSink<
    WebSocketStream<MaybeTlsStream<TcpStream>>,
    Message,
>;

/// Stream client configuration.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// WebSocket URL (see `codec::http_to_wss`).
    pub ws_url: String,
    /// DEX scope this connection covers.
    pub scope: Scope,
    /// Account address for state/balance streams. None = prices only.
    pub user_address: Option<String>,
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub ping_interval_ms: u64,
    pub reconnect_min_delay_ms: u64,
    pub reconnect_max_delay_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            ws_url: String::new(),
            scope: Scope::Main,
            user_address: None,
            connect_timeout_ms: 15_000,
            read_timeout_ms: 60_000,
            ping_interval_ms: 20_000,
            reconnect_min_delay_ms: 1_000,
            reconnect_max_delay_ms: 8_000,
        }
    }
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// WebSocket client for one (scope, address) stream.
pub struct MarketStreamClient {
    config: StreamConfig,
    state: Arc<StreamState>,
    subscriptions: Arc<SubscriptionManager>,
    spot_meta: Arc<SpotMetadataResolver>,
    conn_state: Arc<RwLock<ConnectionState>>,
    /// Coins with a requested per-coin asset-context stream. Resent in
    /// full after every reconnect.
    ctx_coins: RwLock<HashSet<String>>,
    ctx_notify: Notify,
    shutdown: CancellationToken,
}

impl MarketStreamClient {
    /// Does not connect; connection is an explicit operation via `run`.
    pub fn new(
        config: StreamConfig,
        spot_meta: Arc<SpotMetadataResolver>,
        dex_names: Vec<String>,
    ) -> Self {
        Self {
            config,
            state: Arc::new(StreamState::new(dex_names)),
            subscriptions: Arc::new(SubscriptionManager::new()),
            spot_meta,
            conn_state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            ctx_coins: RwLock::new(HashSet::new()),
            ctx_notify: Notify::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Request per-coin asset-context updates for a qualified coin name.
    /// Safe to call repeatedly and before the first connect; the active
    /// session picks the subscription up at its next suspension point.
    pub fn subscribe_asset_ctx(&self, coin: &str) {
        if self.ctx_coins.write().insert(coin.to_string()) {
            self.ctx_notify.notify_one();
        }
    }

    /// The decoded caches this connection feeds.
    pub fn state(&self) -> Arc<StreamState> {
        Arc::clone(&self.state)
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.conn_state.read()
    }

    /// Request teardown. Safe to call multiple times; the run loop exits
    /// at its next suspension point.
    pub fn close(&self) {
        if !self.shutdown.is_cancelled() {
            info!(scope = %self.config.scope, "Stream client close requested");
            self.shutdown.cancel();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Connect and keep the stream alive until `close` is called.
    ///
    /// There is no retry limit: this is an always-on market-data client,
    /// so backoff continues until a connect succeeds or we are closed.
    pub async fn run(&self) -> WsResult<()> {
        let mut attempt = 0u32;

        loop {
            if self.is_closed() {
                *self.conn_state.write() = ConnectionState::Disconnected;
                return Ok(());
            }

            *self.conn_state.write() = ConnectionState::Connecting;
            match self.run_session().await {
                Ok(()) => {
                    info!(scope = %self.config.scope, "Stream session ended");
                }
                Err(e) => {
                    error!(scope = %self.config.scope, error = %e, "Stream session error");
                }
            }

            if self.is_closed() {
                *self.conn_state.write() = ConnectionState::Disconnected;
                return Ok(());
            }

            attempt = attempt.saturating_add(1);
            *self.conn_state.write() = ConnectionState::Reconnecting;
            let delay = self.backoff_delay(attempt);
            warn!(
                scope = %self.config.scope,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Reconnecting"
            );

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = self.shutdown.cancelled() => {
                    *self.conn_state.write() = ConnectionState::Disconnected;
                    return Ok(());
                }
            }

            // All subscriptions must be resent on the new socket.
            self.subscriptions.clear();
        }
    }

    async fn run_session(&self) -> WsResult<()> {
        info!(url = %self.config.ws_url, scope = %self.config.scope, "Connecting to stream");

        let connect = connect_async_tls_with_config(&self.config.ws_url, None, true, None);
        let (ws_stream, _response) =
            tokio::time::timeout(Duration::from_millis(self.config.connect_timeout_ms), connect)
                .await
                .map_err(|_| WsError::ConnectTimeout(self.config.connect_timeout_ms))??;
        let (mut write, mut read) = ws_stream.split();

        *self.conn_state.write() = ConnectionState::Connected;
        info!(scope = %self.config.scope, "Stream connected");

        self.send_subscriptions(&mut write).await?;

        // Bootstrap the spot maps so index-keyed mids resolve. A failure
        // here is not fatal: prices queue as pending and the next session
        // retries the load.
        if !self.state.has_spot_maps() {
            match self.spot_meta.ensure_loaded().await {
                Ok(maps) => self.state.install_spot_maps(maps),
                Err(e) => warn!(error = %e, "Spot metadata unavailable, queuing pair prices"),
            }
        }

        let mut ping_interval =
            tokio::time::interval(Duration::from_millis(self.config.ping_interval_ms));
        ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ping_interval.reset();

        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => {
                    if let Err(e) = write.send(Message::Close(None)).await {
                        debug!(error = %e, "Close frame send failed during shutdown");
                    }
                    *self.conn_state.write() = ConnectionState::Disconnected;
                    return Ok(());
                }

                () = self.ctx_notify.notified() => {
                    self.send_ctx_subscriptions(&mut write).await?;
                }

                _ = ping_interval.tick() => {
                    let ping = serde_json::to_string(&WsRequest::ping())?;
                    write.send(Message::Text(ping)).await?;
                    debug!(scope = %self.config.scope, "Sent keepalive ping");
                }

                msg = tokio::time::timeout(
                    Duration::from_millis(self.config.read_timeout_ms),
                    read.next(),
                ) => {
                    let msg = msg.map_err(|_| WsError::ReadTimeout(self.config.read_timeout_ms))?;
                    match msg {
                        Some(Ok(Message::Text(text))) => self.dispatch(&text),
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Pong(_))) => {
                            debug!("Received transport pong");
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (f.code.into(), f.reason.to_string()))
                                .unwrap_or((1000, "normal close".to_string()));
                            warn!(code, %reason, "Stream closed by server");
                            return Err(WsError::ConnectionClosed { code, reason });
                        }
                        Some(Err(e)) => return Err(e.into()),
                        None => {
                            warn!("Stream ended");
                            return Ok(());
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    /// Send the required subscription set, suppressing repeats.
    async fn send_subscriptions(&self, write: &mut WsSink) -> WsResult<()> {
        let required = SubscriptionManager::required_for(
            &self.config.scope,
            self.config.user_address.as_deref(),
        );
        for sub in required {
            self.send_subscription(write, sub).await?;
        }
        self.send_ctx_subscriptions(write).await?;
        info!(
            scope = %self.config.scope,
            count = self.subscriptions.active_count(),
            "Subscriptions active"
        );
        Ok(())
    }

    /// Send the asset-context subscription for every requested coin.
    async fn send_ctx_subscriptions(&self, write: &mut WsSink) -> WsResult<()> {
        let coins: Vec<String> = self.ctx_coins.read().iter().cloned().collect();
        for coin in coins {
            self.send_subscription(write, StreamSubscription::active_asset_ctx(&coin))
                .await?;
        }
        Ok(())
    }

    async fn send_subscription(&self, write: &mut WsSink, sub: StreamSubscription) -> WsResult<()> {
        if !self.subscriptions.mark_if_new(&sub) {
            return Ok(());
        }
        let request = serde_json::to_string(&WsRequest::subscribe(sub.clone()))?;
        write.send(Message::Text(request)).await?;
        debug!(kind = %sub.kind, "Subscription sent");
        Ok(())
    }

    /// Route one decoded frame. Parse faults are logged and skipped;
    /// they never take down the receive loop.
    fn dispatch(&self, text: &str) {
        let frame = match parse_frame(text) {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                debug!("Frame without channel discriminator");
                return;
            }
            Err(e) => {
                warn!(error = %e, "Unparsable frame skipped");
                return;
            }
        };

        match frame.channel.as_str() {
            CHANNEL_MIDS => self.state.apply_mids(&frame.data),
            CHANNEL_ACCOUNT => self.state.apply_account_state(&frame.data),
            CHANNEL_SPOT => self.state.apply_spot_balances(&frame.data),
            CHANNEL_ASSET_CTX => self.state.apply_active_asset_ctx(&frame.data),
            CHANNEL_PONG => debug!("Received application pong"),
            CHANNEL_ERROR => {
                let detail = frame.data.as_str().unwrap_or_default();
                if detail.contains("Already subscribed") {
                    // Expected during resubscribe races, benign.
                    debug!(detail, "Venue reports existing subscription");
                } else {
                    error!(detail, "Venue error message");
                }
            }
            other => debug!(channel = other, "Ignoring unrecognized channel"),
        }
    }

    /// Capped exponential backoff with jitter: min * 2^(attempt-1) up to
    /// max, plus 0-500ms so reconnect storms spread out.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(10);
        let delay = self
            .config
            .reconnect_min_delay_ms
            .saturating_mul(1u64 << exponent)
            .min(self.config.reconnect_max_delay_ms);
        Duration::from_millis(delay + rand_jitter())
    }
}

/// Pseudo-random jitter (0-500ms) from the clock's nanosecond field.
fn rand_jitter() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    (nanos % 500) as u64
}
