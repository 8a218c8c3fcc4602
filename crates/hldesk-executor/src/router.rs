//! Unified order construction and routing for Hyperliquid-protocol
//! venues.
//!
//! `execute_order` is a linear pipeline, not a state machine: each call
//! is independent and the only cross-call state lives in the asset-index
//! cache and the leverage-application set. Resolution and signing faults
//! abort the single call; leverage-provisioning faults are logged and
//! swallowed so an outage there never blocks order flow.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use hldesk_core::{
    price_decimals_for, round_price, round_size, format_price_str, format_size_str, AssetEntry,
    CoinKey, OrderIntent, OrderType, Price, RoundMode, Scope, Side, Size, TimeInForce,
};
use hldesk_registry::AssetIndexResolver;
use hldesk_ws::StreamState;

use crate::delegated::DelegatedSigningClient;
use crate::dispatch::{exchange_payload, extract_order_id, ExchangeClient};
use crate::error::{ExecutorError, ExecutorResult};
use crate::fees::select_fee;
use crate::leverage::LeverageApplicationState;
use crate::nonce::{NonceManager, SystemClock};
use crate::signer::{BuilderInfo, OrderAction, OrderTypeWire, OrderWire, Signer, UpdateLeverageAction};
use crate::venue::VenueOptions;

/// Hands out the live stream cache for a scope. The application keeps
/// one stream per (scope, address) pair and exposes their state here.
#[cfg_attr(test, mockall::automock)]
pub trait StreamDirectory: Send + Sync {
    fn state_for(&self, scope: &Scope) -> Option<Arc<StreamState>>;
}

/// Signing path for a venue.
pub enum SigningBackend {
    Local(Signer),
    Delegated(DelegatedSigningClient),
}

/// Order pipeline for one Hyperliquid-protocol venue.
pub struct OrderBuilder {
    options: VenueOptions,
    assets: Arc<AssetIndexResolver>,
    streams: Arc<dyn StreamDirectory>,
    signing: SigningBackend,
    exchange: ExchangeClient,
    nonce: NonceManager<SystemClock>,
    leverage: LeverageApplicationState,
}

impl OrderBuilder {
    pub fn new(
        options: VenueOptions,
        assets: Arc<AssetIndexResolver>,
        streams: Arc<dyn StreamDirectory>,
        signing: SigningBackend,
        exchange: ExchangeClient,
    ) -> Self {
        Self {
            options,
            assets,
            streams,
            signing,
            exchange,
            nonce: NonceManager::with_system_clock(),
            leverage: LeverageApplicationState::new(),
        }
    }

    /// Build, sign and submit one order. Returns the exchange order id
    /// when the venue reports one.
    pub async fn execute_order(&self, intent: &OrderIntent) -> ExecutorResult<Option<u64>> {
        let key = CoinKey::parse(&intent.symbol);

        let entry = self
            .assets
            .resolve(&key)
            .await?
            .ok_or_else(|| ExecutorError::UnresolvedSymbol(intent.symbol.clone()))?;
        let decimals = price_decimals_for(entry.sz_decimals);

        let (limit_px, tif) = match intent.order_type {
            OrderType::Market => {
                let base = self.pick_price(&key, intent.price);
                if base.is_zero() {
                    warn!(symbol = %intent.symbol, "no live price for market order, using zero base");
                }
                let (px, clamped) =
                    market_order_price(base, intent.side, self.options.slippage, decimals);
                if clamped {
                    warn!(
                        symbol = %intent.symbol,
                        base = %base.inner(),
                        clamped_px = %px.inner(),
                        "slippage price outside guard band, clamped"
                    );
                }
                let tif = market_tif(
                    intent.tif,
                    self.options.frontend_market,
                    self.options.force_ioc,
                );
                (px, tif)
            }
            OrderType::Limit => {
                let px = intent
                    .price
                    .ok_or_else(|| ExecutorError::MissingLimitPrice(intent.symbol.clone()))?;
                let px = round_price(px, decimals, RoundMode::HalfUp);
                (px, intent.tif.unwrap_or(TimeInForce::Gtc))
            }
        };

        let size = round_size(intent.size, entry.sz_decimals);

        self.ensure_max_leverage_auto(&key, &entry).await;

        let is_market = matches!(intent.order_type, OrderType::Market);
        let builder = self.builder_info(&key.scope, is_market);

        let order = OrderWire {
            asset: entry.asset_id,
            is_buy: intent.side.is_buy(),
            limit_px: format_price_str(limit_px),
            sz: format_size_str(size, entry.sz_decimals),
            reduce_only: intent.reduce_only,
            order_type: OrderTypeWire::limit(tif),
            cloid: intent.client_id.clone(),
        };
        debug!(
            symbol = %intent.symbol,
            asset = order.asset,
            px = %order.limit_px,
            sz = %order.sz,
            tif = tif.wire_name(),
            reduce_only = order.reduce_only,
            "submitting order"
        );

        let action = OrderAction::single(order, builder);
        let response = self.submit(&action).await?;
        Ok(extract_order_id(&response))
    }

    /// Close the cached position on `symbol` with a reduce-only market
    /// order. Position state comes from the stream cache only; closing a
    /// flat or unknown position is a no-op, not an error.
    pub async fn close_position(
        &self,
        symbol: &str,
        price_hint: Option<Price>,
    ) -> ExecutorResult<Option<u64>> {
        let key = CoinKey::parse(symbol);

        // Dex snapshots key positions by the qualified "dex:COIN" name.
        let position = self
            .streams
            .state_for(&key.scope)
            .and_then(|state| state.position(&key.scope, &key.canonical()))
            .filter(|p| p.is_open());
        let Some(position) = position else {
            debug!(symbol = %symbol, "close requested with no open position, nothing to do");
            return Ok(None);
        };

        let side = match position.side {
            hldesk_core::PositionSide::Long => Side::Sell,
            hldesk_core::PositionSide::Short => Side::Buy,
            hldesk_core::PositionSide::Flat => return Ok(None),
        };

        let intent = OrderIntent {
            exchange: self.options.name.clone(),
            symbol: symbol.to_string(),
            side,
            size: Size::new(position.size.inner().abs()),
            order_type: OrderType::Market,
            price: price_hint,
            tif: None,
            reduce_only: true,
            client_id: None,
        };
        self.execute_order(&intent).await
    }

    /// Price resolution: explicit hint, then the live stream for the
    /// scope (perp mid, with base-spot fallback on the main venue only),
    /// then a cached asset-context price, then zero as the degraded-mode
    /// fallback.
    ///
    /// Dex-scoped mids arrive under the qualified "dex:COIN" key, so the
    /// lookup always uses the canonical symbol.
    fn pick_price(&self, key: &CoinKey, hint: Option<Price>) -> Price {
        if let Some(px) = hint {
            return px;
        }
        if let Some(state) = self.streams.state_for(&key.scope) {
            let symbol = key.canonical();
            if let Some(px) = state.perp_price(&symbol) {
                return px;
            }
            if key.scope.is_main() {
                if let Some(px) = state.spot_base_price(&key.coin) {
                    return px;
                }
            }
            if let Some(px) = state.ctx_price(&key.scope, &symbol) {
                return px;
            }
        }
        Price::ZERO
    }

    /// Push the symbol's max leverage to the venue once per session.
    /// Failures are logged and recorded as applied; see the note in
    /// `leverage`.
    async fn ensure_max_leverage_auto(&self, key: &CoinKey, entry: &AssetEntry) {
        let cache_key = key.canonical();
        if !self.leverage.begin_if_needed(&cache_key) {
            return;
        }

        let action =
            UpdateLeverageAction::new(entry.asset_id, !entry.only_isolated, entry.max_leverage);
        match self.submit(&action).await {
            Ok(_) => debug!(
                symbol = %cache_key,
                leverage = entry.max_leverage,
                "leverage applied"
            ),
            Err(e) => warn!(
                symbol = %cache_key,
                error = %e,
                "leverage update failed, proceeding with order"
            ),
        }
        self.leverage.mark_applied(&cache_key);
    }

    fn builder_info(&self, scope: &Scope, is_market: bool) -> Option<BuilderInfo> {
        let address = self.options.builder_address.as_ref()?;
        let fee = select_fee(&self.options.fees, scope, is_market)?;
        Some(BuilderInfo {
            address: address.to_lowercase(),
            fee,
        })
    }

    async fn submit<A: Serialize>(&self, action: &A) -> ExecutorResult<Value> {
        let payload = match &self.signing {
            SigningBackend::Local(signer) => {
                let nonce = self.nonce.next();
                let signature = signer
                    .sign_action(action, nonce, self.options.vault_address, None)
                    .await?;
                let vault = self.options.vault_address.map(|a| a.to_string());
                exchange_payload(action, nonce, &signature, vault.as_deref())?
            }
            SigningBackend::Delegated(provider) => {
                let raw = serde_json::to_value(action)?;
                provider.build_payload(&raw).await?
            }
        };
        self.exchange.post_action(&payload).await
    }
}

/// Slippage-adjusted, guard-clamped, tick-rounded market price.
///
/// Buys pay up and round up; sells give and round down, so the rounded
/// price is always marketable. The [0.5x, 1.5x] clamp protects against a
/// stale or mis-scaled base producing a grossly wrong limit.
pub(crate) fn market_order_price(
    base: Price,
    side: Side,
    slippage: Decimal,
    decimals: u32,
) -> (Price, bool) {
    let factor = if side.is_buy() {
        Decimal::ONE + slippage
    } else {
        Decimal::ONE - slippage
    };
    let raw = Price::new(base.inner() * factor);

    let lo = Price::new(base.inner() * Decimal::new(5, 1));
    let hi = Price::new(base.inner() * Decimal::new(15, 1));
    let clamped = raw.clamp_between(lo, hi);
    let was_clamped = clamped.inner() != raw.inner();

    let mode = if side.is_buy() {
        RoundMode::Up
    } else {
        RoundMode::Down
    };
    (round_price(clamped, decimals, mode), was_clamped)
}

/// Market-order TIF: forced IOC wins, then the caller's choice, then the
/// venue's frontend-market flag, then GTC.
pub(crate) fn market_tif(
    requested: Option<TimeInForce>,
    frontend_market: bool,
    force_ioc: bool,
) -> TimeInForce {
    if force_ioc {
        return TimeInForce::Ioc;
    }
    if let Some(tif) = requested {
        return tif;
    }
    if frontend_market {
        TimeInForce::FrontendMarket
    } else {
        TimeInForce::Gtc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::{KeyManager, Signer};
    use hldesk_registry::InfoClient;
    use rust_decimal_macros::dec;
    use serde_json::json;

    const TEST_PRIVATE_KEY: &str =
        "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn test_builder(state: Option<Arc<StreamState>>) -> OrderBuilder {
        // Unroutable endpoints: these tests never reach the network.
        let info = Arc::new(InfoClient::new("http://127.0.0.1:1").unwrap());
        let keys = Arc::new(KeyManager::from_hex(TEST_PRIVATE_KEY, None).unwrap());
        let mut streams = MockStreamDirectory::new();
        streams
            .expect_state_for()
            .returning(move |_| state.clone());
        OrderBuilder::new(
            VenueOptions::new("test", "http://127.0.0.1:1"),
            Arc::new(AssetIndexResolver::new(info)),
            Arc::new(streams),
            SigningBackend::Local(Signer::new(keys, true)),
            ExchangeClient::new("http://127.0.0.1:1", 1).unwrap(),
        )
    }

    #[test]
    fn test_buy_market_price_rounds_up() {
        let (px, clamped) =
            market_order_price(Price::new(dec!(100)), Side::Buy, dec!(0.05), 1);
        assert_eq!(px.inner(), dec!(105.0));
        assert!(!clamped);

        // A base that lands between ticks rounds up for a buy.
        let (px, _) = market_order_price(Price::new(dec!(100.03)), Side::Buy, dec!(0.05), 1);
        assert!(px.inner() >= dec!(105.0));
        assert_eq!(px.inner(), dec!(105.1));
    }

    #[test]
    fn test_sell_market_price_rounds_down() {
        let (px, clamped) =
            market_order_price(Price::new(dec!(100)), Side::Sell, dec!(0.05), 1);
        assert_eq!(px.inner(), dec!(95.0));
        assert!(!clamped);

        let (px, _) = market_order_price(Price::new(dec!(100.07)), Side::Sell, dec!(0.05), 1);
        assert!(px.inner() <= dec!(95.1));
        assert_eq!(px.inner(), dec!(95.0));
    }

    #[test]
    fn test_guard_band_clamps_runaway_slippage() {
        // Slippage of 1.0 would double the price; the 1.5x bound wins.
        let (px, clamped) = market_order_price(Price::new(dec!(100)), Side::Buy, dec!(1.0), 1);
        assert_eq!(px.inner(), dec!(150.0));
        assert!(clamped);

        let (px, clamped) = market_order_price(Price::new(dec!(100)), Side::Sell, dec!(0.8), 1);
        assert_eq!(px.inner(), dec!(50.0));
        assert!(clamped);
    }

    #[test]
    fn test_market_tif_priority() {
        assert_eq!(market_tif(None, false, false), TimeInForce::Gtc);
        assert_eq!(market_tif(None, true, false), TimeInForce::FrontendMarket);
        assert_eq!(market_tif(Some(TimeInForce::Alo), true, false), TimeInForce::Alo);
        // Forced IOC overrides everything.
        assert_eq!(market_tif(Some(TimeInForce::Gtc), true, true), TimeInForce::Ioc);
    }

    #[test]
    fn test_pick_price_hint_wins() {
        let state = Arc::new(StreamState::new(vec![]));
        state.apply_mids(&json!({"mids": {"BTC": "60000"}}));
        let builder = test_builder(Some(state));

        let key = CoinKey::parse("BTC");
        let px = builder.pick_price(&key, Some(Price::new(dec!(59000))));
        assert_eq!(px.inner(), dec!(59000));
    }

    #[test]
    fn test_pick_price_falls_back_to_stream() {
        let state = Arc::new(StreamState::new(vec![]));
        state.apply_mids(&json!({"mids": {"BTC": "60000"}}));
        let builder = test_builder(Some(state));

        let key = CoinKey::parse("BTC");
        assert_eq!(builder.pick_price(&key, None).inner(), dec!(60000));
    }

    #[test]
    fn test_pick_price_uses_qualified_key_for_dex_scope() {
        // Builder-DEX mids arrive under the qualified name.
        let state = Arc::new(StreamState::new(vec!["xyz".to_string()]));
        state.apply_mids(&json!({"mids": {"xyz:SILVER": "31.1"}}));
        let builder = test_builder(Some(state));

        let key = CoinKey::parse("xyz:SILVER");
        assert_eq!(builder.pick_price(&key, None).inner(), dec!(31.1));
    }

    #[test]
    fn test_pick_price_falls_back_to_asset_ctx() {
        let state = Arc::new(StreamState::new(vec!["xyz".to_string()]));
        state.apply_active_asset_ctx(&json!({
            "coin": "xyz:SILVER",
            "ctx": {"markPx": "30.5"}
        }));
        let builder = test_builder(Some(state));

        let key = CoinKey::parse("xyz:SILVER");
        assert_eq!(builder.pick_price(&key, None).inner(), dec!(30.5));
    }

    #[test]
    fn test_pick_price_degrades_to_zero() {
        let builder = test_builder(None);
        let key = CoinKey::parse("xyz:SILVER");
        assert!(builder.pick_price(&key, None).is_zero());
    }

    #[tokio::test]
    async fn test_close_on_flat_is_noop() {
        // Empty stream cache: no position, so no order and no error.
        let state = Arc::new(StreamState::new(vec![]));
        let builder = test_builder(Some(state));

        let result = builder.close_position("BTC", None).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_close_dex_position_is_not_treated_as_flat() {
        // An open builder-DEX position is cached under "xyz:SILVER". The
        // close must find it and proceed into order construction, where
        // the unroutable resolver endpoint fails the call. A flat-no-op
        // Ok(None) here would mean the cache lookup missed.
        let state = Arc::new(StreamState::new(vec!["xyz".to_string()]));
        state.apply_account_state(&json!({
            "perpDexStates": [
                {"clearinghouseState": {"marginSummary": {}}},
                {"clearinghouseState": {
                    "marginSummary": {},
                    "assetPositions": [
                        {"position": {"coin": "xyz:SILVER", "szi": "1.5"}}
                    ]
                }}
            ]
        }));
        let builder = test_builder(Some(state));

        let result = builder
            .close_position("xyz:SILVER", Some(Price::new(dec!(31))))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_close_without_stream_is_noop() {
        let builder = test_builder(None);
        let result = builder.close_position("xyz:SILVER", None).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_limit_order_without_price_is_fatal() {
        let state = Arc::new(StreamState::new(vec![]));
        let builder = test_builder(Some(state));

        let intent = OrderIntent {
            exchange: "test".to_string(),
            symbol: "BTC".to_string(),
            side: Side::Buy,
            size: Size::new(dec!(1)),
            order_type: OrderType::Limit,
            price: None,
            tif: None,
            reduce_only: false,
            client_id: None,
        };
        // Resolution is attempted first and fails fast on the unroutable
        // endpoint, which is also an acceptable fatal outcome; assert on
        // the error, not its variant ordering.
        assert!(builder.execute_order(&intent).await.is_err());
    }
}
