//! Decoded, queryable stream state.
//!
//! All mutation happens from the single receive loop; reads come from
//! many tasks. Query methods never block waiting for data: a cache miss
//! is `None`, which consumers treat as "not yet available".

use crate::codec::{classify_mid_key, MidKey};
use hldesk_core::{MarginSummary, NormalizedPosition, Price, Scope};
use hldesk_registry::SpotMaps;
use parking_lot::RwLock;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

/// Whole-snapshot account state for one DEX scope.
///
/// Rebuilt in full from every account-state message; individual fields
/// are never merged across messages.
#[derive(Debug, Clone, Default)]
pub struct DexAccountSnapshot {
    pub margin: MarginSummary,
    /// Positions keyed by upper-cased coin. Qualified "dex:COIN" names are
    /// stored under both the raw and upper-cased key for lookup symmetry.
    pub positions: HashMap<String, NormalizedPosition>,
    /// Raw per-asset context records, retained as delivered.
    pub asset_ctxs: Vec<Value>,
}

/// Shared caches owned by one stream client.
pub struct StreamState {
    /// Configured builder-DEX names for account-state index mapping.
    dex_names: Vec<String>,
    perp_prices: RwLock<HashMap<String, Price>>,
    spot_base_prices: RwLock<HashMap<String, Price>>,
    spot_pair_prices: RwLock<HashMap<String, Price>>,
    /// Pair prices that arrived before the spot maps were ready.
    pending_pair_mids: RwLock<HashMap<u32, Price>>,
    spot_maps: RwLock<Option<Arc<SpotMaps>>>,
    snapshots: RwLock<HashMap<Scope, DexAccountSnapshot>>,
    spot_balances: RwLock<HashMap<String, Decimal>>,
    /// Per-coin contexts from the `activeAssetCtx` stream, keyed by
    /// upper-cased coin.
    active_ctxs: RwLock<HashMap<String, Value>>,
}

impl StreamState {
    pub fn new(dex_names: Vec<String>) -> Self {
        Self {
            dex_names,
            perp_prices: RwLock::new(HashMap::new()),
            spot_base_prices: RwLock::new(HashMap::new()),
            spot_pair_prices: RwLock::new(HashMap::new()),
            pending_pair_mids: RwLock::new(HashMap::new()),
            spot_maps: RwLock::new(None),
            snapshots: RwLock::new(HashMap::new()),
            spot_balances: RwLock::new(HashMap::new()),
            active_ctxs: RwLock::new(HashMap::new()),
        }
    }

    // ---- updates (receive loop only) ----

    /// Apply one `allMids` payload.
    pub fn apply_mids(&self, data: &Value) {
        let Some(mids) = data.get("mids").and_then(Value::as_object) else {
            debug!("allMids payload without mids object");
            return;
        };

        for (raw_key, raw_mid) in mids {
            let Some(px) = decimal_of(raw_mid).map(Price::new) else {
                continue;
            };
            match classify_mid_key(raw_key) {
                Some(MidKey::PairIndex(pair_idx)) => self.apply_pair_index_mid(pair_idx, px),
                Some(MidKey::PairName { base, quote }) => {
                    let pair_name = format!("{}/{}", base.to_uppercase(), quote.to_uppercase());
                    self.store_pair_price(&pair_name, &base.to_uppercase(), &quote.to_uppercase(), px);
                }
                Some(MidKey::Symbol(symbol)) => {
                    self.perp_prices.write().insert(symbol.to_uppercase(), px);
                }
                None => {}
            }
        }
    }

    fn apply_pair_index_mid(&self, pair_idx: u32, px: Price) {
        let maps = self.spot_maps.read().clone();
        match maps.as_ref().and_then(|m| m.pair(pair_idx)) {
            Some(pair) => {
                let (name, base, quote) = (pair.name.clone(), pair.base.clone(), pair.quote.clone());
                self.store_pair_price(&name, &base, &quote, px);
            }
            None => {
                // Maps not ready for this index; hold the price for replay.
                self.pending_pair_mids.write().insert(pair_idx, px);
            }
        }
    }

    fn store_pair_price(&self, pair_name: &str, base: &str, quote: &str, px: Price) {
        self.spot_pair_prices.write().insert(pair_name.to_string(), px);
        if quote == "USDC" {
            self.spot_base_prices.write().insert(base.to_string(), px);
        }
    }

    /// Install the spot maps and replay every pending pair price into the
    /// named caches. Nothing stays pending after a successful install.
    pub fn install_spot_maps(&self, maps: Arc<SpotMaps>) {
        *self.spot_maps.write() = Some(Arc::clone(&maps));

        let pending: Vec<(u32, Price)> = self.pending_pair_mids.write().drain().collect();
        let mut replayed = 0usize;
        for (pair_idx, px) in pending {
            if let Some(pair) = maps.pair(pair_idx) {
                let (name, base, quote) = (pair.name.clone(), pair.base.clone(), pair.quote.clone());
                self.store_pair_price(&name, &base, &quote, px);
                replayed += 1;
            }
        }
        if replayed > 0 {
            info!(replayed, "Replayed pending spot pair prices");
        }
    }

    /// Rebuild the per-DEX snapshots from one account-state payload.
    ///
    /// Index 0 of `perpDexStates` is always the main venue; later indices
    /// map onto the configured DEX names in order, with a `dex{i}`
    /// fallback label past the end of the list.
    pub fn apply_account_state(&self, data: &Value) {
        let Some(dex_states) = data.get("perpDexStates").and_then(Value::as_array) else {
            debug!("account-state payload without perpDexStates");
            return;
        };

        let mut snapshots = self.snapshots.write();
        for (i, st) in dex_states.iter().enumerate() {
            let scope = self.scope_for_index(i);
            snapshots.insert(scope, parse_dex_snapshot(st));
        }
    }

    /// Replace the spot balances wholesale.
    pub fn apply_spot_balances(&self, data: &Value) {
        let balances_list = data
            .get("spotState")
            .and_then(|s| s.get("balances"))
            .and_then(Value::as_array);
        let Some(balances_list) = balances_list else {
            debug!("spot-state payload without balances");
            return;
        };

        let mut balances = HashMap::new();
        for entry in balances_list {
            let Some(coin) = entry.get("coin").and_then(Value::as_str) else {
                continue;
            };
            let Some(total) = entry.get("total").and_then(decimal_of) else {
                continue;
            };
            balances.insert(coin.to_uppercase(), total);
        }
        *self.spot_balances.write() = balances;
    }

    /// Apply one `activeAssetCtx` payload: `{"coin": str, "ctx": {...}}`.
    pub fn apply_active_asset_ctx(&self, data: &Value) {
        let Some(coin) = data.get("coin").and_then(Value::as_str) else {
            debug!("asset-ctx payload without coin");
            return;
        };
        let Some(ctx) = data.get("ctx") else {
            return;
        };
        if ctx.is_object() {
            self.active_ctxs
                .write()
                .insert(coin.to_uppercase(), ctx.clone());
        }
    }

    fn scope_for_index(&self, i: usize) -> Scope {
        if i == 0 {
            Scope::Main
        } else {
            match self.dex_names.get(i - 1) {
                Some(name) => Scope::Dex(name.to_lowercase()),
                None => Scope::Dex(format!("dex{i}")),
            }
        }
    }

    // ---- queries (any task) ----

    pub fn perp_price(&self, symbol: &str) -> Option<Price> {
        self.perp_prices.read().get(&symbol.to_uppercase()).copied()
    }

    pub fn spot_base_price(&self, base: &str) -> Option<Price> {
        self.spot_base_prices.read().get(&base.to_uppercase()).copied()
    }

    /// Spot pair price with the fallback chain: explicit pair context
    /// (mid, then mark, then previous-day) -> cached stream price -> base
    /// price when the quote is USDC.
    pub fn spot_pair_price(&self, pair: &str, ctx: Option<&Value>) -> Option<Price> {
        let pair = pair.trim().to_uppercase();
        if pair.is_empty() {
            return None;
        }

        if let Some(ctx) = ctx {
            for key in ["midPx", "markPx", "prevDayPx"] {
                if let Some(px) = ctx.get(key).and_then(decimal_of) {
                    return Some(Price::new(px));
                }
            }
        }

        if let Some(px) = self.spot_pair_prices.read().get(&pair).copied() {
            return Some(px);
        }

        if let Some(base) = pair.strip_suffix("/USDC") {
            return self.spot_base_price(base);
        }
        None
    }

    pub fn margin_summary(&self, scope: &Scope) -> Option<MarginSummary> {
        self.snapshots.read().get(scope).map(|s| s.margin.clone())
    }

    pub fn account_value(&self, scope: &Scope) -> Option<Decimal> {
        self.margin_summary(scope).map(|m| m.account_value)
    }

    pub fn withdrawable(&self, scope: &Scope) -> Option<Decimal> {
        self.margin_summary(scope).map(|m| m.withdrawable)
    }

    /// Sum of account values across every cached DEX scope.
    pub fn total_account_value(&self) -> Decimal {
        self.snapshots
            .read()
            .values()
            .map(|s| s.margin.account_value)
            .sum()
    }

    pub fn positions(&self, scope: &Scope) -> HashMap<String, NormalizedPosition> {
        self.snapshots
            .read()
            .get(scope)
            .map(|s| s.positions.clone())
            .unwrap_or_default()
    }

    pub fn position(&self, scope: &Scope, coin: &str) -> Option<NormalizedPosition> {
        let snapshots = self.snapshots.read();
        let snapshot = snapshots.get(scope)?;
        snapshot
            .positions
            .get(coin)
            .or_else(|| snapshot.positions.get(&coin.to_uppercase()))
            .cloned()
    }

    /// Latest `activeAssetCtx` context for a coin, if one has arrived.
    pub fn active_ctx(&self, coin: &str) -> Option<Value> {
        self.active_ctxs.read().get(&coin.to_uppercase()).cloned()
    }

    /// Context-derived price for a coin: the per-coin `activeAssetCtx`
    /// record first, then any account-snapshot asset context carrying a
    /// matching coin name. Used as the fallback when the mids cache has
    /// no entry for the symbol.
    pub fn ctx_price(&self, scope: &Scope, coin: &str) -> Option<Price> {
        if let Some(ctx) = self.active_ctxs.read().get(&coin.to_uppercase()) {
            if let Some(px) = ctx_px(ctx) {
                return Some(px);
            }
        }

        let snapshots = self.snapshots.read();
        let snapshot = snapshots.get(scope)?;
        snapshot
            .asset_ctxs
            .iter()
            .find(|ctx| {
                ctx.get("coin")
                    .and_then(Value::as_str)
                    .is_some_and(|n| n.eq_ignore_ascii_case(coin))
            })
            .and_then(ctx_px)
    }

    pub fn asset_ctxs(&self, scope: &Scope) -> Vec<Value> {
        self.snapshots
            .read()
            .get(scope)
            .map(|s| s.asset_ctxs.clone())
            .unwrap_or_default()
    }

    pub fn spot_balances(&self) -> HashMap<String, Decimal> {
        self.spot_balances.read().clone()
    }

    /// Total spot portfolio value in USDC terms.
    ///
    /// USDC counts at 1.0; other tokens use their cached BASE/USDC price;
    /// tokens without a known price contribute zero.
    pub fn spot_portfolio_value_usdc(&self) -> Decimal {
        let balances = self.spot_balances.read();
        let mut total = Decimal::ZERO;
        for (coin, amount) in balances.iter() {
            if coin == "USDC" {
                total += *amount;
            } else if let Some(px) = self.spot_base_price(coin) {
                total += *amount * px.inner();
            }
        }
        total
    }

    /// Number of prices still waiting for the spot maps.
    pub fn pending_pair_count(&self) -> usize {
        self.pending_pair_mids.read().len()
    }

    pub fn has_spot_maps(&self) -> bool {
        self.spot_maps.read().is_some()
    }
}

/// Parse one `perpDexStates` entry into a snapshot.
fn parse_dex_snapshot(st: &Value) -> DexAccountSnapshot {
    let ch = st.get("clearinghouseState").cloned().unwrap_or(Value::Null);
    let ms = ch.get("marginSummary").cloned().unwrap_or(Value::Null);

    let margin = MarginSummary {
        account_value: field_decimal(&ms, "accountValue"),
        total_notional: field_decimal(&ms, "totalNtlPos"),
        total_margin_used: field_decimal(&ms, "totalMarginUsed"),
        withdrawable: field_decimal(&ch, "withdrawable"),
        maintenance_margin: field_decimal(&ch, "crossMaintenanceMarginUsed"),
    };

    let mut positions = HashMap::new();
    if let Some(asset_positions) = ch.get("assetPositions").and_then(Value::as_array) {
        for ap in asset_positions {
            let Some(pos) = ap.get("position") else {
                continue;
            };
            let Some(norm) = normalize_position(pos) else {
                continue;
            };
            let coin_raw = norm.coin.clone();
            positions.insert(coin_raw.to_uppercase(), norm.clone());
            if coin_raw.contains(':') {
                positions.insert(coin_raw, norm);
            }
        }
    }

    let asset_ctxs = st
        .get("assetCtxs")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    DexAccountSnapshot {
        margin,
        positions,
        asset_ctxs,
    }
}

/// Normalize one raw position record. Side is derived from the signed
/// `szi` field; a record without a coin is dropped.
fn normalize_position(pos: &Value) -> Option<NormalizedPosition> {
    let coin = pos.get("coin").and_then(Value::as_str)?;
    if coin.is_empty() {
        return None;
    }
    let szi = pos.get("szi").and_then(decimal_of).unwrap_or(Decimal::ZERO);

    let mut norm = NormalizedPosition::from_signed_size(coin.to_string(), szi, pos.clone());
    norm.entry_px = pos.get("entryPx").and_then(decimal_of).map(Price::new);
    norm.position_value = pos.get("positionValue").and_then(decimal_of);
    norm.unrealized_pnl = pos.get("unrealizedPnl").and_then(decimal_of);
    norm.return_on_equity = pos.get("returnOnEquity").and_then(decimal_of);
    norm.liquidation_px = pos.get("liquidationPx").and_then(decimal_of).map(Price::new);
    norm.margin_used = pos.get("marginUsed").and_then(decimal_of);
    if let Some(lev) = pos.get("leverage") {
        norm.leverage_type = lev
            .get("type")
            .and_then(Value::as_str)
            .map(|t| t.to_lowercase());
        norm.leverage_value = lev.get("value").and_then(decimal_of);
    }
    norm.max_leverage = pos
        .get("maxLeverage")
        .and_then(decimal_of)
        .and_then(|d| d.trunc().to_u32());
    Some(norm)
}

/// Price out of one asset-context record, preferring the mid.
fn ctx_px(ctx: &Value) -> Option<Price> {
    for key in ["midPx", "markPx", "oraclePx"] {
        if let Some(px) = ctx.get(key).and_then(decimal_of) {
            return Some(Price::new(px));
        }
    }
    None
}

/// Decimal field of a JSON object, zero when absent or unparsable.
fn field_decimal(value: &Value, key: &str) -> Decimal {
    value.get(key).and_then(decimal_of).unwrap_or(Decimal::ZERO)
}

/// Decimal from a JSON string or number.
fn decimal_of(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hldesk_core::PositionSide;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn maps_with_pairs() -> Arc<SpotMaps> {
        let value = json!({
            "tokens": [
                {"index": 0, "name": "USDC"},
                {"index": 1, "name": "PURR"},
                {"index": 2, "name": "HYPE"}
            ],
            "universe": [
                {"index": 0, "tokens": [1, 0], "name": "PURR/USDC"},
                {"index": 107, "tokens": [2, 0]}
            ]
        });
        Arc::new(SpotMaps::parse(&value).unwrap())
    }

    fn state_with_maps() -> StreamState {
        let state = StreamState::new(vec!["xyz".to_string()]);
        state.install_spot_maps(maps_with_pairs());
        state
    }

    #[test]
    fn test_mids_three_way_classification() {
        let state = state_with_maps();
        state.apply_mids(&json!({
            "mids": {
                "BTC": "65000.5",
                "HYPE/USDC": "30.25",
                "@0": "0.55",
                "xyz:SILVER": "31.1"
            }
        }));

        assert_eq!(state.perp_price("BTC"), Some(Price::new(dec!(65000.5))));
        assert_eq!(state.perp_price("xyz:SILVER"), Some(Price::new(dec!(31.1))));
        assert_eq!(
            state.spot_pair_price("PURR/USDC", None),
            Some(Price::new(dec!(0.55)))
        );
        assert_eq!(
            state.spot_pair_price("HYPE/USDC", None),
            Some(Price::new(dec!(30.25)))
        );
        // USDC-quoted pairs also fill the base price cache
        assert_eq!(state.spot_base_price("hype"), Some(Price::new(dec!(30.25))));
    }

    #[test]
    fn test_pending_prices_replayed_exactly_once() {
        let state = StreamState::new(vec![]);
        state.apply_mids(&json!({"mids": {"@0": "0.5", "@107": "30.0", "@999": "1.0"}}));
        assert_eq!(state.pending_pair_count(), 3);
        assert_eq!(state.spot_pair_price("PURR/USDC", None), None);

        state.install_spot_maps(maps_with_pairs());

        assert_eq!(state.pending_pair_count(), 0);
        assert_eq!(
            state.spot_pair_price("PURR/USDC", None),
            Some(Price::new(dec!(0.5)))
        );
        assert_eq!(
            state.spot_pair_price("HYPE/USDC", None),
            Some(Price::new(dec!(30.0)))
        );
    }

    #[test]
    fn test_unparsable_mid_values_skipped() {
        let state = state_with_maps();
        state.apply_mids(&json!({"mids": {"BTC": "not-a-number", "ETH": "3000"}}));
        assert_eq!(state.perp_price("BTC"), None);
        assert_eq!(state.perp_price("ETH"), Some(Price::new(dec!(3000))));
    }

    fn account_payload() -> Value {
        json!({
            "userState": {"serverTime": 1700000000000u64},
            "perpDexStates": [
                {
                    "clearinghouseState": {
                        "marginSummary": {
                            "accountValue": "1000.5",
                            "totalNtlPos": "2500",
                            "totalMarginUsed": "250"
                        },
                        "withdrawable": "700",
                        "crossMaintenanceMarginUsed": "50",
                        "assetPositions": [
                            {"position": {
                                "coin": "ETH",
                                "szi": "-2.5",
                                "entryPx": "3000",
                                "unrealizedPnl": "12.5",
                                "leverage": {"type": "cross", "value": 5},
                                "maxLeverage": 50
                            }}
                        ]
                    },
                    "assetCtxs": [{"markPx": "3001"}]
                },
                {
                    "clearinghouseState": {
                        "marginSummary": {"accountValue": "200"},
                        "withdrawable": "150"
                    },
                    "assetCtxs": []
                },
                {
                    "clearinghouseState": {
                        "marginSummary": {"accountValue": "25"}
                    }
                }
            ]
        })
    }

    #[test]
    fn test_account_state_rebuild_per_dex() {
        let state = StreamState::new(vec!["xyz".to_string()]);
        state.apply_account_state(&account_payload());

        assert_eq!(state.account_value(&Scope::Main), Some(dec!(1000.5)));
        assert_eq!(state.withdrawable(&Scope::Main), Some(dec!(700)));
        assert_eq!(
            state.account_value(&Scope::Dex("xyz".to_string())),
            Some(dec!(200))
        );
        // Index past the configured list gets the fallback label.
        assert_eq!(
            state.account_value(&Scope::Dex("dex2".to_string())),
            Some(dec!(25))
        );
        assert_eq!(state.total_account_value(), dec!(1225.5));
    }

    #[test]
    fn test_absent_margin_fields_parse_as_zero() {
        let state = StreamState::new(vec![]);
        state.apply_account_state(&json!({
            "perpDexStates": [
                {"clearinghouseState": {"marginSummary": {"accountValue": "10"}}}
            ]
        }));
        let margin = state.margin_summary(&Scope::Main).unwrap();
        assert_eq!(margin.account_value, dec!(10));
        assert_eq!(margin.total_notional, Decimal::ZERO);
        assert_eq!(margin.withdrawable, Decimal::ZERO);
        assert_eq!(margin.maintenance_margin, Decimal::ZERO);
    }

    #[test]
    fn test_active_asset_ctx_feeds_ctx_price() {
        let state = StreamState::new(vec!["xyz".to_string()]);
        state.apply_active_asset_ctx(&json!({
            "coin": "xyz:SILVER",
            "ctx": {"markPx": "31.5"}
        }));

        let scope = Scope::Dex("xyz".to_string());
        assert_eq!(
            state.ctx_price(&scope, "xyz:SILVER"),
            Some(Price::new(dec!(31.5)))
        );
        // Key case is folded on both store and lookup.
        assert_eq!(
            state.ctx_price(&scope, "XYZ:silver"),
            Some(Price::new(dec!(31.5)))
        );
        assert!(state.active_ctx("xyz:silver").is_some());
    }

    #[test]
    fn test_ctx_price_prefers_mid_then_falls_back_to_snapshot() {
        let state = StreamState::new(vec!["xyz".to_string()]);
        state.apply_account_state(&json!({
            "perpDexStates": [
                {"clearinghouseState": {"marginSummary": {}}},
                {
                    "clearinghouseState": {"marginSummary": {}},
                    "assetCtxs": [{"coin": "xyz:SILVER", "markPx": "30.0"}]
                }
            ]
        }));
        let scope = Scope::Dex("xyz".to_string());
        // Snapshot context answers when no active ctx exists.
        assert_eq!(
            state.ctx_price(&scope, "xyz:SILVER"),
            Some(Price::new(dec!(30.0)))
        );

        state.apply_active_asset_ctx(&json!({
            "coin": "xyz:SILVER",
            "ctx": {"midPx": "30.2", "markPx": "30.3"}
        }));
        assert_eq!(
            state.ctx_price(&scope, "xyz:SILVER"),
            Some(Price::new(dec!(30.2)))
        );
    }

    #[test]
    fn test_position_normalization_from_snapshot() {
        let state = StreamState::new(vec![]);
        state.apply_account_state(&account_payload());

        let pos = state.position(&Scope::Main, "eth").unwrap();
        assert_eq!(pos.side, PositionSide::Short);
        assert_eq!(pos.size.inner(), dec!(2.5));
        assert_eq!(pos.entry_px, Some(Price::new(dec!(3000))));
        assert_eq!(pos.leverage_type.as_deref(), Some("cross"));
        assert_eq!(pos.max_leverage, Some(50));
        assert_eq!(pos.raw["coin"], "ETH");
    }

    #[test]
    fn test_snapshot_replaced_wholesale() {
        let state = StreamState::new(vec![]);
        state.apply_account_state(&account_payload());
        assert!(state.position(&Scope::Main, "ETH").is_some());

        // Next message has no positions: the old one must not linger.
        state.apply_account_state(&json!({
            "perpDexStates": [
                {"clearinghouseState": {"marginSummary": {"accountValue": "900"}}}
            ]
        }));
        assert!(state.position(&Scope::Main, "ETH").is_none());
        assert_eq!(state.account_value(&Scope::Main), Some(dec!(900)));
    }

    #[test]
    fn test_qualified_coin_stored_under_both_keys() {
        let state = StreamState::new(vec!["xyz".to_string()]);
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
        let scope = Scope::Dex("xyz".to_string());
        assert!(state.position(&scope, "xyz:SILVER").is_some());
        assert!(state.position(&scope, "XYZ:SILVER").is_some());
    }

    #[test]
    fn test_spot_balances_replaced_wholesale() {
        let state = StreamState::new(vec![]);
        state.apply_spot_balances(&json!({
            "spotState": {"balances": [
                {"coin": "USDC", "total": "100.5"},
                {"coin": "HYPE", "total": "3"}
            ]}
        }));
        assert_eq!(state.spot_balances().get("USDC"), Some(&dec!(100.5)));

        state.apply_spot_balances(&json!({
            "spotState": {"balances": [{"coin": "HYPE", "total": "2"}]}
        }));
        let balances = state.spot_balances();
        assert!(balances.get("USDC").is_none());
        assert_eq!(balances.get("HYPE"), Some(&dec!(2)));
    }

    #[test]
    fn test_portfolio_value_usdc() {
        let state = state_with_maps();
        state.apply_mids(&json!({"mids": {"@107": "30.0"}}));
        state.apply_spot_balances(&json!({
            "spotState": {"balances": [
                {"coin": "USDC", "total": "100"},
                {"coin": "HYPE", "total": "2"},
                {"coin": "UNKNOWN", "total": "500"}
            ]}
        }));
        // 100 USDC at 1.0 + 2 HYPE at 30.0 + unknown contributes zero
        assert_eq!(state.spot_portfolio_value_usdc(), dec!(160));
    }

    #[test]
    fn test_pair_price_fallback_chain() {
        let state = state_with_maps();

        // Explicit context wins over everything.
        let ctx = json!({"markPx": "31.0"});
        assert_eq!(
            state.spot_pair_price("HYPE/USDC", Some(&ctx)),
            Some(Price::new(dec!(31.0)))
        );
        let ctx = json!({"midPx": "30.5", "markPx": "31.0"});
        assert_eq!(
            state.spot_pair_price("HYPE/USDC", Some(&ctx)),
            Some(Price::new(dec!(30.5)))
        );

        // Base price used when quote is USDC and no pair price cached.
        state.apply_mids(&json!({"mids": {"HYPE/USDC": "29.0"}}));
        let base_only = StreamState::new(vec![]);
        base_only.apply_mids(&json!({"mids": {"HYPE/USDC": "29.0"}}));
        assert_eq!(
            base_only.spot_pair_price("HYPE/USDC", None),
            Some(Price::new(dec!(29.0)))
        );
    }

    #[test]
    fn test_queries_miss_returns_none() {
        let state = StreamState::new(vec![]);
        assert_eq!(state.perp_price("BTC"), None);
        assert_eq!(state.account_value(&Scope::Main), None);
        assert!(state.position(&Scope::Main, "BTC").is_none());
    }
}
