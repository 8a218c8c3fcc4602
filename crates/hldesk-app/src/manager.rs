//! Venue construction and the unified query/trade surface.
//!
//! One `ExchangeManager` owns every configured venue. Hyperliquid-
//! protocol venues get an order pipeline plus a lazily-built registry of
//! market streams keyed by (scope, address); generic adapter venues are
//! registered by the embedding application and handle their own orders.
//! A venue that fails to construct is logged and skipped so the others
//! keep operating.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use rust_decimal::Decimal;
use tracing::{debug, error, info};

use crate::config::{AppConfig, VenueConfig, VenueKind};
use crate::error::{AppError, AppResult};
use hldesk_core::{CoinKey, MarginSummary, NormalizedPosition, OrderIntent, Price, Scope};
use hldesk_executor::{
    DelegatedSigningClient, ExchangeClient, ExecutorError, GenericVenue, KeyManager, KeySource,
    OrderBuilder, Signer, SigningBackend, SigningMode, StreamDirectory, VenueOptions,
};
use hldesk_registry::{AssetIndexResolver, InfoClient, SpotMetadataResolver};
use hldesk_ws::{MarketStreamClient, StreamConfig, StreamState};

const REST_TIMEOUT_SECS: u64 = 10;

/// Lazily-created market streams for one venue, keyed by
/// (scope, address).
pub struct StreamRegistry {
    ws_url: String,
    dex_names: Vec<String>,
    spot_meta: Arc<SpotMetadataResolver>,
    clients: DashMap<String, Arc<MarketStreamClient>>,
}

impl StreamRegistry {
    pub fn new(ws_url: String, dex_names: Vec<String>, spot_meta: Arc<SpotMetadataResolver>) -> Self {
        Self {
            ws_url,
            dex_names,
            spot_meta,
            clients: DashMap::new(),
        }
    }

    /// Fetch or create the stream for a (scope, address) pair. Creation
    /// is guarded per key by the map shard lock, so concurrent callers
    /// never spawn duplicate connections.
    pub fn get_or_create(&self, scope: &Scope, address: Option<&str>) -> Arc<MarketStreamClient> {
        let key = format!("{}|{}", scope, address.unwrap_or("").to_lowercase());
        if let Some(existing) = self.clients.get(&key) {
            return Arc::clone(&existing);
        }

        let entry = self.clients.entry(key).or_insert_with(|| {
            let config = StreamConfig {
                ws_url: self.ws_url.clone(),
                scope: scope.clone(),
                user_address: address.map(str::to_string),
                ..StreamConfig::default()
            };
            debug!(scope = %scope, "creating market stream");
            let client = Arc::new(MarketStreamClient::new(
                config,
                Arc::clone(&self.spot_meta),
                self.dex_names.clone(),
            ));
            let runner = Arc::clone(&client);
            tokio::spawn(async move {
                let _ = runner.run().await;
            });
            client
        });
        Arc::clone(&entry)
    }

    pub fn close_all(&self) {
        for client in self.clients.iter() {
            client.close();
        }
    }

    pub fn stream_count(&self) -> usize {
        self.clients.len()
    }
}

/// Binds a venue's wallet address to its stream registry for the order
/// pipeline.
struct VenueStreams {
    registry: Arc<StreamRegistry>,
    address: Option<String>,
}

impl StreamDirectory for VenueStreams {
    fn state_for(&self, scope: &Scope) -> Option<Arc<StreamState>> {
        Some(
            self.registry
                .get_or_create(scope, self.address.as_deref())
                .state(),
        )
    }
}

/// One constructed Hyperliquid-protocol venue.
pub struct HlVenue {
    options: VenueOptions,
    builder: OrderBuilder,
    registry: Arc<StreamRegistry>,
}

impl HlVenue {
    fn from_config(cfg: &VenueConfig) -> AppResult<Self> {
        let options = cfg.to_options()?;

        let info = Arc::new(InfoClient::new(&cfg.api_url)?);
        let spot_meta = Arc::new(SpotMetadataResolver::new(Arc::clone(&info)));
        let registry = Arc::new(StreamRegistry::new(
            cfg.ws_endpoint(),
            options.dex_names.clone(),
            spot_meta,
        ));
        let assets = Arc::new(AssetIndexResolver::new(info));

        let signing = match options.signing_mode {
            SigningMode::Delegated => {
                let signing_url = cfg.signing_url.as_ref().ok_or_else(|| {
                    AppError::Config(format!("venue {} has no signing_url", cfg.name))
                })?;
                let api_key_env = cfg.api_key_env.as_ref().ok_or_else(|| {
                    AppError::Config(format!("venue {} has no api_key_env", cfg.name))
                })?;
                let api_key = std::env::var(api_key_env).map_err(|_| {
                    AppError::Config(format!("environment variable not set: {api_key_env}"))
                })?;
                SigningBackend::Delegated(DelegatedSigningClient::new(
                    signing_url,
                    &api_key,
                    REST_TIMEOUT_SECS,
                )?)
            }
            SigningMode::Local => {
                let var_name = cfg.private_key_env.clone().ok_or_else(|| {
                    AppError::Config(format!("venue {} has no private_key_env", cfg.name))
                })?;
                let keys = Arc::new(
                    KeyManager::load(KeySource::EnvVar { var_name }, None)
                        .map_err(ExecutorError::Key)?,
                );
                SigningBackend::Local(Signer::new(keys, options.is_mainnet))
            }
        };

        let exchange = ExchangeClient::new(&cfg.api_url, REST_TIMEOUT_SECS)?;
        let streams = Arc::new(VenueStreams {
            registry: Arc::clone(&registry),
            address: options.wallet_address.clone(),
        });
        let builder = OrderBuilder::new(options.clone(), assets, streams, signing, exchange);

        Ok(Self {
            options,
            builder,
            registry,
        })
    }

    fn state(&self, scope: &Scope) -> Arc<StreamState> {
        self.registry
            .get_or_create(scope, self.options.wallet_address.as_deref())
            .state()
    }

    /// Start the streams every configured scope needs, ahead of first
    /// use.
    pub fn warm_streams(&self) {
        self.state(&Scope::Main);
        for dex in &self.options.dex_names {
            self.state(&Scope::Dex(dex.clone()));
        }
    }

    /// Live price for a perp symbol or a "BASE/QUOTE" spot pair.
    /// Dex-scoped symbols are cached under their qualified name.
    pub fn price(&self, symbol: &str) -> Option<Price> {
        if symbol.contains('/') {
            let state = self.state(&Scope::Main);
            let ctx = state.active_ctx(symbol);
            return state.spot_pair_price(symbol, ctx.as_ref());
        }

        let key = CoinKey::parse(symbol);
        let state = self.state(&key.scope);
        let qualified = key.canonical();
        state
            .perp_price(&qualified)
            .or_else(|| {
                if key.scope.is_main() {
                    state.spot_base_price(&key.coin)
                } else {
                    None
                }
            })
            .or_else(|| state.ctx_price(&key.scope, &qualified))
    }

    pub fn position(&self, symbol: &str) -> Option<NormalizedPosition> {
        let key = CoinKey::parse(symbol);
        self.state(&key.scope).position(&key.scope, &key.canonical())
    }

    pub fn margin_summary(&self, scope: &Scope) -> Option<MarginSummary> {
        self.state(scope).margin_summary(scope)
    }

    pub fn total_account_value(&self) -> Decimal {
        self.state(&Scope::Main).total_account_value()
    }

    pub fn spot_portfolio_value_usdc(&self) -> Decimal {
        self.state(&Scope::Main).spot_portfolio_value_usdc()
    }

    /// Request per-coin asset-context updates so the order pipeline has
    /// a context price to fall back on during mids gaps.
    fn ensure_asset_ctx(&self, symbol: &str) {
        let key = CoinKey::parse(symbol);
        self.registry
            .get_or_create(&key.scope, self.options.wallet_address.as_deref())
            .subscribe_asset_ctx(&key.canonical());
    }

    pub async fn execute_order(&self, intent: &OrderIntent) -> AppResult<Option<u64>> {
        self.ensure_asset_ctx(&intent.symbol);
        Ok(self.builder.execute_order(intent).await?)
    }

    pub async fn close_position(
        &self,
        symbol: &str,
        price_hint: Option<Price>,
    ) -> AppResult<Option<u64>> {
        self.ensure_asset_ctx(symbol);
        Ok(self.builder.close_position(symbol, price_hint).await?)
    }

    pub fn close_streams(&self) {
        self.registry.close_all();
    }

    pub fn name(&self) -> &str {
        &self.options.name
    }
}

/// A constructed venue of either kind.
pub enum VenueHandle {
    Hl(Arc<HlVenue>),
    Generic(Arc<dyn GenericVenue>),
}

/// Owns every venue and routes calls by exchange name.
pub struct ExchangeManager {
    venues: HashMap<String, VenueHandle>,
}

impl ExchangeManager {
    /// Build all configured venues. A venue that fails construction is
    /// logged and skipped; the rest stay available.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut venues = HashMap::new();
        for cfg in &config.venues {
            match cfg.kind {
                VenueKind::Generic => {
                    // Adapter venues are registered by the embedder via
                    // register_generic; the file entry only reserves the
                    // name.
                    debug!(venue = %cfg.name, "generic venue declared, awaiting adapter");
                }
                VenueKind::Hyperliquid | VenueKind::Delegated => {
                    match HlVenue::from_config(cfg) {
                        Ok(venue) => {
                            info!(venue = %cfg.name, "venue ready");
                            venues.insert(cfg.name.clone(), VenueHandle::Hl(Arc::new(venue)));
                        }
                        Err(e) => {
                            error!(venue = %cfg.name, error = %e, "venue construction failed, skipping");
                        }
                    }
                }
            }
        }
        Self { venues }
    }

    pub fn register_generic(&mut self, name: impl Into<String>, venue: Arc<dyn GenericVenue>) {
        self.venues.insert(name.into(), VenueHandle::Generic(venue));
    }

    pub fn venue(&self, name: &str) -> Option<&VenueHandle> {
        self.venues.get(name)
    }

    pub fn hl_venues(&self) -> impl Iterator<Item = &Arc<HlVenue>> {
        self.venues.values().filter_map(|v| match v {
            VenueHandle::Hl(venue) => Some(venue),
            VenueHandle::Generic(_) => None,
        })
    }

    /// Route an order to its venue.
    pub async fn execute_order(&self, intent: &OrderIntent) -> AppResult<Option<u64>> {
        match self.venue(&intent.exchange) {
            Some(VenueHandle::Hl(venue)) => venue.execute_order(intent).await,
            Some(VenueHandle::Generic(venue)) => Ok(venue.create_order(intent).await?),
            None => Err(AppError::UnknownExchange(intent.exchange.clone())),
        }
    }

    pub async fn close_position(
        &self,
        exchange: &str,
        symbol: &str,
        price_hint: Option<Price>,
    ) -> AppResult<Option<u64>> {
        match self.venue(exchange) {
            Some(VenueHandle::Hl(venue)) => venue.close_position(symbol, price_hint).await,
            Some(VenueHandle::Generic(venue)) => Ok(venue.close_position(symbol).await?),
            None => Err(AppError::UnknownExchange(exchange.to_string())),
        }
    }

    /// Live price for a symbol on an exchange. Generic venues answer via
    /// their own mark-price call.
    pub async fn price(&self, exchange: &str, symbol: &str) -> AppResult<Option<Price>> {
        match self.venue(exchange) {
            Some(VenueHandle::Hl(venue)) => Ok(venue.price(symbol)),
            Some(VenueHandle::Generic(venue)) => Ok(venue.get_mark_price(symbol).await?),
            None => Err(AppError::UnknownExchange(exchange.to_string())),
        }
    }

    pub fn close_all(&self) {
        for venue in self.hl_venues() {
            venue.close_streams();
        }
    }
}
