//! Venue classification and the generic-venue capability surface.
//!
//! Two kinds of venue exist: Hyperliquid-protocol venues (the main
//! exchange, builder DEXes, and delegated-signing providers in front of
//! either) go through the order pipeline in this crate; anything else is
//! an adapter implementing [`GenericVenue`] and handles its own order
//! placement. The split is decided once per call, at the top.

use alloy::primitives::Address;
use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::ExecutorResult;
use crate::fees::FeeSchedule;
use hldesk_core::{NormalizedPosition, OrderIntent, Price};

/// How orders for a venue get signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningMode {
    /// Local key, EIP-712 phantom-agent signature.
    Local,
    /// Provider holds the key and returns ready payloads.
    Delegated,
}

/// Resolved per-venue options, flowing from configuration into the
/// pipeline.
#[derive(Debug, Clone)]
pub struct VenueOptions {
    /// Configured venue name, used in routing and logs.
    pub name: String,
    /// REST API root.
    pub api_url: String,
    /// Account address whose streams are watched.
    pub wallet_address: Option<String>,
    /// Sub-account the orders act on, when configured.
    pub vault_address: Option<Address>,
    /// Builder fee recipient.
    pub builder_address: Option<String>,
    pub fees: FeeSchedule,
    /// Market-order slippage fraction, e.g. 0.05.
    pub slippage: Decimal,
    /// Use the venue's frontend-market TIF for market orders.
    pub frontend_market: bool,
    /// Provider requires IOC on market orders regardless of other flags.
    pub force_ioc: bool,
    pub is_mainnet: bool,
    /// Builder DEX names, in the venue's perp-DEX array order.
    pub dex_names: Vec<String>,
    pub signing_mode: SigningMode,
}

impl VenueOptions {
    pub fn new(name: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            api_url: api_url.into(),
            wallet_address: None,
            vault_address: None,
            builder_address: None,
            fees: FeeSchedule::default(),
            slippage: Decimal::new(5, 2),
            frontend_market: false,
            force_ioc: false,
            is_mainnet: true,
            dex_names: Vec::new(),
            signing_mode: SigningMode::Local,
        }
    }
}

/// Capability surface of a non-Hyperliquid adapter venue.
///
/// Implementations own their transport, authentication and precision
/// rules; the router only forwards.
#[async_trait]
pub trait GenericVenue: Send + Sync {
    async fn get_position(&self, symbol: &str) -> ExecutorResult<Option<NormalizedPosition>>;

    /// Place an order; returns the venue's order id when it reports one.
    async fn create_order(&self, intent: &OrderIntent) -> ExecutorResult<Option<u64>>;

    async fn get_collateral(&self) -> ExecutorResult<Decimal>;

    async fn close_position(&self, symbol: &str) -> ExecutorResult<Option<u64>>;

    async fn get_mark_price(&self, symbol: &str) -> ExecutorResult<Option<Price>>;
}
