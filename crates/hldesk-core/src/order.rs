//! Order intent types shared by the router and dispatchers.

use crate::{Price, Size};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn is_buy(&self) -> bool {
        matches!(self, Side::Buy)
    }

    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Market,
    Limit,
}

/// Time-in-force, in the venue's wire spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    Gtc,
    Ioc,
    Alo,
    /// Venue-native market mode used by its own frontend.
    FrontendMarket,
}

impl TimeInForce {
    pub fn wire_name(&self) -> &'static str {
        match self {
            TimeInForce::Gtc => "Gtc",
            TimeInForce::Ioc => "Ioc",
            TimeInForce::Alo => "Alo",
            TimeInForce::FrontendMarket => "FrontendMarket",
        }
    }
}

/// One order request as it enters the construction pipeline.
///
/// Ephemeral: built per call, never stored.
#[derive(Debug, Clone)]
pub struct OrderIntent {
    /// Configured exchange name the order is routed through.
    pub exchange: String,
    /// "COIN" or "dex:COIN".
    pub symbol: String,
    pub side: Side,
    pub size: Size,
    pub order_type: OrderType,
    /// Required for limit orders; a hint for market orders.
    pub price: Option<Price>,
    /// Caller-chosen time-in-force; the router picks a venue default
    /// when absent.
    pub tif: Option<TimeInForce>,
    pub reduce_only: bool,
    /// Client order id (cloid) when the caller wants idempotent submission.
    pub client_id: Option<String>,
}
