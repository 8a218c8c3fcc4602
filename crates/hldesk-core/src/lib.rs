//! Core domain types for the multi-venue trading desk.
//!
//! This crate provides fundamental types used throughout the desk:
//! - `Scope`, `CoinKey`: venue/DEX scoping and `dex:coin` symbol parsing
//! - `Price`, `Size`: precision-safe numeric types
//! - `AssetEntry`: resolved asset id plus precision metadata
//! - `NormalizedPosition`, `MarginSummary`: decoded account state
//! - `Side`, `OrderType`, `TimeInForce`, `OrderIntent`: trading enums

pub mod decimal;
pub mod error;
pub mod order;
pub mod position;
pub mod precision;
pub mod symbol;

pub use decimal::{Price, Size};
pub use error::{CoreError, Result};
pub use order::{OrderIntent, OrderType, Side, TimeInForce};
pub use position::{MarginSummary, NormalizedPosition, PositionSide};
pub use precision::{
    format_price_str, format_size_str, price_decimals_for, round_price, round_size, RoundMode,
    MAX_PRICE_DECIMALS,
};
pub use symbol::{asset_id_for, AssetEntry, CoinKey, Scope, BUILDER_DEX_BASE, BUILDER_DEX_STRIDE};
