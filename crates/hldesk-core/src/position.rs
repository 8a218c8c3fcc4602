//! Normalized account-state types.
//!
//! Positions arrive from the venue with a signed size. The sign is the
//! single source of truth for direction: `PositionSide` is always derived
//! from it, never stored independently by decoders.

use crate::{Price, Size};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Position direction derived from signed size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    Long,
    Short,
    Flat,
}

impl PositionSide {
    /// Derive direction from a signed quantity.
    pub fn from_signed(signed: Decimal) -> Self {
        if signed.is_zero() {
            Self::Flat
        } else if signed.is_sign_positive() {
            Self::Long
        } else {
            Self::Short
        }
    }
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long => write!(f, "long"),
            Self::Short => write!(f, "short"),
            Self::Flat => write!(f, "flat"),
        }
    }
}

/// One decoded position, keyed by coin within its DEX scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedPosition {
    pub coin: String,
    /// Absolute size. Direction lives in `side`.
    pub size: Size,
    pub side: PositionSide,
    pub entry_px: Option<Price>,
    pub position_value: Option<Decimal>,
    pub unrealized_pnl: Option<Decimal>,
    pub return_on_equity: Option<Decimal>,
    pub liquidation_px: Option<Price>,
    pub margin_used: Option<Decimal>,
    /// "cross" or "isolated".
    pub leverage_type: Option<String>,
    pub leverage_value: Option<Decimal>,
    pub max_leverage: Option<u32>,
    /// Raw venue record, retained for audit.
    pub raw: serde_json::Value,
}

impl NormalizedPosition {
    /// Build from a signed size, deriving side and absolute magnitude.
    pub fn from_signed_size(coin: String, signed: Decimal, raw: serde_json::Value) -> Self {
        Self {
            coin,
            size: Size::new(signed.abs()),
            side: PositionSide::from_signed(signed),
            entry_px: None,
            position_value: None,
            unrealized_pnl: None,
            return_on_equity: None,
            liquidation_px: None,
            margin_used: None,
            leverage_type: None,
            leverage_value: None,
            max_leverage: None,
            raw,
        }
    }

    pub fn is_open(&self) -> bool {
        self.side != PositionSide::Flat && self.size.is_positive()
    }
}

/// Margin summary for one DEX scope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarginSummary {
    pub account_value: Decimal,
    pub total_notional: Decimal,
    pub total_margin_used: Decimal,
    pub withdrawable: Decimal,
    pub maintenance_margin: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_side_from_signed() {
        assert_eq!(PositionSide::from_signed(dec!(2.5)), PositionSide::Long);
        assert_eq!(PositionSide::from_signed(dec!(-2.5)), PositionSide::Short);
        assert_eq!(PositionSide::from_signed(dec!(0)), PositionSide::Flat);
    }

    #[test]
    fn test_normalized_from_signed_size() {
        let pos = NormalizedPosition::from_signed_size("ETH".into(), dec!(-2.5), json!({}));
        assert_eq!(pos.side, PositionSide::Short);
        assert_eq!(pos.size, Size::new(dec!(2.5)));
        assert!(pos.is_open());
    }

    #[test]
    fn test_flat_is_not_open() {
        let pos = NormalizedPosition::from_signed_size("ETH".into(), dec!(0), json!({}));
        assert_eq!(pos.side, PositionSide::Flat);
        assert!(!pos.is_open());
    }
}
