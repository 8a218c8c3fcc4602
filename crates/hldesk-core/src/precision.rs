//! Price and size precision rules.
//!
//! The perp protocol allows at most `6 - szDecimals` decimal places on a
//! price (never negative). Market orders round toward the marketable side
//! (up for buys, down for sells); limit orders round half-up. Sizes round
//! half-up to `szDecimals` and are serialized without trailing decimal
//! zeros.

use crate::{Price, Size};
use rust_decimal::{Decimal, RoundingStrategy};

/// Protocol-wide price decimal budget for perps.
pub const MAX_PRICE_DECIMALS: u32 = 6;

/// Allowed price decimals for a symbol: `6 - szDecimals`, floored at zero.
pub fn price_decimals_for(sz_decimals: u32) -> u32 {
    MAX_PRICE_DECIMALS.saturating_sub(sz_decimals)
}

/// Direction applied when snapping a price onto the allowed grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundMode {
    /// Toward positive infinity. Used for buy market prices.
    Up,
    /// Toward negative infinity. Used for sell market prices.
    Down,
    /// Standard half-up. Used for limit prices and sizes.
    HalfUp,
}

/// Round a price to the given number of decimals in the given direction.
pub fn round_price(price: Price, decimals: u32, mode: RoundMode) -> Price {
    let strategy = match mode {
        RoundMode::Up => RoundingStrategy::ToPositiveInfinity,
        RoundMode::Down => RoundingStrategy::ToNegativeInfinity,
        RoundMode::HalfUp => RoundingStrategy::MidpointAwayFromZero,
    };
    Price::new(price.inner().round_dp_with_strategy(decimals, strategy))
}

/// Round a quantity half-up to the symbol's size decimals.
pub fn round_size(size: Size, sz_decimals: u32) -> Size {
    Size::new(
        size.inner()
            .round_dp_with_strategy(sz_decimals, RoundingStrategy::MidpointAwayFromZero),
    )
}

/// Wire string for a rounded price. Trailing decimal zeros are stripped.
pub fn format_price_str(price: Price) -> String {
    normalized_string(price.inner())
}

/// Wire string for a quantity.
///
/// Rounds half-up to `sz_decimals` (to the nearest integer when zero),
/// then strips trailing zeros after the decimal point. Integer-part zeros
/// are never touched: "100" stays "100".
pub fn format_size_str(size: Size, sz_decimals: u32) -> String {
    normalized_string(round_size(size, sz_decimals).inner())
}

fn normalized_string(value: Decimal) -> String {
    value.normalize().to_string()
}
