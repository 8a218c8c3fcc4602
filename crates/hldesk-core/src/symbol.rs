//! Venue scoping, symbol parsing and asset id arithmetic.
//!
//! A symbol is either a bare coin on the main venue ("BTC") or a
//! builder-DEX scoped coin ("xyz:SILVER"). Builder-DEX asset ids use the
//! formula `100000 + meta_index * 10000 + local_index`.
//! Example: xyz:SILVER (metaIndex=1, localIndex=27) = 110027.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Base offset for builder-DEX asset ids.
pub const BUILDER_DEX_BASE: u32 = 100_000;
/// Per-DEX stride within the builder-DEX id space.
pub const BUILDER_DEX_STRIDE: u32 = 10_000;

/// The DEX context under which prices, positions and subscriptions are keyed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    /// Main venue (perp DEX metadata index 0).
    Main,
    /// A HIP-3 builder DEX, identified by its lower-cased name.
    Dex(String),
}

impl Scope {
    /// Builder-DEX name, if any.
    pub fn dex_name(&self) -> Option<&str> {
        match self {
            Scope::Main => None,
            Scope::Dex(name) => Some(name),
        }
    }

    pub fn is_main(&self) -> bool {
        matches!(self, Scope::Main)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Main => write!(f, "main"),
            Scope::Dex(name) => write!(f, "{name}"),
        }
    }
}

/// Parsed trading symbol: scope plus upper-cased coin.
///
/// The canonical form is used as the metadata cache key, so parsing must
/// normalize case consistently: DEX names lower, coins upper.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CoinKey {
    pub scope: Scope,
    pub coin: String,
}

impl CoinKey {
    /// Parse `"COIN"` or `"dex:coin"` into a normalized key.
    pub fn parse(symbol: &str) -> Self {
        match symbol.split_once(':') {
            Some((dex, coin)) if !dex.is_empty() => Self {
                scope: Scope::Dex(dex.trim().to_lowercase()),
                coin: coin.trim().to_uppercase(),
            },
            _ => Self {
                scope: Scope::Main,
                coin: symbol.trim().to_uppercase(),
            },
        }
    }

    /// Canonical string form: `"COIN"` or `"dex:COIN"`.
    pub fn canonical(&self) -> String {
        match &self.scope {
            Scope::Main => self.coin.clone(),
            Scope::Dex(name) => format!("{name}:{}", self.coin),
        }
    }
}

impl fmt::Display for CoinKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

/// Compute the venue asset id from perp-DEX metadata position.
///
/// Metadata index 0 is the main venue, where the asset id is the local
/// index within its universe. Builder DEXes (index >= 1) are offset into
/// a dedicated id space.
pub fn asset_id_for(meta_index: usize, local_index: u32) -> u32 {
    if meta_index == 0 {
        local_index
    } else {
        BUILDER_DEX_BASE + meta_index as u32 * BUILDER_DEX_STRIDE + local_index
    }
}

/// Resolved metadata for one tradable symbol.
///
/// Cached for process lifetime; venue metadata changes are rare and a
/// restart clears the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetEntry {
    /// Venue numeric asset id (see [`asset_id_for`]).
    pub asset_id: u32,
    /// Size decimals (szDecimals) for quantity rounding.
    pub sz_decimals: u32,
    /// Maximum leverage the venue allows for this symbol.
    pub max_leverage: u32,
    /// Whether the symbol only supports isolated margin.
    pub only_isolated: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_main_venue_asset_id_is_local_index() {
        assert_eq!(asset_id_for(0, 7), 7);
        assert_eq!(asset_id_for(0, 0), 0);
    }

    #[test]
    fn test_builder_dex_asset_id_formula() {
        assert_eq!(asset_id_for(2, 3), 120_003);
        assert_eq!(asset_id_for(1, 27), 110_027);
    }

    #[test]
    fn test_parse_bare_coin() {
        let key = CoinKey::parse("btc");
        assert_eq!(key.scope, Scope::Main);
        assert_eq!(key.coin, "BTC");
        assert_eq!(key.canonical(), "BTC");
    }

    #[test]
    fn test_parse_dex_scoped_coin() {
        let key = CoinKey::parse("XYZ:silver");
        assert_eq!(key.scope, Scope::Dex("xyz".to_string()));
        assert_eq!(key.coin, "SILVER");
        assert_eq!(key.canonical(), "xyz:SILVER");
    }

    #[test]
    fn test_parse_leading_colon_falls_back_to_main() {
        let key = CoinKey::parse(":ETH");
        assert_eq!(key.scope, Scope::Main);
        assert_eq!(key.coin, ":ETH");
    }
}
