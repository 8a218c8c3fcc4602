//! Asset index resolution for main-venue and builder-DEX symbols.
//!
//! Maps a parsed [`CoinKey`] to the venue's numeric asset id plus the
//! precision metadata needed for order construction. Resolved entries are
//! cached for the process lifetime, keyed by the canonical symbol.

use crate::client::InfoClient;
use crate::error::RegistryResult;
use dashmap::DashMap;
use hldesk_core::{asset_id_for, AssetEntry, CoinKey, Scope};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Lazy per-symbol metadata resolver over the `/info` endpoint.
pub struct AssetIndexResolver {
    client: Arc<InfoClient>,
    cache: DashMap<String, AssetEntry>,
}

impl AssetIndexResolver {
    pub fn new(client: Arc<InfoClient>) -> Self {
        Self {
            client,
            cache: DashMap::new(),
        }
    }

    /// Resolve a symbol to its asset entry.
    ///
    /// Returns `Ok(None)` when the venue has no matching universe entry;
    /// callers must treat that as "cannot trade this symbol". Network or
    /// parse failures propagate as errors and nothing is cached.
    pub async fn resolve(&self, key: &CoinKey) -> RegistryResult<Option<AssetEntry>> {
        let cache_key = key.canonical();
        if let Some(entry) = self.cache.get(&cache_key) {
            return Ok(Some(*entry));
        }

        let (meta_index, universe) = match &key.scope {
            Scope::Main => (0, self.client.meta(None).await?),
            Scope::Dex(name) => {
                let Some(meta_index) = self.dex_meta_index(name).await? else {
                    warn!(dex = %name, "Unknown builder DEX");
                    return Ok(None);
                };
                (meta_index, self.client.meta(Some(name)).await?)
            }
        };

        let Some(found) = find_in_universe(&universe, key) else {
            debug!(symbol = %cache_key, "No universe entry for symbol");
            return Ok(None);
        };

        let entry = AssetEntry {
            asset_id: asset_id_for(meta_index, found.local_index),
            sz_decimals: found.sz_decimals,
            max_leverage: found.max_leverage,
            only_isolated: found.only_isolated,
        };

        info!(
            symbol = %cache_key,
            asset_id = entry.asset_id,
            sz_decimals = entry.sz_decimals,
            "Resolved asset index"
        );
        self.cache.insert(cache_key, entry);
        Ok(Some(entry))
    }

    /// Position of a builder DEX in the `perpDexs` directory.
    ///
    /// Index 0 is the main venue (a null entry); builder DEXes keep their
    /// array position, which feeds the asset id formula.
    async fn dex_meta_index(&self, dex_name: &str) -> RegistryResult<Option<usize>> {
        let dexs = self.client.perp_dexs().await?;
        Ok(dex_meta_index_in(&dexs, dex_name))
    }
}

/// One matched universe row.
#[derive(Debug, PartialEq, Eq)]
struct UniverseMatch {
    local_index: u32,
    sz_decimals: u32,
    max_leverage: u32,
    only_isolated: bool,
}

/// Scan a DEX directory response for a named builder DEX.
fn dex_meta_index_in(dexs: &Value, dex_name: &str) -> Option<usize> {
    let entries = dexs.as_array()?;
    entries.iter().position(|entry| {
        entry
            .get("name")
            .and_then(Value::as_str)
            .is_some_and(|n| n.eq_ignore_ascii_case(dex_name))
    })
}

/// Scan a meta response for the symbol, skipping delisted rows.
///
/// Tolerates the meta shape variants the venue has used: a bare
/// `{universe: [...]}` object, a `[meta, assetCtxs]` pair, or a raw entry
/// array. Universe names in builder-DEX metadata are fully qualified
/// ("xyz:SILVER"); both that and the bare coin name match.
fn find_in_universe(meta: &Value, key: &CoinKey) -> Option<UniverseMatch> {
    let entries = universe_entries(meta)?;
    let qualified = key.canonical();

    for (local_index, entry) in entries.iter().enumerate() {
        if entry
            .get("isDelisted")
            .and_then(Value::as_bool)
            .unwrap_or(false)
        {
            continue;
        }
        let Some(name) = entry.get("name").and_then(Value::as_str) else {
            continue;
        };
        if !name.eq_ignore_ascii_case(&key.coin) && !name.eq_ignore_ascii_case(&qualified) {
            continue;
        }
        return Some(UniverseMatch {
            local_index: local_index as u32,
            sz_decimals: entry
                .get("szDecimals")
                .and_then(Value::as_u64)
                .unwrap_or(0) as u32,
            max_leverage: entry
                .get("maxLeverage")
                .and_then(Value::as_u64)
                .unwrap_or(10) as u32,
            only_isolated: entry
                .get("onlyIsolated")
                .and_then(Value::as_bool)
                .unwrap_or_else(|| {
                    entry
                        .get("marginMode")
                        .and_then(Value::as_str)
                        .is_some_and(|m| m.eq_ignore_ascii_case("isolated"))
                }),
        });
    }
    None
}

/// Extract the universe entry list from any of the supported meta shapes.
fn universe_entries(meta: &Value) -> Option<&Vec<Value>> {
    if let Some(universe) = meta.get("universe").and_then(Value::as_array) {
        return Some(universe);
    }
    let array = meta.as_array()?;
    if let Some(first) = array.first() {
        if let Some(universe) = first.get("universe").and_then(Value::as_array) {
            return Some(universe);
        }
    }
    Some(array)
}
