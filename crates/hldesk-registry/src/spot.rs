//! Spot token and pair metadata.
//!
//! The market stream quotes spot pairs by numeric index (`@107` style
//! keys), so the desk needs the `spotMeta` tables to name them. The maps
//! are built once per process lifetime and are immutable afterwards.

use crate::client::InfoClient;
use crate::error::{RegistryError, RegistryResult};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// One spot trading pair. `name` is always of the form "BASE/QUOTE".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpotPair {
    pub name: String,
    pub base: String,
    pub quote: String,
}

/// Bidirectional token map plus pair-index table, built from `spotMeta`.
#[derive(Debug, Default)]
pub struct SpotMaps {
    token_name_by_index: HashMap<u32, String>,
    token_index_by_name: HashMap<String, u32>,
    pair_by_index: HashMap<u32, SpotPair>,
}

impl SpotMaps {
    pub fn token_name(&self, index: u32) -> Option<&str> {
        self.token_name_by_index.get(&index).map(String::as_str)
    }

    pub fn token_index(&self, name: &str) -> Option<u32> {
        self.token_index_by_name.get(name).copied()
    }

    pub fn pair(&self, index: u32) -> Option<&SpotPair> {
        self.pair_by_index.get(&index)
    }

    pub fn pair_count(&self) -> usize {
        self.pair_by_index.len()
    }

    pub fn token_count(&self) -> usize {
        self.token_name_by_index.len()
    }

    /// Parse a `spotMeta` response.
    ///
    /// Tolerates several historical shapes for pair entries: an explicit
    /// `tokens: [baseIdx, quoteIdx]` index pair, or named `base`/`quote`
    /// fields, or `baseToken`/`quoteToken` index fields. A pair that ends
    /// up without both a base and a quote name is dropped, never stored
    /// partially.
    pub fn parse(value: &Value) -> RegistryResult<Self> {
        let tokens = value
            .get("tokens")
            .and_then(Value::as_array)
            .ok_or_else(|| RegistryError::Parse("spotMeta missing tokens array".to_string()))?;

        let mut maps = SpotMaps::default();

        for (pos, token) in tokens.iter().enumerate() {
            let index = token
                .get("index")
                .and_then(Value::as_u64)
                .unwrap_or(pos as u64) as u32;
            let Some(name) = token.get("name").and_then(Value::as_str) else {
                continue;
            };
            if name.is_empty() {
                continue;
            }
            maps.token_name_by_index.insert(index, name.to_string());
            maps.token_index_by_name.insert(name.to_string(), index);
        }

        let universe = value
            .get("universe")
            .and_then(Value::as_array)
            .ok_or_else(|| RegistryError::Parse("spotMeta missing universe array".to_string()))?;

        for (pos, entry) in universe.iter().enumerate() {
            let index = entry
                .get("index")
                .and_then(Value::as_u64)
                .unwrap_or(pos as u64) as u32;

            let base = maps.resolve_pair_token(entry, 0, "base", "baseToken");
            let quote = maps.resolve_pair_token(entry, 1, "quote", "quoteToken");

            let (Some(base), Some(quote)) = (base, quote) else {
                debug!(pair_index = index, "Dropping spot pair without resolvable base/quote");
                continue;
            };

            let name = match entry.get("name").and_then(Value::as_str) {
                Some(n) if n.contains('/') => n.to_string(),
                _ => format!("{base}/{quote}"),
            };

            maps.pair_by_index.insert(index, SpotPair { name, base, quote });
        }

        Ok(maps)
    }

    /// Resolve one leg of a pair entry to a token name.
    fn resolve_pair_token(
        &self,
        entry: &Value,
        token_pos: usize,
        name_field: &str,
        index_field: &str,
    ) -> Option<String> {
        if let Some(idx) = entry
            .get("tokens")
            .and_then(Value::as_array)
            .and_then(|t| t.get(token_pos))
            .and_then(Value::as_u64)
        {
            if let Some(name) = self.token_name(idx as u32) {
                return Some(name.to_string());
            }
        }
        if let Some(name) = entry.get(name_field).and_then(Value::as_str) {
            if !name.is_empty() {
                return Some(name.to_string());
            }
        }
        if let Some(idx) = entry.get(index_field).and_then(Value::as_u64) {
            if let Some(name) = self.token_name(idx as u32) {
                return Some(name.to_string());
            }
        }
        None
    }
}

/// One-shot `spotMeta` loader with process-lifetime caching.
///
/// `ensure_loaded` is idempotent: once the maps are built, repeat calls
/// return the cached tables without touching the network. A failed load
/// leaves the cache empty so the next use retries.
pub struct SpotMetadataResolver {
    client: Arc<InfoClient>,
    maps: RwLock<Option<Arc<SpotMaps>>>,
}

impl SpotMetadataResolver {
    pub fn new(client: Arc<InfoClient>) -> Self {
        Self {
            client,
            maps: RwLock::new(None),
        }
    }

    /// Cached maps, if a load has succeeded.
    pub fn cached(&self) -> Option<Arc<SpotMaps>> {
        self.maps.read().clone()
    }

    /// Load the maps if not yet loaded; returns the cached tables.
    pub async fn ensure_loaded(&self) -> RegistryResult<Arc<SpotMaps>> {
        if let Some(maps) = self.cached() {
            return Ok(maps);
        }

        let value = self.client.spot_meta().await.map_err(|e| {
            warn!(error = %e, "spotMeta fetch failed, maps stay empty until next use");
            e
        })?;
        let parsed = SpotMaps::parse(&value)?;
        debug!(
            tokens = parsed.token_count(),
            pairs = parsed.pair_count(),
            "Spot metadata loaded"
        );
        Ok(self.install(parsed))
    }

    /// Install parsed maps, keeping an earlier install if one raced us in.
    pub fn install(&self, parsed: SpotMaps) -> Arc<SpotMaps> {
        let mut guard = self.maps.write();
        if let Some(existing) = guard.as_ref() {
            return Arc::clone(existing);
        }
        let maps = Arc::new(parsed);
        *guard = Some(Arc::clone(&maps));
        maps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_spot_meta() -> Value {
        json!({
            "tokens": [
                {"index": 0, "name": "USDC"},
                {"index": 1, "name": "PURR"},
                {"index": 2, "name": "HYPE"}
            ],
            "universe": [
                {"index": 0, "tokens": [1, 0], "name": "PURR/USDC"},
                {"index": 107, "tokens": [2, 0]},
                {"index": 200, "tokens": [99, 98]}
            ]
        })
    }

    #[test]
    fn test_parse_builds_bidirectional_token_map() {
        let maps = SpotMaps::parse(&sample_spot_meta()).unwrap();
        assert_eq!(maps.token_name(2), Some("HYPE"));
        assert_eq!(maps.token_index("PURR"), Some(1));
        assert_eq!(maps.token_count(), 3);
    }

    #[test]
    fn test_parse_prefers_explicit_slash_name() {
        let maps = SpotMaps::parse(&sample_spot_meta()).unwrap();
        let pair = maps.pair(0).unwrap();
        assert_eq!(pair.name, "PURR/USDC");
        assert_eq!(pair.base, "PURR");
        assert_eq!(pair.quote, "USDC");
    }

    #[test]
    fn test_parse_synthesizes_name_from_token_indices() {
        let maps = SpotMaps::parse(&sample_spot_meta()).unwrap();
        let pair = maps.pair(107).unwrap();
        assert_eq!(pair.name, "HYPE/USDC");
    }

    #[test]
    fn test_unresolvable_pair_is_dropped_not_partial() {
        let maps = SpotMaps::parse(&sample_spot_meta()).unwrap();
        assert!(maps.pair(200).is_none());
        assert_eq!(maps.pair_count(), 2);
    }

    #[test]
    fn test_pair_with_named_fields_fallback() {
        let value = json!({
            "tokens": [],
            "universe": [
                {"index": 5, "base": "ABC", "quote": "USDC"}
            ]
        });
        let maps = SpotMaps::parse(&value).unwrap();
        let pair = maps.pair(5).unwrap();
        assert_eq!(pair.name, "ABC/USDC");
    }

    #[tokio::test]
    async fn test_ensure_loaded_is_idempotent_after_install() {
        // Unroutable endpoint: any network call would fail, so a second
        // ensure_loaded succeeding proves it served from cache.
        let client = Arc::new(InfoClient::new("http://127.0.0.1:1").unwrap());
        let resolver = SpotMetadataResolver::new(client);

        let parsed = SpotMaps::parse(&sample_spot_meta()).unwrap();
        resolver.install(parsed);

        let maps = resolver.ensure_loaded().await.unwrap();
        assert_eq!(maps.pair_count(), 2);
        let again = resolver.ensure_loaded().await.unwrap();
        assert!(Arc::ptr_eq(&maps, &again));
    }
}
