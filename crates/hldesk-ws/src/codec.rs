//! Stateless wire helpers.
//!
//! URL scheme rewriting and the classification of `allMids` keys into
//! their three mutually exclusive shapes.

/// Rewrite an HTTP base URL into the venue's WebSocket endpoint.
///
/// `https://` becomes `wss://`, `http://` becomes `ws://`, and a bare
/// host gets `/ws` appended. URLs already ending in `/ws` are untouched.
pub fn http_to_wss(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    let rewritten = if let Some(rest) = trimmed.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = trimmed.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        trimmed.to_string()
    };
    if rewritten.ends_with("/ws") {
        rewritten
    } else {
        format!("{rewritten}/ws")
    }
}

/// One decoded `allMids` map key.
///
/// Every key falls into exactly one of these shapes; anything that fits
/// none of them is skipped by the dispatcher, not errored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MidKey {
    /// `@<pairIndex>` synthetic spot-pair key.
    PairIndex(u32),
    /// Textual `BASE/QUOTE` pair.
    PairName { base: String, quote: String },
    /// Plain perp/asset symbol.
    Symbol(String),
}

/// Classify a raw `allMids` key.
pub fn classify_mid_key(key: &str) -> Option<MidKey> {
    if key.is_empty() {
        return None;
    }
    if let Some(index_str) = key.strip_prefix('@') {
        return index_str.parse::<u32>().ok().map(MidKey::PairIndex);
    }
    if let Some((base, quote)) = key.split_once('/') {
        if base.is_empty() || quote.is_empty() {
            return None;
        }
        return Some(MidKey::PairName {
            base: base.to_string(),
            quote: quote.to_string(),
        });
    }
    Some(MidKey::Symbol(key.to_string()))
}
