//! Error types for order construction and dispatch.

use thiserror::Error;

/// Result alias for executor operations.
pub type ExecutorResult<T> = Result<T, ExecutorError>;

/// Errors raised by the order pipeline.
///
/// Resolution and signing faults are fatal to the single call that hit
/// them. Leverage-provisioning faults never surface here; they are logged
/// and swallowed so a leverage outage cannot block order flow.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// No universe entry matched the symbol on any configured venue.
    #[error("cannot resolve asset index for symbol: {0}")]
    UnresolvedSymbol(String),

    /// Limit orders carry their price; there is no venue-side default.
    #[error("limit order for {0} requires a price")]
    MissingLimitPrice(String),

    #[error("no market stream available for scope: {0}")]
    NoStream(String),

    #[error("signing failed: {0}")]
    Signing(#[from] crate::signer::SignerError),

    #[error("key error: {0}")]
    Key(#[from] crate::signer::KeyError),

    /// HTML response from the exchange edge, typically an IP allow-list
    /// rejection in front of the API rather than an API error.
    #[error("request blocked by WAF/IP allowlist (HTTP {status}): {preview}")]
    Blocked { status: u16, preview: String },

    #[error("exchange API error (HTTP {status}): {preview}")]
    Api { status: u16, preview: String },

    #[error("delegated signing provider error: {0}")]
    Provider(String),

    #[error("metadata error: {0}")]
    Registry(#[from] hldesk_registry::RegistryError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
