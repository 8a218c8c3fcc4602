//! Order construction, signing and dispatch for Hyperliquid-protocol
//! venues.
//!
//! # Key components
//!
//! - [`OrderBuilder`]: the unified order pipeline (resolve, price, round,
//!   leverage, fee, sign, post) and cache-backed `close_position`
//! - [`Signer`] / [`KeyManager`]: EIP-712 phantom-agent signing over a
//!   msgpack action hash
//! - [`DelegatedSigningClient`]: provider-side signing for venues that
//!   hold the key remotely
//! - [`ExchangeClient`]: `/exchange` POST with WAF-vs-API error
//!   discrimination
//! - [`NonceManager`]: monotonic millisecond nonces
//! - [`LeverageApplicationState`]: once-per-session leverage push
//! - [`GenericVenue`]: capability trait for non-Hyperliquid adapters

pub mod delegated;
pub mod dispatch;
pub mod error;
pub mod fees;
pub mod leverage;
pub mod nonce;
pub mod router;
pub mod signer;
pub mod venue;

pub use delegated::DelegatedSigningClient;
pub use dispatch::{exchange_payload, extract_order_id, find_key_deep, ExchangeClient};
pub use error::{ExecutorError, ExecutorResult};
pub use fees::{parse_fee_pair, select_fee, FeePair, FeeSchedule};
pub use leverage::LeverageApplicationState;
pub use nonce::{Clock, NonceManager, SystemClock};
pub use router::{OrderBuilder, SigningBackend, StreamDirectory};
pub use signer::{
    action_hash, BuilderInfo, KeyError, KeyManager, KeySource, OrderAction, OrderTypeWire,
    OrderWire, PhantomAgent, SignatureWire, Signer, SignerError, UpdateLeverageAction,
};
pub use venue::{GenericVenue, SigningMode, VenueOptions};
