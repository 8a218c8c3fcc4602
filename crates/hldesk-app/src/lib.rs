//! Multi-venue perpetuals trading desk core.
//!
//! Orchestrates the pieces:
//! - market/account streams per venue scope (`hldesk-ws`)
//! - REST metadata resolution (`hldesk-registry`)
//! - unified order construction, signing and dispatch (`hldesk-executor`)
//!
//! The [`ExchangeManager`] is the single entry point for embedding
//! applications: prices, positions, order execution and position close,
//! routed by configured exchange name.

pub mod config;
pub mod error;
pub mod manager;

pub use config::{AppConfig, VenueConfig, VenueKind};
pub use error::{AppError, AppResult};
pub use manager::{ExchangeManager, HlVenue, StreamRegistry, VenueHandle};
