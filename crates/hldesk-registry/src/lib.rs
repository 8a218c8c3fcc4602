//! REST metadata resolvers for the trading desk.
//!
//! Two lazily-populated tables back the rest of the system:
//! - spot token/pair maps (`spotMeta`), consumed by the market stream to
//!   name index-keyed spot quotes
//! - per-symbol asset entries (`perpDexs` + `meta`), consumed by the
//!   order router

pub mod assets;
pub mod client;
pub mod error;
pub mod spot;

pub use assets::AssetIndexResolver;
pub use client::InfoClient;
pub use error::{RegistryError, RegistryResult};
pub use spot::{SpotMaps, SpotMetadataResolver, SpotPair};
