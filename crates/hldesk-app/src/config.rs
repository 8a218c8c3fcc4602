//! Application configuration.
//!
//! Venues are declared in a TOML file. Secrets never live in the file:
//! private keys and provider API keys are named by environment variable
//! and read at venue construction time.

use std::collections::HashMap;
use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use hldesk_executor::{FeeSchedule, SigningMode, VenueOptions};

/// How a configured venue is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VenueKind {
    /// Hyperliquid-protocol venue signed with a local key.
    #[default]
    Hyperliquid,
    /// Hyperliquid-protocol venue behind a delegated-signing provider.
    Delegated,
    /// Non-Hyperliquid adapter venue; handles its own orders.
    Generic,
}

/// One venue entry in the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueConfig {
    pub name: String,
    /// REST API root; the WS URL is derived from it unless overridden.
    pub api_url: String,
    #[serde(default)]
    pub kind: VenueKind,
    #[serde(default)]
    pub ws_url: Option<String>,
    /// Account whose streams are watched.
    #[serde(default)]
    pub wallet_address: Option<String>,
    /// Sub-account orders act on.
    #[serde(default)]
    pub vault_address: Option<String>,
    /// Environment variable holding the trading private key.
    #[serde(default)]
    pub private_key_env: Option<String>,
    /// Delegated providers: signing endpoint root and API-key variable.
    #[serde(default)]
    pub signing_url: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub builder_address: Option<String>,
    /// Fee strings: one or two integers ("20", "20 25", "20,25").
    #[serde(default)]
    pub dex_fees: HashMap<String, String>,
    #[serde(default)]
    pub dex_fee_default: Option<String>,
    #[serde(default)]
    pub main_fee: Option<String>,
    /// Legacy single fee value.
    #[serde(default)]
    pub fee: Option<String>,
    #[serde(default = "default_slippage")]
    pub slippage: Decimal,
    #[serde(default)]
    pub frontend_market: bool,
    #[serde(default)]
    pub force_ioc: bool,
    #[serde(default = "default_true")]
    pub mainnet: bool,
    /// Builder DEX names in the venue's perp-DEX array order.
    #[serde(default)]
    pub dex_names: Vec<String>,
}

fn default_slippage() -> Decimal {
    Decimal::new(5, 2)
}

fn default_true() -> bool {
    true
}

impl VenueConfig {
    /// Resolve into the executor's per-venue options.
    pub fn to_options(&self) -> AppResult<VenueOptions> {
        let vault_address = match &self.vault_address {
            Some(raw) => Some(raw.parse().map_err(|_| {
                AppError::Config(format!("invalid vault address for venue {}", self.name))
            })?),
            None => None,
        };

        let mut options = VenueOptions::new(&self.name, &self.api_url);
        options.wallet_address = self.wallet_address.clone();
        options.vault_address = vault_address;
        options.builder_address = self.builder_address.clone();
        options.fees = FeeSchedule {
            per_dex: self
                .dex_fees
                .iter()
                .map(|(k, v)| (k.to_lowercase(), v.clone()))
                .collect(),
            dex_common: self.dex_fee_default.clone(),
            main: self.main_fee.clone(),
            legacy: self.fee.clone(),
        };
        options.slippage = self.slippage;
        options.frontend_market = self.frontend_market;
        options.force_ioc = self.force_ioc;
        options.is_mainnet = self.mainnet;
        options.dex_names = self.dex_names.iter().map(|d| d.to_lowercase()).collect();
        options.signing_mode = match self.kind {
            VenueKind::Delegated => SigningMode::Delegated,
            _ => SigningMode::Local,
        };
        Ok(options)
    }

    /// WS endpoint: explicit override or derived from the API root.
    pub fn ws_endpoint(&self) -> String {
        self.ws_url
            .clone()
            .unwrap_or_else(|| hldesk_ws::http_to_wss(&self.api_url))
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub venues: Vec<VenueConfig>,
}

impl AppConfig {
    /// Load from `HLDESK_CONFIG` or the default path, falling back to an
    /// empty configuration when the file is absent.
    pub fn load() -> AppResult<Self> {
        let config_path =
            std::env::var("HLDESK_CONFIG").unwrap_or_else(|_| "config/default.toml".to_string());

        if Path::new(&config_path).exists() {
            Self::from_file(&config_path)
        } else {
            tracing::warn!(path = %config_path, "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    pub fn venue(&self, name: &str) -> Option<&VenueConfig> {
        self.venues.iter().find(|v| v.name == name)
    }
}
