//! L1 action signing for Hyperliquid-protocol venues.
//!
//! Two-stage process matching the venue's reference SDK:
//! 1. `action_hash` = keccak256(msgpack(action) + nonce + vault tag)
//! 2. EIP-712 signature over a phantom `Agent{source, connectionId}`
//!
//! Msgpack and JSON field order both matter: the venue hashes the action
//! exactly as serialized, so every wire struct here keeps its fields in
//! the SDK's order and omits absent optionals instead of encoding nil.

use std::path::PathBuf;
use std::sync::Arc;

use alloy::primitives::{keccak256, Address, PrimitiveSignature, B256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer as AlloySigner;
use alloy::sol;
use alloy::sol_types::eip712_domain;
use alloy::sol_types::SolStruct;
use serde::Serialize;
use thiserror::Error;
use zeroize::Zeroizing;

use hldesk_core::TimeInForce;

/// Source of a venue's trading private key.
///
/// Config files name the source; the key material itself never appears in
/// configuration.
#[derive(Debug, Clone)]
pub enum KeySource {
    EnvVar { var_name: String },
    File { path: PathBuf },
}

/// Holds one venue's trading key.
///
/// Never log key material or derived signatures.
pub struct KeyManager {
    signer: PrivateKeySigner,
    address: Address,
}

impl KeyManager {
    /// Load the key and verify the derived address when one is expected.
    pub fn load(source: KeySource, expected: Option<Address>) -> Result<Self, KeyError> {
        let hex_str: Zeroizing<String> = match source {
            KeySource::EnvVar { ref var_name } => Zeroizing::new(
                std::env::var(var_name).map_err(|_| KeyError::EnvVarNotFound(var_name.clone()))?,
            ),
            KeySource::File { ref path } => Zeroizing::new(std::fs::read_to_string(path)?),
        };
        Self::from_hex(&hex_str, expected)
    }

    /// Build from a hex-encoded key, with or without the 0x prefix.
    pub fn from_hex(hex_str: &str, expected: Option<Address>) -> Result<Self, KeyError> {
        let trimmed = hex_str.trim().trim_start_matches("0x");
        let secret: Zeroizing<Vec<u8>> = Zeroizing::new(hex::decode(trimmed)?);
        let signer = PrivateKeySigner::from_slice(&secret)
            .map_err(|e| KeyError::InvalidKey(e.to_string()))?;

        if let Some(expected) = expected {
            if signer.address() != expected {
                return Err(KeyError::AddressMismatch {
                    expected,
                    actual: signer.address(),
                });
            }
        }

        Ok(Self {
            address: signer.address(),
            signer,
        })
    }

    pub fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }

    pub fn address(&self) -> Address {
        self.address
    }
}

/// Key loading errors.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("failed to decode hex: {0}")]
    HexDecode(#[from] hex::FromHexError),

    #[error("invalid private key: {0}")]
    InvalidKey(String),

    #[error("address mismatch: expected {expected}, got {actual}")]
    AddressMismatch { expected: Address, actual: Address },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

/// Order submission action.
///
/// Field order is the SDK's: type, orders, grouping, builder. Absent
/// builder info is omitted, not nil.
#[derive(Debug, Clone, Serialize)]
pub struct OrderAction {
    #[serde(rename = "type")]
    pub action_type: String,
    pub orders: Vec<OrderWire>,
    /// "na" for independent orders.
    pub grouping: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub builder: Option<BuilderInfo>,
}

impl OrderAction {
    pub fn single(order: OrderWire, builder: Option<BuilderInfo>) -> Self {
        Self {
            action_type: "order".to_string(),
            orders: vec![order],
            grouping: "na".to_string(),
            builder,
        }
    }
}

/// Leverage update action.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateLeverageAction {
    #[serde(rename = "type")]
    pub action_type: String,
    pub asset: u32,
    #[serde(rename = "isCross")]
    pub is_cross: bool,
    pub leverage: u32,
}

impl UpdateLeverageAction {
    pub fn new(asset: u32, is_cross: bool, leverage: u32) -> Self {
        Self {
            action_type: "updateLeverage".to_string(),
            asset,
            is_cross,
            leverage,
        }
    }
}

/// Builder fee attribution: builder address and fee in tenths of a basis
/// point.
#[derive(Debug, Clone, Serialize)]
pub struct BuilderInfo {
    #[serde(rename = "b")]
    pub address: String,
    #[serde(rename = "f")]
    pub fee: u64,
}

/// One order in the venue's compact wire form.
#[derive(Debug, Clone, Serialize)]
pub struct OrderWire {
    /// Asset id.
    #[serde(rename = "a")]
    pub asset: u32,

    /// Buy (true) or sell (false).
    #[serde(rename = "b")]
    pub is_buy: bool,

    /// Limit price, already precision-formatted.
    #[serde(rename = "p")]
    pub limit_px: String,

    /// Size, already precision-formatted.
    #[serde(rename = "s")]
    pub sz: String,

    #[serde(rename = "r")]
    pub reduce_only: bool,

    #[serde(rename = "t")]
    pub order_type: OrderTypeWire,

    /// Client order id.
    #[serde(rename = "c", skip_serializing_if = "Option::is_none")]
    pub cloid: Option<String>,
}

/// Order type wire form: `{"limit": {"tif": "Gtc"|"Ioc"|...}}`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum OrderTypeWire {
    Limit { limit: LimitOrderType },
}

impl OrderTypeWire {
    pub fn limit(tif: TimeInForce) -> Self {
        Self::Limit {
            limit: LimitOrderType {
                tif: tif.wire_name().to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LimitOrderType {
    pub tif: String,
}

/// Signature in the venue's JSON form.
#[derive(Debug, Clone, Serialize)]
pub struct SignatureWire {
    pub r: String,
    pub s: String,
    pub v: u64,
}

impl From<&PrimitiveSignature> for SignatureWire {
    fn from(sig: &PrimitiveSignature) -> Self {
        Self {
            r: format!("0x{}", hex::encode(sig.r().to_be_bytes::<32>())),
            s: format!("0x{}", hex::encode(sig.s().to_be_bytes::<32>())),
            v: if sig.v() { 28 } else { 27 },
        }
    }
}

// ---------------------------------------------------------------------------
// action_hash and phantom agent
// ---------------------------------------------------------------------------

/// keccak256 over msgpack(action) + nonce (8 bytes BE) + vault tag.
///
/// Vault tag: 0x00 when absent, 0x01 + 20 address bytes when present.
/// An expiry, when set, appends 0x00 + 8 bytes BE; when unset nothing is
/// appended at all.
pub fn action_hash<A: Serialize>(
    action: &A,
    nonce: u64,
    vault_address: Option<Address>,
    expires_after: Option<u64>,
) -> Result<B256, SignerError> {
    let mut data = rmp_serde::to_vec_named(action)
        .map_err(|e| SignerError::SerializationFailed(e.to_string()))?;
    data.extend_from_slice(&nonce.to_be_bytes());

    match vault_address {
        None => data.push(0x00),
        Some(addr) => {
            data.push(0x01);
            data.extend_from_slice(addr.as_slice());
        }
    }

    if let Some(expires) = expires_after {
        data.push(0x00);
        data.extend_from_slice(&expires.to_be_bytes());
    }

    Ok(keccak256(&data))
}

pub const EIP712_DOMAIN_NAME: &str = "Exchange";
pub const EIP712_DOMAIN_VERSION: &str = "1";
pub const EIP712_CHAIN_ID: u64 = 1337;
pub const EIP712_VERIFYING_CONTRACT: Address = Address::ZERO;

sol! {
    #[derive(Debug)]
    struct Agent {
        string source;
        bytes32 connectionId;
    }
}

/// EIP-712 signing target carrying the action hash.
#[derive(Debug, Clone)]
pub struct PhantomAgent {
    /// "a" on mainnet, "b" on testnet.
    pub source: String,
    pub connection_id: B256,
}

impl PhantomAgent {
    pub fn new(action_hash: B256, is_mainnet: bool) -> Self {
        Self {
            source: if is_mainnet { "a" } else { "b" }.to_string(),
            connection_id: action_hash,
        }
    }

    pub async fn sign<S: AlloySigner + Send + Sync>(
        &self,
        signer: &S,
    ) -> Result<PrimitiveSignature, alloy::signers::Error> {
        let domain = eip712_domain! {
            name: EIP712_DOMAIN_NAME,
            version: EIP712_DOMAIN_VERSION,
            chain_id: EIP712_CHAIN_ID,
            verifying_contract: EIP712_VERIFYING_CONTRACT,
        };

        let agent = Agent {
            source: self.source.clone(),
            connectionId: self.connection_id,
        };

        let signing_hash = agent.eip712_signing_hash(&domain);
        signer.sign_hash(&signing_hash).await
    }
}

/// Signing errors.
#[derive(Debug, Error)]
pub enum SignerError {
    #[error("signing failed: {0}")]
    SigningFailed(#[from] alloy::signers::Error),

    #[error("action serialization failed: {0}")]
    SerializationFailed(String),
}

/// Local signer bound to one venue's key.
pub struct Signer {
    keys: Arc<KeyManager>,
    is_mainnet: bool,
}

impl Signer {
    pub fn new(keys: Arc<KeyManager>, is_mainnet: bool) -> Self {
        Self { keys, is_mainnet }
    }

    /// Sign an action for submission.
    pub async fn sign_action<A: Serialize>(
        &self,
        action: &A,
        nonce: u64,
        vault_address: Option<Address>,
        expires_after: Option<u64>,
    ) -> Result<SignatureWire, SignerError> {
        let hash = action_hash(action, nonce, vault_address, expires_after)?;
        let agent = PhantomAgent::new(hash, self.is_mainnet);
        let signature = agent.sign(self.keys.signer()).await?;
        Ok(SignatureWire::from(&signature))
    }

    pub fn address(&self) -> Address {
        self.keys.address()
    }

    pub fn is_mainnet(&self) -> bool {
        self.is_mainnet
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Well-known development key, never funded.
    const TEST_PRIVATE_KEY: &str =
        "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn test_keys() -> Arc<KeyManager> {
        Arc::new(KeyManager::from_hex(TEST_PRIVATE_KEY, None).unwrap())
    }

    fn sample_order_action() -> OrderAction {
        OrderAction::single(
            OrderWire {
                asset: 110027,
                is_buy: true,
                limit_px: "105.00".to_string(),
                sz: "0.2".to_string(),
                reduce_only: false,
                order_type: OrderTypeWire::limit(TimeInForce::Ioc),
                cloid: Some("0x0de3e244a8f44fc28a6b7bc852d66d19".to_string()),
            },
            None,
        )
    }

    #[test]
    fn test_key_manager_from_hex() {
        let keys = test_keys();
        assert_ne!(keys.address(), Address::ZERO);
    }

    #[test]
    fn test_key_manager_address_mismatch() {
        let result = KeyManager::from_hex(TEST_PRIVATE_KEY, Some(Address::ZERO));
        assert!(matches!(result, Err(KeyError::AddressMismatch { .. })));
    }

    #[test]
    fn test_order_type_wire_serialization() {
        let ioc = OrderTypeWire::limit(TimeInForce::Ioc);
        assert_eq!(
            serde_json::to_string(&ioc).unwrap(),
            r#"{"limit":{"tif":"Ioc"}}"#
        );

        let gtc = OrderTypeWire::limit(TimeInForce::Gtc);
        assert_eq!(
            serde_json::to_string(&gtc).unwrap(),
            r#"{"limit":{"tif":"Gtc"}}"#
        );
    }

    #[test]
    fn test_order_action_skips_absent_builder() {
        let json = serde_json::to_string(&sample_order_action()).unwrap();
        assert!(!json.contains("builder"));
        assert!(json.starts_with(r#"{"type":"order""#));
    }

    #[test]
    fn test_order_action_carries_builder() {
        let mut action = sample_order_action();
        action.builder = Some(BuilderInfo {
            address: "0x1122334455667788990011223344556677889900".to_string(),
            fee: 25,
        });
        let json = serde_json::to_string(&action).unwrap();
        assert!(json.contains(r#""builder":{"b":"0x1122334455667788990011223344556677889900","f":25}"#));
    }

    /// Msgpack bytes must match the reference SDK exactly; any field
    /// reordering changes the action hash and invalidates the signature.
    #[test]
    fn test_msgpack_matches_reference_sdk() {
        let action = sample_order_action();
        let bytes = rmp_serde::to_vec_named(&action).unwrap();

        let expected = "83a474797065a56f72646572a66f72646572739187a161ce0001adcba162c3a170a63130352e3030a173a3302e32a172c2a17481a56c696d697481a3746966a3496f63a163d92230783064653365323434613866343466633238613662376263383532643636643139a867726f7570696e67a26e61";
        assert_eq!(hex::encode(&bytes), expected);

        let nonce: u64 = 1769339470576;
        let hash = action_hash(&action, nonce, None, None).unwrap();
        assert_eq!(
            hex::encode(hash.as_slice()),
            "904c57b8f4b75ac9da005b49298dc39af735ed8c3a89b241f5f1e061e0207868"
        );
    }

    #[test]
    fn test_update_leverage_wire_shape() {
        let action = UpdateLeverageAction::new(120003, true, 10);
        let json = serde_json::to_string(&action).unwrap();
        assert_eq!(
            json,
            r#"{"type":"updateLeverage","asset":120003,"isCross":true,"leverage":10}"#
        );
    }

    #[test]
    fn test_action_hash_vault_changes_hash() {
        let action = sample_order_action();
        let plain = action_hash(&action, 1000, None, None).unwrap();
        let vaulted = action_hash(&action, 1000, Some(Address::repeat_byte(0x42)), None).unwrap();
        assert_ne!(plain, vaulted);
    }

    #[test]
    fn test_action_hash_expiry_changes_hash() {
        let action = sample_order_action();
        let plain = action_hash(&action, 1000, None, None).unwrap();
        let expiring = action_hash(&action, 1000, None, Some(1_700_000_000)).unwrap();
        assert_ne!(plain, expiring);
    }

    #[test]
    fn test_phantom_agent_source() {
        let hash = B256::repeat_byte(0xab);
        assert_eq!(PhantomAgent::new(hash, true).source, "a");
        assert_eq!(PhantomAgent::new(hash, false).source, "b");
    }

    /// Deterministic RFC 6979 signature over a fixed action hash, pinned
    /// against the reference SDK's output for the same key.
    #[tokio::test]
    async fn test_signature_matches_reference_sdk() {
        let keys = test_keys();
        let action_hash = B256::from_slice(
            &hex::decode("f01fa6eaca0b8cbd2afe65f8852a2e00d35eae3d19560ece9b8a28614646e849")
                .unwrap(),
        );

        let agent = PhantomAgent::new(action_hash, false);
        let signature = agent.sign(keys.signer()).await.unwrap();
        let wire = SignatureWire::from(&signature);

        assert_eq!(
            wire.r,
            "0xa9e728f2faea4febc0b6eb9c3dbbac04b375eb3869f051030d205318425faebc"
        );
        assert_eq!(
            wire.s,
            "0x7b21be7030bb979352b71494708b99d789266f0d0e1242a21e74905b683e4698"
        );
        assert_eq!(wire.v, 27);
    }

    #[tokio::test]
    async fn test_signer_sign_action() {
        let signer = Signer::new(test_keys(), true);
        let wire = signer
            .sign_action(&sample_order_action(), 1234567890, None, None)
            .await
            .unwrap();

        assert!(wire.r.starts_with("0x"));
        assert!(wire.s.starts_with("0x"));
        assert!(wire.v == 27 || wire.v == 28);
    }
}
