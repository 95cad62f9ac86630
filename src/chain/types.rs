use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Error raised when a string is not a `0x`-prefixed hex identifier
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HexIdError {
    #[error("missing 0x prefix")]
    MissingPrefix,

    #[error("expected {expected} hex digits, got {actual}")]
    BadLength { expected: usize, actual: usize },

    #[error("invalid hex digit")]
    BadDigit,
}

fn parse_prefixed_hex<const N: usize>(s: &str) -> Result<[u8; N], HexIdError> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .ok_or(HexIdError::MissingPrefix)?;

    if digits.len() != N * 2 {
        return Err(HexIdError::BadLength {
            expected: N * 2,
            actual: digits.len(),
        });
    }

    let mut bytes = [0u8; N];
    hex::decode_to_slice(digits, &mut bytes).map_err(|_| HexIdError::BadDigit)?;
    Ok(bytes)
}

/// A 20-byte account or contract address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 20]);

impl Address {
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Address(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl FromStr for Address {
    type Err = HexIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_prefixed_hex::<20>(s.trim()).map(Address)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Handle of a broadcast transaction (its 32-byte hash).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxHandle([u8; 32]);

impl TxHandle {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        TxHandle(bytes)
    }

    /// Link to the transaction on a block explorer rooted at `explorer_base`.
    pub fn explorer_url(&self, explorer_base: &str) -> String {
        format!("{}/tx/{}", explorer_base.trim_end_matches('/'), self)
    }
}

impl FromStr for TxHandle {
    type Err = HexIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_prefixed_hex::<32>(s.trim()).map(TxHandle)
    }
}

impl fmt::Display for TxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for TxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHandle({})", self)
    }
}

impl Serialize for TxHandle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TxHandle {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Amounts travel as decimal strings; JSON numbers cannot hold a full u128.
pub mod amount_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(amount: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(amount)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.trim().parse().map_err(serde::de::Error::custom)
    }
}

/// One positional argument of a contract call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum CallArg {
    Address(Address),
    Uint(#[serde(with = "amount_string")] u128),
    Text(String),
}

/// A state-changing contract call, ready to be signed by the wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxRequest {
    pub from: Address,
    pub method: String,
    pub args: Vec<CallArg>,
    #[serde(with = "amount_string")]
    pub value: u128,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptStatus {
    Success,
    Reverted,
}

/// Outcome of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub tx: TxHandle,
    pub block_number: u64,
    pub status: ReceiptStatus,
    #[serde(default)]
    pub revert_reason: Option<String>,
    #[serde(default = "Utc::now")]
    pub confirmed_at: DateTime<Utc>,
}

impl Receipt {
    pub fn succeeded(&self) -> bool {
        self.status == ReceiptStatus::Success
    }
}

/// The DAO's current stored ("box") value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainValue {
    pub raw: u128,
    pub display_unit: String,
}

impl fmt::Display for ChainValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.raw, self.display_unit)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub owner: Address,
    pub amount: u128,
}

/// What the wallet hands back on connect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub account: Address,
    pub chain_id: u64,
}
