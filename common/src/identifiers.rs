//! Identifier types for Synthex entities.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::CommonError;

/// Unique identifier for a settlement queue entry.
/// Uses UUID v7 so ids sort in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId(Uuid);

impl EntryId {
    /// Create a new entry ID.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Create from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parse from string.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Holder of synthetic-asset balances.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    /// Create a new account ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Create an account ID, rejecting malformed input.
    pub fn parse(id: impl Into<String>) -> Result<Self, CommonError> {
        let account = Self::new(id);
        if account.is_valid() {
            Ok(account)
        } else {
            Err(CommonError::InvalidAccountId(account.0))
        }
    }

    /// Get the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validate the account ID format.
    pub fn is_valid(&self) -> bool {
        // Addresses, handles and test names: alphanumeric plus a few separators
        !self.0.is_empty()
            && self.0.len() <= 64
            && self
                .0
                .chars()
                .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == ':')
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for AccountId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Key of a synthetic asset, e.g. `sUSD`, `sEUR` or the inverse `iBTC`.
///
/// Keys are case sensitive: the leading `s`/`i` marks long and inverse synths.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AssetKey(String);

impl AssetKey {
    /// Maximum key length (the on-ledger encoding is a 32 byte word).
    pub const MAX_LEN: usize = 32;

    /// Create a new asset key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Create an asset key, rejecting malformed input.
    pub fn parse(key: impl Into<String>) -> Result<Self, CommonError> {
        let key = Self::new(key);
        if key.0.is_empty()
            || key.0.len() > Self::MAX_LEN
            || !key.0.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(CommonError::InvalidAssetKey(key.0));
        }
        Ok(key)
    }

    /// Get the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the key follows the inverse-synth naming convention.
    pub fn is_inverse(&self) -> bool {
        self.0.starts_with('i')
    }

    /// Common assets
    pub fn susd() -> Self {
        Self::new("sUSD")
    }

    pub fn seur() -> Self {
        Self::new("sEUR")
    }

    pub fn sbtc() -> Self {
        Self::new("sBTC")
    }

    pub fn ibtc() -> Self {
        Self::new("iBTC")
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AssetKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
