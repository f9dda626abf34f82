//! Common AWS type definitions shared across crates.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// AWS Account ID (12-digit string).
///
/// Used as the expected bucket owner on every lifecycle and tagging call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId(String);

impl AccountId {
    /// Length of every AWS account ID.
    pub const LEN: usize = 12;

    /// Create a new account ID from a string.
    ///
    /// # Errors
    /// Returns an error if the account ID is not a 12-digit numeric string.
    pub fn new(id: impl Into<String>) -> Result<Self, crate::RustStackError> {
        let id = id.into();
        if id.len() != Self::LEN || !id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(crate::RustStackError::InvalidAccountId(id));
        }
        Ok(Self(id))
    }

    /// Parse an optional account ID where the empty string means "absent".
    ///
    /// # Errors
    /// Returns an error if a non-empty value is not a valid account ID.
    pub fn parse_optional(id: &str) -> Result<Option<Self>, crate::RustStackError> {
        if id.is_empty() {
            Ok(None)
        } else {
            Self::new(id).map(Some)
        }
    }

    /// Get the account ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for AccountId {
    type Err = crate::RustStackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for AccountId {
    type Error = crate::RustStackError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AccountId> for String {
    fn from(value: AccountId) -> Self {
        value.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// AWS Region identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AwsRegion(String);

impl AwsRegion {
    /// Region used when nothing else is configured.
    pub const DEFAULT: &str = "us-east-1";

    /// Create a new region.
    #[must_use]
    pub fn new(region: impl Into<String>) -> Self {
        Self(region.into())
    }

    /// Get the region as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for AwsRegion {
    fn default() -> Self {
        Self(Self::DEFAULT.to_owned())
    }
}

impl fmt::Display for AwsRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
