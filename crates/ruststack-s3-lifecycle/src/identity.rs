//! Resource identity codec.
//!
//! A lifecycle configuration is addressed by its bucket and, optionally, the
//! account expected to own that bucket. The pair is persisted as one opaque
//! string:
//!
//! ```text
//! my-bucket                  (no expected owner)
//! my-bucket,111122223333     (with expected owner)
//! ```
//!
//! This format is stored in state files and must never change.

use std::fmt;
use std::str::FromStr;

use ruststack_core::AccountId;
use serde::{Deserialize, Serialize};

use crate::error::LifecycleError;

/// Reserved separator between bucket and expected owner.
pub const RESOURCE_ID_SEPARATOR: char = ',';

/// Composite identity of a bucket lifecycle configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceId {
    bucket: String,
    expected_bucket_owner: Option<AccountId>,
}

impl ResourceId {
    /// Create an identity from its parts.
    #[must_use]
    pub fn new(bucket: impl Into<String>, expected_bucket_owner: Option<AccountId>) -> Self {
        Self {
            bucket: bucket.into(),
            expected_bucket_owner,
        }
    }

    /// The bucket name.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// The expected bucket owner, if any.
    #[must_use]
    pub fn expected_bucket_owner(&self) -> Option<&AccountId> {
        self.expected_bucket_owner.as_ref()
    }

    /// The expected bucket owner, or `""` when absent.
    #[must_use]
    pub fn owner_str(&self) -> &str {
        self.expected_bucket_owner
            .as_ref()
            .map_or("", AccountId::as_str)
    }

    /// Serialize to the persisted string form.
    #[must_use]
    pub fn encode(&self) -> String {
        match &self.expected_bucket_owner {
            Some(owner) => format!("{}{RESOURCE_ID_SEPARATOR}{owner}", self.bucket),
            None => self.bucket.clone(),
        }
    }

    /// Parse the persisted string form.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Format`] when the id is empty, has an empty
    /// part, has more than one separator, or carries an owner that is not a
    /// 12-digit account id.
    pub fn decode(id: &str) -> Result<Self, LifecycleError> {
        let format_err = || LifecycleError::Format { id: id.to_owned() };

        let mut parts = id.split(RESOURCE_ID_SEPARATOR);
        let bucket = parts.next().filter(|b| !b.is_empty()).ok_or_else(format_err)?;

        match (parts.next(), parts.next()) {
            (None, _) => Ok(Self::new(bucket, None)),
            (Some(owner), None) if !owner.is_empty() => {
                let owner = AccountId::new(owner).map_err(|_| format_err())?;
                Ok(Self::new(bucket, Some(owner)))
            }
            _ => Err(format_err()),
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for ResourceId {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl TryFrom<String> for ResourceId {
    type Error = LifecycleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::decode(&value)
    }
}

impl From<ResourceId> for String {
    fn from(value: ResourceId) -> Self {
        value.encode()
    }
}

/// Encode a `(bucket, owner)` pair where an empty owner means "absent".
///
/// # Errors
///
/// Returns an error if `owner` is non-empty and not a valid account id.
pub fn encode_resource_id(bucket: &str, owner: &str) -> Result<String, LifecycleError> {
    let owner = AccountId::parse_optional(owner)?;
    Ok(ResourceId::new(bucket, owner).encode())
}

/// Decode an id into `(bucket, owner)`, with `""` for an absent owner.
///
/// # Errors
///
/// Returns [`LifecycleError::Format`] on malformed input.
pub fn decode_resource_id(id: &str) -> Result<(String, String), LifecycleError> {
    let decoded = ResourceId::decode(id)?;
    let owner = decoded.owner_str().to_owned();
    Ok((decoded.bucket, owner))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_encode_without_owner() {
        let id = ResourceId::new("my-bucket", None);
        assert_eq!(id.encode(), "my-bucket");
        assert_eq!(id.owner_str(), "");
    }

    #[test]
    fn test_should_encode_with_owner() {
        let owner = AccountId::new("111122223333").unwrap();
        let id = ResourceId::new("my-bucket", Some(owner));
        assert_eq!(id.encode(), "my-bucket,111122223333");
        assert_eq!(id.to_string(), id.encode());
    }

    #[test]
    fn test_should_round_trip_both_shapes() {
        for (bucket, owner) in [("my-bucket", ""), ("my-bucket", "111122223333"), ("a.b.c", "000000000000")] {
            let id = encode_resource_id(bucket, owner).unwrap();
            let (b, o) = decode_resource_id(&id).unwrap();
            assert_eq!((b.as_str(), o.as_str()), (bucket, owner));
        }
    }

    #[test]
    fn test_should_reject_malformed_ids() {
        for bad in ["", ",", "my-bucket,", ",111122223333", "a,111122223333,b", "my-bucket,owner"] {
            let err = ResourceId::decode(bad).unwrap_err();
            assert!(matches!(err, LifecycleError::Format { .. }), "expected format error for {bad:?}");
        }
    }

    #[test]
    fn test_should_reject_invalid_owner_on_encode() {
        assert!(encode_resource_id("my-bucket", "123").is_err());
    }

    #[test]
    fn test_should_serialize_as_plain_string() {
        let id: ResourceId = "my-bucket,111122223333".parse().unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"my-bucket,111122223333\"");
        let back: ResourceId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<ResourceId>("\"a,b,c\"").is_err());
    }
}
