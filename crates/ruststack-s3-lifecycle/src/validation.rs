//! Field-level constraint checks for lifecycle configuration.
//!
//! Bucket names are only length-checked: legacy `us-east-1` buckets predate
//! the DNS naming rules, and the service itself rejects names it does not
//! know. Everything else follows the limits documented for
//! `PutBucketLifecycleConfiguration` and the tagging APIs.

use crate::error::LifecycleError;
use crate::identity::RESOURCE_ID_SEPARATOR;

/// Maximum bucket name length.
pub const MAX_BUCKET_NAME_LEN: usize = 63;

/// Maximum lifecycle rule id length.
pub const MAX_RULE_ID_LEN: usize = 255;

/// Maximum number of tags on a bucket.
pub const MAX_BUCKET_TAGS: usize = 50;

/// Maximum number of tags on an object.
pub const MAX_OBJECT_TAGS: usize = 10;

/// Maximum length of a tag key in characters.
const MAX_TAG_KEY_LEN: usize = 128;

/// Maximum length of a tag value in characters.
const MAX_TAG_VALUE_LEN: usize = 256;

/// Validate the bucket a lifecycle configuration is attached to.
///
/// Rules:
/// - 1-63 characters long
/// - Must not contain the identity separator (`,`)
///
/// # Errors
///
/// Returns [`LifecycleError::InvalidConfig`] if any rule is violated.
///
/// # Examples
///
/// ```
/// use ruststack_s3_lifecycle::validation::validate_bucket;
///
/// assert!(validate_bucket("my-bucket").is_ok());
/// assert!(validate_bucket("").is_err());
/// ```
pub fn validate_bucket(bucket: &str) -> Result<(), LifecycleError> {
    let len = bucket.chars().count();
    if !(1..=MAX_BUCKET_NAME_LEN).contains(&len) {
        return Err(LifecycleError::InvalidConfig(format!(
            "bucket must be between 1 and {MAX_BUCKET_NAME_LEN} characters long, got {len}"
        )));
    }
    if bucket.contains(RESOURCE_ID_SEPARATOR) {
        return Err(LifecycleError::InvalidConfig(format!(
            "bucket must not contain '{RESOURCE_ID_SEPARATOR}'"
        )));
    }
    Ok(())
}

/// Validate a lifecycle rule id (1-255 characters).
///
/// # Errors
///
/// Returns [`LifecycleError::InvalidConfig`] if the id is empty or too long.
pub fn validate_rule_id(id: &str) -> Result<(), LifecycleError> {
    let len = id.chars().count();
    if !(1..=MAX_RULE_ID_LEN).contains(&len) {
        return Err(LifecycleError::InvalidConfig(format!(
            "rule id must be between 1 and {MAX_RULE_ID_LEN} characters long, got {len}"
        )));
    }
    Ok(())
}

/// Require an optional integer to be at least `min` when present.
///
/// # Errors
///
/// Returns [`LifecycleError::InvalidConfig`] naming `field` when violated.
pub fn validate_at_least<T>(field: &str, value: Option<T>, min: T) -> Result<(), LifecycleError>
where
    T: PartialOrd + std::fmt::Display + Copy,
{
    match value {
        Some(v) if v < min => Err(LifecycleError::InvalidConfig(format!(
            "{field} must be at least {min}, got {v}"
        ))),
        _ => Ok(()),
    }
}

/// Validate a tag key.
///
/// Rules:
/// - 1-128 characters in length
///
/// # Errors
///
/// Returns [`LifecycleError::InvalidConfig`] if the key is empty or too long.
///
/// # Examples
///
/// ```
/// use ruststack_s3_lifecycle::validation::validate_tag_key;
///
/// assert!(validate_tag_key("environment").is_ok());
/// assert!(validate_tag_key("").is_err());
/// ```
pub fn validate_tag_key(key: &str) -> Result<(), LifecycleError> {
    if key.is_empty() {
        return Err(LifecycleError::InvalidConfig(
            "tag key must not be empty".to_owned(),
        ));
    }
    let len = key.chars().count();
    if len > MAX_TAG_KEY_LEN {
        return Err(LifecycleError::InvalidConfig(format!(
            "tag key must not exceed {MAX_TAG_KEY_LEN} characters, got {len}"
        )));
    }
    Ok(())
}

/// Validate a tag value (0-256 characters; empty values are allowed).
///
/// # Errors
///
/// Returns [`LifecycleError::InvalidConfig`] if the value is too long.
pub fn validate_tag_value(value: &str) -> Result<(), LifecycleError> {
    let len = value.chars().count();
    if len > MAX_TAG_VALUE_LEN {
        return Err(LifecycleError::InvalidConfig(format!(
            "tag value must not exceed {MAX_TAG_VALUE_LEN} characters, got {len}"
        )));
    }
    Ok(())
}

/// Validate a set of tags against a per-resource maximum.
///
/// # Errors
///
/// Returns [`LifecycleError::InvalidConfig`] if any rule is violated.
///
/// # Examples
///
/// ```
/// use ruststack_s3_lifecycle::validation::{validate_tags, MAX_OBJECT_TAGS};
///
/// let tags = [("env", "prod"), ("team", "backend")];
/// assert!(validate_tags(tags, MAX_OBJECT_TAGS).is_ok());
/// ```
pub fn validate_tags<'a, I>(tags: I, max: usize) -> Result<(), LifecycleError>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut count = 0usize;
    for (key, value) in tags {
        validate_tag_key(key)?;
        validate_tag_value(value)?;
        count += 1;
    }
    if count > max {
        return Err(LifecycleError::InvalidConfig(format!(
            "tags cannot be greater than {max}, got {count}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // Bucket validation
    // -----------------------------------------------------------------------

    #[test]
    fn test_should_accept_legacy_bucket_names() {
        let long_name = "a".repeat(63);
        for name in ["b", "My_Legacy_Bucket", "bucket.with.dots", long_name.as_str()] {
            assert!(validate_bucket(name).is_ok(), "expected valid: {name}");
        }
    }

    #[test]
    fn test_should_reject_empty_or_long_bucket() {
        assert!(validate_bucket("").is_err());
        assert!(validate_bucket(&"a".repeat(64)).is_err());
    }

    #[test]
    fn test_should_reject_bucket_with_separator() {
        assert!(validate_bucket("my,bucket").is_err());
    }

    // -----------------------------------------------------------------------
    // Rule ids and numeric bounds
    // -----------------------------------------------------------------------

    #[test]
    fn test_should_bound_rule_id_length() {
        assert!(validate_rule_id("expire-old").is_ok());
        assert!(validate_rule_id(&"r".repeat(255)).is_ok());
        assert!(validate_rule_id("").is_err());
        assert!(validate_rule_id(&"r".repeat(256)).is_err());
    }

    #[test]
    fn test_should_check_lower_bounds() {
        assert!(validate_at_least("days", Some(1), 1).is_ok());
        assert!(validate_at_least::<i32>("days", None, 1).is_ok());
        let err = validate_at_least("days", Some(0), 1).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid lifecycle configuration: days must be at least 1, got 0"
        );
    }

    // -----------------------------------------------------------------------
    // Tags
    // -----------------------------------------------------------------------

    #[test]
    fn test_should_reject_too_long_tag_key() {
        assert!(validate_tag_key(&"k".repeat(129)).is_err());
        assert!(validate_tag_key(&"k".repeat(128)).is_ok());
    }

    #[test]
    fn test_should_accept_empty_tag_value() {
        assert!(validate_tag_value("").is_ok());
        assert!(validate_tag_value(&"v".repeat(257)).is_err());
    }

    #[test]
    fn test_should_enforce_tag_count() {
        let keys: Vec<String> = (0..11).map(|i| format!("k{i}")).collect();
        let tags: Vec<(&str, &str)> = keys.iter().map(|k| (k.as_str(), "v")).collect();
        assert!(validate_tags(tags.iter().copied(), MAX_OBJECT_TAGS).is_err());
        assert!(validate_tags(tags.iter().copied(), MAX_BUCKET_TAGS).is_ok());
    }
}
