//! Lifecycle and tagging shapes, mirroring the AWS S3 Smithy model.
//!
//! These are the wire-level shapes exchanged with the S3 control plane. They
//! are deliberately loose (everything optional) because the API accepts and
//! returns partially populated structures; the user-facing, validated shapes
//! live in `ruststack-s3-lifecycle`.

use serde::{Deserialize, Serialize};

/// S3 ExpirationStatus enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ExpirationStatus {
    /// Default variant.
    #[default]
    Disabled,
    Enabled,
}

impl ExpirationStatus {
    /// All values accepted by the API.
    pub const VALUES: &'static [&'static str] = &["Disabled", "Enabled"];

    /// Returns the string value of this enum variant.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "Disabled",
            Self::Enabled => "Enabled",
        }
    }

    /// Parse a status string, returning `None` for unknown values.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Disabled" => Some(Self::Disabled),
            "Enabled" => Some(Self::Enabled),
            _ => None,
        }
    }
}

impl std::fmt::Display for ExpirationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// S3 TransitionStorageClass enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TransitionStorageClass {
    /// Default variant.
    #[default]
    #[serde(rename = "DEEP_ARCHIVE")]
    DeepArchive,
    #[serde(rename = "GLACIER")]
    Glacier,
    #[serde(rename = "GLACIER_IR")]
    GlacierIr,
    #[serde(rename = "INTELLIGENT_TIERING")]
    IntelligentTiering,
    #[serde(rename = "ONEZONE_IA")]
    OnezoneIa,
    #[serde(rename = "STANDARD_IA")]
    StandardIa,
}

impl TransitionStorageClass {
    /// All values accepted by the API.
    pub const VALUES: &'static [&'static str] = &[
        "DEEP_ARCHIVE",
        "GLACIER",
        "GLACIER_IR",
        "INTELLIGENT_TIERING",
        "ONEZONE_IA",
        "STANDARD_IA",
    ];

    /// Returns the string value of this enum variant.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DeepArchive => "DEEP_ARCHIVE",
            Self::Glacier => "GLACIER",
            Self::GlacierIr => "GLACIER_IR",
            Self::IntelligentTiering => "INTELLIGENT_TIERING",
            Self::OnezoneIa => "ONEZONE_IA",
            Self::StandardIa => "STANDARD_IA",
        }
    }

    /// Parse a storage class string, returning `None` for unknown values.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DEEP_ARCHIVE" => Some(Self::DeepArchive),
            "GLACIER" => Some(Self::Glacier),
            "GLACIER_IR" => Some(Self::GlacierIr),
            "INTELLIGENT_TIERING" => Some(Self::IntelligentTiering),
            "ONEZONE_IA" => Some(Self::OnezoneIa),
            "STANDARD_IA" => Some(Self::StandardIa),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransitionStorageClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// S3 AbortIncompleteMultipartUpload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AbortIncompleteMultipartUpload {
    pub days_after_initiation: Option<i32>,
}

/// S3 BucketLifecycleConfiguration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketLifecycleConfiguration {
    pub rules: Vec<LifecycleRule>,
}

/// S3 LifecycleExpiration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LifecycleExpiration {
    pub date: Option<chrono::DateTime<chrono::Utc>>,
    pub days: Option<i32>,
    pub expired_object_delete_marker: Option<bool>,
}

/// S3 LifecycleRule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LifecycleRule {
    pub abort_incomplete_multipart_upload: Option<AbortIncompleteMultipartUpload>,
    pub expiration: Option<LifecycleExpiration>,
    pub filter: Option<LifecycleRuleFilter>,
    pub id: Option<String>,
    pub noncurrent_version_expiration: Option<NoncurrentVersionExpiration>,
    pub noncurrent_version_transitions: Vec<NoncurrentVersionTransition>,
    /// Deprecated top-level prefix, superseded by `filter.prefix`.
    pub prefix: Option<String>,
    pub status: ExpirationStatus,
    pub transitions: Vec<Transition>,
}

/// S3 LifecycleRuleAndOperator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LifecycleRuleAndOperator {
    pub object_size_greater_than: Option<i64>,
    pub object_size_less_than: Option<i64>,
    pub prefix: Option<String>,
    pub tags: Vec<Tag>,
}

/// S3 LifecycleRuleFilter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LifecycleRuleFilter {
    pub and: Option<LifecycleRuleAndOperator>,
    pub object_size_greater_than: Option<i64>,
    pub object_size_less_than: Option<i64>,
    pub prefix: Option<String>,
    pub tag: Option<Tag>,
}

/// S3 NoncurrentVersionExpiration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoncurrentVersionExpiration {
    pub newer_noncurrent_versions: Option<i32>,
    pub noncurrent_days: Option<i32>,
}

/// S3 NoncurrentVersionTransition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoncurrentVersionTransition {
    pub newer_noncurrent_versions: Option<i32>,
    pub noncurrent_days: Option<i32>,
    pub storage_class: TransitionStorageClass,
}

/// S3 Tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    /// Create a tag from a key and value.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// S3 Tagging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tagging {
    pub tag_set: Vec<Tag>,
}

/// S3 Transition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transition {
    pub date: Option<chrono::DateTime<chrono::Utc>>,
    pub days: Option<i32>,
    pub storage_class: TransitionStorageClass,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_parse_known_storage_classes() {
        for value in TransitionStorageClass::VALUES {
            let class = TransitionStorageClass::parse(value).expect("known value");
            assert_eq!(class.as_str(), *value);
        }
        assert!(TransitionStorageClass::parse("STANDARD").is_none());
    }

    #[test]
    fn test_should_reject_unknown_status() {
        assert_eq!(ExpirationStatus::parse("Enabled"), Some(ExpirationStatus::Enabled));
        assert!(ExpirationStatus::parse("bogus").is_none());
        assert!(ExpirationStatus::parse("enabled").is_none());
    }

    #[test]
    fn test_should_compare_rules_structurally() {
        let rule = LifecycleRule {
            id: Some("a".to_owned()),
            status: ExpirationStatus::Enabled,
            filter: Some(LifecycleRuleFilter {
                prefix: Some(String::new()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let mut other = rule.clone();
        assert_eq!(rule, other);

        other.status = ExpirationStatus::Disabled;
        assert_ne!(rule, other);
    }
}
