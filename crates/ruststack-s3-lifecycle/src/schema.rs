//! User-facing lifecycle configuration.
//!
//! This is the declarative shape a user writes (and the shape the reconciler
//! reports back). Field names follow the snake_case block layout used by
//! infrastructure tooling, so a policy reads as:
//!
//! ```json
//! {
//!   "bucket": "my-bucket",
//!   "rule": [
//!     { "id": "expire-old", "status": "Enabled", "expiration": { "days": 30 } }
//!   ]
//! }
//! ```
//!
//! Every block carries explicit optional fields; constraint checks live in
//! the `validate` methods and run before any payload is built.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use ruststack_core::AccountId;
use ruststack_s3_model::types::{ExpirationStatus, TransitionStorageClass};
use serde::{Deserialize, Serialize};

use crate::error::LifecycleError;
use crate::identity::ResourceId;
use crate::validation::{validate_at_least, validate_bucket, validate_rule_id, validate_tags};

/// Maximum number of tags inside a `filter.and` block.
const MAX_FILTER_TAGS: usize = 10;

const SECONDS_PER_DAY: i64 = 86_400;

/// Desired state of one bucket's lifecycle configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LifecyclePolicyConfig {
    /// The bucket the configuration is attached to.
    pub bucket: String,
    /// Account expected to own the bucket.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_bucket_owner: Option<AccountId>,
    /// Ordered rule list.
    pub rule: Vec<LifecycleRuleBlock>,
}

impl LifecyclePolicyConfig {
    /// The identity this configuration resolves to.
    #[must_use]
    pub fn resource_id(&self) -> ResourceId {
        ResourceId::new(self.bucket.clone(), self.expected_bucket_owner.clone())
    }

    /// Check the bucket name and that at least one rule is present.
    ///
    /// # Errors
    ///
    /// An invalid bucket name or an empty rule list.
    pub fn validate_target(&self) -> Result<(), LifecycleError> {
        validate_bucket(&self.bucket)?;
        if self.rule.is_empty() {
            return Err(LifecycleError::InvalidConfig(
                "at least one rule is required".to_owned(),
            ));
        }
        Ok(())
    }

    /// Check resource-level and rule-level constraints.
    ///
    /// # Errors
    ///
    /// Returns the first violation found; rule errors name the rule id.
    pub fn validate(&self) -> Result<(), LifecycleError> {
        self.validate_target()?;
        let mut seen = std::collections::HashSet::new();
        for rule in &self.rule {
            rule.validate()?;
            if !seen.insert(rule.id.as_str()) {
                return Err(LifecycleError::validation(&rule.id, "duplicate rule id"));
            }
        }
        Ok(())
    }
}

/// One lifecycle rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LifecycleRuleBlock {
    /// Unique rule identifier (1-255 characters).
    pub id: String,
    /// Whether the rule is applied.
    pub status: ExpirationStatus,
    /// Deprecated top-level prefix; use `filter.prefix` instead.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub prefix: String,
    /// Which objects the rule applies to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterBlock>,
    /// When current object versions expire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<ExpirationBlock>,
    /// When noncurrent object versions expire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub noncurrent_version_expiration: Option<NoncurrentVersionExpirationBlock>,
    /// Storage class transitions for noncurrent versions (unordered).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub noncurrent_version_transition: Vec<NoncurrentVersionTransitionBlock>,
    /// Storage class transitions for current versions (unordered).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transition: Vec<TransitionBlock>,
    /// When incomplete multipart uploads are aborted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abort_incomplete_multipart_upload: Option<AbortIncompleteMultipartUploadBlock>,
}

impl LifecycleRuleBlock {
    /// A rule with only an id and a status.
    #[must_use]
    pub fn new(id: impl Into<String>, status: ExpirationStatus) -> Self {
        Self {
            id: id.into(),
            status,
            prefix: String::new(),
            filter: None,
            expiration: None,
            noncurrent_version_expiration: None,
            noncurrent_version_transition: Vec::new(),
            transition: Vec::new(),
            abort_incomplete_multipart_upload: None,
        }
    }

    /// Check every constraint of this rule.
    ///
    /// # Errors
    ///
    /// Returns a [`LifecycleError::Validation`] naming this rule.
    pub fn validate(&self) -> Result<(), LifecycleError> {
        self.validate_inner().map_err(|e| e.in_rule(&self.id))
    }

    fn validate_inner(&self) -> Result<(), LifecycleError> {
        validate_rule_id(&self.id)?;

        let filter = self.filter.as_ref().filter(|f| !f.is_empty());
        if filter.is_some() && !self.prefix.is_empty() {
            return Err(LifecycleError::InvalidConfig(
                "prefix and filter cannot both be set; move prefix into filter".to_owned(),
            ));
        }
        if let Some(filter) = filter {
            filter.validate()?;
        }
        if let Some(expiration) = &self.expiration {
            expiration.validate()?;
        }
        if let Some(expiration) = &self.noncurrent_version_expiration {
            validate_at_least(
                "noncurrent_version_expiration.noncurrent_days",
                expiration.noncurrent_days,
                1,
            )?;
            validate_at_least(
                "noncurrent_version_expiration.newer_noncurrent_versions",
                expiration.newer_noncurrent_versions,
                1,
            )?;
        }
        for transition in &self.noncurrent_version_transition {
            validate_at_least(
                "noncurrent_version_transition.noncurrent_days",
                transition.noncurrent_days,
                0,
            )?;
            validate_at_least(
                "noncurrent_version_transition.newer_noncurrent_versions",
                transition.newer_noncurrent_versions,
                1,
            )?;
        }
        for transition in &self.transition {
            transition.validate()?;
        }
        if let Some(abort) = &self.abort_incomplete_multipart_upload {
            validate_at_least(
                "abort_incomplete_multipart_upload.days_after_initiation",
                abort.days_after_initiation,
                1,
            )?;
        }
        Ok(())
    }

    /// Canonical form used for semantic comparison.
    ///
    /// Values the API treats as "unset" are cleared, a filter that selects
    /// every object is dropped, and the unordered transition sets are sorted.
    #[must_use]
    pub fn normalized(&self) -> Self {
        let mut rule = self.clone();

        rule.filter = rule
            .filter
            .take()
            .map(|f| f.normalized())
            .filter(|f| !f.selects_everything());

        rule.expiration = rule
            .expiration
            .take()
            .map(|e| e.normalized())
            .filter(|e| !e.is_empty());

        rule.noncurrent_version_expiration = rule
            .noncurrent_version_expiration
            .take()
            .filter(|e| e.noncurrent_days.is_some() || e.newer_noncurrent_versions.is_some());

        rule.abort_incomplete_multipart_upload = rule
            .abort_incomplete_multipart_upload
            .take()
            .filter(|a| a.days_after_initiation.is_some());

        rule.transition.sort_by(|a, b| {
            (a.days, a.date, a.storage_class.as_str()).cmp(&(
                b.days,
                b.date,
                b.storage_class.as_str(),
            ))
        });
        rule.noncurrent_version_transition.sort_by(|a, b| {
            (a.noncurrent_days, a.newer_noncurrent_versions, a.storage_class.as_str()).cmp(&(
                b.noncurrent_days,
                b.newer_noncurrent_versions,
                b.storage_class.as_str(),
            ))
        });

        rule
    }
}

/// Which objects a rule applies to.
///
/// At most one predicate may be set; use `and` to combine several.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterBlock {
    /// Conjunction of several predicates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub and: Option<AndBlock>,
    /// Minimum object size (exclusive) in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_size_greater_than: Option<i64>,
    /// Maximum object size (exclusive) in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_size_less_than: Option<i64>,
    /// Key prefix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    /// Single object tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<TagBlock>,
}

impl FilterBlock {
    /// Filter on a key prefix.
    #[must_use]
    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            ..Self::default()
        }
    }

    /// Whether no predicate at all is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.and.is_none()
            && self.object_size_greater_than.is_none()
            && self.object_size_less_than.is_none()
            && self.prefix.is_none()
            && self.tag.is_none()
    }

    /// Whether this filter is the "applies to all objects" filter.
    #[must_use]
    pub fn selects_everything(&self) -> bool {
        self.is_empty()
            || (self.prefix.as_deref() == Some("")
                && self.and.is_none()
                && self.object_size_greater_than.is_none()
                && self.object_size_less_than.is_none()
                && self.tag.is_none())
    }

    fn predicate_count(&self) -> usize {
        [
            self.and.is_some(),
            self.object_size_greater_than.is_some(),
            self.object_size_less_than.is_some(),
            self.prefix.is_some(),
            self.tag.is_some(),
        ]
        .into_iter()
        .filter(|set| *set)
        .count()
    }

    fn validate(&self) -> Result<(), LifecycleError> {
        if self.predicate_count() > 1 {
            return Err(LifecycleError::InvalidConfig(
                "filter accepts only one of and, object_size_greater_than, object_size_less_than, prefix, tag"
                    .to_owned(),
            ));
        }
        validate_at_least("filter.object_size_greater_than", self.object_size_greater_than, 0)?;
        validate_at_least("filter.object_size_less_than", self.object_size_less_than, 1)?;
        if let Some(tag) = &self.tag {
            validate_tags([(tag.key.as_str(), tag.value.as_str())], 1)?;
        }
        if let Some(and) = &self.and {
            and.validate()?;
        }
        Ok(())
    }

    fn normalized(&self) -> Self {
        let mut filter = self.clone();
        filter.and = filter.and.take().map(|a| AndBlock {
            prefix: a.prefix.filter(|p| !p.is_empty()),
            object_size_greater_than: a.object_size_greater_than.filter(|n| *n > 0),
            object_size_less_than: a.object_size_less_than.filter(|n| *n > 0),
            tags: a.tags,
        });
        filter
    }
}

/// Conjunction of filter predicates; at least two must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AndBlock {
    /// Minimum object size (exclusive) in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_size_greater_than: Option<i64>,
    /// Maximum object size (exclusive) in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_size_less_than: Option<i64>,
    /// Key prefix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    /// Object tags that must all match.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

impl AndBlock {
    /// Number of predicates that take part in the conjunction.
    ///
    /// An empty prefix and a zero size bound select nothing extra and do not count.
    #[must_use]
    pub fn predicate_count(&self) -> usize {
        usize::from(self.prefix.as_deref().is_some_and(|p| !p.is_empty()))
            + usize::from(self.object_size_greater_than.is_some_and(|n| n > 0))
            + usize::from(self.object_size_less_than.is_some_and(|n| n > 0))
            + self.tags.len()
    }

    fn validate(&self) -> Result<(), LifecycleError> {
        if self.predicate_count() < 2 {
            return Err(LifecycleError::InvalidConfig(
                "filter.and requires at least two of prefix, tags, object_size_greater_than, object_size_less_than"
                    .to_owned(),
            ));
        }
        validate_at_least("filter.and.object_size_greater_than", self.object_size_greater_than, 0)?;
        validate_at_least("filter.and.object_size_less_than", self.object_size_less_than, 1)?;
        if let (Some(lower), Some(upper)) = (self.object_size_greater_than, self.object_size_less_than) {
            if lower >= upper {
                return Err(LifecycleError::InvalidConfig(format!(
                    "filter.and.object_size_greater_than ({lower}) must be less than object_size_less_than ({upper})"
                )));
            }
        }
        validate_tags(
            self.tags.iter().map(|(k, v)| (k.as_str(), v.as_str())),
            MAX_FILTER_TAGS,
        )
    }
}

/// A single key/value tag predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TagBlock {
    /// Tag key.
    pub key: String,
    /// Tag value.
    pub value: String,
}

/// Expiration of current object versions.
///
/// Exactly one of `date`, a non-zero `days`, or
/// `expired_object_delete_marker = true` may be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExpirationBlock {
    /// Expire on this UTC date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    /// Expire this many days after creation; `0` means unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days: Option<i32>,
    /// Remove delete markers with no noncurrent versions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expired_object_delete_marker: Option<bool>,
}

impl ExpirationBlock {
    /// Expire after a number of days.
    #[must_use]
    pub fn days(days: i32) -> Self {
        Self {
            days: Some(days),
            ..Self::default()
        }
    }

    /// Whether nothing meaningful is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.choice_count() == 0
    }

    fn choice_count(&self) -> usize {
        usize::from(self.date.is_some())
            + usize::from(self.days.is_some_and(|d| d != 0))
            + usize::from(self.expired_object_delete_marker == Some(true))
    }

    fn validate(&self) -> Result<(), LifecycleError> {
        validate_at_least("expiration.days", self.days, 0)?;
        validate_midnight("expiration.date", self.date)?;
        if self.choice_count() > 1 {
            return Err(LifecycleError::InvalidConfig(
                "expiration accepts only one of date, days, expired_object_delete_marker".to_owned(),
            ));
        }
        Ok(())
    }

    fn normalized(&self) -> Self {
        Self {
            date: self.date,
            days: self.days.filter(|d| *d != 0),
            expired_object_delete_marker: self.expired_object_delete_marker.filter(|m| *m),
        }
    }
}

/// Expiration of noncurrent object versions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NoncurrentVersionExpirationBlock {
    /// Number of newer noncurrent versions to retain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub newer_noncurrent_versions: Option<i32>,
    /// Days after becoming noncurrent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub noncurrent_days: Option<i32>,
}

/// Storage class transition of noncurrent object versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NoncurrentVersionTransitionBlock {
    /// Number of newer noncurrent versions to retain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub newer_noncurrent_versions: Option<i32>,
    /// Days after becoming noncurrent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub noncurrent_days: Option<i32>,
    /// Target storage class.
    pub storage_class: TransitionStorageClass,
}

/// Storage class transition of current object versions.
///
/// Exactly one of `date` and `days` must be set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransitionBlock {
    /// Transition on this UTC date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    /// Transition this many days after creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days: Option<i32>,
    /// Target storage class.
    pub storage_class: TransitionStorageClass,
}

impl TransitionBlock {
    fn validate(&self) -> Result<(), LifecycleError> {
        validate_at_least("transition.days", self.days, 0)?;
        validate_midnight("transition.date", self.date)?;
        match (self.date, self.days) {
            (Some(_), Some(_)) => Err(LifecycleError::InvalidConfig(
                "transition accepts only one of date, days".to_owned(),
            )),
            (None, None) => Err(LifecycleError::InvalidConfig(
                "transition requires one of date, days".to_owned(),
            )),
            _ => Ok(()),
        }
    }
}

/// Cleanup of incomplete multipart uploads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AbortIncompleteMultipartUploadBlock {
    /// Days after the upload was initiated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_after_initiation: Option<i32>,
}

fn validate_midnight(field: &str, date: Option<DateTime<Utc>>) -> Result<(), LifecycleError> {
    let Some(date) = date else {
        return Ok(());
    };
    if date.timestamp().rem_euclid(SECONDS_PER_DAY) != 0 || date.timestamp_subsec_nanos() != 0 {
        return Err(LifecycleError::InvalidConfig(format!(
            "{field} must be at midnight UTC, got {}",
            date.to_rfc3339()
        )));
    }
    Ok(())
}

/// Semantic equality of two rule lists (order of rules matters, order within sets does not).
#[must_use]
pub fn rules_equivalent(a: &[LifecycleRuleBlock], b: &[LifecycleRuleBlock]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b)
            .all(|(x, y)| x.normalized() == y.normalized())
}
