//! Rule Mapper: translation between configuration blocks and API rules.
//!
//! [`expand_rules`] turns validated [`LifecycleRuleBlock`]s into the
//! [`LifecycleRule`] payload sent with `PutBucketLifecycleConfiguration`.
//! [`flatten_rules`] goes the other way for whatever
//! `GetBucketLifecycleConfiguration` returns, and is the left inverse of
//! expansion up to [`LifecycleRuleBlock::normalized`].

use std::collections::{BTreeMap, HashSet};

use ruststack_s3_model::types::{
    AbortIncompleteMultipartUpload, LifecycleExpiration, LifecycleRule, LifecycleRuleAndOperator,
    LifecycleRuleFilter, NoncurrentVersionExpiration, NoncurrentVersionTransition, Tag, Transition,
};

use crate::error::LifecycleError;
use crate::schema::{
    AbortIncompleteMultipartUploadBlock, AndBlock, ExpirationBlock, FilterBlock, LifecycleRuleBlock,
    NoncurrentVersionExpirationBlock, NoncurrentVersionTransitionBlock, TagBlock, TransitionBlock,
};

// ---------------------------------------------------------------------------
// Expand
// ---------------------------------------------------------------------------

/// Validate and convert configuration rules into the API payload.
///
/// Fails on the first invalid rule; no partial payload is returned.
///
/// # Errors
///
/// Returns [`LifecycleError::Validation`] naming the offending rule.
pub fn expand_rules(rules: &[LifecycleRuleBlock]) -> Result<Vec<LifecycleRule>, LifecycleError> {
    let mut seen = HashSet::with_capacity(rules.len());
    let mut out = Vec::with_capacity(rules.len());
    for rule in rules {
        rule.validate()?;
        if !seen.insert(rule.id.as_str()) {
            return Err(LifecycleError::validation(&rule.id, "duplicate rule id"));
        }
        out.push(expand_rule(rule));
    }
    Ok(out)
}

fn expand_rule(rule: &LifecycleRuleBlock) -> LifecycleRule {
    let filter = rule.filter.as_ref().filter(|f| !f.is_empty());

    // The API wants either a filter or the legacy prefix. No filter and no
    // prefix means "every object", which is spelled as an empty filter prefix.
    let (filter, prefix) = match filter {
        Some(filter) => (Some(expand_filter(filter)), None),
        None if !rule.prefix.is_empty() => (None, Some(rule.prefix.clone())),
        None => (
            Some(LifecycleRuleFilter {
                prefix: Some(String::new()),
                ..LifecycleRuleFilter::default()
            }),
            None,
        ),
    };

    LifecycleRule {
        abort_incomplete_multipart_upload: rule
            .abort_incomplete_multipart_upload
            .as_ref()
            .filter(|a| a.days_after_initiation.is_some())
            .map(|a| AbortIncompleteMultipartUpload {
                days_after_initiation: a.days_after_initiation,
            }),
        expiration: rule.expiration.as_ref().and_then(expand_expiration),
        filter,
        id: Some(rule.id.clone()),
        noncurrent_version_expiration: rule
            .noncurrent_version_expiration
            .as_ref()
            .filter(|e| e.noncurrent_days.is_some() || e.newer_noncurrent_versions.is_some())
            .map(|e| NoncurrentVersionExpiration {
                newer_noncurrent_versions: e.newer_noncurrent_versions,
                noncurrent_days: e.noncurrent_days,
            }),
        noncurrent_version_transitions: rule
            .noncurrent_version_transition
            .iter()
            .map(|t| NoncurrentVersionTransition {
                newer_noncurrent_versions: t.newer_noncurrent_versions,
                noncurrent_days: t.noncurrent_days,
                storage_class: t.storage_class,
            })
            .collect(),
        prefix,
        status: rule.status,
        transitions: rule
            .transition
            .iter()
            .map(|t| Transition {
                date: t.date,
                days: t.days,
                storage_class: t.storage_class,
            })
            .collect(),
    }
}

fn expand_filter(filter: &FilterBlock) -> LifecycleRuleFilter {
    LifecycleRuleFilter {
        and: filter.and.as_ref().map(|and| LifecycleRuleAndOperator {
            object_size_greater_than: and.object_size_greater_than.filter(|n| *n > 0),
            object_size_less_than: and.object_size_less_than.filter(|n| *n > 0),
            prefix: and.prefix.clone(),
            tags: and
                .tags
                .iter()
                .map(|(k, v)| Tag::new(k.as_str(), v.as_str()))
                .collect(),
        }),
        object_size_greater_than: filter.object_size_greater_than,
        object_size_less_than: filter.object_size_less_than,
        prefix: filter.prefix.clone(),
        tag: filter
            .tag
            .as_ref()
            .map(|t| Tag::new(t.key.as_str(), t.value.as_str())),
    }
}

fn expand_expiration(expiration: &ExpirationBlock) -> Option<LifecycleExpiration> {
    // `days = 0` and `expired_object_delete_marker = false` are what the API
    // reports for "unset"; sending them would conflict with the other choice.
    let expiration = LifecycleExpiration {
        date: expiration.date,
        days: expiration.days.filter(|d| *d != 0),
        expired_object_delete_marker: expiration.expired_object_delete_marker.filter(|m| *m),
    };
    let empty = expiration.date.is_none()
        && expiration.days.is_none()
        && expiration.expired_object_delete_marker.is_none();
    (!empty).then_some(expiration)
}

// ---------------------------------------------------------------------------
// Flatten
// ---------------------------------------------------------------------------

/// Convert rules returned by the API into configuration blocks.
#[must_use]
pub fn flatten_rules(rules: &[LifecycleRule]) -> Vec<LifecycleRuleBlock> {
    rules.iter().map(flatten_rule).collect()
}

fn flatten_rule(rule: &LifecycleRule) -> LifecycleRuleBlock {
    LifecycleRuleBlock {
        id: rule.id.clone().unwrap_or_default(),
        status: rule.status,
        prefix: rule.prefix.clone().unwrap_or_default(),
        filter: rule
            .filter
            .as_ref()
            .map(flatten_filter)
            .filter(|f| !f.selects_everything()),
        expiration: rule.expiration.as_ref().and_then(flatten_expiration),
        noncurrent_version_expiration: rule.noncurrent_version_expiration.as_ref().and_then(|e| {
            let block = NoncurrentVersionExpirationBlock {
                newer_noncurrent_versions: e.newer_noncurrent_versions.filter(|n| *n != 0),
                noncurrent_days: e.noncurrent_days.filter(|n| *n != 0),
            };
            (block.newer_noncurrent_versions.is_some() || block.noncurrent_days.is_some())
                .then_some(block)
        }),
        noncurrent_version_transition: rule
            .noncurrent_version_transitions
            .iter()
            .map(|t| NoncurrentVersionTransitionBlock {
                newer_noncurrent_versions: t.newer_noncurrent_versions.filter(|n| *n != 0),
                noncurrent_days: t.noncurrent_days,
                storage_class: t.storage_class,
            })
            .collect(),
        transition: rule
            .transitions
            .iter()
            .map(|t| TransitionBlock {
                date: t.date,
                days: t.days,
                storage_class: t.storage_class,
            })
            .collect(),
        abort_incomplete_multipart_upload: rule
            .abort_incomplete_multipart_upload
            .as_ref()
            .and_then(|a| a.days_after_initiation.filter(|d| *d != 0))
            .map(|days| AbortIncompleteMultipartUploadBlock {
                days_after_initiation: Some(days),
            }),
    }
}

fn flatten_filter(filter: &LifecycleRuleFilter) -> FilterBlock {
    FilterBlock {
        and: filter.and.as_ref().map(|and| AndBlock {
            object_size_greater_than: and.object_size_greater_than.filter(|n| *n > 0),
            object_size_less_than: and.object_size_less_than.filter(|n| *n > 0),
            prefix: and.prefix.clone().filter(|p| !p.is_empty()),
            tags: and
                .tags
                .iter()
                .map(|t| (t.key.clone(), t.value.clone()))
                .collect::<BTreeMap<_, _>>(),
        }),
        object_size_greater_than: filter.object_size_greater_than,
        object_size_less_than: filter.object_size_less_than,
        prefix: filter.prefix.clone(),
        tag: filter.tag.as_ref().map(|t| TagBlock {
            key: t.key.clone(),
            value: t.value.clone(),
        }),
    }
}

fn flatten_expiration(expiration: &LifecycleExpiration) -> Option<ExpirationBlock> {
    let block = ExpirationBlock {
        date: expiration.date,
        days: expiration.days.filter(|d| *d != 0),
        expired_object_delete_marker: expiration.expired_object_delete_marker.filter(|m| *m),
    };
    (!block.is_empty()).then_some(block)
}
