//! Tag Sync for buckets and objects.
//!
//! Tag sets are replaced wholesale by the API, so an update has to decide
//! which of the stored tags it owns. For buckets, anything stored that the
//! caller did not previously set is a system tag and is carried over, as is
//! every tag under the reserved `aws:` prefix. Objects have no system tags.

use std::collections::BTreeMap;
use std::collections::btree_map;

use ruststack_s3_model::types::{Tag, Tagging};
use ruststack_s3_model::{S3Error, S3ErrorCode, S3Operation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::LifecycleApi;
use crate::error::{Action, LifecycleError, LifecycleResult};
use crate::validation::{MAX_BUCKET_TAGS, MAX_OBJECT_TAGS, validate_tags};

/// Key prefix reserved for tags managed by AWS.
pub const SYSTEM_TAG_PREFIX: &str = "aws:";

/// An ordered key/value tag map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyValueTags(BTreeMap<String, String>);

impl KeyValueTags {
    /// An empty tag map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `key` is reserved for system tags.
    #[must_use]
    pub fn is_system_key(key: &str) -> bool {
        key.starts_with(SYSTEM_TAG_PREFIX)
    }

    /// Build from API tags; a later duplicate key wins.
    #[must_use]
    pub fn from_tags(tags: &[Tag]) -> Self {
        tags.iter()
            .map(|t| (t.key.clone(), t.value.clone()))
            .collect()
    }

    /// Convert to API tags, ordered by key.
    #[must_use]
    pub fn to_tags(&self) -> Vec<Tag> {
        self.0
            .iter()
            .map(|(k, v)| Tag::new(k.as_str(), v.as_str()))
            .collect()
    }

    /// Insert a tag, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    /// Look up a tag value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Number of tags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no tags.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over `(key, value)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The tags without any `aws:` keys.
    #[must_use]
    pub fn ignore_system(&self) -> Self {
        self.iter()
            .filter(|(k, _)| !Self::is_system_key(k))
            .collect()
    }

    /// The `aws:` tags only.
    #[must_use]
    pub fn only_system(&self) -> Self {
        self.iter().filter(|(k, _)| Self::is_system_key(k)).collect()
    }

    /// The tags whose keys do not appear in `other`.
    #[must_use]
    pub fn without_keys_of(&self, other: &Self) -> Self {
        self.iter().filter(|(k, _)| other.get(k).is_none()).collect()
    }

    /// Union with `other`; on a key collision the value from `self` wins.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        let mut merged = other.clone();
        merged.0.extend(self.0.clone());
        merged
    }

    /// Check key and value lengths and the tag count.
    pub fn validate(&self, max: usize) -> LifecycleResult<()> {
        validate_tags(self.iter(), max)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for KeyValueTags {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl IntoIterator for KeyValueTags {
    type Item = (String, String);
    type IntoIter = btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Stored tags the caller does not manage: everything not in `old_user`,
/// plus every `aws:` tag.
#[must_use]
pub fn system_tags(stored: &KeyValueTags, old_user: &KeyValueTags) -> KeyValueTags {
    stored.without_keys_of(old_user).merge(&stored.only_system())
}

// ---------------------------------------------------------------------------
// Bucket tags
// ---------------------------------------------------------------------------

/// List the tags of a bucket. A bucket without a tag set has no tags.
pub async fn list_bucket_tags<A>(api: &A, bucket: &str) -> LifecycleResult<KeyValueTags>
where
    A: LifecycleApi + ?Sized,
{
    match api.get_bucket_tagging(bucket).await {
        Ok(tags) => Ok(KeyValueTags::from_tags(&tags)),
        Err(e) if e.code == S3ErrorCode::NoSuchTagSet => Ok(KeyValueTags::new()),
        Err(e) => Err(LifecycleError::remote(
            Action::ListTags,
            S3Operation::GetBucketTagging,
            bucket,
            e,
        )),
    }
}

/// Move a bucket's user tags from `old` to `new`, keeping system tags.
pub async fn update_bucket_tags<A>(
    api: &A,
    bucket: &str,
    old: &KeyValueTags,
    new: &KeyValueTags,
) -> LifecycleResult<()>
where
    A: LifecycleApi + ?Sized,
{
    let new = new.ignore_system();
    new.validate(MAX_BUCKET_TAGS)?;

    let stored = list_bucket_tags(api, bucket).await?;
    let system = system_tags(&stored, old);
    let desired = new.merge(&system);

    if !desired.is_empty() {
        desired.validate(MAX_BUCKET_TAGS)?;
        debug!(
            bucket = %bucket,
            user = new.len(),
            system = system.len(),
            "put_bucket_tagging"
        );
        api.put_bucket_tagging(
            bucket,
            Tagging {
                tag_set: desired.to_tags(),
            },
        )
        .await
        .map_err(|e| update_err(S3Operation::PutBucketTagging, bucket, e))
    } else if !old.is_empty() {
        debug!(bucket = %bucket, "delete_bucket_tagging");
        api.delete_bucket_tagging(bucket)
            .await
            .map_err(|e| update_err(S3Operation::DeleteBucketTagging, bucket, e))
    } else {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Object tags
// ---------------------------------------------------------------------------

/// List the tags of an object.
pub async fn list_object_tags<A>(api: &A, bucket: &str, key: &str) -> LifecycleResult<KeyValueTags>
where
    A: LifecycleApi + ?Sized,
{
    api.get_object_tagging(bucket, key)
        .await
        .map(|tags| KeyValueTags::from_tags(&tags))
        .map_err(|e| {
            LifecycleError::remote(
                Action::ListTags,
                S3Operation::GetObjectTagging,
                object_id(bucket, key),
                e,
            )
        })
}

/// Replace an object's tags with `new`, ignoring `aws:` keys.
pub async fn update_object_tags<A>(
    api: &A,
    bucket: &str,
    key: &str,
    old: &KeyValueTags,
    new: &KeyValueTags,
) -> LifecycleResult<()>
where
    A: LifecycleApi + ?Sized,
{
    let new = new.ignore_system();
    new.validate(MAX_OBJECT_TAGS)?;
    let id = object_id(bucket, key);

    if !new.is_empty() {
        debug!(bucket = %bucket, key = %key, tags = new.len(), "put_object_tagging");
        api.put_object_tagging(
            bucket,
            key,
            Tagging {
                tag_set: new.to_tags(),
            },
        )
        .await
        .map_err(|e| update_err(S3Operation::PutObjectTagging, &id, e))
    } else if !old.is_empty() {
        debug!(bucket = %bucket, key = %key, "delete_object_tagging");
        api.delete_object_tagging(bucket, key)
            .await
            .map_err(|e| update_err(S3Operation::DeleteObjectTagging, &id, e))
    } else {
        Ok(())
    }
}

fn object_id(bucket: &str, key: &str) -> String {
    format!("{bucket}/{key}")
}

fn update_err(operation: S3Operation, id: &str, source: S3Error) -> LifecycleError {
    LifecycleError::remote(Action::UpdateTags, operation, id, source)
}

#[cfg(test)]
mod tests {
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::memory::InMemoryLifecycleApi;

    fn tags(pairs: &[(&str, &str)]) -> KeyValueTags {
        pairs.iter().copied().collect()
    }

    fn api_with_bucket() -> InMemoryLifecycleApi {
        let api = InMemoryLifecycleApi::new();
        api.create_bucket("b", None);
        api
    }

    #[test]
    fn test_should_partition_system_tags() {
        let stored = tags(&[("sys", "x"), ("user", "a"), ("aws:cloudformation:stack-name", "s")]);
        let old = tags(&[("user", "a"), ("aws:cloudformation:stack-name", "s")]);
        assert_eq!(
            system_tags(&stored, &old),
            tags(&[("sys", "x"), ("aws:cloudformation:stack-name", "s")])
        );
    }

    #[test]
    fn test_should_prefer_own_values_on_merge() {
        let merged = tags(&[("k", "new")]).merge(&tags(&[("k", "old"), ("other", "1")]));
        assert_eq!(merged, tags(&[("k", "new"), ("other", "1")]));
    }

    #[tokio::test]
    async fn test_should_keep_system_tags_when_clearing_user_tags() {
        let api = api_with_bucket();
        api.set_bucket_tags("b", vec![Tag::new("sys", "x"), Tag::new("user", "a")])
            .unwrap();

        assert_ok!(update_bucket_tags(&api, "b", &tags(&[("user", "a")]), &KeyValueTags::new()).await);

        assert_eq!(api.bucket_tags("b"), vec![Tag::new("sys", "x")]);
        assert_eq!(api.call_count(S3Operation::PutBucketTagging), 1);
        assert_eq!(api.call_count(S3Operation::DeleteBucketTagging), 0);
    }

    #[tokio::test]
    async fn test_should_delete_tag_set_when_nothing_remains() {
        let api = api_with_bucket();
        api.set_bucket_tags("b", vec![Tag::new("user", "a")]).unwrap();

        assert_ok!(update_bucket_tags(&api, "b", &tags(&[("user", "a")]), &KeyValueTags::new()).await);

        assert!(api.bucket_tags("b").is_empty());
        assert_eq!(api.call_count(S3Operation::DeleteBucketTagging), 1);
    }

    #[tokio::test]
    async fn test_should_skip_writes_when_nothing_to_do() {
        let api = api_with_bucket();
        assert_ok!(update_bucket_tags(&api, "b", &KeyValueTags::new(), &KeyValueTags::new()).await);
        assert_eq!(api.calls(), vec![S3Operation::GetBucketTagging]);
    }

    #[tokio::test]
    async fn test_should_replace_user_tags_and_keep_aws_tags() {
        let api = api_with_bucket();
        api.set_bucket_tags("b", vec![Tag::new("aws:createdBy", "me"), Tag::new("env", "dev")])
            .unwrap();

        let new = tags(&[("env", "prod"), ("aws:createdBy", "ignored")]);
        assert_ok!(update_bucket_tags(&api, "b", &tags(&[("env", "dev")]), &new).await);

        assert_eq!(
            list_bucket_tags(&api, "b").await.unwrap(),
            tags(&[("aws:createdBy", "me"), ("env", "prod")])
        );
    }

    #[tokio::test]
    async fn test_should_list_empty_tags_for_untagged_bucket() {
        let api = api_with_bucket();
        assert!(list_bucket_tags(&api, "b").await.unwrap().is_empty());

        let err = assert_err!(list_bucket_tags(&api, "ghost").await);
        assert_eq!(
            err.remote_source().map(|e| e.code.clone()),
            Some(S3ErrorCode::NoSuchBucket)
        );
    }

    #[tokio::test]
    async fn test_should_reject_too_many_bucket_tags_before_calling_api() {
        let api = api_with_bucket();
        let new: KeyValueTags = (0..51).map(|i| (format!("k{i}"), "v")).collect();
        let err = assert_err!(update_bucket_tags(&api, "b", &KeyValueTags::new(), &new).await);
        assert!(err.is_validation());
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_should_update_object_tags() {
        let api = api_with_bucket();
        api.put_object("b", "data.csv").unwrap();

        let first = tags(&[("class", "hot")]);
        assert_ok!(update_object_tags(&api, "b", "data.csv", &KeyValueTags::new(), &first).await);
        assert_eq!(list_object_tags(&api, "b", "data.csv").await.unwrap(), first);

        assert_ok!(update_object_tags(&api, "b", "data.csv", &first, &KeyValueTags::new()).await);
        assert!(list_object_tags(&api, "b", "data.csv").await.unwrap().is_empty());
        assert_eq!(api.call_count(S3Operation::DeleteObjectTagging), 1);
    }

    #[tokio::test]
    async fn test_should_name_object_in_errors() {
        let api = api_with_bucket();
        let err = assert_err!(list_object_tags(&api, "b", "missing.txt").await);
        assert!(err.to_string().contains("b/missing.txt"));
    }
}
