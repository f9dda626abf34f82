//! In-memory [`LifecycleApi`] backend.
//!
//! [`InMemoryLifecycleApi`] keeps a bucket table in a `DashMap` and answers
//! the lifecycle and tagging calls the way S3 does, including the error
//! codes. On top of that it can simulate the behaviour the reconciler has
//! to cope with:
//!
//! - read lag: the first N reads after a lifecycle write still see the old
//!   configuration;
//! - scripted reads: queued results returned ahead of the stored state;
//! - scripted write failures: queued errors returned by the next lifecycle
//!   writes.
//!
//! Every call is recorded so tests can assert on the request sequence.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use ruststack_s3_model::types::{BucketLifecycleConfiguration, LifecycleRule, Tag, Tagging};
use ruststack_s3_model::{S3Error, S3ErrorCode, S3Operation};
use tracing::debug;

use crate::api::LifecycleApi;
use crate::validation::{MAX_BUCKET_TAGS, MAX_OBJECT_TAGS};

/// Per-bucket state.
#[derive(Debug, Default)]
struct MemoryBucket {
    owner: Option<String>,
    lifecycle: Option<Vec<LifecycleRule>>,
    /// What reads return while `stale_reads > 0`.
    previous_lifecycle: Option<Vec<LifecycleRule>>,
    stale_reads: u32,
    tags: Vec<Tag>,
    objects: HashMap<String, Vec<Tag>>,
}

impl MemoryBucket {
    fn check_owner(&self, bucket: &str, expected_owner: Option<&str>) -> Result<(), S3Error> {
        match (expected_owner, self.owner.as_deref()) {
            (Some(expected), Some(actual)) if expected != actual => Err(S3Error::access_denied(bucket)),
            _ => Ok(()),
        }
    }

    fn set_lifecycle(&mut self, rules: Option<Vec<LifecycleRule>>, lag: u32) {
        let previous = std::mem::replace(&mut self.lifecycle, rules);
        if lag > 0 {
            self.previous_lifecycle = previous;
            self.stale_reads = lag;
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    buckets: DashMap<String, MemoryBucket>,
    read_lag: Mutex<u32>,
    scripted_reads: Mutex<VecDeque<Result<Vec<LifecycleRule>, S3Error>>>,
    put_failures: Mutex<VecDeque<S3Error>>,
    calls: Mutex<Vec<S3Operation>>,
}

/// Thread-safe in-memory S3 lifecycle and tagging backend.
///
/// Clones share the same state.
#[derive(Clone, Default)]
pub struct InMemoryLifecycleApi {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for InMemoryLifecycleApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryLifecycleApi")
            .field("bucket_count", &self.inner.buckets.len())
            .field("read_lag", &*self.inner.read_lag.lock())
            .finish_non_exhaustive()
    }
}

impl InMemoryLifecycleApi {
    /// Create an empty backend with no read lag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `reads` lifecycle reads after every write return the
    /// previous configuration.
    #[must_use]
    pub fn with_read_lag(self, reads: u32) -> Self {
        *self.inner.read_lag.lock() = reads;
        self
    }

    /// Create a bucket, optionally owned by a specific account.
    pub fn create_bucket(&self, bucket: &str, owner: Option<&str>) {
        self.inner.buckets.insert(
            bucket.to_owned(),
            MemoryBucket {
                owner: owner.map(ToOwned::to_owned),
                ..MemoryBucket::default()
            },
        );
        debug!(bucket = %bucket, "in-memory bucket created");
    }

    /// Remove a bucket and everything attached to it.
    pub fn remove_bucket(&self, bucket: &str) {
        self.inner.buckets.remove(bucket);
    }

    /// Create an object so it can be tagged.
    pub fn put_object(&self, bucket: &str, key: &str) -> Result<(), S3Error> {
        let mut b = self.bucket_mut(bucket)?;
        b.objects.entry(key.to_owned()).or_default();
        Ok(())
    }

    /// Queue a result returned by the next lifecycle read, ahead of the stored state.
    pub fn enqueue_read(&self, result: Result<Vec<LifecycleRule>, S3Error>) {
        self.inner.scripted_reads.lock().push_back(result);
    }

    /// Queue an error returned by the next lifecycle write.
    pub fn fail_next_put(&self, error: S3Error) {
        self.inner.put_failures.lock().push_back(error);
    }

    /// Replace a bucket's lifecycle configuration behind the caller's back.
    pub fn set_lifecycle_out_of_band(&self, bucket: &str, rules: Option<Vec<LifecycleRule>>) -> Result<(), S3Error> {
        self.bucket_mut(bucket)?.set_lifecycle(rules, 0);
        Ok(())
    }

    /// The authoritative (non-lagged) lifecycle configuration of a bucket.
    #[must_use]
    pub fn lifecycle(&self, bucket: &str) -> Option<Vec<LifecycleRule>> {
        self.inner.buckets.get(bucket).and_then(|b| b.lifecycle.clone())
    }

    /// Replace a bucket's tags directly, e.g. to simulate system tags.
    pub fn set_bucket_tags(&self, bucket: &str, tags: Vec<Tag>) -> Result<(), S3Error> {
        self.bucket_mut(bucket)?.tags = tags;
        Ok(())
    }

    /// The stored tags of a bucket.
    #[must_use]
    pub fn bucket_tags(&self, bucket: &str) -> Vec<Tag> {
        self.inner
            .buckets
            .get(bucket)
            .map(|b| b.tags.clone())
            .unwrap_or_default()
    }

    /// The stored tags of an object.
    #[must_use]
    pub fn object_tags(&self, bucket: &str, key: &str) -> Option<Vec<Tag>> {
        self.inner
            .buckets
            .get(bucket)
            .and_then(|b| b.objects.get(key).cloned())
    }

    /// Every call made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<S3Operation> {
        self.inner.calls.lock().clone()
    }

    /// How many times `operation` was called.
    #[must_use]
    pub fn call_count(&self, operation: S3Operation) -> usize {
        self.inner.calls.lock().iter().filter(|op| **op == operation).count()
    }

    fn record(&self, operation: S3Operation) {
        self.inner.calls.lock().push(operation);
    }

    fn bucket_mut(
        &self,
        bucket: &str,
    ) -> Result<dashmap::mapref::one::RefMut<'_, String, MemoryBucket>, S3Error> {
        self.inner
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| S3Error::no_such_bucket(bucket))
    }

    fn bucket_ref(&self, bucket: &str) -> Result<dashmap::mapref::one::Ref<'_, String, MemoryBucket>, S3Error> {
        self.inner
            .buckets
            .get(bucket)
            .ok_or_else(|| S3Error::no_such_bucket(bucket))
    }
}

fn check_tag_count(tags: &[Tag], max: usize, what: &str) -> Result<(), S3Error> {
    if tags.len() > max {
        return Err(S3Error::with_message(
            S3ErrorCode::InvalidTag,
            format!("{what} tags cannot be greater than {max}"),
        ));
    }
    Ok(())
}

#[async_trait]
impl LifecycleApi for InMemoryLifecycleApi {
    async fn put_lifecycle(
        &self,
        bucket: &str,
        expected_owner: Option<&str>,
        configuration: BucketLifecycleConfiguration,
    ) -> Result<(), S3Error> {
        self.record(S3Operation::PutBucketLifecycleConfiguration);
        if let Some(err) = self.inner.put_failures.lock().pop_front() {
            return Err(err);
        }
        if configuration.rules.is_empty() {
            return Err(S3Error::malformed_xml());
        }

        let lag = *self.inner.read_lag.lock();
        let mut b = self.bucket_mut(bucket)?;
        b.check_owner(bucket, expected_owner)?;
        b.set_lifecycle(Some(configuration.rules), lag);

        debug!(bucket = %bucket, "put_lifecycle completed");
        Ok(())
    }

    async fn get_lifecycle(
        &self,
        bucket: &str,
        expected_owner: Option<&str>,
    ) -> Result<Vec<LifecycleRule>, S3Error> {
        self.record(S3Operation::GetBucketLifecycleConfiguration);
        if let Some(result) = self.inner.scripted_reads.lock().pop_front() {
            return result;
        }

        let mut b = self.bucket_mut(bucket)?;
        b.check_owner(bucket, expected_owner)?;
        let visible = if b.stale_reads > 0 {
            b.stale_reads -= 1;
            b.previous_lifecycle.clone()
        } else {
            b.lifecycle.clone()
        };
        visible.ok_or_else(|| S3Error::no_such_lifecycle_configuration(bucket))
    }

    async fn delete_lifecycle(&self, bucket: &str, expected_owner: Option<&str>) -> Result<(), S3Error> {
        self.record(S3Operation::DeleteBucketLifecycle);
        let lag = *self.inner.read_lag.lock();
        let mut b = self.bucket_mut(bucket)?;
        b.check_owner(bucket, expected_owner)?;
        b.set_lifecycle(None, lag);

        debug!(bucket = %bucket, "delete_lifecycle completed");
        Ok(())
    }

    async fn get_bucket_tagging(&self, bucket: &str) -> Result<Vec<Tag>, S3Error> {
        self.record(S3Operation::GetBucketTagging);
        let b = self.bucket_ref(bucket)?;
        if b.tags.is_empty() {
            return Err(S3Error::no_such_tag_set(bucket));
        }
        Ok(b.tags.clone())
    }

    async fn put_bucket_tagging(&self, bucket: &str, tagging: Tagging) -> Result<(), S3Error> {
        self.record(S3Operation::PutBucketTagging);
        check_tag_count(&tagging.tag_set, MAX_BUCKET_TAGS, "Bucket")?;
        self.bucket_mut(bucket)?.tags = tagging.tag_set;
        Ok(())
    }

    async fn delete_bucket_tagging(&self, bucket: &str) -> Result<(), S3Error> {
        self.record(S3Operation::DeleteBucketTagging);
        self.bucket_mut(bucket)?.tags.clear();
        Ok(())
    }

    async fn get_object_tagging(&self, bucket: &str, key: &str) -> Result<Vec<Tag>, S3Error> {
        self.record(S3Operation::GetObjectTagging);
        let b = self.bucket_ref(bucket)?;
        b.objects
            .get(key)
            .cloned()
            .ok_or_else(|| S3Error::no_such_key(key))
    }

    async fn put_object_tagging(&self, bucket: &str, key: &str, tagging: Tagging) -> Result<(), S3Error> {
        self.record(S3Operation::PutObjectTagging);
        check_tag_count(&tagging.tag_set, MAX_OBJECT_TAGS, "Object")?;
        let mut b = self.bucket_mut(bucket)?;
        let tags = b.objects.get_mut(key).ok_or_else(|| S3Error::no_such_key(key))?;
        *tags = tagging.tag_set;
        Ok(())
    }

    async fn delete_object_tagging(&self, bucket: &str, key: &str) -> Result<(), S3Error> {
        self.record(S3Operation::DeleteObjectTagging);
        let mut b = self.bucket_mut(bucket)?;
        let tags = b.objects.get_mut(key).ok_or_else(|| S3Error::no_such_key(key))?;
        tags.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ruststack_s3_model::types::ExpirationStatus;

    use super::*;

    fn config(id: &str) -> BucketLifecycleConfiguration {
        BucketLifecycleConfiguration {
            rules: vec![LifecycleRule {
                id: Some(id.to_owned()),
                status: ExpirationStatus::Enabled,
                ..LifecycleRule::default()
            }],
        }
    }

    #[tokio::test]
    async fn test_should_report_missing_bucket_and_configuration() {
        let api = InMemoryLifecycleApi::new();
        let err = api.get_lifecycle("ghost", None).await.unwrap_err();
        assert_eq!(err.code, S3ErrorCode::NoSuchBucket);

        api.create_bucket("b", None);
        let err = api.get_lifecycle("b", None).await.unwrap_err();
        assert_eq!(err.code, S3ErrorCode::NoSuchLifecycleConfiguration);
    }

    #[tokio::test]
    async fn test_should_serve_stale_reads_after_write() {
        let api = InMemoryLifecycleApi::new().with_read_lag(2);
        api.create_bucket("b", None);
        api.put_lifecycle("b", None, config("r1")).await.unwrap();

        assert!(api.get_lifecycle("b", None).await.is_err());
        assert!(api.get_lifecycle("b", None).await.is_err());
        let rules = api.get_lifecycle("b", None).await.unwrap();
        assert_eq!(rules[0].id.as_deref(), Some("r1"));
        assert_eq!(api.call_count(S3Operation::GetBucketLifecycleConfiguration), 3);
    }

    #[tokio::test]
    async fn test_should_deny_wrong_expected_owner() {
        let api = InMemoryLifecycleApi::new();
        api.create_bucket("b", Some("111122223333"));
        let err = api
            .put_lifecycle("b", Some("444455556666"), config("r1"))
            .await
            .unwrap_err();
        assert_eq!(err.code, S3ErrorCode::AccessDenied);
        api.put_lifecycle("b", Some("111122223333"), config("r1")).await.unwrap();
        api.put_lifecycle("b", None, config("r2")).await.unwrap();
    }

    #[tokio::test]
    async fn test_should_return_scripted_results_first() {
        let api = InMemoryLifecycleApi::new();
        api.create_bucket("b", None);
        api.fail_next_put(S3Error::no_such_bucket("b"));
        assert!(api.put_lifecycle("b", None, config("r1")).await.is_err());
        api.put_lifecycle("b", None, config("r1")).await.unwrap();

        api.enqueue_read(Err(S3Error::internal_error("boom")));
        assert_eq!(
            api.get_lifecycle("b", None).await.unwrap_err().code,
            S3ErrorCode::InternalError
        );
        assert!(api.get_lifecycle("b", None).await.is_ok());
    }

    #[tokio::test]
    async fn test_should_report_missing_tag_set() {
        let api = InMemoryLifecycleApi::new();
        api.create_bucket("b", None);
        let err = api.get_bucket_tagging("b").await.unwrap_err();
        assert_eq!(err.code, S3ErrorCode::NoSuchTagSet);

        api.put_object("b", "k").unwrap();
        assert!(api.get_object_tagging("b", "k").await.unwrap().is_empty());
        let err = api.get_object_tagging("b", "missing").await.unwrap_err();
        assert_eq!(err.code, S3ErrorCode::NoSuchKey);
    }

    #[tokio::test]
    async fn test_should_limit_object_tags() {
        let api = InMemoryLifecycleApi::new();
        api.create_bucket("b", None);
        api.put_object("b", "k").unwrap();
        let tag_set = (0..11).map(|i| Tag::new(format!("k{i}"), "v")).collect();
        let err = api
            .put_object_tagging("b", "k", Tagging { tag_set })
            .await
            .unwrap_err();
        assert_eq!(err.code, S3ErrorCode::InvalidTag);
    }
}
