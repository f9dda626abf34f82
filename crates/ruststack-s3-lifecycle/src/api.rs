//! The remote API boundary.
//!
//! [`LifecycleApi`] is the narrow slice of the S3 control plane the
//! reconciler and tag sync need. Every call is a single request; retrying,
//! polling and error classification happen in the callers.
//!
//! Two implementations ship with the crate:
//!
//! - [`crate::sdk::SdkLifecycleApi`] talks to a real endpoint through `aws-sdk-s3`.
//! - [`crate::memory::InMemoryLifecycleApi`] keeps buckets in memory, with
//!   scriptable read lag and failures for tests and offline use.

use async_trait::async_trait;
use ruststack_s3_model::S3Error;
use ruststack_s3_model::types::{BucketLifecycleConfiguration, LifecycleRule, Tag, Tagging};

/// Lifecycle and tagging operations against one S3 endpoint.
///
/// `expected_owner` is the `x-amz-expected-bucket-owner` header: when set,
/// the call fails with `AccessDenied` if the bucket belongs to another
/// account.
#[async_trait]
pub trait LifecycleApi: Send + Sync {
    /// `PutBucketLifecycleConfiguration`: replace the whole rule list.
    async fn put_lifecycle(
        &self,
        bucket: &str,
        expected_owner: Option<&str>,
        configuration: BucketLifecycleConfiguration,
    ) -> Result<(), S3Error>;

    /// `GetBucketLifecycleConfiguration`.
    async fn get_lifecycle(
        &self,
        bucket: &str,
        expected_owner: Option<&str>,
    ) -> Result<Vec<LifecycleRule>, S3Error>;

    /// `DeleteBucketLifecycle`.
    async fn delete_lifecycle(&self, bucket: &str, expected_owner: Option<&str>) -> Result<(), S3Error>;

    /// `GetBucketTagging`. Fails with `NoSuchTagSet` when the bucket has no tags.
    async fn get_bucket_tagging(&self, bucket: &str) -> Result<Vec<Tag>, S3Error>;

    /// `PutBucketTagging`: replace the whole tag set.
    async fn put_bucket_tagging(&self, bucket: &str, tagging: Tagging) -> Result<(), S3Error>;

    /// `DeleteBucketTagging`.
    async fn delete_bucket_tagging(&self, bucket: &str) -> Result<(), S3Error>;

    /// `GetObjectTagging`.
    async fn get_object_tagging(&self, bucket: &str, key: &str) -> Result<Vec<Tag>, S3Error>;

    /// `PutObjectTagging`: replace the whole tag set.
    async fn put_object_tagging(&self, bucket: &str, key: &str, tagging: Tagging) -> Result<(), S3Error>;

    /// `DeleteObjectTagging`.
    async fn delete_object_tagging(&self, bucket: &str, key: &str) -> Result<(), S3Error>;
}
