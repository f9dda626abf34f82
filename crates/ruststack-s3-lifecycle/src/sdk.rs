//! [`LifecycleApi`] over `aws-sdk-s3`.
//!
//! Converts between the model shapes in `ruststack-s3-model` and the SDK's
//! builders, and maps every `SdkError` to an [`S3Error`] that keeps the
//! service's error code, message, request id and HTTP status.

use async_trait::async_trait;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::DateTime as SdkDateTime;
use aws_sdk_s3::types as sdk;
use aws_smithy_runtime_api::client::orchestrator::HttpResponse;
use chrono::{DateTime, Utc};
use ruststack_core::RustStackConfig;
use ruststack_s3_model::types::{
    AbortIncompleteMultipartUpload, BucketLifecycleConfiguration, ExpirationStatus, LifecycleExpiration,
    LifecycleRule, LifecycleRuleAndOperator, LifecycleRuleFilter, NoncurrentVersionExpiration,
    NoncurrentVersionTransition, Tag, Tagging, Transition, TransitionStorageClass,
};
use ruststack_s3_model::{S3Error, S3ErrorCode};
use tracing::debug;

use crate::api::LifecycleApi;

/// S3 lifecycle and tagging calls through an `aws_sdk_s3::Client`.
#[derive(Debug, Clone)]
pub struct SdkLifecycleApi {
    client: aws_sdk_s3::Client,
}

impl SdkLifecycleApi {
    /// Wrap an existing client.
    #[must_use]
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }

    /// Build a client from the default credential chain and `config`.
    ///
    /// `config.endpoint_url` overrides the service endpoint (e.g. a local
    /// emulator) and `config.force_path_style` selects path-style addressing.
    pub async fn from_config(config: &RustStackConfig) -> Self {
        let shared = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.default_region.as_str().to_owned()))
            .load()
            .await;

        let mut builder =
            aws_sdk_s3::config::Builder::from(&shared).force_path_style(config.force_path_style);
        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }

        debug!(
            region = %config.default_region,
            endpoint = ?config.endpoint_url,
            "s3 client configured"
        );
        Self::new(aws_sdk_s3::Client::from_conf(builder.build()))
    }

    /// The underlying SDK client.
    #[must_use]
    pub fn client(&self) -> &aws_sdk_s3::Client {
        &self.client
    }
}

#[async_trait]
impl LifecycleApi for SdkLifecycleApi {
    async fn put_lifecycle(
        &self,
        bucket: &str,
        expected_owner: Option<&str>,
        configuration: BucketLifecycleConfiguration,
    ) -> Result<(), S3Error> {
        let rules = configuration
            .rules
            .iter()
            .map(rule_to_sdk)
            .collect::<Result<Vec<_>, _>>()?;
        let configuration = sdk::BucketLifecycleConfiguration::builder()
            .set_rules(Some(rules))
            .build()
            .map_err(|e| S3Error::invalid_argument(e.to_string()))?;

        self.client
            .put_bucket_lifecycle_configuration()
            .bucket(bucket)
            .set_expected_bucket_owner(expected_owner.map(ToOwned::to_owned))
            .lifecycle_configuration(configuration)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, bucket))?;
        Ok(())
    }

    async fn get_lifecycle(
        &self,
        bucket: &str,
        expected_owner: Option<&str>,
    ) -> Result<Vec<LifecycleRule>, S3Error> {
        let output = self
            .client
            .get_bucket_lifecycle_configuration()
            .bucket(bucket)
            .set_expected_bucket_owner(expected_owner.map(ToOwned::to_owned))
            .send()
            .await
            .map_err(|e| map_sdk_error(e, bucket))?;
        output
            .rules()
            .iter()
            .map(rule_from_sdk)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| e.with_resource(bucket))
    }

    async fn delete_lifecycle(&self, bucket: &str, expected_owner: Option<&str>) -> Result<(), S3Error> {
        self.client
            .delete_bucket_lifecycle()
            .bucket(bucket)
            .set_expected_bucket_owner(expected_owner.map(ToOwned::to_owned))
            .send()
            .await
            .map_err(|e| map_sdk_error(e, bucket))?;
        Ok(())
    }

    async fn get_bucket_tagging(&self, bucket: &str) -> Result<Vec<Tag>, S3Error> {
        let output = self
            .client
            .get_bucket_tagging()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, bucket))?;
        Ok(output.tag_set().iter().map(tag_from_sdk).collect())
    }

    async fn put_bucket_tagging(&self, bucket: &str, tagging: Tagging) -> Result<(), S3Error> {
        self.client
            .put_bucket_tagging()
            .bucket(bucket)
            .tagging(tagging_to_sdk(&tagging)?)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, bucket))?;
        Ok(())
    }

    async fn delete_bucket_tagging(&self, bucket: &str) -> Result<(), S3Error> {
        self.client
            .delete_bucket_tagging()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, bucket))?;
        Ok(())
    }

    async fn get_object_tagging(&self, bucket: &str, key: &str) -> Result<Vec<Tag>, S3Error> {
        let output = self
            .client
            .get_object_tagging()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, key))?;
        Ok(output.tag_set().iter().map(tag_from_sdk).collect())
    }

    async fn put_object_tagging(&self, bucket: &str, key: &str, tagging: Tagging) -> Result<(), S3Error> {
        self.client
            .put_object_tagging()
            .bucket(bucket)
            .key(key)
            .tagging(tagging_to_sdk(&tagging)?)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, key))?;
        Ok(())
    }

    async fn delete_object_tagging(&self, bucket: &str, key: &str) -> Result<(), S3Error> {
        self.client
            .delete_object_tagging()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, key))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Convert an SDK failure into an [`S3Error`].
///
/// Service errors keep their wire code; transport and timeout failures have
/// no code and become `InternalError` with the full error chain as message.
pub(crate) fn map_sdk_error<E>(err: SdkError<E, HttpResponse>, resource: &str) -> S3Error
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let code = err.code().map_or(S3ErrorCode::InternalError, S3ErrorCode::from_code);
    let message = err
        .message()
        .map_or_else(|| DisplayErrorContext(&err).to_string(), ToOwned::to_owned);
    let status = err
        .raw_response()
        .and_then(|r| http::StatusCode::from_u16(r.status().as_u16()).ok());
    let request_id = err.meta().extra("aws_request_id").map(ToOwned::to_owned);

    let mut s3_err = S3Error::with_message(code, message).with_resource(resource);
    if let Some(status) = status {
        s3_err = s3_err.with_status_code(status);
    }
    if let Some(request_id) = request_id {
        s3_err = s3_err.with_request_id(request_id);
    }
    s3_err.with_source(err)
}

// ---------------------------------------------------------------------------
// Model -> SDK
// ---------------------------------------------------------------------------

fn date_to_sdk(date: Option<DateTime<Utc>>) -> Option<SdkDateTime> {
    date.map(|d| SdkDateTime::from_secs(d.timestamp()))
}

fn storage_class_to_sdk(class: TransitionStorageClass) -> sdk::TransitionStorageClass {
    sdk::TransitionStorageClass::from(class.as_str())
}

fn tag_to_sdk(tag: &Tag) -> Result<sdk::Tag, S3Error> {
    sdk::Tag::builder()
        .key(&tag.key)
        .value(&tag.value)
        .build()
        .map_err(|e| S3Error::with_message(S3ErrorCode::InvalidTag, e.to_string()))
}

fn tagging_to_sdk(tagging: &Tagging) -> Result<sdk::Tagging, S3Error> {
    let tags = tagging.tag_set.iter().map(tag_to_sdk).collect::<Result<Vec<_>, _>>()?;
    sdk::Tagging::builder()
        .set_tag_set(Some(tags))
        .build()
        .map_err(|e| S3Error::with_message(S3ErrorCode::InvalidTag, e.to_string()))
}

fn filter_to_sdk(filter: &LifecycleRuleFilter) -> Result<sdk::LifecycleRuleFilter, S3Error> {
    let and = filter
        .and
        .as_ref()
        .map(|and| -> Result<_, S3Error> {
            let tags = and.tags.iter().map(tag_to_sdk).collect::<Result<Vec<_>, _>>()?;
            Ok(sdk::LifecycleRuleAndOperator::builder()
                .set_prefix(and.prefix.clone())
                .set_tags((!tags.is_empty()).then_some(tags))
                .set_object_size_greater_than(and.object_size_greater_than)
                .set_object_size_less_than(and.object_size_less_than)
                .build())
        })
        .transpose()?;

    Ok(sdk::LifecycleRuleFilter::builder()
        .set_and(and)
        .set_object_size_greater_than(filter.object_size_greater_than)
        .set_object_size_less_than(filter.object_size_less_than)
        .set_prefix(filter.prefix.clone())
        .set_tag(filter.tag.as_ref().map(tag_to_sdk).transpose()?)
        .build())
}

#[allow(deprecated)]
fn rule_to_sdk(rule: &LifecycleRule) -> Result<sdk::LifecycleRule, S3Error> {
    let expiration = rule.expiration.as_ref().map(|e| {
        sdk::LifecycleExpiration::builder()
            .set_date(date_to_sdk(e.date))
            .set_days(e.days)
            .set_expired_object_delete_marker(e.expired_object_delete_marker)
            .build()
    });
    let transitions = rule
        .transitions
        .iter()
        .map(|t| {
            sdk::Transition::builder()
                .set_date(date_to_sdk(t.date))
                .set_days(t.days)
                .storage_class(storage_class_to_sdk(t.storage_class))
                .build()
        })
        .collect::<Vec<_>>();
    let noncurrent_transitions = rule
        .noncurrent_version_transitions
        .iter()
        .map(|t| {
            sdk::NoncurrentVersionTransition::builder()
                .set_newer_noncurrent_versions(t.newer_noncurrent_versions)
                .set_noncurrent_days(t.noncurrent_days)
                .storage_class(storage_class_to_sdk(t.storage_class))
                .build()
        })
        .collect::<Vec<_>>();

    sdk::LifecycleRule::builder()
        .set_id(rule.id.clone())
        .status(sdk::ExpirationStatus::from(rule.status.as_str()))
        .set_prefix(rule.prefix.clone())
        .set_filter(rule.filter.as_ref().map(filter_to_sdk).transpose()?)
        .set_expiration(expiration)
        .set_transitions((!transitions.is_empty()).then_some(transitions))
        .set_noncurrent_version_transitions(
            (!noncurrent_transitions.is_empty()).then_some(noncurrent_transitions),
        )
        .set_noncurrent_version_expiration(rule.noncurrent_version_expiration.as_ref().map(|e| {
            sdk::NoncurrentVersionExpiration::builder()
                .set_newer_noncurrent_versions(e.newer_noncurrent_versions)
                .set_noncurrent_days(e.noncurrent_days)
                .build()
        }))
        .set_abort_incomplete_multipart_upload(rule.abort_incomplete_multipart_upload.as_ref().map(|a| {
            sdk::AbortIncompleteMultipartUpload::builder()
                .set_days_after_initiation(a.days_after_initiation)
                .build()
        }))
        .build()
        .map_err(|e| S3Error::invalid_argument(e.to_string()))
}

// ---------------------------------------------------------------------------
// SDK -> Model
// ---------------------------------------------------------------------------

fn date_from_sdk(date: Option<&SdkDateTime>) -> Option<DateTime<Utc>> {
    date.and_then(|d| DateTime::from_timestamp(d.secs(), d.subsec_nanos()))
}

/// Storage classes outside the model are an error, not a default.
fn storage_class_from_sdk(class: Option<&sdk::TransitionStorageClass>) -> Result<TransitionStorageClass, S3Error> {
    let class = class.ok_or_else(|| {
        S3Error::with_message(S3ErrorCode::InvalidStorageClass, "transition without a storage class")
    })?;
    TransitionStorageClass::parse(class.as_str()).ok_or_else(|| {
        S3Error::with_message(
            S3ErrorCode::InvalidStorageClass,
            format!("unsupported storage class {}", class.as_str()),
        )
    })
}

fn status_from_sdk(status: &sdk::ExpirationStatus) -> Result<ExpirationStatus, S3Error> {
    ExpirationStatus::parse(status.as_str()).ok_or_else(|| {
        S3Error::with_message(
            S3ErrorCode::InvalidArgument,
            format!("unsupported rule status {}", status.as_str()),
        )
    })
}

fn tag_from_sdk(tag: &sdk::Tag) -> Tag {
    Tag::new(tag.key(), tag.value())
}

fn filter_from_sdk(filter: &sdk::LifecycleRuleFilter) -> LifecycleRuleFilter {
    LifecycleRuleFilter {
        and: filter.and().map(|and| LifecycleRuleAndOperator {
            object_size_greater_than: and.object_size_greater_than(),
            object_size_less_than: and.object_size_less_than(),
            prefix: and.prefix().map(ToOwned::to_owned),
            tags: and.tags().iter().map(tag_from_sdk).collect(),
        }),
        object_size_greater_than: filter.object_size_greater_than(),
        object_size_less_than: filter.object_size_less_than(),
        prefix: filter.prefix().map(ToOwned::to_owned),
        tag: filter.tag().map(tag_from_sdk),
    }
}

#[allow(deprecated)]
fn rule_from_sdk(rule: &sdk::LifecycleRule) -> Result<LifecycleRule, S3Error> {
    let noncurrent_version_transitions = rule
        .noncurrent_version_transitions()
        .iter()
        .map(|t| {
            Ok(NoncurrentVersionTransition {
                newer_noncurrent_versions: t.newer_noncurrent_versions(),
                noncurrent_days: t.noncurrent_days(),
                storage_class: storage_class_from_sdk(t.storage_class())?,
            })
        })
        .collect::<Result<Vec<_>, S3Error>>()?;
    let transitions = rule
        .transitions()
        .iter()
        .map(|t| {
            Ok(Transition {
                date: date_from_sdk(t.date()),
                days: t.days(),
                storage_class: storage_class_from_sdk(t.storage_class())?,
            })
        })
        .collect::<Result<Vec<_>, S3Error>>()?;

    Ok(LifecycleRule {
        abort_incomplete_multipart_upload: rule.abort_incomplete_multipart_upload().map(|a| {
            AbortIncompleteMultipartUpload {
                days_after_initiation: a.days_after_initiation(),
            }
        }),
        expiration: rule.expiration().map(|e| LifecycleExpiration {
            date: date_from_sdk(e.date()),
            days: e.days(),
            expired_object_delete_marker: e.expired_object_delete_marker(),
        }),
        filter: rule.filter().map(filter_from_sdk),
        id: rule.id().map(ToOwned::to_owned),
        noncurrent_version_expiration: rule.noncurrent_version_expiration().map(|e| {
            NoncurrentVersionExpiration {
                newer_noncurrent_versions: e.newer_noncurrent_versions(),
                noncurrent_days: e.noncurrent_days(),
            }
        }),
        noncurrent_version_transitions,
        prefix: rule.prefix().map(ToOwned::to_owned),
        status: status_from_sdk(rule.status())?,
        transitions,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::mapper::expand_rules;
    use crate::schema::{AndBlock, ExpirationBlock, FilterBlock, LifecycleRuleBlock, TransitionBlock};

    fn sample() -> LifecycleRule {
        let mut block = LifecycleRuleBlock::new("archive", ExpirationStatus::Enabled);
        block.filter = Some(FilterBlock {
            and: Some(AndBlock {
                prefix: Some("logs/".to_owned()),
                tags: BTreeMap::from([("class".to_owned(), "cold".to_owned())]),
                ..AndBlock::default()
            }),
            ..FilterBlock::default()
        });
        block.expiration = Some(ExpirationBlock {
            date: Some("2031-01-01T00:00:00Z".parse().unwrap()),
            ..ExpirationBlock::default()
        });
        block.transition.push(TransitionBlock {
            date: None,
            days: Some(30),
            storage_class: TransitionStorageClass::GlacierIr,
        });
        expand_rules(&[block]).unwrap().remove(0)
    }

    #[test]
    fn test_should_convert_rule_through_sdk_shapes() {
        let rule = sample();
        let sdk_rule = rule_to_sdk(&rule).unwrap();
        assert_eq!(sdk_rule.status(), &sdk::ExpirationStatus::Enabled);
        assert_eq!(
            sdk_rule.transitions()[0].storage_class(),
            Some(&sdk::TransitionStorageClass::GlacierIr)
        );
        assert_eq!(rule_from_sdk(&sdk_rule).unwrap(), rule);
    }

    #[test]
    fn test_should_keep_dates_at_second_precision() {
        let date: DateTime<Utc> = "2031-01-01T00:00:00Z".parse().unwrap();
        let sdk_date = date_to_sdk(Some(date));
        assert_eq!(date_from_sdk(sdk_date.as_ref()), Some(date));
    }

    #[test]
    fn test_should_reject_unknown_storage_class_on_read() {
        let class = sdk::TransitionStorageClass::from("TAPE");
        let err = storage_class_from_sdk(Some(&class)).unwrap_err();
        assert_eq!(err.code, S3ErrorCode::InvalidStorageClass);
        assert!(err.message.contains("TAPE"));

        let mut sdk_rule = rule_to_sdk(&sample()).unwrap();
        sdk_rule.transitions = Some(vec![
            sdk::Transition::builder()
                .days(30)
                .storage_class(sdk::TransitionStorageClass::from("EXPRESS_FUTURE"))
                .build(),
        ]);
        let err = rule_from_sdk(&sdk_rule).unwrap_err();
        assert!(err.message.contains("EXPRESS_FUTURE"));
    }

    #[test]
    fn test_should_reject_unknown_rule_status_on_read() {
        let mut sdk_rule = rule_to_sdk(&sample()).unwrap();
        sdk_rule.status = sdk::ExpirationStatus::from("Paused");
        let err = rule_from_sdk(&sdk_rule).unwrap_err();
        assert_eq!(err.code, S3ErrorCode::InvalidArgument);
        assert!(err.message.contains("Paused"));
    }

    #[test]
    fn test_should_build_tagging_payload() {
        let tagging = Tagging {
            tag_set: vec![Tag::new("env", "prod")],
        };
        assert_eq!(tagging_to_sdk(&tagging).unwrap().tag_set().len(), 1);
    }
}
