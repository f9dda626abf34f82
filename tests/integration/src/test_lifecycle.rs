//! Lifecycle reconciler integration tests.

#[cfg(test)]
mod tests {
    use ruststack_s3_lifecycle::schema::{ExpirationBlock, FilterBlock, TransitionBlock};
    use ruststack_s3_lifecycle::{
        LifecycleError, LifecyclePolicyConfig, LifecycleRuleBlock, OperationContext, ReadOutcome,
    };
    use ruststack_s3_model::types::{ExpirationStatus, TransitionStorageClass};

    use crate::{cleanup_bucket, create_test_bucket, reconciler, s3_client, test_bucket_name};

    fn expire_old(days: i32) -> LifecycleRuleBlock {
        let mut rule = LifecycleRuleBlock::new("expire-old", ExpirationStatus::Enabled);
        rule.expiration = Some(ExpirationBlock::days(days));
        rule
    }

    fn policy(bucket: &str, rules: Vec<LifecycleRuleBlock>) -> LifecyclePolicyConfig {
        LifecyclePolicyConfig {
            bucket: bucket.to_owned(),
            expected_bucket_owner: None,
            rule: rules,
        }
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_create_read_and_delete_configuration() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "lc-crud").await;
        let reconciler = reconciler();
        let ctx = OperationContext::new();

        let state = reconciler
            .create(&ctx, &policy(&bucket, vec![expire_old(30)]))
            .await
            .expect("create");
        assert_eq!(state.id.encode(), bucket);
        assert_eq!(state.rules[0].expiration, Some(ExpirationBlock::days(30)));

        let read = reconciler.read(&ctx, &state).await.expect("read");
        assert_eq!(read, ReadOutcome::Present(state.clone()));

        reconciler.delete(&ctx, &state).await.expect("delete");
        let read = reconciler.read(&ctx, &state).await.expect("read after delete");
        assert_eq!(read, ReadOutcome::Absent);

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_update_filtered_rules_in_place() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "lc-update").await;
        let reconciler = reconciler();
        let ctx = OperationContext::new();

        let state = reconciler
            .create(&ctx, &policy(&bucket, vec![expire_old(30)]))
            .await
            .expect("create");

        let mut archive = LifecycleRuleBlock::new("archive-logs", ExpirationStatus::Enabled);
        archive.filter = Some(FilterBlock::prefix("logs/"));
        archive.transition = vec![TransitionBlock {
            date: None,
            days: Some(30),
            storage_class: TransitionStorageClass::Glacier,
        }];

        let updated = reconciler
            .update(&ctx, &state, &policy(&bucket, vec![expire_old(60), archive]))
            .await
            .expect("update");
        assert_eq!(updated.rules.len(), 2);
        let archive = updated
            .rules
            .iter()
            .find(|r| r.id == "archive-logs")
            .expect("archive rule");
        assert_eq!(archive.filter, Some(FilterBlock::prefix("logs/")));

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_import_by_bucket_name() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "lc-import").await;
        let reconciler = reconciler();
        let ctx = OperationContext::new();

        reconciler
            .create(&ctx, &policy(&bucket, vec![expire_old(7)]))
            .await
            .expect("create");

        let imported = reconciler.import(&ctx, &bucket).await.expect("import");
        assert_eq!(imported.rules[0].id, "expire-old");

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_time_out_on_missing_bucket() {
        let reconciler = reconciler();
        let bucket = test_bucket_name("lc-missing");
        let ctx = OperationContext::new().with_timeout(std::time::Duration::from_secs(3));

        let err = reconciler
            .create(&ctx, &policy(&bucket, vec![expire_old(1)]))
            .await
            .expect_err("bucket does not exist");
        assert!(matches!(err, LifecycleError::Timeout { .. }), "got {err}");
    }
}
