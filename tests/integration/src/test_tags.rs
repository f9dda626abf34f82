//! Bucket and object tag sync integration tests.

#[cfg(test)]
mod tests {
    use ruststack_s3_lifecycle::tags::{
        list_bucket_tags, list_object_tags, update_bucket_tags, update_object_tags,
    };
    use ruststack_s3_lifecycle::{KeyValueTags, SdkLifecycleApi};

    use crate::{cleanup_bucket, create_test_bucket, s3_client};

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_sync_bucket_tags() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "tags-bucket").await;
        let api = SdkLifecycleApi::new(client.clone());

        let first: KeyValueTags = [("env", "test"), ("team", "storage")].into_iter().collect();
        update_bucket_tags(&api, &bucket, &KeyValueTags::new(), &first)
            .await
            .expect("put tags");
        assert_eq!(list_bucket_tags(&api, &bucket).await.expect("list"), first);

        let second: KeyValueTags = [("env", "prod")].into_iter().collect();
        update_bucket_tags(&api, &bucket, &first, &second)
            .await
            .expect("replace tags");
        assert_eq!(list_bucket_tags(&api, &bucket).await.expect("list"), second);

        update_bucket_tags(&api, &bucket, &second, &KeyValueTags::new())
            .await
            .expect("clear tags");
        assert!(list_bucket_tags(&api, &bucket).await.expect("list").is_empty());

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_sync_object_tags() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "tags-object").await;
        client
            .put_object()
            .bucket(&bucket)
            .key("report.csv")
            .body(aws_sdk_s3::primitives::ByteStream::from_static(b"a,b"))
            .send()
            .await
            .expect("put_object");
        let api = SdkLifecycleApi::new(client.clone());

        let tags: KeyValueTags = [("classification", "internal")].into_iter().collect();
        update_object_tags(&api, &bucket, "report.csv", &KeyValueTags::new(), &tags)
            .await
            .expect("put object tags");
        assert_eq!(
            list_object_tags(&api, &bucket, "report.csv").await.expect("list"),
            tags
        );

        update_object_tags(&api, &bucket, "report.csv", &tags, &KeyValueTags::new())
            .await
            .expect("clear object tags");
        assert!(
            list_object_tags(&api, &bucket, "report.csv")
                .await
                .expect("list")
                .is_empty()
        );

        cleanup_bucket(&client, &bucket).await;
    }
}
