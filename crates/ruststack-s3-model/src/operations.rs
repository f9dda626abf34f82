//! The S3 control-plane operations this binding issues.

/// S3 operations used by lifecycle reconciliation and tag sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum S3Operation {
    /// The GetBucketLifecycleConfiguration operation.
    GetBucketLifecycleConfiguration,
    /// The PutBucketLifecycleConfiguration operation.
    PutBucketLifecycleConfiguration,
    /// The DeleteBucketLifecycle operation.
    DeleteBucketLifecycle,
    /// The GetBucketTagging operation.
    GetBucketTagging,
    /// The PutBucketTagging operation.
    PutBucketTagging,
    /// The DeleteBucketTagging operation.
    DeleteBucketTagging,
    /// The GetObjectTagging operation.
    GetObjectTagging,
    /// The PutObjectTagging operation.
    PutObjectTagging,
    /// The DeleteObjectTagging operation.
    DeleteObjectTagging,
}

impl S3Operation {
    /// Returns the AWS operation name string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GetBucketLifecycleConfiguration => "GetBucketLifecycleConfiguration",
            Self::PutBucketLifecycleConfiguration => "PutBucketLifecycleConfiguration",
            Self::DeleteBucketLifecycle => "DeleteBucketLifecycle",
            Self::GetBucketTagging => "GetBucketTagging",
            Self::PutBucketTagging => "PutBucketTagging",
            Self::DeleteBucketTagging => "DeleteBucketTagging",
            Self::GetObjectTagging => "GetObjectTagging",
            Self::PutObjectTagging => "PutObjectTagging",
            Self::DeleteObjectTagging => "DeleteObjectTagging",
        }
    }

    /// Parse an operation from its AWS name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "GetBucketLifecycleConfiguration" => Some(Self::GetBucketLifecycleConfiguration),
            "PutBucketLifecycleConfiguration" => Some(Self::PutBucketLifecycleConfiguration),
            "DeleteBucketLifecycle" => Some(Self::DeleteBucketLifecycle),
            "GetBucketTagging" => Some(Self::GetBucketTagging),
            "PutBucketTagging" => Some(Self::PutBucketTagging),
            "DeleteBucketTagging" => Some(Self::DeleteBucketTagging),
            "GetObjectTagging" => Some(Self::GetObjectTagging),
            "PutObjectTagging" => Some(Self::PutObjectTagging),
            "DeleteObjectTagging" => Some(Self::DeleteObjectTagging),
            _ => None,
        }
    }

    /// Whether the operation mutates remote state.
    #[must_use]
    pub fn is_write(&self) -> bool {
        !matches!(
            self,
            Self::GetBucketLifecycleConfiguration | Self::GetBucketTagging | Self::GetObjectTagging
        )
    }
}

impl std::fmt::Display for S3Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
