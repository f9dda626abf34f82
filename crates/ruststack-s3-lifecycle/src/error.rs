//! Lifecycle binding error types.
//!
//! [`LifecycleError`] is the single error type surfaced by the reconciler and
//! tag sync. Validation problems are reported before any network call;
//! remote faults carry the reconciler action, the S3 operation and the
//! resource identity so the message is self-describing.
//!
//! Transient "not found" responses and unstable reads never reach the
//! caller as errors: they are absorbed by the polling layer in
//! [`crate::wait`].

use std::fmt;

use ruststack_core::RustStackError;
use ruststack_s3_model::{S3Error, S3Operation};

/// The reconciler-level action during which an error happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Creating the lifecycle configuration.
    Create,
    /// Reading (and stabilizing) the lifecycle configuration.
    Read,
    /// Replacing the rule list of an existing configuration.
    Update,
    /// Deleting the lifecycle configuration.
    Delete,
    /// Adopting an existing configuration by identity.
    Import,
    /// Listing a bucket or object tag set.
    ListTags,
    /// Writing a bucket or object tag set.
    UpdateTags,
}

impl Action {
    /// Present participle used in error messages.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "creating",
            Self::Read => "reading",
            Self::Update => "updating",
            Self::Delete => "deleting",
            Self::Import => "importing",
            Self::ListTags => "listing tags for",
            Self::UpdateTags => "updating tags for",
        }
    }

    /// The kind of resource the action applies to.
    #[must_use]
    pub fn resource_kind(&self) -> &'static str {
        match self {
            Self::ListTags | Self::UpdateTags => "S3 resource",
            _ => "S3 Bucket Lifecycle Configuration",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced by the lifecycle binding.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// A rule violates a structural constraint.
    #[error("invalid lifecycle rule ({rule}): {message}")]
    Validation {
        /// The id of the offending rule.
        rule: String,
        /// What is wrong with it.
        message: String,
    },

    /// A resource-level configuration value is invalid.
    #[error("invalid lifecycle configuration: {0}")]
    InvalidConfig(String),

    /// A persisted identity string does not have the expected shape.
    #[error("unexpected format for ID ({id}), expected BUCKET or BUCKET,EXPECTED_BUCKET_OWNER")]
    Format {
        /// The malformed identity.
        id: String,
    },

    /// An identity field changed; the resource has to be destroyed and re-created.
    #[error("{field} of S3 Bucket Lifecycle Configuration ({id}) cannot be changed in place")]
    RequiresReplacement {
        /// The current resource identity.
        id: String,
        /// The immutable field that changed.
        field: &'static str,
    },

    /// The operation ran out of time or was cancelled.
    #[error("timed out {action} {} ({id}): {reason}", .action.resource_kind())]
    Timeout {
        /// The reconciler action that timed out.
        action: Action,
        /// The resource identity.
        id: String,
        /// Why the wait ended.
        reason: String,
    },

    /// The remote API reported a fault.
    #[error("error {action} {} ({id}) during {operation}: {source}", .action.resource_kind())]
    Remote {
        /// The reconciler action.
        action: Action,
        /// The S3 operation that failed.
        operation: S3Operation,
        /// The resource identity.
        id: String,
        /// The error returned by the API.
        #[source]
        source: S3Error,
    },

    /// An error from the shared core crate.
    #[error(transparent)]
    Core(#[from] RustStackError),
}

impl LifecycleError {
    /// Attribute a configuration error to a specific rule.
    #[must_use]
    pub fn in_rule(self, rule: &str) -> Self {
        match self {
            Self::InvalidConfig(message) => Self::Validation {
                rule: rule.to_owned(),
                message,
            },
            other => other,
        }
    }

    /// Build a [`LifecycleError::Validation`].
    #[must_use]
    pub fn validation(rule: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            rule: rule.to_owned(),
            message: message.into(),
        }
    }

    /// Build a [`LifecycleError::Remote`].
    #[must_use]
    pub fn remote(action: Action, operation: S3Operation, id: impl Into<String>, source: S3Error) -> Self {
        Self::Remote {
            action,
            operation,
            id: id.into(),
            source,
        }
    }

    /// Whether this error was caught before any network call was made.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::InvalidConfig(_) | Self::Format { .. } | Self::Core(_)
        )
    }

    /// The S3 error behind a remote fault, if any.
    #[must_use]
    pub fn remote_source(&self) -> Option<&S3Error> {
        match self {
            Self::Remote { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Convenience result type for lifecycle operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;

#[cfg(test)]
mod tests {
    use ruststack_s3_model::S3ErrorCode;

    use super::*;

    #[test]
    fn test_should_name_rule_in_validation_message() {
        let err = LifecycleError::InvalidConfig("days must be positive".to_owned()).in_rule("expire-old");
        assert_eq!(
            err.to_string(),
            "invalid lifecycle rule (expire-old): days must be positive"
        );
        assert!(err.is_validation());
    }

    #[test]
    fn test_should_tag_remote_fault_with_operation_and_identity() {
        let err = LifecycleError::remote(
            Action::Create,
            S3Operation::PutBucketLifecycleConfiguration,
            "my-bucket,111122223333",
            S3Error::access_denied("my-bucket"),
        );
        let message = err.to_string();
        assert!(message.contains("creating"));
        assert!(message.contains("PutBucketLifecycleConfiguration"));
        assert!(message.contains("my-bucket,111122223333"));
        assert!(message.contains("S3 Bucket Lifecycle Configuration"));
        assert!(!err.is_validation());
        assert_eq!(
            err.remote_source().map(|e| e.code.clone()),
            Some(S3ErrorCode::AccessDenied)
        );
    }

    #[test]
    fn test_should_name_tagged_resource() {
        let err = LifecycleError::remote(
            Action::UpdateTags,
            S3Operation::PutBucketTagging,
            "my-bucket",
            S3Error::no_such_bucket("my-bucket"),
        );
        assert!(
            err.to_string()
                .starts_with("error updating tags for S3 resource (my-bucket) during PutBucketTagging")
        );
    }

    #[test]
    fn test_should_leave_non_config_errors_untouched() {
        let err = LifecycleError::Format { id: ",".to_owned() }.in_rule("r1");
        assert!(matches!(err, LifecycleError::Format { .. }));
    }
}
