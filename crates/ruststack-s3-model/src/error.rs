//! S3 error codes and the error response shape returned by the control plane.

use std::fmt;

/// Well-known S3 error codes relevant to lifecycle and tagging operations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum S3ErrorCode {
    /// AccessDenied error.
    AccessDenied,
    /// InternalError error.
    #[default]
    InternalError,
    /// InvalidArgument error.
    InvalidArgument,
    /// InvalidBucketName error.
    InvalidBucketName,
    /// InvalidRequest error.
    InvalidRequest,
    /// InvalidStorageClass error.
    InvalidStorageClass,
    /// InvalidTag error.
    InvalidTag,
    /// MalformedXML error.
    MalformedXML,
    /// NoSuchBucket error.
    NoSuchBucket,
    /// NoSuchKey error.
    NoSuchKey,
    /// NoSuchLifecycleConfiguration error.
    NoSuchLifecycleConfiguration,
    /// NoSuchTagSet error.
    NoSuchTagSet,
    /// ServiceUnavailable error.
    ServiceUnavailable,
    /// SignatureDoesNotMatch error.
    SignatureDoesNotMatch,
    /// SlowDown error.
    SlowDown,
    /// A code not in the standard set, kept verbatim.
    Custom(String),
}

impl S3ErrorCode {
    /// Returns the error code as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::AccessDenied => "AccessDenied",
            Self::InternalError => "InternalError",
            Self::InvalidArgument => "InvalidArgument",
            Self::InvalidBucketName => "InvalidBucketName",
            Self::InvalidRequest => "InvalidRequest",
            Self::InvalidStorageClass => "InvalidStorageClass",
            Self::InvalidTag => "InvalidTag",
            Self::MalformedXML => "MalformedXML",
            Self::NoSuchBucket => "NoSuchBucket",
            Self::NoSuchKey => "NoSuchKey",
            Self::NoSuchLifecycleConfiguration => "NoSuchLifecycleConfiguration",
            Self::NoSuchTagSet => "NoSuchTagSet",
            Self::ServiceUnavailable => "ServiceUnavailable",
            Self::SignatureDoesNotMatch => "SignatureDoesNotMatch",
            Self::SlowDown => "SlowDown",
            Self::Custom(code) => code,
        }
    }

    /// Map a wire error code onto a well-known variant.
    ///
    /// The API reference names the missing tag set error `NoSuchTagSetError`
    /// while the service actually returns `NoSuchTagSet`; both are accepted.
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        match code {
            "AccessDenied" => Self::AccessDenied,
            "InternalError" => Self::InternalError,
            "InvalidArgument" => Self::InvalidArgument,
            "InvalidBucketName" => Self::InvalidBucketName,
            "InvalidRequest" => Self::InvalidRequest,
            "InvalidStorageClass" => Self::InvalidStorageClass,
            "InvalidTag" => Self::InvalidTag,
            "MalformedXML" => Self::MalformedXML,
            "NoSuchBucket" => Self::NoSuchBucket,
            "NoSuchKey" => Self::NoSuchKey,
            "NoSuchLifecycleConfiguration" => Self::NoSuchLifecycleConfiguration,
            "NoSuchTagSet" | "NoSuchTagSetError" => Self::NoSuchTagSet,
            "ServiceUnavailable" => Self::ServiceUnavailable,
            "SignatureDoesNotMatch" => Self::SignatureDoesNotMatch,
            "SlowDown" => Self::SlowDown,
            other => Self::Custom(other.to_owned()),
        }
    }

    /// Returns the default HTTP status code for this error.
    #[must_use]
    #[allow(clippy::match_same_arms)]
    pub fn default_status_code(&self) -> http::StatusCode {
        match self {
            Self::InvalidArgument
            | Self::InvalidBucketName
            | Self::InvalidRequest
            | Self::InvalidStorageClass
            | Self::InvalidTag
            | Self::MalformedXML => http::StatusCode::BAD_REQUEST,
            Self::AccessDenied | Self::SignatureDoesNotMatch => http::StatusCode::FORBIDDEN,
            Self::NoSuchBucket
            | Self::NoSuchKey
            | Self::NoSuchLifecycleConfiguration
            | Self::NoSuchTagSet => http::StatusCode::NOT_FOUND,
            Self::ServiceUnavailable | Self::SlowDown => http::StatusCode::SERVICE_UNAVAILABLE,
            Self::InternalError | Self::Custom(_) => http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the default message for this error.
    #[must_use]
    pub fn default_message(&self) -> &'static str {
        match self {
            Self::AccessDenied => "Access Denied",
            Self::InternalError => "We encountered an internal error. Please try again.",
            Self::InvalidArgument => "Invalid Argument",
            Self::InvalidBucketName => "The specified bucket is not valid",
            Self::InvalidRequest => "Invalid Request",
            Self::InvalidStorageClass => "The storage class you specified is not valid",
            Self::InvalidTag => "The tag provided was not a valid tag",
            Self::MalformedXML => "The XML you provided was not well-formed",
            Self::NoSuchBucket => "The specified bucket does not exist",
            Self::NoSuchKey => "The specified key does not exist",
            Self::NoSuchLifecycleConfiguration => "The lifecycle configuration does not exist",
            Self::NoSuchTagSet => "There is no tag set associated with the bucket",
            Self::ServiceUnavailable => "Service is unable to handle request",
            Self::SignatureDoesNotMatch => {
                "The request signature we calculated does not match the signature you provided"
            }
            Self::SlowDown => "Please reduce your request rate",
            Self::Custom(_) => "Unrecognized error",
        }
    }
}

impl fmt::Display for S3ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An S3 error response.
#[derive(Debug)]
pub struct S3Error {
    /// The error code.
    pub code: S3ErrorCode,
    /// A human-readable error message.
    pub message: String,
    /// The resource that caused the error.
    pub resource: Option<String>,
    /// The request ID.
    pub request_id: Option<String>,
    /// The HTTP status code.
    pub status_code: http::StatusCode,
    /// The underlying source error, if any.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for S3Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S3Error({}): {}", self.code, self.message)
    }
}

impl std::error::Error for S3Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl S3Error {
    /// Create a new S3Error from an error code.
    #[must_use]
    pub fn new(code: S3ErrorCode) -> Self {
        let status_code = code.default_status_code();
        let message = code.default_message().to_owned();
        Self {
            code,
            message,
            resource: None,
            request_id: None,
            status_code,
            source: None,
        }
    }

    /// Create a new S3Error with a custom message.
    #[must_use]
    pub fn with_message(code: S3ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status_code: code.default_status_code(),
            message: message.into(),
            code,
            resource: None,
            request_id: None,
            source: None,
        }
    }

    /// Set the resource that caused this error.
    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Set the request ID.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Set the HTTP status code reported by the service.
    #[must_use]
    pub fn with_status_code(mut self, status_code: http::StatusCode) -> Self {
        self.status_code = status_code;
        self
    }

    /// Set the source error.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Whether this error carries any of the given codes.
    #[must_use]
    pub fn is_code_in(&self, codes: &[S3ErrorCode]) -> bool {
        codes.contains(&self.code)
    }

    /// Create a NoSuchBucket error.
    #[must_use]
    pub fn no_such_bucket(bucket_name: impl Into<String>) -> Self {
        Self::new(S3ErrorCode::NoSuchBucket).with_resource(bucket_name)
    }

    /// Create a NoSuchKey error.
    #[must_use]
    pub fn no_such_key(key: impl Into<String>) -> Self {
        Self::new(S3ErrorCode::NoSuchKey).with_resource(key)
    }

    /// Create a NoSuchLifecycleConfiguration error.
    #[must_use]
    pub fn no_such_lifecycle_configuration(bucket_name: impl Into<String>) -> Self {
        Self::new(S3ErrorCode::NoSuchLifecycleConfiguration).with_resource(bucket_name)
    }

    /// Create a NoSuchTagSet error.
    #[must_use]
    pub fn no_such_tag_set(resource: impl Into<String>) -> Self {
        Self::new(S3ErrorCode::NoSuchTagSet).with_resource(resource)
    }

    /// Create a AccessDenied error.
    #[must_use]
    pub fn access_denied(resource: impl Into<String>) -> Self {
        Self::new(S3ErrorCode::AccessDenied).with_resource(resource)
    }

    /// Create a InternalError error.
    #[must_use]
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::with_message(S3ErrorCode::InternalError, message)
    }

    /// Create a InvalidArgument error.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::with_message(S3ErrorCode::InvalidArgument, message)
    }

    /// Create a MalformedXML error.
    #[must_use]
    pub fn malformed_xml() -> Self {
        Self::new(S3ErrorCode::MalformedXML)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_map_wire_codes() {
        assert_eq!(
            S3ErrorCode::from_code("NoSuchLifecycleConfiguration"),
            S3ErrorCode::NoSuchLifecycleConfiguration
        );
        assert_eq!(
            S3ErrorCode::from_code("NoSuchTagSetError"),
            S3ErrorCode::NoSuchTagSet
        );
        assert_eq!(
            S3ErrorCode::from_code("OperationAborted"),
            S3ErrorCode::Custom("OperationAborted".to_owned())
        );
    }

    #[test]
    fn test_should_keep_custom_code_verbatim() {
        let code = S3ErrorCode::from_code("OperationAborted");
        assert_eq!(code.as_str(), "OperationAborted");
        assert_eq!(
            code.default_status_code(),
            http::StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_should_build_not_found_errors() {
        let err = S3Error::no_such_lifecycle_configuration("my-bucket");
        assert_eq!(err.status_code, http::StatusCode::NOT_FOUND);
        assert_eq!(err.resource.as_deref(), Some("my-bucket"));
        assert!(err.is_code_in(&[S3ErrorCode::NoSuchBucket, S3ErrorCode::NoSuchLifecycleConfiguration]));
        assert_eq!(
            err.to_string(),
            "S3Error(NoSuchLifecycleConfiguration): The lifecycle configuration does not exist"
        );
    }
}
