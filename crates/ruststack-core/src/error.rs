//! Error types for the RustStack core.

/// Errors raised while building core values.
#[derive(Debug, thiserror::Error)]
pub enum RustStackError {
    /// An account ID that is not exactly twelve digits.
    #[error("invalid AWS account ID ({0}): expected 12 digits")]
    InvalidAccountId(String),
}

/// Convenience result type for RustStack operations.
pub type RustStackResult<T> = Result<T, RustStackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_name_rejected_account_id() {
        let err = RustStackError::InvalidAccountId("12345".to_owned());
        assert_eq!(err.to_string(), "invalid AWS account ID (12345): expected 12 digits");
    }
}
