//! Wire-level S3 shapes for bucket lifecycle configuration and tagging.
//!
//! The types here mirror the S3 Smithy model one-to-one and carry no
//! validation; see `ruststack-s3-lifecycle` for the user-facing rule schema.
#![allow(missing_docs)]

pub mod error;
pub mod operations;
pub mod types;

pub use error::{S3Error, S3ErrorCode};
pub use operations::S3Operation;
