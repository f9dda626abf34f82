//! Core types and configuration shared across RustStack crates.
//!
//! This crate provides the foundational building blocks used by the S3
//! lifecycle binding and its command-line front end: validated AWS account
//! and region types, the core error type, and environment-driven settings.

mod config;
mod error;
mod types;

pub use config::{RustStackConfig, parse_bool};
pub use error::{RustStackError, RustStackResult};
pub use types::{AccountId, AwsRegion};
