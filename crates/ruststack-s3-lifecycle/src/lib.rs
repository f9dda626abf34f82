//! S3 bucket lifecycle configuration binding for RustStack.
//!
//! Keeps the lifecycle configuration of one bucket in line with a declared
//! rule list, against an S3 control plane whose reads lag behind writes.
//!
//! # Architecture
//!
//! ```text
//! LifecyclePolicyConfig (schema, validated)
//!        |
//!        v
//!   expand_rules / flatten_rules (mapper)
//!        |
//!        v
//!   Reconciler (create/read/update/delete, write retry, stabilization)
//!        |
//!        v
//!   LifecycleApi ── SdkLifecycleApi (aws-sdk-s3)
//!                └─ InMemoryLifecycleApi (tests, offline)
//! ```
//!
//! Bucket and object tags are synchronised separately by the functions in
//! [`tags`], which leave `aws:` system tags untouched.

pub mod api;
pub mod config;
pub mod error;
pub mod identity;
pub mod mapper;
pub mod memory;
pub mod reconciler;
pub mod schema;
pub mod sdk;
pub mod tags;
pub mod validation;
pub mod wait;

pub use api::LifecycleApi;
pub use config::LifecycleConfig;
pub use error::{Action, LifecycleError, LifecycleResult};
pub use identity::ResourceId;
pub use memory::InMemoryLifecycleApi;
pub use reconciler::{Plan, ReadOutcome, Reconciler, TrackedState};
pub use schema::{LifecyclePolicyConfig, LifecycleRuleBlock};
pub use sdk::SdkLifecycleApi;
pub use tags::KeyValueTags;
pub use wait::{Cancellation, OperationContext};
