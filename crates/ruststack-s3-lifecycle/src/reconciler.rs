//! Reconciler: the create/read/update/delete state machine.
//!
//! ```text
//! Absent ──create──▶ Creating ──write ok──▶ Stabilizing ──2 equal reads──▶ Stable
//! Stable ──update──▶ Updating ──write ok──▶ Stabilizing
//! any    ──delete──▶ Deleting ──────────────────────────────────────────▶ Absent
//! ```
//!
//! Writes retry while the bucket is still propagating (`NoSuchBucket`).
//! Reads poll until two consecutive responses are identical, because the
//! lifecycle read path lags behind writes. How a "not found" read is
//! treated depends on [`TrackedState::new_resource`]: right after a write
//! it is lag and is retried; for an existing resource it means the
//! configuration was removed out of band.

use std::fmt;

use ruststack_core::AccountId;
use ruststack_s3_model::types::{BucketLifecycleConfiguration, LifecycleRule};
use ruststack_s3_model::{S3Error, S3ErrorCode, S3Operation};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::api::LifecycleApi;
use crate::config::LifecycleConfig;
use crate::error::{Action, LifecycleError, LifecycleResult};
use crate::identity::ResourceId;
use crate::mapper::{expand_rules, flatten_rules};
use crate::schema::{LifecyclePolicyConfig, LifecycleRuleBlock, rules_equivalent};
use crate::wait::{
    Backoff, Clock, Deadline, OperationContext, Retry, TokioClock, WaitError, poll_until, retry_until,
};

/// Error codes that mean "there is no lifecycle configuration here".
const NOT_FOUND_CODES: &[S3ErrorCode] = &[
    S3ErrorCode::NoSuchLifecycleConfiguration,
    S3ErrorCode::NoSuchBucket,
];

const NOT_VISIBLE: &str = "written rules not visible yet";

fn is_not_found(err: &S3Error) -> bool {
    err.is_code_in(NOT_FOUND_CODES)
}

/// Reconciler phases, used in log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No configuration exists.
    Absent,
    /// The initial write is in flight.
    Creating,
    /// A replacing write is in flight.
    Updating,
    /// Waiting for the read path to settle.
    Stabilizing,
    /// Two consecutive reads agreed.
    Stable,
    /// The delete is in flight.
    Deleting,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Absent => "absent",
            Self::Creating => "creating",
            Self::Updating => "updating",
            Self::Stabilizing => "stabilizing",
            Self::Stable => "stable",
            Self::Deleting => "deleting",
        })
    }
}

/// What the reconciler knows about one managed configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedState {
    /// Persisted identity.
    pub id: ResourceId,
    /// Rules as last read from the API.
    pub rules: Vec<LifecycleRuleBlock>,
    /// Set until the first successful read after creation.
    #[serde(skip)]
    pub new_resource: bool,
}

impl TrackedState {
    /// State for a resource that is known to exist.
    #[must_use]
    pub fn existing(id: ResourceId, rules: Vec<LifecycleRuleBlock>) -> Self {
        Self {
            id,
            rules,
            new_resource: false,
        }
    }
}

/// Result of reading a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The configuration exists.
    Present(TrackedState),
    /// The configuration is gone; tracked state should be dropped.
    Absent,
}

impl ReadOutcome {
    /// The state, if present.
    #[must_use]
    pub fn into_state(self) -> Option<TrackedState> {
        match self {
            Self::Present(state) => Some(state),
            Self::Absent => None,
        }
    }
}

/// What [`Reconciler::apply`] would do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// Nothing is tracked; create it.
    Create,
    /// Rules differ; replace the rule list in place.
    Update,
    /// An identity field changed; delete and re-create.
    Replace {
        /// The field that changed.
        field: &'static str,
    },
    /// Tracked rules already match.
    NoOp,
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => f.write_str("create"),
            Self::Update => f.write_str("update in place"),
            Self::Replace { field } => write!(f, "replace ({field} changed)"),
            Self::NoOp => f.write_str("no changes"),
        }
    }
}

/// A failed stabilization read.
#[derive(Debug)]
enum ReadFault {
    NotFound(S3Error),
    Api(S3Error),
    Pending(String),
}

impl fmt::Display for ReadFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(e) | Self::Api(e) => e.fmt(f),
            Self::Pending(msg) => f.write_str(msg),
        }
    }
}

/// Drives one bucket lifecycle configuration towards its desired state.
#[derive(Debug)]
pub struct Reconciler<A, C = TokioClock> {
    api: A,
    clock: C,
    config: LifecycleConfig,
}

impl<A: LifecycleApi> Reconciler<A> {
    /// Create a reconciler on the tokio clock.
    pub fn new(api: A, config: LifecycleConfig) -> Self {
        Self::with_clock(api, TokioClock::default(), config)
    }
}

impl<A: LifecycleApi, C: Clock> Reconciler<A, C> {
    /// Create a reconciler on an explicit clock.
    pub fn with_clock(api: A, clock: C, config: LifecycleConfig) -> Self {
        Self { api, clock, config }
    }

    /// The API client.
    pub fn api(&self) -> &A {
        &self.api
    }

    /// The timing configuration.
    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Create the configuration and wait for it to become readable.
    ///
    /// # Errors
    ///
    /// Validation errors before any call, [`LifecycleError::Remote`] for a
    /// fatal API fault, [`LifecycleError::Timeout`] when the bucket never
    /// appears or the operation is cancelled.
    pub async fn create(
        &self,
        ctx: &OperationContext,
        desired: &LifecyclePolicyConfig,
    ) -> LifecycleResult<TrackedState> {
        desired.validate_target()?;
        let rules = expand_rules(&desired.rule)?;
        let id = desired.resource_id();
        let op_deadline = ctx.deadline(&self.clock);

        info!(id = %id, phase = %Phase::Creating, rules = rules.len(), "creating lifecycle configuration");
        self.write_rules(ctx, op_deadline, Action::Create, &id, &rules).await?;

        let state = self
            .settle(ctx, op_deadline, Action::Create, &id, &rules, &desired.rule)
            .await?;
        Ok(state)
    }

    /// Read the configuration, waiting for two consecutive equal reads.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::Remote`] for a fatal API fault and
    /// [`LifecycleError::Timeout`] when a new resource never appears.
    pub async fn read(&self, ctx: &OperationContext, state: &TrackedState) -> LifecycleResult<ReadOutcome> {
        let op_deadline = ctx.deadline(&self.clock);
        self.read_stable(ctx, op_deadline, Action::Read, &state.id, state.new_resource, None)
            .await
    }

    /// Replace the rule list of an existing configuration.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::RequiresReplacement`] when the bucket or expected
    /// owner changed; otherwise as [`Reconciler::create`].
    pub async fn update(
        &self,
        ctx: &OperationContext,
        state: &TrackedState,
        desired: &LifecyclePolicyConfig,
    ) -> LifecycleResult<TrackedState> {
        if let Some(field) = changed_identity_field(&state.id, &desired.resource_id()) {
            return Err(LifecycleError::RequiresReplacement {
                id: state.id.encode(),
                field,
            });
        }
        desired.validate_target()?;
        let rules = expand_rules(&desired.rule)?;
        let op_deadline = ctx.deadline(&self.clock);

        info!(id = %state.id, phase = %Phase::Updating, rules = rules.len(), "updating lifecycle configuration");
        self.write_rules(ctx, op_deadline, Action::Update, &state.id, &rules)
            .await?;

        self.settle(ctx, op_deadline, Action::Update, &state.id, &rules, &desired.rule)
            .await
    }

    /// Delete the configuration. A configuration or bucket that is already
    /// gone counts as deleted.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::Remote`] for any other API fault and
    /// [`LifecycleError::Timeout`] when the operation is already cancelled.
    pub async fn delete(&self, ctx: &OperationContext, state: &TrackedState) -> LifecycleResult<()> {
        let id = &state.id;
        if ctx.cancellation().is_cancelled() {
            return Err(cancelled(Action::Delete, id));
        }
        info!(id = %id, phase = %Phase::Deleting, "deleting lifecycle configuration");

        match self
            .api
            .delete_lifecycle(id.bucket(), owner_of(id))
            .await
        {
            Ok(()) => {}
            Err(e) if is_not_found(&e) => {
                debug!(id = %id, code = %e.code, "lifecycle configuration already gone");
            }
            Err(e) => {
                return Err(LifecycleError::remote(
                    Action::Delete,
                    S3Operation::DeleteBucketLifecycle,
                    id.encode(),
                    e,
                ));
            }
        }

        info!(id = %id, phase = %Phase::Absent, "lifecycle configuration deleted");
        Ok(())
    }

    /// Adopt an existing configuration by its persisted identity.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::Format`] for a malformed id and
    /// [`LifecycleError::Remote`] when nothing exists under it.
    pub async fn import(&self, ctx: &OperationContext, id: &str) -> LifecycleResult<TrackedState> {
        let id = ResourceId::decode(id)?;
        let op_deadline = ctx.deadline(&self.clock);
        info!(id = %id, "importing lifecycle configuration");

        match self
            .read_stable(ctx, op_deadline, Action::Import, &id, false, None)
            .await?
        {
            ReadOutcome::Present(state) => Ok(state),
            ReadOutcome::Absent => Err(LifecycleError::remote(
                Action::Import,
                S3Operation::GetBucketLifecycleConfiguration,
                id.encode(),
                S3Error::no_such_lifecycle_configuration(id.bucket()),
            )),
        }
    }

    /// Compare desired configuration with tracked state.
    ///
    /// # Errors
    ///
    /// Validation errors in `desired`.
    pub fn plan(
        &self,
        state: Option<&TrackedState>,
        desired: &LifecyclePolicyConfig,
    ) -> LifecycleResult<Plan> {
        desired.validate()?;
        let Some(state) = state else {
            return Ok(Plan::Create);
        };
        if let Some(field) = changed_identity_field(&state.id, &desired.resource_id()) {
            return Ok(Plan::Replace { field });
        }
        if rules_equivalent(&state.rules, &desired.rule) {
            Ok(Plan::NoOp)
        } else {
            Ok(Plan::Update)
        }
    }

    /// Refresh tracked state, then create, update, replace or leave it.
    ///
    /// Returns the new tracked state.
    ///
    /// # Errors
    ///
    /// Any error of the underlying operations.
    pub async fn apply(
        &self,
        ctx: &OperationContext,
        state: Option<TrackedState>,
        desired: &LifecyclePolicyConfig,
    ) -> LifecycleResult<TrackedState> {
        let current = match state {
            Some(state) => self.read(ctx, &state).await?.into_state(),
            None => None,
        };

        let plan = self.plan(current.as_ref(), desired)?;
        info!(bucket = %desired.bucket, plan = %plan, "applying lifecycle configuration");

        match (plan, current) {
            (Plan::NoOp, Some(current)) => Ok(current),
            (Plan::Update, Some(current)) => self.update(ctx, &current, desired).await,
            (Plan::Replace { .. }, Some(current)) => {
                self.delete(ctx, &current).await?;
                self.create(ctx, desired).await
            }
            _ => self.create(ctx, desired).await,
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn expired(&self, op_deadline: Option<Deadline>) -> bool {
        op_deadline.is_some_and(|d| d.is_expired(&self.clock))
    }

    /// Issue the write, retrying while the bucket is not yet visible.
    async fn write_rules(
        &self,
        ctx: &OperationContext,
        op_deadline: Option<Deadline>,
        action: Action,
        id: &ResourceId,
        rules: &[LifecycleRule],
    ) -> LifecycleResult<()> {
        let api = &self.api;
        let bucket = id.bucket();
        let owner = owner_of(id);
        let deadline = Deadline::after(&self.clock, self.config.create_timeout()).min_with(op_deadline);
        let backoff = Backoff::exponential(self.config.retry_base_delay(), self.config.retry_max_delay());

        let result = retry_until(&self.clock, ctx.cancellation(), deadline, backoff, move || async move {
            let configuration = BucketLifecycleConfiguration {
                rules: rules.to_vec(),
            };
            api.put_lifecycle(bucket, owner, configuration)
                .await
                .map_err(|e| {
                    if e.code == S3ErrorCode::NoSuchBucket {
                        debug!(bucket = %bucket, "bucket not visible yet; retrying write");
                        Retry::Transient(e)
                    } else {
                        Retry::Fatal(e)
                    }
                })
        })
        .await;

        result.map_err(|err| match err {
            WaitError::Fatal(e) => {
                LifecycleError::remote(action, S3Operation::PutBucketLifecycleConfiguration, id.encode(), e)
            }
            WaitError::TimedOut { .. } if self.expired(op_deadline) => deadline_exceeded(action, id),
            WaitError::TimedOut {
                attempts,
                last_error,
            } => LifecycleError::Timeout {
                action,
                id: id.encode(),
                reason: format!(
                    "{} still failing after {attempts} attempts: {}",
                    S3Operation::PutBucketLifecycleConfiguration,
                    last_error.map_or_else(|| "no response".to_owned(), |e| e.to_string()),
                ),
            },
            WaitError::Cancelled => cancelled(action, id),
        })
    }

    /// Wait for a fresh write to become readable and report drift.
    async fn settle(
        &self,
        ctx: &OperationContext,
        op_deadline: Option<Deadline>,
        action: Action,
        id: &ResourceId,
        written: &[LifecycleRule],
        desired: &[LifecycleRuleBlock],
    ) -> LifecycleResult<TrackedState> {
        info!(id = %id, phase = %Phase::Stabilizing, "waiting for lifecycle configuration to stabilize");
        let outcome = self
            .read_stable(ctx, op_deadline, action, id, true, Some(written))
            .await?;

        let ReadOutcome::Present(state) = outcome else {
            return Err(LifecycleError::Timeout {
                action,
                id: id.encode(),
                reason: "configuration not visible after write".to_owned(),
            });
        };

        if self.config.warn_on_drift && !rules_equivalent(&state.rules, desired) {
            warn!(
                id = %id,
                "lifecycle configuration read back differs from the configuration written"
            );
        }
        info!(id = %id, phase = %Phase::Stable, rules = state.rules.len(), "lifecycle configuration is stable");
        Ok(state)
    }

    /// Poll the read path until two consecutive reads agree.
    ///
    /// With `expected`, a read that does not yet show every written rule id
    /// with its written status also counts as not settled.
    async fn read_stable(
        &self,
        ctx: &OperationContext,
        op_deadline: Option<Deadline>,
        action: Action,
        id: &ResourceId,
        new_resource: bool,
        expected: Option<&[LifecycleRule]>,
    ) -> LifecycleResult<ReadOutcome> {
        let api = &self.api;
        let bucket = id.bucket();
        let owner = owner_of(id);
        let steady = Deadline::after(&self.clock, self.config.steady_timeout());

        let result = poll_until(
            &self.clock,
            ctx.cancellation(),
            steady.min_with(op_deadline),
            self.config.poll_interval(),
            move || async move {
                match api.get_lifecycle(bucket, owner).await {
                    Ok(rules) => match expected {
                        Some(expected) if !statuses_match(expected, &rules) => {
                            Err(Retry::Transient(ReadFault::Pending(NOT_VISIBLE.to_owned())))
                        }
                        _ => Ok(rules),
                    },
                    Err(e) if is_not_found(&e) && new_resource => Err(Retry::Transient(ReadFault::NotFound(e))),
                    Err(e) if is_not_found(&e) => Err(Retry::Fatal(ReadFault::NotFound(e))),
                    Err(e) => Err(Retry::Fatal(ReadFault::Api(e))),
                }
            },
            |a, b| a == b,
        )
        .await;

        match result {
            Ok(rules) => Ok(present(id, &rules)),
            Err(WaitError::Fatal(ReadFault::NotFound(e))) => {
                warn!(id = %id, code = %e.code, "lifecycle configuration not found, removing from state");
                Ok(ReadOutcome::Absent)
            }
            Err(WaitError::Fatal(fault)) => Err(read_error(action, id, fault)),
            Err(WaitError::Cancelled) => Err(cancelled(action, id)),
            Err(WaitError::TimedOut { attempts, .. }) if self.expired(op_deadline) => {
                warn!(id = %id, attempts, "operation deadline exceeded while waiting for a stable read");
                Err(deadline_exceeded(action, id))
            }
            Err(WaitError::TimedOut {
                attempts,
                last_error,
            }) => {
                warn!(
                    id = %id,
                    attempts,
                    last_error = ?last_error.as_ref().map(ToString::to_string),
                    "lifecycle configuration did not stabilize in time; using one last read"
                );
                match self.api.get_lifecycle(bucket, owner).await {
                    Ok(rules) if expected.is_some_and(|e| !statuses_match(e, &rules)) => Err(read_error(
                        action,
                        id,
                        ReadFault::Pending(NOT_VISIBLE.to_owned()),
                    )),
                    Ok(rules) => Ok(present(id, &rules)),
                    Err(e) if is_not_found(&e) && !new_resource => {
                        warn!(id = %id, code = %e.code, "lifecycle configuration not found, removing from state");
                        Ok(ReadOutcome::Absent)
                    }
                    Err(e) if is_not_found(&e) => Err(LifecycleError::Timeout {
                        action,
                        id: id.encode(),
                        reason: e.to_string(),
                    }),
                    Err(e) => Err(read_error(action, id, ReadFault::Api(e))),
                }
            }
        }
    }
}

fn read_error(action: Action, id: &ResourceId, fault: ReadFault) -> LifecycleError {
    match fault {
        ReadFault::NotFound(e) | ReadFault::Api(e) => LifecycleError::remote(
            action,
            S3Operation::GetBucketLifecycleConfiguration,
            id.encode(),
            e,
        ),
        ReadFault::Pending(reason) => LifecycleError::Timeout {
            action,
            id: id.encode(),
            reason,
        },
    }
}

fn owner_of(id: &ResourceId) -> Option<&str> {
    id.expected_bucket_owner().map(AccountId::as_str)
}

fn present(id: &ResourceId, rules: &[LifecycleRule]) -> ReadOutcome {
    ReadOutcome::Present(TrackedState::existing(id.clone(), flatten_rules(rules)))
}

fn cancelled(action: Action, id: &ResourceId) -> LifecycleError {
    LifecycleError::Timeout {
        action,
        id: id.encode(),
        reason: "operation cancelled".to_owned(),
    }
}

fn deadline_exceeded(action: Action, id: &ResourceId) -> LifecycleError {
    LifecycleError::Timeout {
        action,
        id: id.encode(),
        reason: "operation deadline exceeded".to_owned(),
    }
}

/// Whether every written rule shows up with its written status.
fn statuses_match(expected: &[LifecycleRule], actual: &[LifecycleRule]) -> bool {
    expected.iter().all(|want| {
        actual
            .iter()
            .any(|got| got.id == want.id && got.status == want.status)
    })
}

fn changed_identity_field(current: &ResourceId, desired: &ResourceId) -> Option<&'static str> {
    if current.bucket() != desired.bucket() {
        Some("bucket")
    } else if current.expected_bucket_owner() != desired.expected_bucket_owner() {
        Some("expected_bucket_owner")
    } else {
        None
    }
}
