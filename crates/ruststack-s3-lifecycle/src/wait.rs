//! Polling and retry combinators with an injectable clock.
//!
//! Nothing here knows about S3. The reconciler hands in closures that issue
//! one API call each and classify the outcome as [`Retry::Transient`] or
//! [`Retry::Fatal`]; the combinators own the sleeping, the deadline and
//! cancellation.
//!
//! - [`retry_until`] repeats a call with backoff until it succeeds.
//! - [`poll_until`] repeats a read until two consecutive successful reads
//!   are equal.
//!
//! Time comes from a [`Clock`]. Production code uses [`TokioClock`]; tests
//! use [`ManualClock`], which advances instantly and records every sleep.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Source of time for the combinators.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Time elapsed since an arbitrary fixed origin.
    fn now(&self) -> Duration;

    /// Suspend for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Wall-clock time backed by the tokio timer.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    origin: tokio::time::Instant,
}

impl Default for TokioClock {
    fn default() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// A clock that only moves when slept on.
///
/// Clones share the same timeline.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    inner: Arc<Mutex<ManualClockState>>,
}

#[derive(Debug, Default)]
struct ManualClockState {
    now: Duration,
    sleeps: Vec<Duration>,
}

impl ManualClock {
    /// Create a clock at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward without recording a sleep.
    pub fn advance(&self, duration: Duration) {
        let mut state = self.inner.lock();
        state.now = state.now.saturating_add(duration);
    }

    /// Every sleep requested so far, in order.
    #[must_use]
    pub fn sleeps(&self) -> Vec<Duration> {
        self.inner.lock().sleeps.clone()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.inner.lock().now
    }

    async fn sleep(&self, duration: Duration) {
        {
            let mut state = self.inner.lock();
            state.now = state.now.saturating_add(duration);
            state.sleeps.push(duration);
        }
        tokio::task::yield_now().await;
    }
}

// ---------------------------------------------------------------------------
// Deadline, cancellation, operation context
// ---------------------------------------------------------------------------

/// A point on a [`Clock`]'s timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline(Duration);

impl Deadline {
    /// The deadline `budget` from now.
    #[must_use]
    pub fn after<C: Clock + ?Sized>(clock: &C, budget: Duration) -> Self {
        Self(clock.now().saturating_add(budget))
    }

    /// The earlier of this deadline and `other`.
    #[must_use]
    pub fn min_with(self, other: Option<Self>) -> Self {
        other.map_or(self, |other| self.min(other))
    }

    /// Time left before the deadline, zero once it has passed.
    #[must_use]
    pub fn remaining<C: Clock + ?Sized>(&self, clock: &C) -> Duration {
        self.0.saturating_sub(clock.now())
    }

    /// Whether the deadline has passed.
    #[must_use]
    pub fn is_expired<C: Clock + ?Sized>(&self, clock: &C) -> bool {
        clock.now() >= self.0
    }
}

/// Cooperative cancellation handle; clones observe the same signal.
#[derive(Debug, Clone)]
pub struct Cancellation {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for Cancellation {
    fn default() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }
}

impl Cancellation {
    /// A handle that has not been cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation to every clone.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Whether cancellation has been signalled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once cancellation is signalled.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// Per-operation deadline and cancellation handle.
#[derive(Debug, Clone, Default)]
pub struct OperationContext {
    timeout: Option<Duration>,
    cancellation: Cancellation,
}

impl OperationContext {
    /// A context with no overall timeout and a fresh cancellation handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound the whole operation by `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Use an existing cancellation handle.
    #[must_use]
    pub fn with_cancellation(mut self, cancellation: Cancellation) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// The overall timeout, if any.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// The cancellation handle.
    #[must_use]
    pub fn cancellation(&self) -> &Cancellation {
        &self.cancellation
    }

    /// The operation deadline, measured from now.
    #[must_use]
    pub fn deadline<C: Clock + ?Sized>(&self, clock: &C) -> Option<Deadline> {
        self.timeout.map(|t| Deadline::after(clock, t))
    }
}

// ---------------------------------------------------------------------------
// Backoff
// ---------------------------------------------------------------------------

/// Delay schedule between retry attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Delay after the first failed attempt.
    pub base_delay: Duration,
    /// Growth factor per attempt.
    pub multiplier: u32,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl Backoff {
    /// The same delay between every attempt.
    #[must_use]
    pub fn fixed(delay: Duration) -> Self {
        Self {
            base_delay: delay,
            multiplier: 1,
            max_delay: delay,
        }
    }

    /// Doubling delays starting at `base_delay`, capped at `max_delay`.
    #[must_use]
    pub fn exponential(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            multiplier: 2,
            max_delay,
        }
    }

    /// Delay after `attempt` failed attempts (1-indexed).
    ///
    /// `base_delay * multiplier^(attempt - 1)`, capped at `max_delay`.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

// ---------------------------------------------------------------------------
// Combinators
// ---------------------------------------------------------------------------

/// Classification of one failed attempt.
#[derive(Debug)]
pub enum Retry<E> {
    /// Worth another attempt.
    Transient(E),
    /// Give up immediately.
    Fatal(E),
}

/// Why a combinator stopped without a value.
#[derive(Debug)]
pub enum WaitError<E> {
    /// An attempt failed with a non-retryable error.
    Fatal(E),
    /// The deadline passed first.
    TimedOut {
        /// Attempts made.
        attempts: u32,
        /// The last transient error, if the last attempt failed.
        last_error: Option<E>,
    },
    /// Cancellation was signalled.
    Cancelled,
}

/// Sleep for `duration`, or return `false` early on cancellation.
async fn pause<C: Clock + ?Sized>(clock: &C, cancel: &Cancellation, duration: Duration) -> bool {
    tokio::select! {
        biased;
        () = cancel.cancelled() => false,
        () = clock.sleep(duration) => true,
    }
}

/// Run `attempt` until it succeeds, backing off between transient failures.
///
/// The first attempt always runs; later ones only while `deadline` has not
/// passed.
///
/// # Errors
///
/// [`WaitError::Fatal`] on a fatal attempt, [`WaitError::TimedOut`] when the
/// deadline passes, [`WaitError::Cancelled`] on cancellation.
pub async fn retry_until<C, T, E, F, Fut>(
    clock: &C,
    cancel: &Cancellation,
    deadline: Deadline,
    backoff: Backoff,
    mut attempt: F,
) -> Result<T, WaitError<E>>
where
    C: Clock + ?Sized,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Retry<E>>>,
{
    let mut attempts = 0u32;
    loop {
        if cancel.is_cancelled() {
            return Err(WaitError::Cancelled);
        }
        attempts += 1;
        let last_error = match attempt().await {
            Ok(value) => return Ok(value),
            Err(Retry::Fatal(e)) => return Err(WaitError::Fatal(e)),
            Err(Retry::Transient(e)) => e,
        };

        let remaining = deadline.remaining(clock);
        if remaining.is_zero() {
            return Err(WaitError::TimedOut {
                attempts,
                last_error: Some(last_error),
            });
        }
        if !pause(clock, cancel, backoff.delay(attempts).min(remaining)).await {
            return Err(WaitError::Cancelled);
        }
    }
}

/// Read until two consecutive successful reads are equal under `equal`.
///
/// A transient read error breaks the streak: the next success starts a new
/// comparison. Reads are spaced `interval` apart.
///
/// # Errors
///
/// [`WaitError::Fatal`] on a fatal read, [`WaitError::TimedOut`] when the
/// deadline passes before the reads agree, [`WaitError::Cancelled`] on
/// cancellation.
pub async fn poll_until<C, T, E, F, Fut, Same>(
    clock: &C,
    cancel: &Cancellation,
    deadline: Deadline,
    interval: Duration,
    mut read: F,
    equal: Same,
) -> Result<T, WaitError<E>>
where
    C: Clock + ?Sized,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Retry<E>>>,
    Same: Fn(&T, &T) -> bool,
{
    let mut previous: Option<T> = None;
    let mut last_error = None;
    let mut attempts = 0u32;
    loop {
        if cancel.is_cancelled() {
            return Err(WaitError::Cancelled);
        }
        if attempts > 0 && deadline.is_expired(clock) {
            return Err(WaitError::TimedOut {
                attempts,
                last_error,
            });
        }

        attempts += 1;
        match read().await {
            Ok(current) => {
                last_error = None;
                if previous.as_ref().is_some_and(|p| equal(p, &current)) {
                    return Ok(current);
                }
                previous = Some(current);
            }
            Err(Retry::Transient(e)) => {
                previous = None;
                last_error = Some(e);
            }
            Err(Retry::Fatal(e)) => return Err(WaitError::Fatal(e)),
        }

        if !pause(clock, cancel, interval.min(deadline.remaining(clock))).await {
            return Err(WaitError::Cancelled);
        }
    }
}
