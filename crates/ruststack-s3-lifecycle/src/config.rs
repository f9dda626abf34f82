//! Reconciler timing configuration.
//!
//! Provides [`LifecycleConfig`], the knobs for the write-retry and
//! stabilization loops. Values are loaded from environment variables with
//! defaults that match the S3 control plane's observed propagation delay.

use std::time::Duration;

use ruststack_core::parse_bool;
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// Lifecycle reconciler configuration.
///
/// # Examples
///
/// ```
/// use ruststack_s3_lifecycle::config::LifecycleConfig;
///
/// let config = LifecycleConfig::default();
/// assert_eq!(config.poll_interval().as_secs(), 5);
/// assert_eq!(config.steady_timeout().as_secs(), 120);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleConfig {
    /// Budget for retrying the initial write while the bucket is still propagating.
    #[builder(default = 120)]
    pub create_timeout_secs: u64,

    /// Budget for the two-consecutive-equal-reads stabilization wait.
    #[builder(default = 120)]
    pub steady_timeout_secs: u64,

    /// Minimum spacing between stabilization reads.
    #[builder(default = 5)]
    pub poll_interval_secs: u64,

    /// First delay of the write-retry backoff.
    #[builder(default = 500)]
    pub retry_base_delay_ms: u64,

    /// Ceiling of the write-retry backoff.
    #[builder(default = 10_000)]
    pub retry_max_delay_ms: u64,

    /// Whether a drifted read right after a write is logged at `warn` level.
    #[builder(default = true)]
    pub warn_on_drift: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            create_timeout_secs: 120,
            steady_timeout_secs: 120,
            poll_interval_secs: 5,
            retry_base_delay_ms: 500,
            retry_max_delay_ms: 10_000,
            warn_on_drift: true,
        }
    }
}

impl LifecycleConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `LIFECYCLE_CREATE_TIMEOUT_SECS` | `120` |
    /// | `LIFECYCLE_STEADY_TIMEOUT_SECS` | `120` |
    /// | `LIFECYCLE_POLL_INTERVAL_SECS` | `5` |
    /// | `LIFECYCLE_RETRY_BASE_DELAY_MS` | `500` |
    /// | `LIFECYCLE_RETRY_MAX_DELAY_MS` | `10000` |
    /// | `LIFECYCLE_WARN_ON_DRIFT` | `true` |
    ///
    /// Unparseable numbers are ignored and the default is kept.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(n) = env_u64("LIFECYCLE_CREATE_TIMEOUT_SECS") {
            config.create_timeout_secs = n;
        }
        if let Some(n) = env_u64("LIFECYCLE_STEADY_TIMEOUT_SECS") {
            config.steady_timeout_secs = n;
        }
        if let Some(n) = env_u64("LIFECYCLE_POLL_INTERVAL_SECS") {
            config.poll_interval_secs = n;
        }
        if let Some(n) = env_u64("LIFECYCLE_RETRY_BASE_DELAY_MS") {
            config.retry_base_delay_ms = n;
        }
        if let Some(n) = env_u64("LIFECYCLE_RETRY_MAX_DELAY_MS") {
            config.retry_max_delay_ms = n;
        }
        if let Ok(v) = std::env::var("LIFECYCLE_WARN_ON_DRIFT") {
            config.warn_on_drift = parse_bool(&v);
        }

        config
    }

    /// Budget for the create-time write retry.
    #[must_use]
    pub fn create_timeout(&self) -> Duration {
        Duration::from_secs(self.create_timeout_secs)
    }

    /// Budget for stabilization polling.
    #[must_use]
    pub fn steady_timeout(&self) -> Duration {
        Duration::from_secs(self.steady_timeout_secs)
    }

    /// Spacing between stabilization reads, never less than one second.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    /// First write-retry delay.
    #[must_use]
    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    /// Maximum write-retry delay.
    #[must_use]
    pub fn retry_max_delay(&self) -> Duration {
        Duration::from_millis(self.retry_max_delay_ms)
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_create_default_config() {
        let config = LifecycleConfig::default();
        assert_eq!(config.create_timeout(), Duration::from_secs(120));
        assert_eq!(config.steady_timeout(), Duration::from_secs(120));
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.retry_base_delay(), Duration::from_millis(500));
        assert_eq!(config.retry_max_delay(), Duration::from_secs(10));
        assert!(config.warn_on_drift);
    }

    #[test]
    fn test_should_clamp_zero_poll_interval() {
        let config = LifecycleConfig::builder().poll_interval_secs(0).build();
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_should_match_builder_defaults() {
        assert_eq!(LifecycleConfig::builder().build(), LifecycleConfig::default());
    }

    #[test]
    fn test_should_build_with_typed_builder() {
        let config = LifecycleConfig::builder()
            .steady_timeout_secs(30)
            .poll_interval_secs(1)
            .warn_on_drift(false)
            .build();

        assert_eq!(config.steady_timeout(), Duration::from_secs(30));
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.create_timeout_secs, 120);
        assert!(!config.warn_on_drift);
    }

    #[test]
    fn test_should_serialize_to_camel_case_json() {
        let json = serde_json::to_string(&LifecycleConfig::default()).expect("test serialization");
        assert!(json.contains("steadyTimeoutSecs"));
        assert!(json.contains("pollIntervalSecs"));
    }

    #[test]
    fn test_should_load_from_env() {
        let config = LifecycleConfig::from_env();
        assert!(config.retry_max_delay_ms >= 1);
    }
}
