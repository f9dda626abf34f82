//! Process-wide configuration shared by RustStack binaries.
//!
//! All configuration is driven by environment variables.

use crate::types::AwsRegion;

/// Global configuration for RustStack tools.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RustStackConfig {
    /// Default AWS region.
    pub default_region: AwsRegion,
    /// Log level.
    pub log_level: String,
    /// Endpoint override for the S3 control plane (e.g. a local emulator).
    pub endpoint_url: Option<String>,
    /// Whether to use path-style bucket addressing.
    pub force_path_style: bool,
}

impl Default for RustStackConfig {
    fn default() -> Self {
        Self {
            default_region: AwsRegion::default(),
            log_level: "info".to_owned(),
            endpoint_url: None,
            force_path_style: false,
        }
    }
}

impl RustStackConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `DEFAULT_REGION` | `us-east-1` |
    /// | `LOG_LEVEL` | `info` |
    /// | `AWS_ENDPOINT_URL` | *(unset)* |
    /// | `S3_FORCE_PATH_STYLE` | `false`, or `true` when an endpoint is set |
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("DEFAULT_REGION") {
            config.default_region = AwsRegion::new(v);
        }
        if let Ok(v) = std::env::var("LOG_LEVEL") {
            config.log_level = v;
        }
        if let Ok(v) = std::env::var("AWS_ENDPOINT_URL") {
            if !v.is_empty() {
                config.endpoint_url = Some(v);
                config.force_path_style = true;
            }
        }
        if let Ok(v) = std::env::var("S3_FORCE_PATH_STYLE") {
            config.force_path_style = parse_bool(&v);
        }

        config
    }
}

/// Parse a string as a boolean, accepting `"1"` and `"true"` (case-insensitive).
#[must_use]
pub fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}
