//! JSON files holding desired configuration and tracked state.

use std::path::Path;

use anyhow::{Context, Result};
use ruststack_s3_lifecycle::{LifecyclePolicyConfig, TrackedState};
use tracing::debug;

/// Load the desired configuration.
pub async fn load_config(path: &Path) -> Result<LifecyclePolicyConfig> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("cannot read config file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid config file {}", path.display()))
}

/// Load tracked state. A missing file means nothing is tracked.
pub async fn load_state(path: &Path) -> Result<Option<TrackedState>> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no state file");
            return Ok(None);
        }
        Err(e) => {
            return Err(e).with_context(|| format!("cannot read state file {}", path.display()));
        }
    };
    let state = serde_json::from_str(&raw)
        .with_context(|| format!("invalid state file {}", path.display()))?;
    Ok(Some(state))
}

/// Write tracked state, or remove the file when nothing is tracked.
pub async fn save_state(path: &Path, state: Option<&TrackedState>) -> Result<()> {
    match state {
        Some(state) => {
            let json = serde_json::to_string_pretty(state).context("cannot serialize state")?;
            tokio::fs::write(path, json)
                .await
                .with_context(|| format!("cannot write state file {}", path.display()))
        }
        None => match tokio::fs::remove_file(path).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                Err(e).with_context(|| format!("cannot remove state file {}", path.display()))
            }
            _ => Ok(()),
        },
    }
}

#[cfg(test)]
mod tests {
    use ruststack_s3_lifecycle::ResourceId;

    use super::*;

    #[tokio::test]
    async fn test_should_round_trip_state_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let state = TrackedState::existing(ResourceId::new("my-bucket", None), Vec::new());

        save_state(&path, Some(&state)).await.unwrap();
        let loaded = load_state(&path).await.unwrap();
        assert_eq!(loaded, Some(state));

        save_state(&path, None).await.unwrap();
        assert!(!path.exists());
        assert!(load_state(&path).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_should_reject_unknown_config_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        tokio::fs::write(&path, r#"{"bucket":"b","rule":[],"colour":"red"}"#)
            .await
            .unwrap();

        let err = tokio_test::assert_err!(load_config(&path).await);
        assert!(err.to_string().contains("invalid config file"));
    }
}
