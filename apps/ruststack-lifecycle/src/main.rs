//! RustStack lifecycle - reconcile an S3 bucket lifecycle configuration.
//!
//! # Usage
//!
//! ```text
//! ruststack-lifecycle apply   --config lifecycle.json --state state.json
//! ruststack-lifecycle plan    --config lifecycle.json --state state.json
//! ruststack-lifecycle read    --state state.json
//! ruststack-lifecycle destroy --state state.json
//! ruststack-lifecycle import  my-bucket,111122223333 --state state.json
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `DEFAULT_REGION` | `us-east-1` | Region of the S3 client |
//! | `AWS_ENDPOINT_URL` | *(unset)* | Endpoint override, e.g. a local emulator |
//! | `S3_FORCE_PATH_STYLE` | `false` | Path-style addressing |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |
//! | `LIFECYCLE_*` | | Timing knobs, see `LifecycleConfig::from_env` |

mod state;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ruststack_core::RustStackConfig;
use ruststack_s3_lifecycle::{
    Cancellation, LifecycleApi, LifecycleConfig, OperationContext, Plan, ReadOutcome, Reconciler,
    SdkLifecycleApi,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Reconcile an S3 bucket lifecycle configuration against a JSON definition.
#[derive(Debug, Parser)]
#[command(name = "ruststack-lifecycle", version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Overall time budget in seconds for the operation.
    #[arg(long, global = true)]
    timeout: Option<u64>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create or update the configuration to match the config file.
    Apply {
        /// Desired configuration (JSON).
        #[arg(long)]
        config: PathBuf,
        /// Tracked state (JSON); created if missing.
        #[arg(long)]
        state: PathBuf,
    },
    /// Show what `apply` would do.
    Plan {
        /// Desired configuration (JSON).
        #[arg(long)]
        config: PathBuf,
        /// Tracked state (JSON).
        #[arg(long)]
        state: PathBuf,
    },
    /// Refresh tracked state from the API.
    Read {
        /// Tracked state (JSON).
        #[arg(long)]
        state: PathBuf,
    },
    /// Delete the configuration and forget it.
    Destroy {
        /// Tracked state (JSON).
        #[arg(long)]
        state: PathBuf,
    },
    /// Adopt an existing configuration by id (`BUCKET` or `BUCKET,OWNER`).
    Import {
        /// Resource id.
        id: String,
        /// Tracked state (JSON) to write.
        #[arg(long)]
        state: PathBuf,
    },
}

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` config value.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

/// Build the operation context; Ctrl-C cancels the in-flight operation.
fn operation_context(timeout: Option<u64>) -> OperationContext {
    let cancellation = Cancellation::new();
    let on_signal = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received interrupt, cancelling");
            on_signal.cancel();
        }
    });

    let ctx = OperationContext::new().with_cancellation(cancellation);
    match timeout {
        Some(secs) => ctx.with_timeout(std::time::Duration::from_secs(secs)),
        None => ctx,
    }
}

async fn run<A: LifecycleApi>(reconciler: &Reconciler<A>, ctx: &OperationContext, command: Command) -> Result<()> {
    match command {
        Command::Apply { config, state } => {
            let desired = state::load_config(&config).await?;
            let current = state::load_state(&state).await?;
            let applied = reconciler.apply(ctx, current, &desired).await?;
            state::save_state(&state, Some(&applied)).await?;
            println!("applied {} rule(s) to {}", applied.rules.len(), applied.id);
        }
        Command::Plan { config, state } => {
            let desired = state::load_config(&config).await?;
            let current = state::load_state(&state).await?;
            let refreshed = match current {
                Some(current) => reconciler.read(ctx, &current).await?.into_state(),
                None => None,
            };
            let plan = reconciler.plan(refreshed.as_ref(), &desired)?;
            if plan == Plan::NoOp {
                println!("{}: up to date", desired.bucket);
            } else {
                println!("{}: {plan}", desired.bucket);
            }
        }
        Command::Read { state } => {
            let Some(current) = state::load_state(&state).await? else {
                anyhow::bail!("nothing tracked in {}", state.display());
            };
            match reconciler.read(ctx, &current).await? {
                ReadOutcome::Present(refreshed) => {
                    state::save_state(&state, Some(&refreshed)).await?;
                    println!("{}", serde_json::to_string_pretty(&refreshed)?);
                }
                ReadOutcome::Absent => {
                    state::save_state(&state, None).await?;
                    println!("{} no longer exists; state removed", current.id);
                }
            }
        }
        Command::Destroy { state } => {
            let Some(current) = state::load_state(&state).await? else {
                println!("nothing to destroy");
                return Ok(());
            };
            reconciler.delete(ctx, &current).await?;
            state::save_state(&state, None).await?;
            println!("destroyed {}", current.id);
        }
        Command::Import { id, state } => {
            let imported = reconciler.import(ctx, &id).await?;
            state::save_state(&state, Some(&imported)).await?;
            println!("imported {} rule(s) from {}", imported.rules.len(), imported.id);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let core = RustStackConfig::from_env();

    init_tracing(&core.log_level)?;

    let lifecycle = LifecycleConfig::from_env();
    info!(
        region = %core.default_region,
        endpoint_url = ?core.endpoint_url,
        steady_timeout_secs = lifecycle.steady_timeout_secs,
        "starting RustStack lifecycle",
    );

    let api = SdkLifecycleApi::from_config(&core).await;
    let reconciler = Reconciler::new(api, lifecycle);
    let ctx = operation_context(args.timeout);

    run(&reconciler, &ctx, args.command).await
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_should_have_valid_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_should_parse_import_command() {
        let args = Args::parse_from([
            "ruststack-lifecycle",
            "import",
            "my-bucket,111122223333",
            "--state",
            "state.json",
            "--timeout",
            "30",
        ]);
        assert_eq!(args.timeout, Some(30));
        assert!(matches!(
            args.command,
            Command::Import { ref id, .. } if id == "my-bucket,111122223333"
        ));
    }
}
