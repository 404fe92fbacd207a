//! `faas-relay` CLI entry-point.
//!
//! Available sub-commands:
//! - `serve`    start a relay function host over HTTP.
//! - `validate` check a workflow definition file.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use api::AppState;
use engine::{validate_workflow, FunctionRuntime, RuntimeConfig, WorkflowCatalog};
use handlers::EchoHandler;

#[derive(Parser)]
#[command(
    name = "faas-relay",
    about = "Serverless workflow coordinator with cold-start hinting",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Host the relay function behind an HTTP endpoint.
    Serve {
        /// Overrides `RELAY_BIND`.
        #[arg(long)]
        bind: Option<SocketAddr>,
        /// Overrides `RELAY_WORKFLOWS_PATH`.
        #[arg(long)]
        workflows: Option<PathBuf>,
    },
    /// Validate a workflow definition file.
    Validate {
        /// Path to the workflow JSON file.
        path: PathBuf,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { bind, workflows } => {
            let mut config = RuntimeConfig::from_env().context("invalid relay configuration")?;
            if let Some(bind) = bind {
                config.bind = bind;
            }
            if let Some(path) = workflows {
                config.workflows_path = path;
            }

            let runtime = FunctionRuntime::from_config(&config)?;
            info!(
                workflows = %config.workflows_path.display(),
                hint_ceiling = config.hint.ceiling,
                "starting relay function"
            );
            let state = AppState::new(runtime, EchoHandler);
            api::serve(config.bind, state).await?;
        }
        Command::Validate { path } => {
            let catalog = WorkflowCatalog::load(&path)
                .await
                .with_context(|| format!("validation failed for {}", path.display()))?;

            for workflow in catalog.iter() {
                let reachable = validate_workflow(workflow)?;
                println!(
                    "{}: {} step(s), reachable from '{}': {}",
                    workflow.name,
                    workflow.workflow.len(),
                    workflow.start_at,
                    reachable.join(" -> ")
                );
            }
            println!("{} workflow(s) valid", catalog.len());
        }
    }

    Ok(())
}
