use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use vecgate::config::GatewayConfig;
use vecgate::gateway::Gateway;
use vecgate::{cli, http};

#[derive(Parser)]
#[command(
    name = "vecgate",
    version,
    about = "Embedding gateway with pluggable providers and vector document storage"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP gateway
    Serve,
    /// Manage the local embedding model
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
}

#[derive(Subcommand)]
enum ModelAction {
    /// Download the embedding model to ~/.vecgate/models/
    Download,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let config = GatewayConfig::load()?;

    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match args.command {
        Command::Serve => {
            let (gateway, report) = Gateway::bootstrap(&config);
            for step in &report.steps {
                if step.outcome.is_success() {
                    tracing::info!(step = step.step, "startup step ok");
                } else {
                    tracing::warn!(
                        step = step.step,
                        reason = step.outcome.reason.as_deref().unwrap_or("unknown"),
                        "startup step failed"
                    );
                }
            }
            anyhow::ensure!(
                report.succeeded(),
                "vector store connection failed — gateway cannot start"
            );

            http::serve(Arc::new(gateway), &config.server).await?;
        }
        Command::Model { action } => match action {
            ModelAction::Download => {
                cli::model_download(&config.provider.local).await?;
            }
        },
    }

    Ok(())
}
