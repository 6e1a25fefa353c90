use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use iris_gateway::Config;
use iris_gateway::api::{self, ApiState};
use iris_gateway::vision::captioner::{Captioner, OfflineCaptioner, VisionCaptioner};

/// Iris - Realtime audio/visual perception gateway for AI assistants
#[derive(Parser)]
#[command(name = "iris", version, about)]
struct Cli {
    /// Port to listen on (overrides config and IRIS_PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Path to a TOML config file
    #[arg(short, long, env = "IRIS_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,iris_gateway=info",
        1 => "info,iris_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let captioner: Arc<dyn Captioner> = match config.captioner.api_key.clone() {
        Some(key) => {
            let mut captioner = VisionCaptioner::new(key)?;
            if let Some(model) = config.captioner.model.clone() {
                captioner = captioner.with_model(model);
            }
            Arc::new(captioner)
        }
        None => {
            tracing::warn!("no captioning API key configured, frames get offline descriptions");
            Arc::new(OfflineCaptioner)
        }
    };
    tracing::info!(captioner = captioner.name(), "captioning provider resolved");

    let state = Arc::new(ApiState::new(config, captioner));
    api::serve(state).await?;

    Ok(())
}
