//! Media repository gateway.
//!
//! ```text
//!     Client Request
//!     ───────────────▶ rate limit (optional) ──▶ dispatcher ──▶ route table
//!                                                    │              │
//!                                              ownership gate    handler
//!                                                    │              │
//!     Client Response                                ▼              ▼
//!     ◀─────────────── base headers ◀──────────── encoder ◀── HandlerResult
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use media_gateway::config::{load_config, GatewayConfig};
use media_gateway::lifecycle::{signals, startup, Shutdown, StartupError};
use media_gateway::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "media-gateway")]
#[command(about = "Media repository gateway", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "media-repo.toml")]
    config: PathBuf,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli.config).map_err(StartupError::from) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {e}", cli.config.display());
            return ExitCode::FAILURE;
        }
    };

    if cli.check {
        println!("{}: configuration ok", cli.config.display());
        return ExitCode::SUCCESS;
    }

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "media-gateway starting");

    match run(config).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: GatewayConfig) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let address = config.listen_address();
    let server = startup::prepare(config).await?;
    let tcp = startup::bind(&address).await?;
    tracing::info!(address = %address, "Listening for connections");

    let shutdown = Shutdown::new();
    let listener = shutdown.listener();
    tokio::spawn(async move { signals::watch_signals(&shutdown).await });

    server.run(tcp, listener).await?;
    Ok(())
}
