//! Trading desk service entry point.

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Multi-venue perpetuals trading desk core
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via HLDESK_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Account-value report interval in seconds
    #[arg(long, default_value_t = 60)]
    report_interval: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // TLS crypto provider must be installed before any WS connections.
    hldesk_ws::init_crypto();

    let args = Args::parse();

    hldesk_telemetry::init_logging()?;

    info!("Starting hldesk v{}", env!("CARGO_PKG_VERSION"));

    let config = match args.config {
        Some(path) => hldesk_app::AppConfig::from_file(&path)?,
        None => hldesk_app::AppConfig::load()?,
    };
    info!(venues = config.venues.len(), "Configuration loaded");

    let manager = hldesk_app::ExchangeManager::from_config(&config);
    for venue in manager.hl_venues() {
        venue.warm_streams();
    }

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            signal_token.cancel();
        }
    });

    let mut report = tokio::time::interval(std::time::Duration::from_secs(args.report_interval));
    report.tick().await; // first tick fires immediately
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = report.tick() => {
                for venue in manager.hl_venues() {
                    info!(
                        venue = venue.name(),
                        account_value = %venue.total_account_value(),
                        spot_value_usdc = %venue.spot_portfolio_value_usdc(),
                        "venue snapshot"
                    );
                }
            }
        }
    }

    manager.close_all();
    info!("Shutdown complete");
    Ok(())
}
