use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use arbitrobot_monitor::mock::{MockFeed, MockFeedOptions};

#[derive(Parser)]
#[command(name = "mock-feed", about = "Mock WebSocket push feed for local development")]
struct Args {
    /// Bind address
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Listen port
    #[arg(long, default_value_t = 3001)]
    port: u16,

    /// Seconds between pushed transactions
    #[arg(long, default_value_t = 15)]
    tx_interval_secs: u64,

    /// Seconds between stats updates
    #[arg(long, default_value_t = 30)]
    stats_interval_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if args.tx_interval_secs == 0 || args.stats_interval_secs == 0 {
        anyhow::bail!("push intervals must be at least 1 second");
    }

    let bind = format!("{}:{}", args.host, args.port);
    let listener = TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    info!("Mock feed listening on ws://{bind}");
    info!(
        "Pushing a transaction every {}s and stats every {}s",
        args.tx_interval_secs, args.stats_interval_secs
    );

    let feed = MockFeed::new(MockFeedOptions {
        tx_interval: Duration::from_secs(args.tx_interval_secs),
        stats_interval: Duration::from_secs(args.stats_interval_secs),
    });
    let shutdown = CancellationToken::new();

    tokio::select! {
        result = feed.serve(listener, shutdown.clone()) => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
            shutdown.cancel();
        }
    }
    Ok(())
}
