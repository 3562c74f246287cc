use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use arbitrobot_monitor::PREFS_PATH;
use arbitrobot_monitor::api::ApiClient;
use arbitrobot_monitor::config::{CONFIG_PATH, MonitorConfig};
use arbitrobot_monitor::feed::{FeedClient, FeedEvent};
use arbitrobot_monitor::reporter;
use arbitrobot_monitor::store::{Preferences, TransactionStore};
use arbitrobot_monitor::types::{
    SessionSummary, SortBy, SortOrder, Subscription, TradeType, TransactionFilters, TxStatus,
};

#[derive(Parser)]
#[command(name = "feedwatch", about = "Console monitor for the arbitrage bot's live feed")]
struct Args {
    /// Config file path
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,

    /// Preferences file (filters, sort, and page size persist here)
    #[arg(long, default_value = PREFS_PATH)]
    prefs: PathBuf,

    /// Filter by status: pending, success, or failed
    #[arg(long)]
    status: Option<String>,

    /// Filter by trade type: V2-V2, V3-V3, V2-V3, or V3-V2
    #[arg(long, value_name = "TYPE")]
    trade_type: Option<String>,

    /// Sort field: timestamp, profit, gas, or blockNumber
    #[arg(long)]
    sort_by: Option<String>,

    /// Sort order: asc or desc
    #[arg(long)]
    sort_order: Option<String>,

    /// Page size for the initial fetch
    #[arg(long)]
    page_size: Option<u32>,

    /// Skip the initial REST load and go straight to the live feed
    #[arg(long)]
    live_only: bool,
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
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let mut config = MonitorConfig::load_or_default(&args.config)?;
    config.apply_env()?;

    let prefs = match Preferences::load(&args.prefs) {
        Ok(prefs) => prefs,
        Err(err) => {
            warn!("Failed to load preferences, using defaults: {err:#}");
            Preferences::default()
        }
    };
    let mut store = TransactionStore::with_preferences(prefs);
    apply_cli_overrides(&args, &config, &mut store)?;

    let api = ApiClient::new(&config)?;

    // Initial load: populate the store from REST before going live. A
    // failure here is reported and the live feed still starts; the store
    // just begins empty.
    if !args.live_only {
        info!("Fetching initial transactions and stats...");
        store.set_loading(true);
        match api
            .transactions(
                store.filters(),
                store.sort_by(),
                store.sort_order(),
                store.page(),
                store.page_size(),
            )
            .await
        {
            Ok(page) => {
                store.set_pagination_meta(page.total, page.has_more);
                store.set_transactions(page.items);
                store.set_loading(false);
                info!(
                    "Loaded {} transactions ({} matching overall)",
                    store.transactions().len(),
                    store.total()
                );
            }
            Err(err) => {
                warn!("Initial transaction fetch failed: {err}");
                store.set_error(Some(err.to_string()));
            }
        }
        match api.stats().await {
            Ok(stats) => {
                reporter::report_stats(&stats);
                store.set_stats(stats);
            }
            Err(err) => warn!("Initial stats fetch failed: {err}"),
        }
    }

    let (feed, mut events) = FeedClient::spawn(config.ws.clone());
    let filters = store.filters().clone();
    let sub_filters = (filters != TransactionFilters::default()).then_some(filters);
    feed.subscribe(Subscription::transactions(sub_filters));
    feed.subscribe(Subscription::stats());
    feed.connect();

    info!("Watching live feed. Press Ctrl+C to stop.");
    let mut summary = SessionSummary::default();
    let mut feed_failed = false;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
            event = events.recv() => match event {
                None => {
                    warn!("Feed task ended unexpectedly");
                    break;
                }
                Some(event) => {
                    if handle_event(event, &mut store, &mut summary) {
                        feed_failed = true;
                        break;
                    }
                }
            }
        }
    }

    feed.disconnect();
    if let Err(err) = store.preferences().save(&args.prefs) {
        warn!("Failed to save preferences: {err:#}");
    }

    summary.transactions_in_store = store.transactions().len();
    reporter::report_session_summary(&summary);

    if feed_failed {
        anyhow::bail!("live feed unavailable; re-run to retry");
    }
    Ok(())
}

/// Apply one feed event to the store; returns true on terminal failure.
fn handle_event(
    event: FeedEvent,
    store: &mut TransactionStore,
    summary: &mut SessionSummary,
) -> bool {
    match event {
        FeedEvent::Connected => {
            store.set_connected(true);
            info!("Live feed connected");
        }
        FeedEvent::Disconnected => {
            store.set_connected(false);
            info!("Live feed disconnected");
        }
        FeedEvent::Reconnecting { attempt } => {
            summary.reconnects += 1;
            info!("Reconnecting to live feed (attempt {attempt})");
        }
        FeedEvent::NewTransaction(tx) => {
            if store.add_transaction(tx.clone()) {
                summary.new_transactions += 1;
                reporter::report_new_transaction(&tx);
            } else {
                summary.duplicates_ignored += 1;
            }
        }
        FeedEvent::TransactionUpdate(tx) => {
            if store.update_transaction(tx.clone()) {
                summary.updates_applied += 1;
                reporter::report_transaction_update(&tx);
            } else {
                summary.updates_dropped += 1;
            }
        }
        FeedEvent::StatsUpdate(stats) => {
            summary.stats_updates += 1;
            reporter::report_stats(&stats);
            store.set_stats(stats);
        }
        FeedEvent::ServerError(message) => {
            summary.server_errors += 1;
            warn!("Feed error: {message}");
        }
        FeedEvent::ConnectionFailed { attempts } => {
            store.set_connected(false);
            store.set_error(Some(format!(
                "live feed unavailable after {attempts} reconnect attempts"
            )));
            warn!("Live feed gave up after {attempts} attempts");
            return true;
        }
    }
    false
}

fn apply_cli_overrides(
    args: &Args,
    config: &MonitorConfig,
    store: &mut TransactionStore,
) -> Result<()> {
    let mut filter_override = TransactionFilters::default();
    if let Some(status) = &args.status {
        let status: TxStatus = status
            .parse()
            .map_err(|err| anyhow::anyhow!("--status: {err}"))?;
        filter_override.status = Some(status);
    }
    if let Some(trade_type) = &args.trade_type {
        let trade_type: TradeType = trade_type
            .parse()
            .map_err(|err| anyhow::anyhow!("--trade-type: {err}"))?;
        filter_override.trade_type = Some(trade_type);
    }
    if filter_override != TransactionFilters::default() {
        store.set_filters(filter_override);
    }

    if args.sort_by.is_some() || args.sort_order.is_some() {
        let sort_by: SortBy = match &args.sort_by {
            Some(field) => field
                .parse()
                .map_err(|err| anyhow::anyhow!("--sort-by: {err}"))?,
            None => store.sort_by(),
        };
        let sort_order: SortOrder = match &args.sort_order {
            Some(order) => order
                .parse()
                .map_err(|err| anyhow::anyhow!("--sort-order: {err}"))?,
            None => store.sort_order(),
        };
        store.set_sorting(sort_by, sort_order);
    }

    if let Some(page_size) = args.page_size {
        if page_size == 0 || page_size > config.paging.max_page_size {
            anyhow::bail!(
                "--page-size must be between 1 and {}",
                config.paging.max_page_size
            );
        }
        store.set_page_size(page_size);
    }
    Ok(())
}
