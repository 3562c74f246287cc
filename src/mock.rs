//! Development stand-in for the bot backend's push feed.
//!
//! Speaks the WebSocket half of the backend contract: acks subscriptions,
//! answers pings, pushes randomly generated transactions on one interval
//! and recomputed stats on another, and keeps the last 100 transactions in
//! memory.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::types::{
    GasBreakdown, ProfitBreakdown, Stats, TradeType, Transaction, TxStatus, WindowStats,
};

const TOKEN_NAMES: [&str; 8] = ["WBNB", "USDT", "BUSD", "CAKE", "ETH", "BTC", "ADA", "DOT"];

/// Retained history cap, matching the backend.
const MAX_HISTORY: usize = 100;

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn random_hex(rng: &mut impl Rng, len: usize) -> String {
    const HEX: &[u8] = b"0123456789abcdef";
    (0..len).map(|_| HEX[rng.random_range(0..16)] as char).collect()
}

/// Generate a plausible transaction. Positive profit means success;
/// losing trades split between failed and still-pending.
pub fn random_transaction(id: u64) -> Transaction {
    let mut rng = rand::rng();

    let trade_type = TradeType::ALL[rng.random_range(0..TradeType::ALL.len())];
    let token1 = TOKEN_NAMES[rng.random_range(0..TOKEN_NAMES.len())];
    let token2 = TOKEN_NAMES[rng.random_range(0..TOKEN_NAMES.len())];

    let profit_usd = rng.random::<f64>() * 30.0 - 5.0; // -5 to +25 USD
    let status = if profit_usd > 0.0 {
        TxStatus::Success
    } else if rng.random::<f64>() > 0.5 {
        TxStatus::Failed
    } else {
        TxStatus::Pending
    };

    let age_ms = rng.random_range(0..3_600_000i64); // within the last hour
    Transaction {
        id: id.to_string(),
        hash: format!("0x{}", random_hex(&mut rng, 64)),
        timestamp: Utc::now() - ChronoDuration::milliseconds(age_ms),
        block_number: 42_000_000 + rng.random_range(0..10_000u64),
        trade_type,
        route: vec![token1.to_owned(), token2.to_owned(), token1.to_owned()],
        route_addresses: vec![
            format!("0x{}", random_hex(&mut rng, 40)),
            format!("0x{}", random_hex(&mut rng, 40)),
            format!("0x{}", random_hex(&mut rng, 40)),
        ],
        profit: ProfitBreakdown {
            usd: round_to(profit_usd, 2),
            percent: round_to(profit_usd / 100.0, 4),
            bnb: round_to(profit_usd / 600.0, 6), // BNB @ $600
        },
        gas: GasBreakdown {
            used: 180_000 + rng.random_range(0..50_000u64),
            price: format!("{:.1} Gwei", 2.0 + rng.random::<f64>() * 3.0),
            cost: round_to(0.004 + rng.random::<f64>() * 0.004, 6),
        },
        status,
        error: None,
        user_id: None,
        user_address: None,
    }
}

/// Aggregate stats over the retained history, the way the backend does:
/// profit sums count successful transactions only, windows are rolling,
/// and the 30-day window covers the whole (hour-deep) history.
pub fn compute_stats(transactions: &[Transaction], now: DateTime<Utc>) -> Stats {
    let successful: Vec<&Transaction> = transactions
        .iter()
        .filter(|tx| tx.status == TxStatus::Success)
        .collect();
    let failed = transactions
        .iter()
        .filter(|tx| tx.status == TxStatus::Failed)
        .count() as u64;

    let total_profit: f64 = successful.iter().map(|tx| tx.profit.usd).sum();
    let avg_profit = if successful.is_empty() {
        0.0
    } else {
        total_profit / successful.len() as f64
    };
    let avg_gas = if transactions.is_empty() {
        0.0
    } else {
        transactions.iter().map(|tx| tx.gas.cost).sum::<f64>() / transactions.len() as f64
    };
    let success_rate = if transactions.is_empty() {
        0.0
    } else {
        successful.len() as f64 / transactions.len() as f64 * 100.0
    };

    let window = |hours: i64| -> WindowStats {
        let cutoff = now - ChronoDuration::hours(hours);
        let in_window: Vec<&Transaction> = transactions
            .iter()
            .filter(|tx| tx.timestamp > cutoff)
            .collect();
        let profit: f64 = in_window
            .iter()
            .filter(|tx| tx.status == TxStatus::Success)
            .map(|tx| tx.profit.usd)
            .sum();
        WindowStats {
            transactions: in_window.len() as u64,
            profit: round_to(profit, 2),
        }
    };

    Stats {
        total_transactions: transactions.len() as u64,
        successful_transactions: successful.len() as u64,
        failed_transactions: failed,
        total_profit: round_to(total_profit, 2),
        last_24h: window(24),
        last_7d: window(24 * 7),
        last_30d: WindowStats {
            transactions: transactions.len() as u64,
            profit: round_to(total_profit, 2),
        },
        avg_profit: round_to(avg_profit, 2),
        avg_gas: round_to(avg_gas, 6),
        success_rate: round_to(success_rate, 2),
        last_update: now,
    }
}

/// Push intervals for the mock feed.
#[derive(Debug, Clone, Copy)]
pub struct MockFeedOptions {
    pub tx_interval: Duration,
    pub stats_interval: Duration,
}

impl Default for MockFeedOptions {
    fn default() -> Self {
        Self {
            tx_interval: Duration::from_secs(15),
            stats_interval: Duration::from_secs(30),
        }
    }
}

/// Shared mock feed state. Clones serve connections off the same history.
#[derive(Clone)]
pub struct MockFeed {
    transactions: Arc<Mutex<Vec<Transaction>>>,
    next_id: Arc<AtomicU64>,
    options: MockFeedOptions,
}

impl MockFeed {
    /// Seed the feed with 50 transactions, newest first.
    pub fn new(options: MockFeedOptions) -> Self {
        let mut seed: Vec<Transaction> = (1..=50u64).map(random_transaction).collect();
        seed.sort_by_key(|tx| std::cmp::Reverse(tx.timestamp));
        Self {
            transactions: Arc::new(Mutex::new(seed)),
            next_id: Arc::new(AtomicU64::new(51)),
            options,
        }
    }

    /// Accept connections until the token is cancelled.
    pub async fn serve(&self, listener: TcpListener, shutdown: CancellationToken) -> Result<()> {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                accepted = listener.accept() => {
                    let (stream, peer) = accepted.context("accept failed")?;
                    info!("Client connected: {peer}");
                    let feed = self.clone();
                    let shutdown = shutdown.clone();
                    tokio::spawn(async move {
                        if let Err(err) = feed.handle(stream, shutdown).await {
                            debug!("Connection ended: {err}");
                        }
                        info!("Client disconnected: {peer}");
                    });
                }
            }
        }
    }

    async fn handle(&self, stream: TcpStream, shutdown: CancellationToken) -> Result<()> {
        let ws = tokio_tungstenite::accept_async(stream).await?;
        let (mut sink, mut stream) = ws.split();

        let start = tokio::time::Instant::now();
        let mut tx_timer =
            tokio::time::interval_at(start + self.options.tx_interval, self.options.tx_interval);
        let mut stats_timer = tokio::time::interval_at(
            start + self.options.stats_interval,
            self.options.stats_interval,
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    let _ = sink.send(Message::Close(None)).await;
                    return Ok(());
                }
                _ = tx_timer.tick() => {
                    let tx = self.push_transaction().await;
                    info!("Pushing transaction {} ({}, ${})", tx.id, tx.status, tx.profit.usd);
                    let data = serde_json::to_value(&tx)?;
                    sink.send(envelope("new_transaction", Some(data))).await?;
                }
                _ = stats_timer.tick() => {
                    let stats = self.stats().await;
                    debug!("Pushing stats update ({} transactions)", stats.total_transactions);
                    let data = serde_json::to_value(&stats)?;
                    sink.send(envelope("stats_update", Some(data))).await?;
                }
                msg = stream.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = reply_to(text.as_str()) {
                            sink.send(reply).await?;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return Ok(()),
                    Some(Ok(_)) => {}
                    Some(Err(err)) => return Err(err.into()),
                }
            }
        }
    }

    /// Generate, record, and return the next transaction.
    async fn push_transaction(&self) -> Transaction {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let tx = random_transaction(id);
        let mut transactions = self.transactions.lock().await;
        transactions.insert(0, tx.clone());
        transactions.truncate(MAX_HISTORY);
        tx
    }

    pub async fn stats(&self) -> Stats {
        let transactions = self.transactions.lock().await;
        compute_stats(&transactions, Utc::now())
    }
}

fn envelope(kind: &str, data: Option<serde_json::Value>) -> Message {
    let mut body = serde_json::json!({
        "type": kind,
        "timestamp": Utc::now().timestamp_millis(),
    });
    if let Some(data) = data {
        body["data"] = data;
    }
    Message::Text(body.to_string().into())
}

fn reply_to(text: &str) -> Option<Message> {
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(err) => {
            debug!("Ignoring unparseable message: {err}");
            return None;
        }
    };
    match value["type"].as_str() {
        Some("subscribe") => {
            info!("Client subscribed to {}", value["data"]["channel"]);
            Some(envelope("subscribed", Some(value["data"].clone())))
        }
        Some("unsubscribe") => {
            info!("Client unsubscribed from {}", value["data"]["channel"]);
            None
        }
        Some("ping") => Some(envelope("pong", None)),
        _ => None,
    }
}
