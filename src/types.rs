use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// DEX pair a trade was routed through (buy venue - sell venue).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeType {
    #[serde(rename = "V2-V2")]
    V2V2,
    #[serde(rename = "V3-V3")]
    V3V3,
    #[serde(rename = "V2-V3")]
    V2V3,
    #[serde(rename = "V3-V2")]
    V3V2,
}

impl TradeType {
    pub const ALL: [TradeType; 4] = [
        TradeType::V2V2,
        TradeType::V3V3,
        TradeType::V2V3,
        TradeType::V3V2,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TradeType::V2V2 => "V2-V2",
            TradeType::V3V3 => "V3-V3",
            TradeType::V2V3 => "V2-V3",
            TradeType::V3V2 => "V3-V2",
        }
    }
}

impl fmt::Display for TradeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "V2-V2" => Ok(TradeType::V2V2),
            "V3-V3" => Ok(TradeType::V3V3),
            "V2-V3" => Ok(TradeType::V2V3),
            "V3-V2" => Ok(TradeType::V3V2),
            other => Err(format!("unknown trade type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Success,
    Failed,
}

impl TxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxStatus::Pending => "pending",
            TxStatus::Success => "success",
            TxStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TxStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TxStatus::Pending),
            "success" => Ok(TxStatus::Success),
            "failed" => Ok(TxStatus::Failed),
            other => Err(format!("unknown status: {other}")),
        }
    }
}

/// Profit of a single arbitrage round-trip, as reported by the bot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfitBreakdown {
    pub usd: f64,
    pub percent: f64,
    pub bnb: f64,
}

/// Gas accounting for a transaction. `price` is a display string in Gwei.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GasBreakdown {
    pub used: u64,
    pub price: String,
    pub cost: f64,
}

/// A single arbitrage transaction pushed by the backend.
///
/// The identifier is immutable; the server may push the same transaction
/// again as an update when its status settles (pending → success/failed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub hash: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub block_number: u64,
    #[serde(rename = "type")]
    pub trade_type: TradeType,
    pub route: Vec<String>,
    pub route_addresses: Vec<String>,
    pub profit: ProfitBreakdown,
    pub gas: GasBreakdown,
    pub status: TxStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_address: Option<String>,
}

/// Transaction count and profit over a rolling time window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowStats {
    pub transactions: u64,
    pub profit: f64,
}

/// Global aggregate statistics. Replaced wholesale on every fetch or push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total_transactions: u64,
    pub successful_transactions: u64,
    pub failed_transactions: u64,
    pub total_profit: f64,
    #[serde(rename = "last24h")]
    pub last_24h: WindowStats,
    #[serde(rename = "last7d")]
    pub last_7d: WindowStats,
    #[serde(rename = "last30d")]
    pub last_30d: WindowStats,
    pub avg_profit: f64,
    pub avg_gas: f64,
    pub success_rate: f64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_update: DateTime<Utc>,
}

/// Per-address statistics for an authenticated user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub user_id: String,
    pub user_address: String,
    pub total_transactions: u64,
    pub successful_transactions: u64,
    pub failed_transactions: u64,
    pub total_profit: f64,
    pub avg_profit: f64,
    pub success_rate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentile: Option<f64>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub first_transaction: Option<DateTime<Utc>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub last_transaction: Option<DateTime<Utc>>,
    pub active_days: u32,
}

/// Health check payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uptime: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Top-level envelope every REST response is wrapped in.
///
/// `success: false` with a 200 status is an application-level failure and
/// carries the server-supplied message in `error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub timestamp: Option<DateTime<Utc>>,
}

/// One page of a paginated listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub has_more: bool,
}

/// Server-side filter set for transaction listings. `None` means "all".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TxStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "type")]
    pub trade_type: Option<TradeType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_profit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_profit: Option<f64>,
    /// Epoch milliseconds, inclusive lower bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<i64>,
    /// Epoch milliseconds, inclusive upper bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<Vec<String>>,
}

impl TransactionFilters {
    /// Merge `other` into `self`, field by field. `None` fields in `other`
    /// leave the current value untouched (partial update, like the UI).
    pub fn merge(&mut self, other: TransactionFilters) {
        if other.status.is_some() {
            self.status = other.status;
        }
        if other.trade_type.is_some() {
            self.trade_type = other.trade_type;
        }
        if other.min_profit.is_some() {
            self.min_profit = other.min_profit;
        }
        if other.max_profit.is_some() {
            self.max_profit = other.max_profit;
        }
        if other.start_date.is_some() {
            self.start_date = other.start_date;
        }
        if other.end_date.is_some() {
            self.end_date = other.end_date;
        }
        if other.tokens.is_some() {
            self.tokens = other.tokens;
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortBy {
    #[default]
    Timestamp,
    Profit,
    Gas,
    BlockNumber,
}

impl SortBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortBy::Timestamp => "timestamp",
            SortBy::Profit => "profit",
            SortBy::Gas => "gas",
            SortBy::BlockNumber => "blockNumber",
        }
    }
}

impl FromStr for SortBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "timestamp" => Ok(SortBy::Timestamp),
            "profit" => Ok(SortBy::Profit),
            "gas" => Ok(SortBy::Gas),
            "blockNumber" => Ok(SortBy::BlockNumber),
            other => Err(format!("unknown sort field: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(format!("unknown sort order: {other}")),
        }
    }
}

/// Named push topic a client can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Transactions,
    Stats,
    User,
}

/// A (channel, optional filter) pair. Uniqueness is by structural equality
/// of the serialized pair; the feed client replays the full set on every
/// reconnect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub channel: Channel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<TransactionFilters>,
}

impl Subscription {
    pub fn transactions(filters: Option<TransactionFilters>) -> Self {
        Self {
            channel: Channel::Transactions,
            filters,
        }
    }

    pub fn stats() -> Self {
        Self {
            channel: Channel::Stats,
            filters: None,
        }
    }

    /// Canonical identity used for subscription dedup.
    pub fn key(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{self:?}"))
    }
}

/// Client → server WebSocket messages, serialized as `{ "type": ..., ... }`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe {
        data: Subscription,
        #[serde(with = "chrono::serde::ts_milliseconds")]
        timestamp: DateTime<Utc>,
    },
    Unsubscribe {
        data: Subscription,
        #[serde(with = "chrono::serde::ts_milliseconds")]
        timestamp: DateTime<Utc>,
    },
    Ping {
        #[serde(with = "chrono::serde::ts_milliseconds")]
        timestamp: DateTime<Utc>,
    },
}

impl ClientMessage {
    pub fn subscribe(subscription: Subscription) -> Self {
        ClientMessage::Subscribe {
            data: subscription,
            timestamp: Utc::now(),
        }
    }

    pub fn unsubscribe(subscription: Subscription) -> Self {
        ClientMessage::Unsubscribe {
            data: subscription,
            timestamp: Utc::now(),
        }
    }

    pub fn ping() -> Self {
        ClientMessage::Ping {
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WsEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// Server → client WebSocket messages.
///
/// Message types outside the known set decode to `Unknown` so a newer
/// server can add types without breaking older clients.
#[derive(Debug, Clone)]
pub enum ServerMessage {
    NewTransaction(Transaction),
    TransactionUpdate(Transaction),
    StatsUpdate(Stats),
    Pong,
    Error(String),
    Unknown(String),
}

impl ServerMessage {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let envelope: WsEnvelope = serde_json::from_str(text)?;
        Ok(match envelope.kind.as_str() {
            "new_transaction" => ServerMessage::NewTransaction(serde_json::from_value(envelope.data)?),
            "transaction_update" => {
                ServerMessage::TransactionUpdate(serde_json::from_value(envelope.data)?)
            }
            "stats_update" => ServerMessage::StatsUpdate(serde_json::from_value(envelope.data)?),
            "pong" => ServerMessage::Pong,
            "error" => {
                let message = envelope
                    .data
                    .as_str()
                    .map(str::to_owned)
                    .unwrap_or_else(|| envelope.data.to_string());
                ServerMessage::Error(message)
            }
            other => ServerMessage::Unknown(other.to_owned()),
        })
    }
}

/// Counters accumulated by `feedwatch` over one session, printed on exit.
#[derive(Debug, Default, Clone, Serialize)]
pub struct SessionSummary {
    pub new_transactions: u64,
    pub duplicates_ignored: u64,
    pub updates_applied: u64,
    pub updates_dropped: u64,
    pub stats_updates: u64,
    pub server_errors: u64,
    pub reconnects: u64,
    pub transactions_in_store: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_tx_json() -> serde_json::Value {
        json!({
            "id": "42",
            "hash": "0xabc0000000000000000000000000000000000000000000000000000000000000",
            "timestamp": 1_700_000_000_000i64,
            "blockNumber": 42_001_337,
            "type": "V2-V3",
            "route": ["WBNB", "USDT", "WBNB"],
            "routeAddresses": ["0x01", "0x02", "0x01"],
            "profit": { "usd": 12.34, "percent": 0.1234, "bnb": 0.020567 },
            "gas": { "used": 201_500, "price": "3.2 Gwei", "cost": 0.005821 },
            "status": "success"
        })
    }

    #[test]
    fn transaction_wire_format() {
        let tx: Transaction = serde_json::from_value(sample_tx_json()).unwrap();
        assert_eq!(tx.id, "42");
        assert_eq!(tx.block_number, 42_001_337);
        assert_eq!(tx.trade_type, TradeType::V2V3);
        assert_eq!(tx.status, TxStatus::Success);
        assert_eq!(tx.timestamp.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(tx.route, vec!["WBNB", "USDT", "WBNB"]);
        assert!(tx.user_id.is_none());

        // Serialization keeps the backend's camelCase keys and ms timestamps.
        let back = serde_json::to_value(&tx).unwrap();
        assert_eq!(back["blockNumber"], 42_001_337);
        assert_eq!(back["type"], "V2-V3");
        assert_eq!(back["timestamp"], 1_700_000_000_000i64);
        assert!(back.get("userId").is_none());
    }

    #[test]
    fn stats_wire_format() {
        let stats: Stats = serde_json::from_value(json!({
            "totalTransactions": 50,
            "successfulTransactions": 30,
            "failedTransactions": 12,
            "totalProfit": 412.55,
            "last24h": { "transactions": 50, "profit": 412.55 },
            "last7d": { "transactions": 50, "profit": 412.55 },
            "last30d": { "transactions": 50, "profit": 412.55 },
            "avgProfit": 13.75,
            "avgGas": 0.005911,
            "successRate": 60.0,
            "lastUpdate": 1_700_000_123_456i64
        }))
        .unwrap();
        assert_eq!(stats.total_transactions, 50);
        assert_eq!(stats.last_24h.transactions, 50);
        assert_eq!(stats.last_update.timestamp_millis(), 1_700_000_123_456);
    }

    // ── ServerMessage::parse ───────────────────────────────────────

    #[test]
    fn parse_new_transaction() {
        let msg = json!({
            "type": "new_transaction",
            "data": sample_tx_json(),
            "timestamp": 1_700_000_000_001i64
        });
        match ServerMessage::parse(&msg.to_string()).unwrap() {
            ServerMessage::NewTransaction(tx) => assert_eq!(tx.id, "42"),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn parse_pong_and_unknown() {
        let pong = json!({ "type": "pong", "timestamp": 1i64 });
        assert!(matches!(
            ServerMessage::parse(&pong.to_string()).unwrap(),
            ServerMessage::Pong
        ));

        // The mock backend acks subscriptions with a type the client never
        // defined; it must decode to Unknown, not fail.
        let ack = json!({ "type": "subscribed", "data": { "channel": "stats" }, "timestamp": 1i64 });
        match ServerMessage::parse(&ack.to_string()).unwrap() {
            ServerMessage::Unknown(kind) => assert_eq!(kind, "subscribed"),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn parse_error_message() {
        let err = json!({ "type": "error", "data": "subscription rejected", "timestamp": 1i64 });
        match ServerMessage::parse(&err.to_string()).unwrap() {
            ServerMessage::Error(message) => assert_eq!(message, "subscription rejected"),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn parse_rejects_non_json() {
        assert!(ServerMessage::parse("not json").is_err());
    }

    // ── ClientMessage / Subscription ───────────────────────────────

    #[test]
    fn subscribe_serializes_with_type_tag() {
        let msg = ClientMessage::subscribe(Subscription::stats());
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "subscribe");
        assert_eq!(value["data"]["channel"], "stats");
        assert!(value["timestamp"].is_i64());
    }

    #[test]
    fn subscription_key_is_structural() {
        let filters = TransactionFilters {
            status: Some(TxStatus::Success),
            ..Default::default()
        };
        let a = Subscription::transactions(Some(filters.clone()));
        let b = Subscription::transactions(Some(filters));
        let c = Subscription::transactions(None);
        assert_eq!(a.key(), b.key());
        assert_ne!(a.key(), c.key());
        assert_ne!(a.key(), Subscription::stats().key());
    }

    #[test]
    fn filters_merge_is_partial() {
        let mut filters = TransactionFilters {
            status: Some(TxStatus::Success),
            min_profit: Some(1.0),
            ..Default::default()
        };
        filters.merge(TransactionFilters {
            trade_type: Some(TradeType::V2V2),
            ..Default::default()
        });
        assert_eq!(filters.status, Some(TxStatus::Success));
        assert_eq!(filters.trade_type, Some(TradeType::V2V2));
        assert_eq!(filters.min_profit, Some(1.0));
    }
}
