use std::time::Duration;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::MonitorConfig;
use crate::error::ApiError;
use crate::types::{
    ApiResponse, Health, PaginatedResponse, SortBy, SortOrder, Stats, Transaction,
    TransactionFilters, UserStats,
};

pub const TRANSACTIONS_ENDPOINT: &str = "/api/transactions";
pub const STATS_ENDPOINT: &str = "/api/stats";
pub const USER_STATS_ENDPOINT: &str = "/api/user/stats";
pub const USER_TRANSACTIONS_ENDPOINT: &str = "/api/user/transactions";
pub const HEALTH_ENDPOINT: &str = "/api/health";

/// REST client for the bot backend.
///
/// Every call runs under the configured deadline. Transient failures
/// (timeout, network, 5xx) are retried with a linearly increasing delay up
/// to the configured budget; 4xx responses and application-level failure
/// flags are surfaced immediately.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
    retries: u32,
    retry_delay: Duration,
}

impl ApiClient {
    pub fn new(config: &MonitorConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: config.api.base_url.trim_end_matches('/').to_owned(),
            timeout: config.api.timeout(),
            retries: config.api.retries,
            retry_delay: config.api.retry_delay(),
        })
    }

    /// Fetch a page of transactions with filters and sorting.
    pub async fn transactions(
        &self,
        filters: &TransactionFilters,
        sort_by: SortBy,
        sort_order: SortOrder,
        page: u32,
        page_size: u32,
    ) -> Result<PaginatedResponse<Transaction>, ApiError> {
        let mut query = filter_params(filters);
        query.push(("sortBy".to_owned(), sort_by.as_str().to_owned()));
        query.push(("sortOrder".to_owned(), sort_order.as_str().to_owned()));
        query.push(("page".to_owned(), page.to_string()));
        query.push(("pageSize".to_owned(), page_size.to_string()));

        let result: PaginatedResponse<Transaction> =
            self.get_json(TRANSACTIONS_ENDPOINT, &query).await?;
        debug!(
            "Fetched {} transactions (page {}/total {})",
            result.items.len(),
            result.page,
            result.total
        );
        Ok(result)
    }

    /// Fetch a single transaction by identifier.
    pub async fn transaction(&self, id: &str) -> Result<Transaction, ApiError> {
        self.get_json(&format!("{TRANSACTIONS_ENDPOINT}/{id}"), &[])
            .await
    }

    /// Fetch global aggregate statistics.
    pub async fn stats(&self) -> Result<Stats, ApiError> {
        self.get_json(STATS_ENDPOINT, &[]).await
    }

    /// Fetch per-user statistics for the given address.
    pub async fn user_stats(&self, address: &str) -> Result<UserStats, ApiError> {
        let query = vec![("address".to_owned(), address.to_owned())];
        self.get_json(USER_STATS_ENDPOINT, &query).await
    }

    /// Fetch a page of the user's own transactions.
    pub async fn user_transactions(
        &self,
        address: &str,
        filters: &TransactionFilters,
        page: u32,
        page_size: u32,
    ) -> Result<PaginatedResponse<Transaction>, ApiError> {
        let mut query = vec![("address".to_owned(), address.to_owned())];
        query.extend(filter_params(filters));
        query.push(("page".to_owned(), page.to_string()));
        query.push(("pageSize".to_owned(), page_size.to_string()));
        self.get_json(USER_TRANSACTIONS_ENDPOINT, &query).await
    }

    /// Backend health check.
    pub async fn health(&self) -> Result<Health, ApiError> {
        self.get_json(HEALTH_ENDPOINT, &[]).await
    }

    /// GET `path`, unwrap the response envelope, retry transient failures.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt: u32 = 0;
        loop {
            match self.execute(&url, query).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.retries => {
                    attempt += 1;
                    let delay = self.retry_delay * attempt;
                    warn!(
                        "GET {url} failed ({err}), retrying in {delay:?} (attempt {attempt}/{})",
                        self.retries
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(String, String)],
    ) -> Result<T, ApiError> {
        let response = self
            .http
            .get(url)
            .query(query)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(ApiError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            // Error bodies use the same envelope; fall back to the bare
            // status line when the body is not parseable.
            let message = match response.json::<ApiResponse<serde_json::Value>>().await {
                Ok(body) => body
                    .error
                    .unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
                Err(_) => format!("HTTP {}", status.as_u16()),
            };
            return Err(ApiError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let body: ApiResponse<T> = response.json().await.map_err(|err| {
            if err.is_timeout() {
                ApiError::Timeout
            } else {
                ApiError::Decode(err)
            }
        })?;

        if !body.success {
            return Err(ApiError::Api(
                body.error.unwrap_or_else(|| "API request failed".to_owned()),
            ));
        }
        body.data
            .ok_or_else(|| ApiError::Api("response missing data".to_owned()))
    }
}

fn filter_params(filters: &TransactionFilters) -> Vec<(String, String)> {
    let mut params = Vec::new();
    if let Some(status) = filters.status {
        params.push(("status".to_owned(), status.as_str().to_owned()));
    }
    if let Some(trade_type) = filters.trade_type {
        params.push(("type".to_owned(), trade_type.as_str().to_owned()));
    }
    if let Some(min_profit) = filters.min_profit {
        params.push(("minProfit".to_owned(), min_profit.to_string()));
    }
    if let Some(max_profit) = filters.max_profit {
        params.push(("maxProfit".to_owned(), max_profit.to_string()));
    }
    if let Some(start_date) = filters.start_date {
        params.push(("startDate".to_owned(), start_date.to_string()));
    }
    if let Some(end_date) = filters.end_date {
        params.push(("endDate".to_owned(), end_date.to_string()));
    }
    if let Some(tokens) = &filters.tokens {
        for token in tokens {
            params.push(("tokens".to_owned(), token.clone()));
        }
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TxStatus;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server_uri: &str, timeout_ms: u64, retries: u32) -> ApiClient {
        let mut config = MonitorConfig::default();
        config.api.base_url = server_uri.to_owned();
        config.api.timeout_ms = timeout_ms;
        config.api.retries = retries;
        config.api.retry_delay_ms = 10;
        ApiClient::new(&config).unwrap()
    }

    fn stats_body() -> serde_json::Value {
        json!({
            "success": true,
            "data": {
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
            },
            "timestamp": 1_700_000_123_456i64
        })
    }

    fn page_body() -> serde_json::Value {
        json!({
            "success": true,
            "data": {
                "items": [{
                    "id": "1",
                    "hash": "0xfeed",
                    "timestamp": 1_700_000_000_000i64,
                    "blockNumber": 42_000_001,
                    "type": "V2-V2",
                    "route": ["WBNB", "CAKE", "WBNB"],
                    "routeAddresses": ["0x0a", "0x0b", "0x0a"],
                    "profit": { "usd": 4.2, "percent": 0.042, "bnb": 0.007 },
                    "gas": { "used": 190_000, "price": "2.5 Gwei", "cost": 0.0047 },
                    "status": "success"
                }],
                "total": 1,
                "page": 1,
                "pageSize": 20,
                "hasMore": false
            },
            "timestamp": 1_700_000_000_000i64
        })
    }

    // ── retry policy ───────────────────────────────────────────────

    #[tokio::test]
    async fn retries_5xx_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(STATS_ENDPOINT))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(3)
            .expect(3)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(STATS_ENDPOINT))
            .respond_with(ResponseTemplate::new(200).set_body_json(stats_body()))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri(), 5_000, 3);
        let stats = client.stats().await.unwrap();
        assert_eq!(stats.total_transactions, 50);

        // Exactly three delayed retries after the initial attempt.
        assert_eq!(server.received_requests().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_last_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(STATS_ENDPOINT))
            .respond_with(ResponseTemplate::new(502))
            .expect(3)
            .mount(&server)
            .await;

        let client = test_client(&server.uri(), 5_000, 2);
        match client.stats().await {
            Err(ApiError::Http { status, .. }) => assert_eq!(status, 502),
            other => panic!("expected HTTP error, got {other:?}"),
        }
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn timeout_rejects_after_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(STATS_ENDPOINT))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(stats_body())
                    .set_delay(Duration::from_millis(500)),
            )
            .expect(3)
            .mount(&server)
            .await;

        let client = test_client(&server.uri(), 50, 2);
        match client.stats().await {
            Err(ApiError::Timeout) => {}
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "success": false,
                "error": "Transaction not found",
                "timestamp": 1_700_000_000_000i64
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri(), 5_000, 3);
        match client.transaction("999").await {
            Err(ApiError::Http { status, message }) => {
                assert_eq!(status, 404);
                assert_eq!(message, "Transaction not found");
            }
            other => panic!("expected HTTP error, got {other:?}"),
        }
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn application_failure_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "error": "scanner offline",
                "timestamp": 1_700_000_000_000i64
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri(), 5_000, 3);
        match client.stats().await {
            Err(ApiError::Api(message)) => assert_eq!(message, "scanner offline"),
            other => panic!("expected API error, got {other:?}"),
        }
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    // ── endpoint contract ──────────────────────────────────────────

    #[tokio::test]
    async fn transactions_sends_backend_query_params() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(TRANSACTIONS_ENDPOINT))
            .and(query_param("status", "success"))
            .and(query_param("type", "V2-V2"))
            .and(query_param("minProfit", "1.5"))
            .and(query_param("sortBy", "blockNumber"))
            .and(query_param("sortOrder", "asc"))
            .and(query_param("page", "2"))
            .and(query_param("pageSize", "50"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_body()))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri(), 5_000, 0);
        let filters = TransactionFilters {
            status: Some(TxStatus::Success),
            trade_type: Some("V2-V2".parse().unwrap()),
            min_profit: Some(1.5),
            ..Default::default()
        };
        let result = client
            .transactions(&filters, SortBy::BlockNumber, SortOrder::Asc, 2, 50)
            .await
            .unwrap();
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].id, "1");
        assert!(!result.has_more);
    }

    #[tokio::test]
    async fn health_without_envelope_timestamp() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(HEALTH_ENDPOINT))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "uptime": 12.5,
                    "timestamp": 1_700_000_000_000i64,
                    "version": "1.0.0"
                }
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri(), 5_000, 0);
        let health = client.health().await.unwrap();
        assert_eq!(health.status, "ok");
        assert_eq!(health.version.as_deref(), Some("1.0.0"));
    }
}
