//! HTTP gateway backend.
//!
//! Speaks the asynchronous submit/poll/fetch protocol exposed by remote
//! columnar engines behind a REST gateway: a statement is submitted, its
//! state polled until terminal, and rows fetched on success.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::time::Instant;
use tracing::{debug, instrument};

use crate::backend::{
    BackendError, BackendResult, ColumnInfo, ColumnSchema, QueryBackend, QueryOutput,
};
use crate::config::Secret;
use crate::core::{Row, TableRef};

/// Configuration for [`HttpQueryBackend`].
#[derive(Debug, Clone)]
pub struct HttpBackendConfig {
    /// Gateway base URL, e.g. `https://query-gateway.internal`.
    pub endpoint: String,
    /// Bearer token presented on every request, if the gateway requires one.
    pub api_key: Option<Secret>,
    /// Delay between state polls.
    pub poll_interval: Duration,
    /// Overall deadline for one statement, submission to rows.
    pub query_timeout: Duration,
}

impl HttpBackendConfig {
    /// Creates a configuration for the given gateway endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: None,
            poll_interval: Duration::from_secs(1),
            query_timeout: Duration::from_secs(300),
        }
    }

    /// Sets the bearer token.
    pub fn with_api_key(mut self, key: Secret) -> Self {
        self.api_key = Some(key);
        self
    }

    /// Sets the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the per-statement deadline.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }
}

/// [`QueryBackend`] implementation over a REST query gateway.
pub struct HttpQueryBackend {
    config: HttpBackendConfig,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    query_id: String,
}

#[derive(Debug, Deserialize)]
struct StateResponse {
    state: QueryState,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    duration_ms: u64,
    #[serde(default)]
    bytes_scanned: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum QueryState {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

#[derive(Debug, Deserialize)]
struct ResultsResponse {
    #[serde(default)]
    columns: Vec<ColumnInfo>,
    #[serde(default)]
    rows: Vec<Row>,
}

#[derive(Debug, Deserialize)]
struct SchemaResponse {
    columns: Vec<ColumnSchema>,
}

impl HttpQueryBackend {
    /// Creates a backend from configuration.
    pub fn new(config: HttpBackendConfig) -> BackendResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| BackendError::unavailable(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.bearer_auth(key.expose()),
            None => request,
        }
    }

    async fn submit(&self, sql: &str) -> BackendResult<String> {
        let url = format!("{}/v1/queries", self.config.endpoint);
        let response = self
            .authorize(self.client.post(&url))
            .json(&serde_json::json!({ "sql": sql }))
            .send()
            .await
            .map_err(|e| BackendError::unavailable(e.to_string()))?;

        let submit: SubmitResponse = Self::decode(response).await?;
        debug!(query_id = %submit.query_id, "statement submitted");
        Ok(submit.query_id)
    }

    async fn poll_state(&self, query_id: &str) -> BackendResult<StateResponse> {
        let url = format!("{}/v1/queries/{query_id}", self.config.endpoint);
        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|e| BackendError::unavailable(e.to_string()))?;
        Self::decode(response).await
    }

    async fn fetch_rows(&self, query_id: &str) -> BackendResult<ResultsResponse> {
        let url = format!("{}/v1/queries/{query_id}/results", self.config.endpoint);
        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|e| BackendError::unavailable(e.to_string()))?;
        Self::decode(response).await
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> BackendResult<T> {
        let status = response.status();
        if status.is_success() {
            response
                .json::<T>()
                .await
                .map_err(|e| BackendError::unavailable(format!("malformed gateway response: {e}")))
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(match status.as_u16() {
                401 | 403 => BackendError::access_denied(body),
                400 => BackendError::syntax(body),
                _ => BackendError::unavailable(format!("gateway returned {status}: {body}")),
            })
        }
    }

    /// Classifies a terminal FAILED state by its engine message.
    fn classify_failure(message: &str) -> BackendError {
        let lower = message.to_ascii_lowercase();
        if lower.contains("access denied") || lower.contains("permission") {
            BackendError::access_denied(message)
        } else if lower.contains("mismatched input")
            || lower.contains("syntax")
            || lower.contains("cannot be resolved")
        {
            BackendError::syntax(message)
        } else {
            BackendError::unavailable(message)
        }
    }
}

#[async_trait]
impl QueryBackend for HttpQueryBackend {
    #[instrument(skip(self, sql), fields(endpoint = %self.config.endpoint))]
    async fn execute(&self, sql: &str) -> BackendResult<QueryOutput> {
        let deadline = Instant::now() + self.config.query_timeout;
        let query_id = self.submit(sql).await?;

        let state = loop {
            if Instant::now() >= deadline {
                return Err(BackendError::Timeout {
                    seconds: self.config.query_timeout.as_secs(),
                });
            }

            let state = self.poll_state(&query_id).await?;
            match state.state {
                QueryState::Succeeded => break state,
                QueryState::Failed => {
                    let message = state.error.unwrap_or_else(|| "unknown failure".to_string());
                    return Err(Self::classify_failure(&message));
                }
                QueryState::Cancelled => {
                    return Err(BackendError::unavailable("query was cancelled"));
                }
                QueryState::Queued | QueryState::Running => {
                    tokio::time::sleep(self.config.poll_interval).await;
                }
            }
        };

        let results = self.fetch_rows(&query_id).await?;
        debug!(
            query_id = %query_id,
            rows = results.rows.len(),
            duration_ms = state.duration_ms,
            "statement completed"
        );

        Ok(QueryOutput {
            rows: results.rows,
            columns: results.columns,
            duration_ms: state.duration_ms,
            bytes_scanned: state.bytes_scanned,
        })
    }

    async fn table_schema(&self, table: &TableRef) -> BackendResult<Vec<ColumnSchema>> {
        let url = format!(
            "{}/v1/catalog/{}/{}",
            self.config.endpoint,
            table.database(),
            table.table()
        );
        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|e| BackendError::unavailable(e.to_string()))?;
        let schema: SchemaResponse = Self::decode(response).await?;
        Ok(schema.columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_trailing_slash_is_trimmed() {
        let config = HttpBackendConfig::new("https://gateway.example/");
        assert_eq!(config.endpoint, "https://gateway.example");
    }

    #[test]
    fn test_failure_classification() {
        assert!(matches!(
            HttpQueryBackend::classify_failure("line 1:8: mismatched input 'FORM'"),
            BackendError::Syntax { .. }
        ));
        assert!(matches!(
            HttpQueryBackend::classify_failure("Access Denied: table sales.orders"),
            BackendError::AccessDenied { .. }
        ));
        assert!(matches!(
            HttpQueryBackend::classify_failure("worker node crashed"),
            BackendError::Unavailable { .. }
        ));
    }

    #[tokio::test]
    async fn test_unreachable_gateway_is_unavailable() {
        let backend = HttpQueryBackend::new(
            HttpBackendConfig::new("http://127.0.0.1:1").with_poll_interval(Duration::from_millis(1)),
        )
        .unwrap();

        let err = backend.execute("SELECT 1").await.unwrap_err();
        assert!(matches!(err, BackendError::Unavailable { .. }));
    }
}
