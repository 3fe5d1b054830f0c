//! Scripted in-memory backend for tests and examples.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::backend::{BackendError, BackendResult, ColumnSchema, QueryBackend, QueryOutput};
use crate::core::TableRef;

/// An in-memory [`QueryBackend`] that answers statements from a script.
///
/// Responses are registered against SQL fragments; the first registered
/// fragment contained in an executed statement wins. Statements with no
/// matching script entry fail as unavailable, which keeps tests honest
/// about the SQL they expect to run.
///
/// # Examples
///
/// ```rust
/// use parity_guard::backend::{MemoryBackend, QueryBackend, QueryOutput};
///
/// # async fn example() {
/// let backend = MemoryBackend::new()
///     .with_response("FROM legacy.orders", QueryOutput::scalar("row_count", 1000))
///     .with_response("FROM prod.orders", QueryOutput::scalar("row_count", 1000));
///
/// let out = backend.execute("SELECT COUNT(*) AS row_count FROM legacy.orders").await.unwrap();
/// assert_eq!(out.first_i64("row_count"), Some(1000));
/// # }
/// ```
#[derive(Default)]
pub struct MemoryBackend {
    responses: Vec<(String, QueryOutput)>,
    failures: Vec<(String, BackendError)>,
    schemas: HashMap<String, Vec<ColumnSchema>>,
    executed: Mutex<Vec<String>>,
}

impl MemoryBackend {
    /// Creates an empty scripted backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a response for statements containing `fragment`.
    pub fn with_response(mut self, fragment: impl Into<String>, output: QueryOutput) -> Self {
        self.responses.push((fragment.into(), output));
        self
    }

    /// Registers a failure for statements containing `fragment`.
    pub fn with_failure(mut self, fragment: impl Into<String>, error: BackendError) -> Self {
        self.failures.push((fragment.into(), error));
        self
    }

    /// Registers a catalog schema for a table.
    pub fn with_schema(mut self, table: &TableRef, columns: Vec<ColumnSchema>) -> Self {
        self.schemas.insert(table.qualified(), columns);
        self
    }

    /// Statements executed so far, in call order.
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().map(|log| log.clone()).unwrap_or_default()
    }

    /// Number of statements executed so far.
    pub fn executed_count(&self) -> usize {
        self.executed.lock().map(|log| log.len()).unwrap_or(0)
    }
}

#[async_trait]
impl QueryBackend for MemoryBackend {
    async fn execute(&self, sql: &str) -> BackendResult<QueryOutput> {
        if let Ok(mut log) = self.executed.lock() {
            log.push(sql.to_string());
        }

        if let Some((_, error)) = self.failures.iter().find(|(frag, _)| sql.contains(frag)) {
            return Err(error.clone());
        }

        self.responses
            .iter()
            .find(|(frag, _)| sql.contains(frag))
            .map(|(_, output)| output.clone())
            .ok_or_else(|| BackendError::unavailable(format!("no scripted response for: {sql}")))
    }

    async fn table_schema(&self, table: &TableRef) -> BackendResult<Vec<ColumnSchema>> {
        self.schemas
            .get(&table.qualified())
            .cloned()
            .ok_or_else(|| {
                BackendError::unavailable(format!("no scripted schema for table {table}"))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(name: &str) -> TableRef {
        name.parse().unwrap()
    }

    #[tokio::test]
    async fn test_scripted_response_matches_fragment() {
        let backend = MemoryBackend::new()
            .with_response("legacy.orders", QueryOutput::scalar("row_count", 7));

        let out = backend
            .execute("SELECT COUNT(*) AS row_count FROM legacy.orders")
            .await
            .unwrap();
        assert_eq!(out.first_i64("row_count"), Some(7));
        assert_eq!(backend.executed_count(), 1);
    }

    #[tokio::test]
    async fn test_unscripted_statement_fails() {
        let backend = MemoryBackend::new();
        let err = backend.execute("SELECT 1").await.unwrap_err();
        assert!(matches!(err, BackendError::Unavailable { .. }));
    }

    #[tokio::test]
    async fn test_scripted_failure_takes_precedence() {
        let backend = MemoryBackend::new()
            .with_response("orders", QueryOutput::scalar("row_count", 7))
            .with_failure("orders", BackendError::access_denied("no grant"));

        let err = backend
            .execute("SELECT COUNT(*) AS row_count FROM legacy.orders")
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::AccessDenied { .. }));
    }

    #[tokio::test]
    async fn test_schema_lookup() {
        let orders = table("legacy.orders");
        let backend = MemoryBackend::new().with_schema(
            &orders,
            vec![
                ColumnSchema::new("id", "bigint", 0),
                ColumnSchema::new("name", "varchar", 1),
            ],
        );

        let schema = backend.table_schema(&orders).await.unwrap();
        assert_eq!(schema.len(), 2);
        assert!(backend.table_schema(&table("x.missing")).await.is_err());
    }
}
