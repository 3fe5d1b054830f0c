//! Query backend adapters.
//!
//! The engine never talks to a query service directly; it goes through the
//! [`QueryBackend`] trait. [`HttpQueryBackend`] speaks the submit/poll/fetch
//! protocol of a remote columnar gateway, and [`MemoryBackend`] is a
//! scripted in-memory implementation for tests and examples.

mod http;
mod memory;

pub use http::{HttpBackendConfig, HttpQueryBackend};
pub use memory::MemoryBackend;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::{Row, TableRef};

/// Failures surfaced by a query backend.
///
/// These map onto `ERROR` rule results; the engine never retries.
#[derive(Error, Debug, Clone)]
pub enum BackendError {
    /// The statement did not finish within the allowed time.
    #[error("query timed out after {seconds} seconds")]
    Timeout {
        /// Seconds waited before giving up
        seconds: u64,
    },

    /// The caller's identity may not read the target table.
    #[error("access denied: {message}")]
    AccessDenied { message: String },

    /// The engine rejected the statement text.
    #[error("SQL syntax error: {message}")]
    Syntax { message: String },

    /// The backend was unreachable or failed internally.
    #[error("backend unavailable: {message}")]
    Unavailable { message: String },
}

impl BackendError {
    /// Creates an access-denied error.
    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::AccessDenied {
            message: message.into(),
        }
    }

    /// Creates a syntax error.
    pub fn syntax(message: impl Into<String>) -> Self {
        Self::Syntax {
            message: message.into(),
        }
    }

    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

/// Result type for backend operations.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// A result column's name and declared type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Column name as returned by the engine.
    pub name: String,
    /// Engine-declared type string.
    pub data_type: String,
}

/// A catalog column description, as returned by schema introspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    /// Column name.
    pub name: String,
    /// Declared type string (engine dialect).
    pub data_type: String,
    /// Whether the column admits nulls.
    pub nullable: bool,
    /// Zero-based position in the table definition.
    pub ordinal: usize,
}

impl ColumnSchema {
    /// Creates a nullable column schema at the given position.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, ordinal: usize) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            ordinal,
        }
    }
}

/// Rows plus execution metadata for one executed statement.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryOutput {
    /// Result rows in engine order.
    pub rows: Vec<Row>,
    /// Result columns in engine order.
    pub columns: Vec<ColumnInfo>,
    /// Engine-reported execution time.
    pub duration_ms: u64,
    /// Engine-reported bytes scanned.
    pub bytes_scanned: u64,
}

impl QueryOutput {
    /// Builds an output from rows, deriving column metadata from the first
    /// row's keys.
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let columns = rows
            .first()
            .map(|row| {
                row.keys()
                    .map(|name| ColumnInfo {
                        name: name.clone(),
                        data_type: "unknown".to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self {
            rows,
            columns,
            duration_ms: 0,
            bytes_scanned: 0,
        }
    }

    /// Builds a single-row, single-column scalar output.
    pub fn scalar(column: impl Into<String>, value: i64) -> Self {
        let column = column.into();
        let mut row = Row::new();
        row.insert(column.clone(), serde_json::Value::from(value));
        Self {
            rows: vec![row],
            columns: vec![ColumnInfo {
                name: column,
                data_type: "bigint".to_string(),
            }],
            duration_ms: 0,
            bytes_scanned: 0,
        }
    }

    /// Reads the first row's value for `column` as an integer, if present.
    pub fn first_i64(&self, column: &str) -> Option<i64> {
        let value = self.rows.first()?.get(column)?;
        match value {
            serde_json::Value::Number(n) => n.as_i64(),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

/// Executes SQL against a remote engine and introspects table schemas.
///
/// Implementations enforce their own transport timeouts; the engine adds a
/// request-level timeout on top and classifies both as `ERROR` results.
/// Retrying is out of scope for the core.
#[async_trait]
pub trait QueryBackend: Send + Sync {
    /// Executes a single statement and returns rows plus metadata.
    async fn execute(&self, sql: &str) -> BackendResult<QueryOutput>;

    /// Returns the catalog schema for a table.
    async fn table_schema(&self, table: &TableRef) -> BackendResult<Vec<ColumnSchema>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_output_round_trip() {
        let output = QueryOutput::scalar("row_count", 1234);
        assert_eq!(output.first_i64("row_count"), Some(1234));
        assert_eq!(output.columns.len(), 1);
        assert_eq!(output.columns[0].name, "row_count");
    }

    #[test]
    fn test_first_i64_parses_string_values() {
        let mut row = Row::new();
        row.insert("n".to_string(), serde_json::Value::from("42"));
        let output = QueryOutput::from_rows(vec![row]);
        assert_eq!(output.first_i64("n"), Some(42));
        assert_eq!(output.first_i64("missing"), None);
    }

    #[test]
    fn test_from_rows_derives_columns() {
        let mut row = Row::new();
        row.insert("a".to_string(), serde_json::Value::from(1));
        row.insert("b".to_string(), serde_json::Value::from("x"));
        let output = QueryOutput::from_rows(vec![row]);
        let names: Vec<_> = output.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_error_display() {
        let err = BackendError::Timeout { seconds: 300 };
        assert_eq!(err.to_string(), "query timed out after 300 seconds");
        let err = BackendError::syntax("mismatched input 'FORM'");
        assert!(err.to_string().contains("mismatched input"));
    }
}
