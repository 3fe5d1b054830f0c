//! Qualified table references.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParityError;

/// A fully qualified `database.table` reference on the remote engine.
///
/// Parsed from the `"db.table"` form used throughout the CLI and the
/// translator output; anything without exactly one dot separating two
/// non-empty identifiers is a configuration error.
///
/// # Examples
///
/// ```rust
/// use parity_guard::core::TableRef;
///
/// let table: TableRef = "ecomm_mart.fact_bill_line".parse().unwrap();
/// assert_eq!(table.database(), "ecomm_mart");
/// assert_eq!(table.table(), "fact_bill_line");
/// assert!("no_database".parse::<TableRef>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TableRef {
    database: String,
    table: String,
}

impl TableRef {
    /// Creates a table reference from already separated parts.
    pub fn new(database: impl Into<String>, table: impl Into<String>) -> Result<Self, ParityError> {
        let database = database.into();
        let table = table.into();
        if database.trim().is_empty() || table.trim().is_empty() {
            return Err(ParityError::configuration(
                "table reference requires non-empty database and table names",
            ));
        }
        if !is_identifier(&database) || !is_identifier(&table) {
            return Err(ParityError::configuration(format!(
                "invalid table reference '{database}.{table}': names may contain only \
                 alphanumerics and underscores"
            )));
        }
        Ok(Self { database, table })
    }

    /// The database (catalog schema) part.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// The bare table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// The `db.table` form used in generated SQL.
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.database, self.table)
    }
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl FromStr for TableRef {
    type Err = ParityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.split_once('.') {
            Some((database, table)) if !table.contains('.') => Self::new(database, table),
            _ => Err(ParityError::configuration(format!(
                "invalid table reference '{trimmed}': expected 'database.table'"
            ))),
        }
    }
}

impl TryFrom<String> for TableRef {
    type Error = ParityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TableRef> for String {
    fn from(value: TableRef) -> Self {
        value.qualified()
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        let table: TableRef = "ecomm_mart.fact_bill_line".parse().unwrap();
        assert_eq!(table.database(), "ecomm_mart");
        assert_eq!(table.table(), "fact_bill_line");
        assert_eq!(table.qualified(), "ecomm_mart.fact_bill_line");
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let table: TableRef = "  sales.orders  ".parse().unwrap();
        assert_eq!(table.to_string(), "sales.orders");
    }

    #[test]
    fn test_parse_rejects_missing_database() {
        assert!("orders".parse::<TableRef>().is_err());
    }

    #[test]
    fn test_parse_rejects_extra_dots() {
        assert!("catalog.sales.orders".parse::<TableRef>().is_err());
    }

    #[test]
    fn test_parse_rejects_empty_parts() {
        assert!(".orders".parse::<TableRef>().is_err());
        assert!("sales.".parse::<TableRef>().is_err());
    }

    #[test]
    fn test_rejects_injection_characters() {
        assert!("sales.orders; DROP TABLE x".parse::<TableRef>().is_err());
        assert!("sales.orders--".parse::<TableRef>().is_err());
    }

    #[test]
    fn test_serde_round_trip() {
        let table: TableRef = "sales.orders".parse().unwrap();
        let json = serde_json::to_string(&table).unwrap();
        assert_eq!(json, "\"sales.orders\"");
        let back: TableRef = serde_json::from_str(&json).unwrap();
        assert_eq!(back, table);
    }
}
