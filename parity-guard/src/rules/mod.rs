//! SQL template builders for the validation rule kinds.
//!
//! Builders are pure: a [`ValidationPlan`] plus a [`BuildContext`] map to a
//! list of annotated SQL statements. Dispatch lives in [`build_sql`]; adding
//! a rule kind means adding one module and one match arm.
//!
//! Generated SQL targets the Presto/Trino dialect spoken by Athena-style
//! engines (`TRY_CAST`, `IS DISTINCT FROM`).

mod guard;
mod key_uniqueness;
mod mismatch;
mod missing;
mod profile;
mod row_count;
mod schema;

pub use guard::ensure_read_only;
pub use schema::{compare_schemas, normalize_type, SchemaDiff};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::{DateFilter, RuleKind, TableRef, ValidationPlan};
use crate::error::{ParityError, Result};

/// What shape of result a statement is expected to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultShape {
    /// A single row with one or more counters.
    ScalarCount,
    /// An ordered row set (samples, frequency breakdowns).
    RowSet,
    /// A row set of key tuples.
    KeyList,
}

/// One generated statement, annotated with its role in the rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlStatement {
    /// Stable label the classifier matches on (`legacy_count`, ...).
    pub label: String,
    /// Expected result shape.
    pub shape: ResultShape,
    /// Statement text.
    pub sql: String,
}

impl SqlStatement {
    /// Creates a statement with the given label and shape.
    pub fn new(label: impl Into<String>, shape: ResultShape, sql: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            shape,
            sql: sql.into(),
        }
    }
}

/// The statements generated for one plan, in execution order.
pub type SqlSet = Vec<SqlStatement>;

/// Catalog context available while building SQL.
///
/// The engine populates `table_columns` whenever a plan needs column
/// knowledge (date-filter placement, derived profile columns); tables
/// absent from the map are treated as having unknown columns and date
/// filters are applied to them unconditionally.
#[derive(Debug, Clone, Default)]
pub struct BuildContext {
    /// Bound on sample rows in offender queries.
    pub sample_limit: usize,
    /// Known column names per qualified table name.
    pub table_columns: HashMap<String, Vec<String>>,
}

impl BuildContext {
    /// Creates a context with the given sample bound.
    pub fn new(sample_limit: usize) -> Self {
        Self {
            sample_limit,
            table_columns: HashMap::new(),
        }
    }

    /// Records the known columns of a table.
    pub fn with_columns<I, S>(mut self, table: &TableRef, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.table_columns
            .insert(table.qualified(), columns.into_iter().map(Into::into).collect());
        self
    }

    /// Known columns of a table, if the catalog was consulted.
    pub fn columns(&self, table: &TableRef) -> Option<&[String]> {
        self.table_columns.get(&table.qualified()).map(|c| c.as_slice())
    }

    /// Whether a date filter on `column` applies to `table`: true when the
    /// table declares the column, or when its columns are unknown.
    pub fn filter_applies(&self, table: &TableRef, column: &str) -> bool {
        match self.columns(table) {
            Some(columns) => columns.iter().any(|c| c == column),
            None => true,
        }
    }
}

/// Generates the SQL set for a plan.
///
/// The plan must already have passed [`ValidationPlan::validate`]; builders
/// only add checks SQL generation itself needs (identifier hygiene, guard
/// on caller-supplied SQL).
pub fn build_sql(plan: &ValidationPlan, ctx: &BuildContext) -> Result<SqlSet> {
    match plan.kind {
        RuleKind::RowCount => row_count::build(plan, ctx),
        RuleKind::KeyUniqueness => key_uniqueness::build(plan, ctx),
        // Schema comparison runs on catalog introspection, not SQL.
        RuleKind::SchemaComparison => Ok(Vec::new()),
        RuleKind::MismatchDetection => mismatch::build(plan, ctx),
        RuleKind::MissingRecords => missing::build(plan, ctx),
        RuleKind::Profile => profile::build(plan, ctx),
        RuleKind::CustomSql => build_custom(plan),
    }
}

fn build_custom(plan: &ValidationPlan) -> Result<SqlSet> {
    let mut statements = Vec::new();
    if let Some(sql) = &plan.params.legacy_sql {
        ensure_read_only(sql)?;
        statements.push(SqlStatement::new("custom_legacy", ResultShape::RowSet, sql));
    }
    if let Some(sql) = &plan.params.prod_sql {
        ensure_read_only(sql)?;
        statements.push(SqlStatement::new("custom_prod", ResultShape::RowSet, sql));
    }
    Ok(statements)
}

/// Rejects column names that are not plain identifiers.
pub(crate) fn check_identifier(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ParityError::configuration(format!(
            "invalid column identifier '{name}'"
        )))
    }
}

/// Renders the inclusive date predicate for one table (optionally aliased).
///
/// `TRY_CAST` tolerates VARCHAR date columns the way the engines this
/// targets store partition dates.
pub(crate) fn date_predicate(filter: &DateFilter, alias: Option<&str>) -> String {
    let column = match alias {
        Some(alias) => format!("{alias}.{}", filter.column),
        None => filter.column.clone(),
    };
    format!(
        "TRY_CAST({column} AS DATE) >= DATE '{}' AND TRY_CAST({column} AS DATE) <= DATE '{}'",
        filter.start, filter.end
    )
}

/// Renders `WHERE c1 AND c2 ...` or an empty string.
pub(crate) fn where_clause(conditions: &[String]) -> String {
    if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_check_identifier() {
        assert!(check_identifier("bill_id").is_ok());
        assert!(check_identifier("Bill_Line_2").is_ok());
        assert!(check_identifier("").is_err());
        assert!(check_identifier("id; DROP").is_err());
        assert!(check_identifier("a.b").is_err());
    }

    #[test]
    fn test_date_predicate_rendering() {
        let filter = DateFilter::new(
            "bill_date",
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
        )
        .unwrap();

        assert_eq!(
            date_predicate(&filter, None),
            "TRY_CAST(bill_date AS DATE) >= DATE '2024-01-01' \
             AND TRY_CAST(bill_date AS DATE) <= DATE '2024-06-30'"
        );
        assert!(date_predicate(&filter, Some("l")).starts_with("TRY_CAST(l.bill_date"));
    }

    #[test]
    fn test_where_clause_empty() {
        assert_eq!(where_clause(&[]), "");
        assert_eq!(where_clause(&["a = 1".to_string()]), " WHERE a = 1");
    }

    #[test]
    fn test_filter_applies_with_unknown_columns() {
        let table: TableRef = "sales.orders".parse().unwrap();
        let ctx = BuildContext::new(10);
        assert!(ctx.filter_applies(&table, "bill_date"));

        let ctx = ctx.with_columns(&table, ["id", "amount"]);
        assert!(!ctx.filter_applies(&table, "bill_date"));
        assert!(ctx.filter_applies(&table, "amount"));
    }

    #[test]
    fn test_custom_sql_guarded() {
        let table: TableRef = "sales.orders".parse().unwrap();
        let mut params = crate::core::RuleParams::default();
        params.legacy_sql = Some("DROP TABLE sales.orders".to_string());
        let plan =
            ValidationPlan::new(RuleKind::CustomSql, vec![table]).with_params(params);

        assert!(build_sql(&plan, &BuildContext::new(10)).is_err());
    }
}
