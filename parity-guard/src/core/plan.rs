//! Validation plans: the typed description of one rule execution.
//!
//! A [`ValidationPlan`] is produced either directly from CLI parameters or
//! by the translation adapter from a natural-language request. The rule
//! kinds form a closed set; translator output that does not fit this schema
//! is rejected rather than executed best-effort.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::core::TableRef;
use crate::error::{ParityError, Result};

/// The closed set of validation rule kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// Compare total row counts between the two tables (tolerance-based).
    RowCount,
    /// Count key tuples that occur more than once per table.
    KeyUniqueness,
    /// Compare column names and declared types between the two tables, or
    /// summarize a single table's schema.
    SchemaComparison,
    /// Join both tables on the key and count rows whose compare columns
    /// differ.
    MismatchDetection,
    /// Find key values present on one side only, tagged by source.
    MissingRecords,
    /// Column-level null/distinct/top-value profiling of a single table.
    Profile,
    /// Caller- or translator-supplied SQL pair, compared result-to-result.
    CustomSql,
}

impl RuleKind {
    /// Stable snake_case identifier, used in fingerprints and output.
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::RowCount => "row_count",
            RuleKind::KeyUniqueness => "key_uniqueness",
            RuleKind::SchemaComparison => "schema_comparison",
            RuleKind::MismatchDetection => "mismatch_detection",
            RuleKind::MissingRecords => "missing_records",
            RuleKind::Profile => "profile",
            RuleKind::CustomSql => "custom_sql",
        }
    }

    /// Human-readable rule name used in reports.
    pub fn display_name(&self) -> &'static str {
        match self {
            RuleKind::RowCount => "Row Count",
            RuleKind::KeyUniqueness => "Primary Key Uniqueness",
            RuleKind::SchemaComparison => "Schema Comparison",
            RuleKind::MismatchDetection => "Mismatch Detection",
            RuleKind::MissingRecords => "Missing Record Detection",
            RuleKind::Profile => "Profile",
            RuleKind::CustomSql => "Custom SQL",
        }
    }

    /// Whether legacy/prod table order is semantically irrelevant for this
    /// rule. Order-independent rules canonicalize table order in their
    /// cache fingerprints.
    pub fn order_independent(&self) -> bool {
        matches!(self, RuleKind::RowCount | RuleKind::SchemaComparison)
    }
}

impl std::fmt::Display for RuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ordered, possibly composite, primary key.
///
/// Column order is preserved for `GROUP BY` / `JOIN ON` generation, but two
/// specs naming the same columns in different order are semantically equal.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeySpec(Vec<String>);

impl KeySpec {
    /// Creates a key spec; at least one column is required.
    pub fn new<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns
            .into_iter()
            .map(Into::into)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        if columns.is_empty() {
            return Err(ParityError::configuration(
                "key specification requires at least one column",
            ));
        }
        Ok(Self(columns))
    }

    /// Parses a comma-separated key list (`"bill_id,bill_line_num"`).
    pub fn parse(spec: &str) -> Result<Self> {
        Self::new(spec.split(','))
    }

    /// Key columns in declaration order.
    pub fn columns(&self) -> &[String] {
        &self.0
    }

    /// Key columns sorted, for order-insensitive comparison and hashing.
    pub fn sorted(&self) -> Vec<String> {
        let mut sorted = self.0.clone();
        sorted.sort();
        sorted
    }
}

impl PartialEq for KeySpec {
    fn eq(&self, other: &Self) -> bool {
        self.sorted() == other.sorted()
    }
}

/// An inclusive date-range restriction on a named column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateFilter {
    /// Column holding the date (DATE or castable VARCHAR).
    pub column: String,
    /// First day included.
    pub start: NaiveDate,
    /// Last day included.
    pub end: NaiveDate,
}

impl DateFilter {
    /// Creates a date filter, rejecting inverted ranges.
    pub fn new(column: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Result<Self> {
        let column = column.into();
        if column.trim().is_empty() {
            return Err(ParityError::configuration(
                "date filter requires a column name",
            ));
        }
        if end < start {
            return Err(ParityError::configuration(format!(
                "date filter range is inverted: {start} > {end}"
            )));
        }
        Ok(Self {
            column: column.trim().to_string(),
            start,
            end,
        })
    }
}

/// Rule-specific parameters carried alongside a plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleParams {
    /// Row-count tolerance override, as a percentage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tolerance: Option<f64>,
    /// Columns compared side-by-side in mismatch detection.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub compare_columns: Vec<String>,
    /// Explicit `ON` clause overriding key-based joins.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_condition: Option<String>,
    /// Override for the sample-row bound on FAIL results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_limit: Option<usize>,
    /// Columns profiled for nulls/distincts (empty: derive from the schema).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub profile_columns: Vec<String>,
    /// Columns given top-N category frequency breakdowns.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub category_columns: Vec<String>,
    /// Top-N bound for category frequencies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_n: Option<usize>,
    /// SCD2 current-record flag column; when set, profiling restricts to
    /// rows where the flag is true.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_flag: Option<String>,
    /// Caller-supplied SQL for the legacy side (custom rule only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legacy_sql: Option<String>,
    /// Caller-supplied SQL for the production side (custom rule only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prod_sql: Option<String>,
    /// Translator-provided explanation of custom SQL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// A fully specified validation intent for one rule execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationPlan {
    /// Which rule to run.
    pub kind: RuleKind,
    /// One table (profiling, single-table rules) or legacy-then-prod.
    pub tables: Vec<TableRef>,
    /// Primary key, where the rule needs one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys: Option<KeySpec>,
    /// Optional inclusive date-range restriction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_filter: Option<DateFilter>,
    /// Rule-specific parameters.
    #[serde(default)]
    pub params: RuleParams,
    /// The natural-language request this plan was resolved from, when the
    /// translator produced it. Participates in the cache fingerprint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_request: Option<String>,
}

impl ValidationPlan {
    /// Creates a plan with the given kind and tables; refine with the
    /// `with_*` methods and check with [`ValidationPlan::validate`].
    pub fn new(kind: RuleKind, tables: Vec<TableRef>) -> Self {
        Self {
            kind,
            tables,
            keys: None,
            date_filter: None,
            params: RuleParams::default(),
            source_request: None,
        }
    }

    /// Sets the key specification.
    pub fn with_keys(mut self, keys: KeySpec) -> Self {
        self.keys = Some(keys);
        self
    }

    /// Sets the date filter.
    pub fn with_date_filter(mut self, filter: DateFilter) -> Self {
        self.date_filter = Some(filter);
        self
    }

    /// Sets rule-specific parameters.
    pub fn with_params(mut self, params: RuleParams) -> Self {
        self.params = params;
        self
    }

    /// Records the natural-language request this plan was resolved from.
    pub fn with_source_request(mut self, request: impl Into<String>) -> Self {
        self.source_request = Some(request.into());
        self
    }

    /// The legacy-side table (first listed).
    pub fn legacy(&self) -> &TableRef {
        &self.tables[0]
    }

    /// The production-side table, when the plan compares two tables.
    pub fn prod(&self) -> Option<&TableRef> {
        self.tables.get(1)
    }

    /// Checks the structural invariants for this plan's rule kind.
    ///
    /// Called before any SQL is generated or cached; a failure here is a
    /// configuration error and no execution is attempted.
    pub fn validate(&self) -> Result<()> {
        let rule = self.kind.as_str();
        match self.tables.len() {
            1 | 2 => {}
            n => {
                return Err(ParityError::invalid_plan(
                    rule,
                    format!("expected 1 or 2 tables, got {n}"),
                ))
            }
        }

        match self.kind {
            RuleKind::RowCount | RuleKind::SchemaComparison => {}
            RuleKind::KeyUniqueness => {
                if self.keys.is_none() {
                    return Err(ParityError::invalid_plan(rule, "requires key columns"));
                }
            }
            RuleKind::MismatchDetection => {
                if self.tables.len() != 2 {
                    return Err(ParityError::invalid_plan(rule, "requires two tables"));
                }
                if self.keys.is_none() && self.params.join_condition.is_none() {
                    return Err(ParityError::invalid_plan(
                        rule,
                        "requires key columns or an explicit join condition",
                    ));
                }
                if self.params.compare_columns.is_empty() {
                    return Err(ParityError::invalid_plan(
                        rule,
                        "requires at least one compare column",
                    ));
                }
            }
            RuleKind::MissingRecords => {
                if self.tables.len() != 2 {
                    return Err(ParityError::invalid_plan(rule, "requires two tables"));
                }
                if self.keys.is_none() {
                    return Err(ParityError::invalid_plan(rule, "requires key columns"));
                }
            }
            RuleKind::Profile => {
                if self.tables.len() != 1 {
                    return Err(ParityError::invalid_plan(rule, "profiles exactly one table"));
                }
            }
            RuleKind::CustomSql => {
                if self.params.legacy_sql.is_none() {
                    return Err(ParityError::invalid_plan(rule, "requires legacy SQL"));
                }
                if self.tables.len() == 2 && self.params.prod_sql.is_none() {
                    return Err(ParityError::invalid_plan(
                        rule,
                        "requires production SQL when two tables are named",
                    ));
                }
            }
        }

        Ok(())
    }
}

/// Partial plan information handed to the translator alongside free text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanHints {
    /// Tables the request is known to be about.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tables: Vec<TableRef>,
    /// Known primary key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys: Option<KeySpec>,
    /// Known date restriction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_filter: Option<DateFilter>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(name: &str) -> TableRef {
        name.parse().unwrap()
    }

    #[test]
    fn test_key_spec_set_equality() {
        let a = KeySpec::parse("bill_id,bill_line_num").unwrap();
        let b = KeySpec::parse("bill_line_num, bill_id").unwrap();
        assert_eq!(a, b);
        // Generation order is preserved even though equality ignores it.
        assert_eq!(a.columns(), &["bill_id", "bill_line_num"]);
        assert_eq!(b.columns(), &["bill_line_num", "bill_id"]);
    }

    #[test]
    fn test_key_spec_rejects_empty() {
        assert!(KeySpec::parse("").is_err());
        assert!(KeySpec::parse(" , ").is_err());
    }

    #[test]
    fn test_date_filter_rejects_inverted_range() {
        let start = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert!(DateFilter::new("bill_date", start, end).is_err());
        assert!(DateFilter::new("bill_date", end, start).is_ok());
    }

    #[test]
    fn test_mismatch_plan_requires_join_information() {
        let plan = ValidationPlan::new(
            RuleKind::MismatchDetection,
            vec![table("legacy.orders"), table("prod.orders")],
        );
        assert!(plan.validate().is_err());

        let mut params = RuleParams::default();
        params.compare_columns = vec!["amount".into()];
        let plan = ValidationPlan::new(
            RuleKind::MismatchDetection,
            vec![table("legacy.orders"), table("prod.orders")],
        )
        .with_keys(KeySpec::parse("order_id").unwrap())
        .with_params(params);
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn test_mismatch_plan_requires_compare_columns() {
        let plan = ValidationPlan::new(
            RuleKind::MismatchDetection,
            vec![table("legacy.orders"), table("prod.orders")],
        )
        .with_keys(KeySpec::parse("order_id").unwrap());
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_profile_plan_is_single_table() {
        let plan = ValidationPlan::new(
            RuleKind::Profile,
            vec![table("legacy.orders"), table("prod.orders")],
        );
        assert!(plan.validate().is_err());

        let plan = ValidationPlan::new(RuleKind::Profile, vec![table("legacy.orders")]);
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn test_custom_plan_requires_sql() {
        let plan = ValidationPlan::new(RuleKind::CustomSql, vec![table("legacy.orders")]);
        assert!(plan.validate().is_err());

        let mut params = RuleParams::default();
        params.legacy_sql = Some("SELECT COUNT(*) FROM legacy.orders".into());
        let plan =
            ValidationPlan::new(RuleKind::CustomSql, vec![table("legacy.orders")]).with_params(params);
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn test_order_independence_flags() {
        assert!(RuleKind::RowCount.order_independent());
        assert!(RuleKind::SchemaComparison.order_independent());
        assert!(!RuleKind::MismatchDetection.order_independent());
        assert!(!RuleKind::MissingRecords.order_independent());
    }
}
