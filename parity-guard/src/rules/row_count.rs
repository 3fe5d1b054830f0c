//! Row-count SQL generation.

use crate::core::ValidationPlan;
use crate::error::Result;
use crate::rules::{date_predicate, where_clause, BuildContext, ResultShape, SqlSet, SqlStatement};

/// One `COUNT(*)` per table; the tolerance comparison happens at
/// classification time, never in SQL.
pub(crate) fn build(plan: &ValidationPlan, ctx: &BuildContext) -> Result<SqlSet> {
    let mut statements = Vec::with_capacity(plan.tables.len());

    for (index, table) in plan.tables.iter().enumerate() {
        let mut conditions = Vec::new();
        if let Some(filter) = &plan.date_filter {
            if ctx.filter_applies(table, &filter.column) {
                conditions.push(date_predicate(filter, None));
            }
        }

        let label = if index == 0 { "legacy_count" } else { "prod_count" };
        let sql = format!(
            "SELECT COUNT(*) AS row_count FROM {}{}",
            table.qualified(),
            where_clause(&conditions)
        );
        statements.push(SqlStatement::new(label, ResultShape::ScalarCount, sql));
    }

    Ok(statements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DateFilter, RuleKind, TableRef};
    use chrono::NaiveDate;

    fn table(name: &str) -> TableRef {
        name.parse().unwrap()
    }

    #[test]
    fn test_two_table_counts() {
        let plan = ValidationPlan::new(
            RuleKind::RowCount,
            vec![table("legacy.orders"), table("prod.orders")],
        );
        let set = build(&plan, &BuildContext::new(10)).unwrap();

        assert_eq!(set.len(), 2);
        assert_eq!(set[0].label, "legacy_count");
        assert_eq!(
            set[0].sql,
            "SELECT COUNT(*) AS row_count FROM legacy.orders"
        );
        assert_eq!(set[1].label, "prod_count");
        assert_eq!(set[1].sql, "SELECT COUNT(*) AS row_count FROM prod.orders");
    }

    #[test]
    fn test_date_filter_skips_tables_without_column() {
        let legacy = table("legacy.orders");
        let prod = table("prod.orders");
        let plan = ValidationPlan::new(RuleKind::RowCount, vec![legacy.clone(), prod.clone()])
            .with_date_filter(
                DateFilter::new(
                    "bill_date",
                    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                    NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
                )
                .unwrap(),
            );

        let ctx = BuildContext::new(10)
            .with_columns(&legacy, ["id", "bill_date"])
            .with_columns(&prod, ["id"]);
        let set = build(&plan, &ctx).unwrap();

        assert!(set[0].sql.contains("WHERE TRY_CAST(bill_date AS DATE) >= DATE '2024-01-01'"));
        assert!(!set[1].sql.contains("WHERE"));
    }
}
