//! Primary-key uniqueness SQL generation.

use crate::core::ValidationPlan;
use crate::error::{ParityError, Result};
use crate::rules::{
    check_identifier, date_predicate, where_clause, BuildContext, ResultShape, SqlSet, SqlStatement,
};

/// Per table: a scalar count of key tuples occurring more than once, plus a
/// bounded sample of the worst offenders. Composite keys keep caller column
/// order in `GROUP BY`.
pub(crate) fn build(plan: &ValidationPlan, ctx: &BuildContext) -> Result<SqlSet> {
    let keys = plan
        .keys
        .as_ref()
        .ok_or_else(|| ParityError::invalid_plan(plan.kind.as_str(), "requires key columns"))?;
    for column in keys.columns() {
        check_identifier(column)?;
    }
    let key_list = keys.columns().join(", ");

    let mut statements = Vec::with_capacity(plan.tables.len() * 2);
    for (index, table) in plan.tables.iter().enumerate() {
        let side = if index == 0 { "legacy" } else { "prod" };

        // Null key components never count as duplicates of each other.
        let mut conditions: Vec<String> = keys
            .columns()
            .iter()
            .map(|c| format!("{c} IS NOT NULL"))
            .collect();
        if let Some(filter) = &plan.date_filter {
            if ctx.filter_applies(table, &filter.column) {
                conditions.push(date_predicate(filter, None));
            }
        }
        let filter = where_clause(&conditions);
        let qualified = table.qualified();

        statements.push(SqlStatement::new(
            format!("{side}_duplicates"),
            ResultShape::ScalarCount,
            format!(
                "SELECT COUNT(*) AS duplicate_groups FROM (\
                 SELECT {key_list} FROM {qualified}{filter} \
                 GROUP BY {key_list} HAVING COUNT(*) > 1)"
            ),
        ));
        statements.push(SqlStatement::new(
            format!("{side}_duplicate_sample"),
            ResultShape::KeyList,
            format!(
                "SELECT {key_list}, COUNT(*) AS occurrences FROM {qualified}{filter} \
                 GROUP BY {key_list} HAVING COUNT(*) > 1 \
                 ORDER BY occurrences DESC LIMIT {limit}",
                limit = ctx.sample_limit
            ),
        ));
    }

    Ok(statements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{KeySpec, RuleKind, TableRef};

    fn table(name: &str) -> TableRef {
        name.parse().unwrap()
    }

    #[test]
    fn test_composite_key_preserves_order() {
        let plan = ValidationPlan::new(RuleKind::KeyUniqueness, vec![table("legacy.bills")])
            .with_keys(KeySpec::parse("bill_id,bill_line_num").unwrap());
        let set = build(&plan, &BuildContext::new(5)).unwrap();

        assert_eq!(set.len(), 2);
        assert_eq!(set[0].label, "legacy_duplicates");
        assert!(set[0]
            .sql
            .contains("GROUP BY bill_id, bill_line_num HAVING COUNT(*) > 1"));
        assert!(set[0].sql.contains("bill_id IS NOT NULL AND bill_line_num IS NOT NULL"));
        assert!(set[1].sql.ends_with("LIMIT 5"));
    }

    #[test]
    fn test_two_tables_generate_four_statements() {
        let plan = ValidationPlan::new(
            RuleKind::KeyUniqueness,
            vec![table("legacy.bills"), table("prod.bills")],
        )
        .with_keys(KeySpec::parse("bill_id").unwrap());
        let set = build(&plan, &BuildContext::new(10)).unwrap();

        let labels: Vec<_> = set.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "legacy_duplicates",
                "legacy_duplicate_sample",
                "prod_duplicates",
                "prod_duplicate_sample"
            ]
        );
    }

    #[test]
    fn test_rejects_hostile_key_column() {
        let plan = ValidationPlan::new(RuleKind::KeyUniqueness, vec![table("legacy.bills")])
            .with_keys(KeySpec::new(["id; DROP TABLE x"]).unwrap());
        assert!(build(&plan, &BuildContext::new(10)).is_err());
    }
}
