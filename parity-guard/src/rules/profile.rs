//! Single-table profiling SQL generation.

use crate::core::ValidationPlan;
use crate::error::{ParityError, Result};
use crate::rules::{
    check_identifier, date_predicate, where_clause, BuildContext, ResultShape, SqlSet, SqlStatement,
};

/// Bound on columns profiled in one statement; wider tables need an
/// explicit column list.
const MAX_PROFILE_COLUMNS: usize = 20;

/// One combined summary statement (row count, per-column null and distinct
/// counts) plus a top-N frequency statement per requested category column.
/// Optionally restricted to SCD2 current records and/or the date filter.
pub(crate) fn build(plan: &ValidationPlan, ctx: &BuildContext) -> Result<SqlSet> {
    let rule = plan.kind.as_str();
    let table = plan.legacy();

    let mut columns: Vec<String> = if plan.params.profile_columns.is_empty() {
        ctx.columns(table)
            .map(|cols| cols.to_vec())
            .ok_or_else(|| {
                ParityError::invalid_plan(
                    rule,
                    "no profile columns given and table schema is unknown",
                )
            })?
    } else {
        plan.params.profile_columns.clone()
    };
    if columns.is_empty() {
        return Err(ParityError::invalid_plan(rule, "no columns to profile"));
    }
    columns.truncate(MAX_PROFILE_COLUMNS);
    for column in columns.iter().chain(plan.params.category_columns.iter()) {
        check_identifier(column)?;
    }

    let mut conditions = Vec::new();
    if let Some(flag) = &plan.params.current_flag {
        check_identifier(flag)?;
        conditions.push(format!("{flag} = true"));
    }
    if let Some(filter) = &plan.date_filter {
        if ctx.filter_applies(table, &filter.column) {
            conditions.push(date_predicate(filter, None));
        }
    }
    let filter = where_clause(&conditions);
    let qualified = table.qualified();

    let mut measures = vec!["COUNT(*) AS row_count".to_string()];
    for column in &columns {
        measures.push(format!(
            "SUM(CASE WHEN {column} IS NULL THEN 1 ELSE 0 END) AS {column}_null_count"
        ));
        measures.push(format!("COUNT(DISTINCT {column}) AS {column}_distinct_count"));
    }

    let mut statements = vec![SqlStatement::new(
        "profile_summary",
        ResultShape::ScalarCount,
        format!("SELECT {} FROM {qualified}{filter}", measures.join(", ")),
    )];

    let top_n = plan.params.top_n.unwrap_or(ctx.sample_limit);
    for column in &plan.params.category_columns {
        statements.push(SqlStatement::new(
            format!("frequency_{column}"),
            ResultShape::RowSet,
            format!(
                "SELECT {column} AS value, COUNT(*) AS frequency FROM {qualified}{filter} \
                 GROUP BY {column} ORDER BY frequency DESC LIMIT {top_n}"
            ),
        ));
    }

    Ok(statements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{RuleKind, RuleParams, TableRef};

    fn table(name: &str) -> TableRef {
        name.parse().unwrap()
    }

    #[test]
    fn test_summary_measures() {
        let mut params = RuleParams::default();
        params.profile_columns = vec!["amount".into(), "status".into()];
        let plan =
            ValidationPlan::new(RuleKind::Profile, vec![table("legacy.orders")]).with_params(params);

        let set = build(&plan, &BuildContext::new(10)).unwrap();
        assert_eq!(set.len(), 1);
        assert!(set[0].sql.contains("COUNT(*) AS row_count"));
        assert!(set[0]
            .sql
            .contains("SUM(CASE WHEN amount IS NULL THEN 1 ELSE 0 END) AS amount_null_count"));
        assert!(set[0].sql.contains("COUNT(DISTINCT status) AS status_distinct_count"));
    }

    #[test]
    fn test_columns_derived_from_schema_when_unspecified() {
        let orders = table("legacy.orders");
        let plan = ValidationPlan::new(RuleKind::Profile, vec![orders.clone()]);

        // Unknown schema and no explicit columns is a configuration error.
        assert!(build(&plan, &BuildContext::new(10)).is_err());

        let ctx = BuildContext::new(10).with_columns(&orders, ["id", "amount"]);
        let set = build(&plan, &ctx).unwrap();
        assert!(set[0].sql.contains("id_null_count"));
        assert!(set[0].sql.contains("amount_distinct_count"));
    }

    #[test]
    fn test_current_flag_and_frequency() {
        let mut params = RuleParams::default();
        params.profile_columns = vec!["status".into()];
        params.category_columns = vec!["status".into()];
        params.current_flag = Some("is_current".into());
        params.top_n = Some(3);
        let plan =
            ValidationPlan::new(RuleKind::Profile, vec![table("legacy.orders")]).with_params(params);

        let set = build(&plan, &BuildContext::new(10)).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set[0].sql.contains("WHERE is_current = true"));
        assert_eq!(set[1].label, "frequency_status");
        assert!(set[1]
            .sql
            .contains("GROUP BY status ORDER BY frequency DESC LIMIT 3"));
    }
}
