//! Mismatch-detection SQL generation.

use crate::core::ValidationPlan;
use crate::error::{ParityError, Result};
use crate::rules::{
    check_identifier, date_predicate, where_clause, BuildContext, ResultShape, SqlSet, SqlStatement,
};

/// Joins legacy and prod on the key (or an explicit join condition) and
/// flags rows whose compare columns differ: a scalar mismatch count plus a
/// bounded sample carrying both sides of each compare column.
pub(crate) fn build(plan: &ValidationPlan, ctx: &BuildContext) -> Result<SqlSet> {
    let rule = plan.kind.as_str();
    let legacy = plan.legacy();
    let prod = plan
        .prod()
        .ok_or_else(|| ParityError::invalid_plan(rule, "requires two tables"))?;

    for column in &plan.params.compare_columns {
        check_identifier(column)?;
    }

    let join_on = match &plan.params.join_condition {
        Some(condition) => condition.clone(),
        None => {
            let keys = plan.keys.as_ref().ok_or_else(|| {
                ParityError::invalid_plan(rule, "requires key columns or a join condition")
            })?;
            for column in keys.columns() {
                check_identifier(column)?;
            }
            keys.columns()
                .iter()
                .map(|c| format!("l.{c} = p.{c}"))
                .collect::<Vec<_>>()
                .join(" AND ")
        }
    };

    let differs = plan
        .params
        .compare_columns
        .iter()
        .map(|c| format!("l.{c} IS DISTINCT FROM p.{c}"))
        .collect::<Vec<_>>()
        .join(" OR ");

    let mut conditions = vec![format!("({differs})")];
    if let Some(filter) = &plan.date_filter {
        if ctx.filter_applies(legacy, &filter.column) {
            conditions.push(date_predicate(filter, Some("l")));
        }
        if ctx.filter_applies(prod, &filter.column) {
            conditions.push(date_predicate(filter, Some("p")));
        }
    }
    let filter = where_clause(&conditions);

    let from = format!(
        "FROM {} l INNER JOIN {} p ON {join_on}",
        legacy.qualified(),
        prod.qualified()
    );

    let mut select_cols: Vec<String> = plan
        .keys
        .as_ref()
        .map(|keys| keys.columns().iter().map(|c| format!("l.{c} AS {c}")).collect())
        .unwrap_or_default();
    for column in &plan.params.compare_columns {
        select_cols.push(format!("l.{column} AS legacy_{column}"));
        select_cols.push(format!("p.{column} AS prod_{column}"));
    }

    Ok(vec![
        SqlStatement::new(
            "mismatch_count",
            ResultShape::ScalarCount,
            format!("SELECT COUNT(*) AS mismatch_count {from}{filter}"),
        ),
        SqlStatement::new(
            "mismatch_sample",
            ResultShape::RowSet,
            format!(
                "SELECT {} {from}{filter} LIMIT {}",
                select_cols.join(", "),
                ctx.sample_limit
            ),
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DateFilter, KeySpec, RuleKind, RuleParams, TableRef};
    use chrono::NaiveDate;

    fn table(name: &str) -> TableRef {
        name.parse().unwrap()
    }

    fn base_plan() -> ValidationPlan {
        let mut params = RuleParams::default();
        params.compare_columns = vec!["amount".into(), "status".into()];
        ValidationPlan::new(
            RuleKind::MismatchDetection,
            vec![table("legacy.orders"), table("prod.orders")],
        )
        .with_keys(KeySpec::parse("order_id").unwrap())
        .with_params(params)
    }

    #[test]
    fn test_count_and_sample_statements() {
        let set = build(&base_plan(), &BuildContext::new(10)).unwrap();

        assert_eq!(set.len(), 2);
        assert_eq!(set[0].label, "mismatch_count");
        assert_eq!(
            set[0].sql,
            "SELECT COUNT(*) AS mismatch_count FROM legacy.orders l \
             INNER JOIN prod.orders p ON l.order_id = p.order_id \
             WHERE (l.amount IS DISTINCT FROM p.amount OR l.status IS DISTINCT FROM p.status)"
        );
        assert!(set[1].sql.contains("l.amount AS legacy_amount"));
        assert!(set[1].sql.contains("p.amount AS prod_amount"));
        assert!(set[1].sql.contains("l.order_id AS order_id"));
        assert!(set[1].sql.ends_with("LIMIT 10"));
    }

    #[test]
    fn test_explicit_join_condition_overrides_keys() {
        let mut plan = base_plan();
        plan.keys = None;
        plan.params.join_condition = Some("l.order_id = p.legacy_order_id".into());
        let set = build(&plan, &BuildContext::new(10)).unwrap();
        assert!(set[0].sql.contains("ON l.order_id = p.legacy_order_id"));
    }

    #[test]
    fn test_date_filter_applies_to_both_sides() {
        let plan = base_plan().with_date_filter(
            DateFilter::new(
                "bill_date",
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            )
            .unwrap(),
        );
        let set = build(&plan, &BuildContext::new(10)).unwrap();
        assert!(set[0].sql.contains("TRY_CAST(l.bill_date AS DATE)"));
        assert!(set[0].sql.contains("TRY_CAST(p.bill_date AS DATE)"));
    }
}
