//! Missing-record detection SQL generation.

use crate::core::{DateFilter, TableRef, ValidationPlan};
use crate::error::{ParityError, Result};
use crate::rules::{
    check_identifier, date_predicate, BuildContext, ResultShape, SqlSet, SqlStatement,
};

/// Union of two anti-joins tagged with a source indicator: keys present in
/// legacy but not prod (`legacy_only`) and the reverse (`prod_only`). Rows
/// present on both sides but differing are mismatch detection's job and are
/// never counted here.
pub(crate) fn build(plan: &ValidationPlan, ctx: &BuildContext) -> Result<SqlSet> {
    let rule = plan.kind.as_str();
    let legacy = plan.legacy();
    let prod = plan
        .prod()
        .ok_or_else(|| ParityError::invalid_plan(rule, "requires two tables"))?;
    let keys = plan
        .keys
        .as_ref()
        .ok_or_else(|| ParityError::invalid_plan(rule, "requires key columns"))?;
    for column in keys.columns() {
        check_identifier(column)?;
    }

    let legacy_branch = anti_join_branch(
        "legacy_only",
        legacy,
        prod,
        keys.columns(),
        plan.date_filter.as_ref(),
        ctx,
    );
    let prod_branch = anti_join_branch(
        "prod_only",
        prod,
        legacy,
        keys.columns(),
        plan.date_filter.as_ref(),
        ctx,
    );

    Ok(vec![
        SqlStatement::new(
            "missing_counts",
            ResultShape::ScalarCount,
            format!(
                "SELECT source, COUNT(*) AS missing_count FROM (\
                 {legacy_branch} UNION ALL {prod_branch}) GROUP BY source"
            ),
        ),
        SqlStatement::new(
            "missing_sample",
            ResultShape::KeyList,
            format!(
                "{legacy_branch} UNION ALL {prod_branch} LIMIT {}",
                ctx.sample_limit
            ),
        ),
    ])
}

/// One preserved-side anti-join: rows of `kept` whose key is absent from
/// `other`, tagged with `source`. Date predicates restrict the kept side in
/// `WHERE` and the outer side in the join condition, so both sides are
/// filtered before the absence test.
fn anti_join_branch(
    source: &str,
    kept: &TableRef,
    other: &TableRef,
    keys: &[String],
    filter: Option<&DateFilter>,
    ctx: &BuildContext,
) -> String {
    let select_keys = keys
        .iter()
        .map(|c| format!("a.{c} AS {c}"))
        .collect::<Vec<_>>()
        .join(", ");
    let mut join_on = keys
        .iter()
        .map(|c| format!("a.{c} = b.{c}"))
        .collect::<Vec<_>>()
        .join(" AND ");

    let mut conditions = vec![format!("b.{} IS NULL", keys[0])];
    if let Some(filter) = filter {
        if ctx.filter_applies(kept, &filter.column) {
            conditions.push(date_predicate(filter, Some("a")));
        }
        if ctx.filter_applies(other, &filter.column) {
            join_on = format!("{join_on} AND {}", date_predicate(filter, Some("b")));
        }
    }

    format!(
        "SELECT '{source}' AS source, {select_keys} FROM {} a \
         LEFT JOIN {} b ON {join_on} WHERE {}",
        kept.qualified(),
        other.qualified(),
        conditions.join(" AND ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{KeySpec, RuleKind};
    use chrono::NaiveDate;

    fn table(name: &str) -> TableRef {
        name.parse().unwrap()
    }

    fn base_plan() -> ValidationPlan {
        ValidationPlan::new(
            RuleKind::MissingRecords,
            vec![table("legacy.orders"), table("prod.orders")],
        )
        .with_keys(KeySpec::parse("id").unwrap())
    }

    #[test]
    fn test_union_of_anti_joins() {
        let set = build(&base_plan(), &BuildContext::new(10)).unwrap();

        assert_eq!(set.len(), 2);
        assert_eq!(set[0].label, "missing_counts");
        assert!(set[0].sql.contains("'legacy_only' AS source"));
        assert!(set[0].sql.contains("'prod_only' AS source"));
        assert!(set[0].sql.contains("GROUP BY source"));
        assert!(set[0]
            .sql
            .contains("FROM legacy.orders a LEFT JOIN prod.orders b ON a.id = b.id WHERE b.id IS NULL"));
        assert!(set[0]
            .sql
            .contains("FROM prod.orders a LEFT JOIN legacy.orders b ON a.id = b.id WHERE b.id IS NULL"));
        assert!(set[1].sql.ends_with("LIMIT 10"));
    }

    #[test]
    fn test_composite_key_anti_join() {
        let mut plan = base_plan();
        plan.keys = Some(KeySpec::parse("bill_id,bill_line_num").unwrap());
        let set = build(&plan, &BuildContext::new(10)).unwrap();

        assert!(set[0]
            .sql
            .contains("ON a.bill_id = b.bill_id AND a.bill_line_num = b.bill_line_num"));
        // Absence is tested on the first key column only.
        assert!(set[0].sql.contains("WHERE b.bill_id IS NULL"));
    }

    #[test]
    fn test_date_filter_lands_on_join_and_where() {
        let plan = base_plan().with_date_filter(
            DateFilter::new(
                "bill_date",
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            )
            .unwrap(),
        );
        let set = build(&plan, &BuildContext::new(10)).unwrap();
        assert!(set[0].sql.contains("TRY_CAST(a.bill_date AS DATE)"));
        assert!(set[0].sql.contains("AND TRY_CAST(b.bill_date AS DATE)"));
    }
}
