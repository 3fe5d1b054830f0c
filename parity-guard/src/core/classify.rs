//! Outcome classification: executed statements to rule results.
//!
//! Pure functions; the engine feeds them the statement outputs and the
//! effective tolerances. Metrics names are stable output surface, consumed
//! by the JSON/CSV formatters.

use std::collections::BTreeMap;

use crate::backend::{ColumnSchema, QueryOutput};
use crate::core::{Row, RuleKind, RuleResult, RuleStatus, ValidationPlan};
use crate::rules::{compare_schemas, SqlStatement};

/// One executed statement with its output.
pub(crate) struct Executed {
    pub statement: SqlStatement,
    pub output: QueryOutput,
}

impl Executed {
    fn labeled<'a>(executed: &'a [Executed], label: &str) -> Option<&'a QueryOutput> {
        executed
            .iter()
            .find(|e| e.statement.label == label)
            .map(|e| &e.output)
    }
}

/// Classifies the outputs of a plan's statements.
pub(crate) fn classify(
    plan: &ValidationPlan,
    executed: &[Executed],
    default_tolerance: f64,
    sample_limit: usize,
) -> RuleResult {
    match plan.kind {
        RuleKind::RowCount => classify_row_count(plan, executed, default_tolerance),
        RuleKind::KeyUniqueness => classify_key_uniqueness(plan, executed, sample_limit),
        RuleKind::MismatchDetection => classify_mismatch(executed),
        RuleKind::MissingRecords => classify_missing(executed),
        RuleKind::Profile => classify_profile(executed),
        RuleKind::CustomSql => classify_custom(plan, executed),
        // Schema comparison never reaches here; the engine classifies it
        // from catalog introspection directly.
        RuleKind::SchemaComparison => RuleResult::error(
            plan.kind,
            "schema comparison has no SQL statements to classify",
        ),
    }
}

fn classify_row_count(
    plan: &ValidationPlan,
    executed: &[Executed],
    default_tolerance: f64,
) -> RuleResult {
    let legacy = match Executed::labeled(executed, "legacy_count")
        .and_then(|o| o.first_i64("row_count"))
    {
        Some(count) => count,
        None => return RuleResult::error(plan.kind, "legacy count query returned no rows"),
    };

    let prod = match Executed::labeled(executed, "prod_count") {
        None => {
            // Single-table mode reports the count without judging it.
            return RuleResult::new(
                RuleKind::RowCount,
                RuleStatus::Info,
                format!("{legacy} rows"),
            )
            .with_metric("row_count", legacy as f64);
        }
        Some(output) => match output.first_i64("row_count") {
            Some(count) => count,
            None => return RuleResult::error(plan.kind, "prod count query returned no rows"),
        },
    };

    let tolerance = plan.params.tolerance.unwrap_or(default_tolerance);
    let difference = (legacy - prod).abs();
    let allowed = tolerance / 100.0 * legacy.max(1) as f64;
    let difference_pct = difference as f64 / legacy.max(1) as f64 * 100.0;

    let (status, message) = if difference as f64 <= allowed {
        if difference == 0 {
            (RuleStatus::Pass, format!("row counts match: {legacy}"))
        } else {
            (
                RuleStatus::Pass,
                format!(
                    "row counts within tolerance: {legacy} vs {prod} \
                     ({difference_pct:.2}% <= {tolerance}%)"
                ),
            )
        }
    } else {
        (
            RuleStatus::Fail,
            format!("row counts differ: {legacy} vs {prod} ({difference_pct:.2}%)"),
        )
    };

    RuleResult::new(RuleKind::RowCount, status, message)
        .with_metric("legacy_rows", legacy as f64)
        .with_metric("prod_rows", prod as f64)
        .with_metric("difference", difference as f64)
        .with_metric("difference_pct", difference_pct)
}

fn classify_key_uniqueness(
    plan: &ValidationPlan,
    executed: &[Executed],
    sample_limit: usize,
) -> RuleResult {
    let mut metrics = BTreeMap::new();
    let mut samples: Vec<Row> = Vec::new();
    let mut total_duplicates = 0i64;

    for side in ["legacy", "prod"] {
        let label = format!("{side}_duplicates");
        let Some(output) = Executed::labeled(executed, &label) else {
            continue;
        };
        let Some(count) = output.first_i64("duplicate_groups") else {
            return RuleResult::error(plan.kind, format!("{label} query returned no rows"));
        };
        metrics.insert(format!("{side}_duplicate_groups"), count as f64);
        total_duplicates += count;

        if count > 0 {
            if let Some(sample) = Executed::labeled(executed, &format!("{side}_duplicate_sample")) {
                for row in sample.rows.iter().take(sample_limit) {
                    let mut row = row.clone();
                    row.insert("table".to_string(), serde_json::Value::from(side));
                    samples.push(row);
                }
            }
        }
    }

    let (status, message) = if total_duplicates == 0 {
        (RuleStatus::Pass, "all key tuples are unique".to_string())
    } else {
        (
            RuleStatus::Fail,
            format!("{total_duplicates} duplicated key tuple(s) found"),
        )
    };

    let mut result = RuleResult::new(RuleKind::KeyUniqueness, status, message)
        .with_samples(samples.into_iter().take(sample_limit).collect());
    result.metrics = metrics;
    result
}

fn classify_mismatch(executed: &[Executed]) -> RuleResult {
    let Some(count) =
        Executed::labeled(executed, "mismatch_count").and_then(|o| o.first_i64("mismatch_count"))
    else {
        return RuleResult::error(
            RuleKind::MismatchDetection,
            "mismatch count query returned no rows",
        );
    };

    let samples = Executed::labeled(executed, "mismatch_sample")
        .map(|o| o.rows.clone())
        .unwrap_or_default();

    let (status, message) = if count == 0 {
        (RuleStatus::Pass, "no mismatched rows".to_string())
    } else {
        (RuleStatus::Fail, format!("{count} mismatched row(s)"))
    };

    RuleResult::new(RuleKind::MismatchDetection, status, message)
        .with_metric("mismatch_count", count as f64)
        .with_samples(samples)
}

fn classify_missing(executed: &[Executed]) -> RuleResult {
    let Some(counts) = Executed::labeled(executed, "missing_counts") else {
        return RuleResult::error(RuleKind::MissingRecords, "missing count query did not run");
    };

    let mut legacy_only = 0i64;
    let mut prod_only = 0i64;
    for row in &counts.rows {
        let count = row
            .get("missing_count")
            .and_then(value_as_i64)
            .unwrap_or(0);
        match row.get("source").and_then(|v| v.as_str()) {
            Some("legacy_only") => legacy_only = count,
            Some("prod_only") => prod_only = count,
            _ => {}
        }
    }
    let total = legacy_only + prod_only;

    let samples = Executed::labeled(executed, "missing_sample")
        .map(|o| o.rows.clone())
        .unwrap_or_default();

    let (status, message) = if total == 0 {
        (
            RuleStatus::Pass,
            "every key is present on both sides".to_string(),
        )
    } else {
        (
            RuleStatus::Fail,
            format!("{total} missing record(s): {legacy_only} legacy-only, {prod_only} prod-only"),
        )
    };

    RuleResult::new(RuleKind::MissingRecords, status, message)
        .with_metric("legacy_only", legacy_only as f64)
        .with_metric("prod_only", prod_only as f64)
        .with_metric("missing_total", total as f64)
        .with_samples(samples)
}

fn classify_profile(executed: &[Executed]) -> RuleResult {
    let Some(summary) = Executed::labeled(executed, "profile_summary") else {
        return RuleResult::error(RuleKind::Profile, "profile summary query did not run");
    };
    let Some(row) = summary.rows.first() else {
        return RuleResult::error(RuleKind::Profile, "profile summary returned no rows");
    };

    let mut metrics = BTreeMap::new();
    for (name, value) in row {
        if let Some(number) = value_as_f64(value) {
            metrics.insert(name.clone(), number);
        }
    }

    // Null percentages derived from the raw counts.
    if let Some(total) = metrics.get("row_count").copied() {
        if total > 0.0 {
            let null_counts: Vec<(String, f64)> = metrics
                .iter()
                .filter(|(name, _)| name.ends_with("_null_count"))
                .map(|(name, value)| (name.clone(), *value))
                .collect();
            for (name, count) in null_counts {
                let pct_name = name.replace("_null_count", "_null_pct");
                metrics.insert(pct_name, count / total * 100.0);
            }
        }
    }

    let mut samples = Vec::new();
    for executed in executed {
        if let Some(column) = executed.statement.label.strip_prefix("frequency_") {
            for row in &executed.output.rows {
                let mut row = row.clone();
                row.insert("column".to_string(), serde_json::Value::from(column));
                samples.push(row);
            }
        }
    }

    let row_count = metrics.get("row_count").copied().unwrap_or(0.0);
    let mut result = RuleResult::new(
        RuleKind::Profile,
        RuleStatus::Info,
        format!("profiled {row_count} rows"),
    )
    .with_samples(samples);
    result.metrics = metrics;
    result
}

fn classify_custom(plan: &ValidationPlan, executed: &[Executed]) -> RuleResult {
    let legacy = Executed::labeled(executed, "custom_legacy");
    let prod = Executed::labeled(executed, "custom_prod");
    let explanation = plan
        .params
        .explanation
        .clone()
        .unwrap_or_else(|| "custom SQL validation".to_string());

    match (legacy, prod) {
        (Some(legacy), Some(prod)) => {
            let matches = legacy.rows == prod.rows;
            let (status, verdict) = if matches {
                (RuleStatus::Pass, "results match")
            } else {
                (RuleStatus::Fail, "results differ")
            };
            RuleResult::new(
                RuleKind::CustomSql,
                status,
                format!("{explanation}: {verdict}"),
            )
            .with_metric("legacy_rows", legacy.rows.len() as f64)
            .with_metric("prod_rows", prod.rows.len() as f64)
        }
        (Some(only), None) => RuleResult::new(
            RuleKind::CustomSql,
            RuleStatus::Info,
            format!("{explanation}: {} row(s)", only.rows.len()),
        )
        .with_metric("rows", only.rows.len() as f64)
        .with_samples(only.rows.clone()),
        _ => RuleResult::error(RuleKind::CustomSql, "custom SQL produced no output"),
    }
}

/// Classifies a schema comparison from catalog introspection output.
pub(crate) fn classify_schema(
    legacy: &[ColumnSchema],
    prod: Option<&[ColumnSchema]>,
) -> RuleResult {
    let Some(prod) = prod else {
        // Single-table mode: a schema summary, informational by nature.
        return RuleResult::new(
            RuleKind::SchemaComparison,
            RuleStatus::Info,
            format!("{} column(s)", legacy.len()),
        )
        .with_metric("column_count", legacy.len() as f64);
    };

    let diff = compare_schemas(legacy, prod);
    let (status, message) = if diff.identical() {
        (RuleStatus::Pass, "schemas are identical".to_string())
    } else if diff.sets_match() {
        (
            RuleStatus::Info,
            format!("column order differs only: {}", diff.describe()),
        )
    } else {
        (RuleStatus::Fail, format!("schemas differ: {}", diff.describe()))
    };

    RuleResult::new(RuleKind::SchemaComparison, status, message)
        .with_metric("legacy_columns", legacy.len() as f64)
        .with_metric("prod_columns", prod.len() as f64)
        .with_metric("added", diff.added.len() as f64)
        .with_metric("removed", diff.removed.len() as f64)
        .with_metric("type_changed", diff.type_changed.len() as f64)
}

fn value_as_i64(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn value_as_f64(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
