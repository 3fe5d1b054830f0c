//! Canonical cache keys for validation intents.
//!
//! Two semantically identical intents must hash identically regardless of
//! surface variation: table order (for order-independent rules), key column
//! order, date formatting, and whitespace or case in natural-language
//! request text. The fingerprint is a SHA-256 digest over a canonical JSON
//! document; `serde_json`'s default map keeps keys sorted, which makes the
//! serialized form stable.

use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::core::{PlanHints, ValidationPlan};

/// A stable digest identifying one validation intent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Full hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shortened digest for log lines.
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fingerprints a fully specified plan.
pub fn fingerprint_plan(plan: &ValidationPlan) -> CacheKey {
    let mut tables: Vec<String> = plan.tables.iter().map(|t| t.qualified()).collect();
    if plan.kind.order_independent() {
        tables.sort();
    }

    let doc = json!({
        "rule": plan.kind.as_str(),
        "tables": tables,
        "keys": plan.keys.as_ref().map(|k| k.sorted()),
        "date": plan.date_filter.as_ref().map(|f| json!({
            "column": f.column,
            "start": f.start.to_string(),
            "end": f.end.to_string(),
        })),
        "params": canonical_params(plan),
        "request": plan.source_request.as_deref().map(normalize_text),
    });

    digest(&doc)
}

/// Fingerprints a natural-language request before translation, so a repeat
/// request can skip the translator entirely.
pub fn fingerprint_request(text: &str, hints: &PlanHints) -> CacheKey {
    let mut tables: Vec<String> = hints.tables.iter().map(|t| t.qualified()).collect();
    tables.sort();

    let doc = json!({
        "rule": "natural_language",
        "tables": tables,
        "keys": hints.keys.as_ref().map(|k| k.sorted()),
        "date": hints.date_filter.as_ref().map(|f| json!({
            "column": f.column,
            "start": f.start.to_string(),
            "end": f.end.to_string(),
        })),
        "request": normalize_text(text),
    });

    digest(&doc)
}

fn canonical_params(plan: &ValidationPlan) -> Value {
    let params = &plan.params;
    let mut compare = params.compare_columns.clone();
    compare.sort();
    let mut profile = params.profile_columns.clone();
    profile.sort();
    let mut categories = params.category_columns.clone();
    categories.sort();

    json!({
        "compare_columns": compare,
        "join_condition": params.join_condition.as_deref().map(str::trim),
        "profile_columns": profile,
        "category_columns": categories,
        "top_n": params.top_n,
        "current_flag": params.current_flag,
        "legacy_sql": params.legacy_sql.as_deref().map(normalize_text),
        "prod_sql": params.prod_sql.as_deref().map(normalize_text),
    })
}

/// Trims, lowercases, and collapses runs of whitespace.
fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn digest(doc: &Value) -> CacheKey {
    let mut hasher = Sha256::new();
    hasher.update(doc.to_string().as_bytes());
    CacheKey(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{KeySpec, RuleKind, TableRef, ValidationPlan};

    fn table(name: &str) -> TableRef {
        name.parse().unwrap()
    }

    #[test]
    fn test_key_order_does_not_matter() {
        let a = ValidationPlan::new(RuleKind::KeyUniqueness, vec![table("legacy.bills")])
            .with_keys(KeySpec::parse("bill_id,bill_line_num").unwrap());
        let b = ValidationPlan::new(RuleKind::KeyUniqueness, vec![table("legacy.bills")])
            .with_keys(KeySpec::parse("bill_line_num,bill_id").unwrap());

        assert_eq!(fingerprint_plan(&a), fingerprint_plan(&b));
    }

    #[test]
    fn test_table_order_ignored_for_order_independent_rules() {
        let a = ValidationPlan::new(
            RuleKind::RowCount,
            vec![table("legacy.orders"), table("prod.orders")],
        );
        let b = ValidationPlan::new(
            RuleKind::RowCount,
            vec![table("prod.orders"), table("legacy.orders")],
        );
        assert_eq!(fingerprint_plan(&a), fingerprint_plan(&b));
    }

    #[test]
    fn test_table_order_significant_for_directional_rules() {
        let a = ValidationPlan::new(
            RuleKind::MissingRecords,
            vec![table("legacy.orders"), table("prod.orders")],
        )
        .with_keys(KeySpec::parse("id").unwrap());
        let b = ValidationPlan::new(
            RuleKind::MissingRecords,
            vec![table("prod.orders"), table("legacy.orders")],
        )
        .with_keys(KeySpec::parse("id").unwrap());
        assert_ne!(fingerprint_plan(&a), fingerprint_plan(&b));
    }

    #[test]
    fn test_request_text_normalization() {
        let hints = PlanHints::default();
        let a = fingerprint_request("Compare   Row Counts", &hints);
        let b = fingerprint_request("  compare row counts ", &hints);
        let c = fingerprint_request("compare column types", &hints);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_hint_table_order_ignored() {
        let mut hints_a = PlanHints::default();
        hints_a.tables = vec![table("a.t"), table("b.t")];
        let mut hints_b = PlanHints::default();
        hints_b.tables = vec![table("b.t"), table("a.t")];

        assert_eq!(
            fingerprint_request("check counts", &hints_a),
            fingerprint_request("check counts", &hints_b)
        );
    }

    #[test]
    fn test_different_rules_differ() {
        let a = ValidationPlan::new(RuleKind::RowCount, vec![table("legacy.orders")]);
        let mut b = a.clone();
        b.kind = RuleKind::Profile;
        assert_ne!(fingerprint_plan(&a), fingerprint_plan(&b));
    }

    #[test]
    fn test_short_form() {
        let key = fingerprint_request("x", &PlanHints::default());
        assert_eq!(key.short().len(), 12);
        assert!(key.as_str().starts_with(key.short()));
    }
}
