//! Schema comparison over catalog introspection.
//!
//! Schema validation never executes SQL: column metadata comes from
//! [`crate::backend::QueryBackend::table_schema`] and the comparison is a
//! set difference over `(column, normalized type)` pairs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::backend::ColumnSchema;

/// Result of comparing two tables' schemas.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaDiff {
    /// Columns present in prod but not legacy.
    pub added: Vec<String>,
    /// Columns present in legacy but not prod.
    pub removed: Vec<String>,
    /// Columns present on both sides with differing normalized types, as
    /// `(column, legacy type, prod type)`.
    pub type_changed: Vec<(String, String, String)>,
    /// Columns whose ordinal position differs while name and type match.
    pub reordered: Vec<String>,
}

impl SchemaDiff {
    /// True when name/type sets match exactly (ordering may still differ).
    pub fn sets_match(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.type_changed.is_empty()
    }

    /// True when the schemas are identical including column order.
    pub fn identical(&self) -> bool {
        self.sets_match() && self.reordered.is_empty()
    }

    /// Short listing of the differences for report messages.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if !self.added.is_empty() {
            parts.push(format!("added in prod: {}", self.added.join(", ")));
        }
        if !self.removed.is_empty() {
            parts.push(format!("missing in prod: {}", self.removed.join(", ")));
        }
        if !self.type_changed.is_empty() {
            let changes: Vec<String> = self
                .type_changed
                .iter()
                .map(|(col, legacy, prod)| format!("{col}: {legacy} -> {prod}"))
                .collect();
            parts.push(format!("type changes: {}", changes.join("; ")));
        }
        if parts.is_empty() && !self.reordered.is_empty() {
            parts.push(format!("reordered: {}", self.reordered.join(", ")));
        }
        parts.join("; ")
    }
}

/// Normalizes an engine type string for comparison.
///
/// Folds the synonym families the catalog produces for Hive vs Iceberg
/// tables and strips precision/scale, so `varchar(64)` and `string`
/// compare equal.
pub fn normalize_type(data_type: &str) -> String {
    let base = data_type
        .to_lowercase()
        .split('(')
        .next()
        .unwrap_or_default()
        .trim()
        .to_string();

    match base.as_str() {
        "varchar" | "char" | "text" => "string".to_string(),
        "integer" => "int".to_string(),
        "double precision" => "double".to_string(),
        "real" => "float".to_string(),
        "bool" => "boolean".to_string(),
        "numeric" => "decimal".to_string(),
        other => other.to_string(),
    }
}

/// Compares legacy and prod schemas as `(column, normalized type)` sets.
pub fn compare_schemas(legacy: &[ColumnSchema], prod: &[ColumnSchema]) -> SchemaDiff {
    let legacy_map: BTreeMap<&str, &ColumnSchema> =
        legacy.iter().map(|c| (c.name.as_str(), c)).collect();
    let prod_map: BTreeMap<&str, &ColumnSchema> =
        prod.iter().map(|c| (c.name.as_str(), c)).collect();

    let mut diff = SchemaDiff::default();

    for (name, prod_col) in &prod_map {
        match legacy_map.get(name) {
            None => diff.added.push((*name).to_string()),
            Some(legacy_col) => {
                let legacy_type = normalize_type(&legacy_col.data_type);
                let prod_type = normalize_type(&prod_col.data_type);
                if legacy_type != prod_type {
                    diff.type_changed.push((
                        (*name).to_string(),
                        legacy_col.data_type.clone(),
                        prod_col.data_type.clone(),
                    ));
                } else if legacy_col.ordinal != prod_col.ordinal {
                    diff.reordered.push((*name).to_string());
                }
            }
        }
    }
    for name in legacy_map.keys() {
        if !prod_map.contains_key(name) {
            diff.removed.push((*name).to_string());
        }
    }

    diff
}
