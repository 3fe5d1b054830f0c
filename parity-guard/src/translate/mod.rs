//! Natural-language translation adapters.
//!
//! A [`Translator`] turns a free-text validation request plus partial hints
//! into fully specified [`ValidationPlan`]s. Translator output is validated
//! against the closed [`PlanSpec`] schema before use; unrecognized rule
//! types or structurally invalid plans are [`TranslationError::InvalidResponse`],
//! never best-effort executions.

mod chat;

pub use chat::{ChatTranslator, ChatTranslatorConfig};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::{
    DateFilter, KeySpec, PlanHints, RuleKind, RuleParams, TableRef, ValidationPlan,
};

/// Failures surfaced by a translation adapter.
#[derive(Error, Debug, Clone)]
pub enum TranslationError {
    /// No API credentials are configured for the translation service.
    #[error("translation service credentials are not configured")]
    NoCredentials,

    /// The translation service could not be reached or failed upstream.
    #[error("translation service unavailable: {message}")]
    Unavailable { message: String },

    /// The service answered with something that does not fit the plan
    /// schema.
    #[error("unusable translation response: {message}")]
    InvalidResponse { message: String },
}

impl TranslationError {
    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates an invalid-response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }
}

/// Result type for translation operations.
pub type TranslationResult<T> = std::result::Result<T, TranslationError>;

/// Resolves natural-language validation requests into plans.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translates `request`, completing missing details from `hints`.
    ///
    /// One request may decompose into several plans ("compare row counts
    /// and check PK uniqueness" is two).
    async fn translate(
        &self,
        request: &str,
        hints: &PlanHints,
    ) -> TranslationResult<Vec<ValidationPlan>>;
}

/// A translator for deployments without a translation service configured.
///
/// Every natural-language request fails with
/// [`TranslationError::NoCredentials`]; explicit plans are unaffected.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTranslator;

#[async_trait]
impl Translator for NullTranslator {
    async fn translate(
        &self,
        _request: &str,
        _hints: &PlanHints,
    ) -> TranslationResult<Vec<ValidationPlan>> {
        Err(TranslationError::NoCredentials)
    }
}

/// The wire schema a translation service must produce, one object per plan.
///
/// Kept deliberately flat so the model has as few ways as possible to get
/// the shape wrong; [`PlanSpec::into_plan`] folds it into a
/// [`ValidationPlan`] and re-validates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanSpec {
    /// Rule identifier; must be one of the known kinds.
    pub rule: String,
    /// Tables in `db.table` form, legacy first.
    #[serde(default)]
    pub tables: Vec<String>,
    /// Key columns.
    #[serde(default)]
    pub keys: Vec<String>,
    /// Date filter column.
    #[serde(default)]
    pub date_column: Option<String>,
    /// Inclusive start date, `YYYY-MM-DD`.
    #[serde(default)]
    pub start_date: Option<String>,
    /// Inclusive end date, `YYYY-MM-DD`.
    #[serde(default)]
    pub end_date: Option<String>,
    /// Columns compared in mismatch detection.
    #[serde(default)]
    pub compare_columns: Vec<String>,
    /// Columns profiled.
    #[serde(default)]
    pub profile_columns: Vec<String>,
    /// Columns given category frequency breakdowns.
    #[serde(default)]
    pub category_columns: Vec<String>,
    /// Custom SQL for the legacy side.
    #[serde(default)]
    pub legacy_sql: Option<String>,
    /// Custom SQL for the production side.
    #[serde(default)]
    pub prod_sql: Option<String>,
    /// Explanation of custom SQL.
    #[serde(default)]
    pub explanation: Option<String>,
}

impl PlanSpec {
    /// Converts the spec into a validated plan, completing missing details
    /// from the caller's hints and recording the originating request text.
    pub fn into_plan(
        self,
        request: &str,
        hints: &PlanHints,
    ) -> TranslationResult<ValidationPlan> {
        let kind = parse_rule_kind(&self.rule)?;

        let tables = if self.tables.is_empty() {
            hints.tables.clone()
        } else {
            self.tables
                .iter()
                .map(|t| t.parse::<TableRef>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| TranslationError::invalid_response(e.to_string()))?
        };

        let keys = if self.keys.is_empty() {
            hints.keys.clone()
        } else {
            Some(
                KeySpec::new(self.keys.clone())
                    .map_err(|e| TranslationError::invalid_response(e.to_string()))?,
            )
        };

        let date_filter = match (&self.date_column, &self.start_date, &self.end_date) {
            (Some(column), Some(start), Some(end)) => {
                let start = start
                    .parse()
                    .map_err(|_| TranslationError::invalid_response("bad start_date"))?;
                let end = end
                    .parse()
                    .map_err(|_| TranslationError::invalid_response("bad end_date"))?;
                Some(
                    DateFilter::new(column.clone(), start, end)
                        .map_err(|e| TranslationError::invalid_response(e.to_string()))?,
                )
            }
            (None, _, _) => hints.date_filter.clone(),
            _ => {
                return Err(TranslationError::invalid_response(
                    "date filter requires date_column, start_date, and end_date",
                ))
            }
        };

        let mut params = RuleParams::default();
        params.compare_columns = self.compare_columns;
        params.profile_columns = self.profile_columns;
        params.category_columns = self.category_columns;
        params.legacy_sql = self.legacy_sql;
        params.prod_sql = self.prod_sql;
        params.explanation = self.explanation;

        let mut plan = ValidationPlan::new(kind, tables)
            .with_params(params)
            .with_source_request(request);
        plan.keys = keys;
        plan.date_filter = date_filter;

        plan.validate()
            .map_err(|e| TranslationError::invalid_response(e.to_string()))?;
        Ok(plan)
    }
}

fn parse_rule_kind(rule: &str) -> TranslationResult<RuleKind> {
    serde_json::from_value(serde_json::Value::String(rule.trim().to_lowercase())).map_err(|_| {
        TranslationError::invalid_response(format!("unrecognized rule type '{rule}'"))
    })
}
