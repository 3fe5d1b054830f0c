//! Rule results and report assembly.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::RuleKind;

/// A single result row as returned by the remote engine.
///
/// Remote engines hand back loosely typed values; JSON values keep the
/// backend adapter honest and the report serializable.
pub type Row = BTreeMap<String, serde_json::Value>;

/// Outcome classification for one rule execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RuleStatus {
    /// The rule's condition held.
    Pass,
    /// The rule's condition was violated.
    Fail,
    /// Informational only; the rule has no pass/fail notion.
    Info,
    /// The rule could not be evaluated (backend, translation, or timeout).
    Error,
}

impl RuleStatus {
    /// Returns true for `Fail`.
    pub fn is_fail(&self) -> bool {
        matches!(self, RuleStatus::Fail)
    }

    /// Returns true for `Error`.
    pub fn is_error(&self) -> bool {
        matches!(self, RuleStatus::Error)
    }
}

impl std::fmt::Display for RuleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RuleStatus::Pass => "PASS",
            RuleStatus::Fail => "FAIL",
            RuleStatus::Info => "INFO",
            RuleStatus::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// The immutable outcome of one rule execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleResult {
    /// Which rule produced this result.
    pub rule: RuleKind,
    /// Human-readable rule name.
    pub name: String,
    /// Outcome classification.
    pub status: RuleStatus,
    /// Named numeric metrics (counts, percentages).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metrics: BTreeMap<String, f64>,
    /// Bounded sample of offending rows, where the rule collects one.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub samples: Vec<Row>,
    /// One-line outcome summary.
    pub message: String,
    /// Wall-clock execution time for this rule.
    pub duration_ms: u64,
}

impl RuleResult {
    /// Creates a result with the given status and message; metrics and
    /// samples are attached with the builder methods.
    pub fn new(rule: RuleKind, status: RuleStatus, message: impl Into<String>) -> Self {
        Self {
            rule,
            name: rule.display_name().to_string(),
            status,
            metrics: BTreeMap::new(),
            samples: Vec::new(),
            message: message.into(),
            duration_ms: 0,
        }
    }

    /// Creates an `ERROR` result carrying the failure description.
    pub fn error(rule: RuleKind, message: impl Into<String>) -> Self {
        Self::new(rule, RuleStatus::Error, message)
    }

    /// Overrides the display name (used when a result does not map onto a
    /// single rule, such as a failed translation).
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Adds a named metric.
    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }

    /// Attaches sample rows.
    pub fn with_samples(mut self, samples: Vec<Row>) -> Self {
        self.samples = samples;
        self
    }

    /// Records the execution duration.
    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }
}

/// The assembled outcome of one validation request.
///
/// Owns its results in resolution order; every requested rule appears
/// exactly once, including rules that ended in `ERROR`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Per-rule results, in the order plans were resolved.
    pub results: Vec<RuleResult>,
    /// Derived overall status.
    pub overall: RuleStatus,
    /// When the request started.
    pub started_at: DateTime<Utc>,
    /// Total wall-clock duration of the request.
    pub duration_ms: u64,
}

impl ValidationReport {
    /// Assembles a report from classified results.
    ///
    /// Overall status: `FAIL` if any result failed; else `ERROR` if any
    /// errored; else `INFO` when every result is informational; else `PASS`.
    pub fn assemble(results: Vec<RuleResult>, started_at: DateTime<Utc>, duration_ms: u64) -> Self {
        let overall = Self::derive_overall(&results);
        Self {
            results,
            overall,
            started_at,
            duration_ms,
        }
    }

    fn derive_overall(results: &[RuleResult]) -> RuleStatus {
        if results.iter().any(|r| r.status.is_fail()) {
            RuleStatus::Fail
        } else if results.iter().any(|r| r.status.is_error()) {
            RuleStatus::Error
        } else if !results.is_empty() && results.iter().all(|r| r.status == RuleStatus::Info) {
            RuleStatus::Info
        } else {
            RuleStatus::Pass
        }
    }

    /// Number of results with the given status.
    pub fn count(&self, status: RuleStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    /// One-line summary of the shape the original tool printed.
    pub fn summary(&self) -> String {
        format!(
            "{} checks: {} passed, {} failed, {} informational, {} errors",
            self.results.len(),
            self.count(RuleStatus::Pass),
            self.count(RuleStatus::Fail),
            self.count(RuleStatus::Info),
            self.count(RuleStatus::Error),
        )
    }
}
