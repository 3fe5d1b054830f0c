//! Report formatting for the three output surfaces: human-readable table,
//! machine-readable JSON, and flattened CSV.
//!
//! Every formatter emits one record per rule, including `ERROR` rules, so
//! downstream parsers can rely on the report enumerating everything that
//! was requested.

use std::fmt::Write;

use crate::core::{RuleStatus, ValidationReport};
use crate::error::Result;

/// Configuration options for report formatting.
#[derive(Debug, Clone)]
pub struct FormatterConfig {
    /// Include per-rule metrics in output.
    pub include_metrics: bool,
    /// Include sample rows attached to failed rules.
    pub include_samples: bool,
    /// Whether to use colorized output (human formatter only).
    pub use_colors: bool,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            include_metrics: true,
            include_samples: true,
            use_colors: true,
        }
    }
}

impl FormatterConfig {
    /// Creates a configuration suitable for CI logs and piping.
    pub fn plain() -> Self {
        Self {
            include_metrics: true,
            include_samples: false,
            use_colors: false,
        }
    }

    /// Sets whether to use colorized output.
    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }
}

/// Renders a validation report into an output format.
pub trait ReportFormatter {
    /// Formats the report.
    fn format(&self, report: &ValidationReport) -> Result<String>;
}

/// Machine-readable JSON output: the full report, pretty-printed.
#[derive(Debug, Clone, Default)]
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    /// Creates a pretty-printing JSON formatter.
    pub fn new() -> Self {
        Self { pretty: true }
    }

    /// Sets whether to pretty-print.
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

impl ReportFormatter for JsonFormatter {
    fn format(&self, report: &ValidationReport) -> Result<String> {
        let serialized = if self.pretty {
            serde_json::to_string_pretty(report)?
        } else {
            serde_json::to_string(report)?
        };
        Ok(serialized)
    }
}

/// Human-readable console output.
#[derive(Debug, Clone, Default)]
pub struct HumanFormatter {
    config: FormatterConfig,
}

impl HumanFormatter {
    /// Creates a formatter with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a formatter with the given configuration.
    pub fn with_config(config: FormatterConfig) -> Self {
        Self { config }
    }

    fn status_label(&self, status: RuleStatus) -> String {
        if !self.config.use_colors {
            return status.to_string();
        }
        let code = match status {
            RuleStatus::Pass => "\x1b[32m",
            RuleStatus::Fail => "\x1b[31m",
            RuleStatus::Info => "\x1b[34m",
            RuleStatus::Error => "\x1b[33m",
        };
        format!("{code}{status}\x1b[0m")
    }
}

impl ReportFormatter for HumanFormatter {
    fn format(&self, report: &ValidationReport) -> Result<String> {
        let mut output = String::new();

        writeln!(output).unwrap();
        let symbol = match report.overall {
            RuleStatus::Pass => "✅",
            RuleStatus::Fail => "❌",
            RuleStatus::Info => "ℹ️ ",
            RuleStatus::Error => "🚨",
        };
        writeln!(
            output,
            "{symbol} Overall: {}",
            self.status_label(report.overall)
        )
        .unwrap();
        writeln!(output, "Started: {}", report.started_at.to_rfc3339()).unwrap();
        writeln!(output, "Duration: {}ms", report.duration_ms).unwrap();
        writeln!(output).unwrap();

        for result in &report.results {
            writeln!(
                output,
                "[{}] {} ({}ms)",
                self.status_label(result.status),
                result.name,
                result.duration_ms
            )
            .unwrap();
            writeln!(output, "    {}", result.message).unwrap();

            if self.config.include_metrics && !result.metrics.is_empty() {
                for (name, value) in &result.metrics {
                    if value.fract() == 0.0 {
                        writeln!(output, "      {name}: {value}").unwrap();
                    } else {
                        writeln!(output, "      {name}: {value:.2}").unwrap();
                    }
                }
            }

            if self.config.include_samples && !result.samples.is_empty() {
                writeln!(output, "      samples:").unwrap();
                for row in &result.samples {
                    let rendered: Vec<String> =
                        row.iter().map(|(k, v)| format!("{k}={v}")).collect();
                    writeln!(output, "        {}", rendered.join(" ")).unwrap();
                }
            }
            writeln!(output).unwrap();
        }

        writeln!(output, "{}", report.summary()).unwrap();
        Ok(output)
    }
}

/// Flattened CSV output: one row per rule, metrics joined into one field.
#[derive(Debug, Clone, Default)]
pub struct CsvFormatter;

impl CsvFormatter {
    /// Creates a CSV formatter.
    pub fn new() -> Self {
        Self
    }

    fn escape(field: &str) -> String {
        if field.contains(',') || field.contains('"') || field.contains('\n') {
            format!("\"{}\"", field.replace('"', "\"\""))
        } else {
            field.to_string()
        }
    }
}

impl ReportFormatter for CsvFormatter {
    fn format(&self, report: &ValidationReport) -> Result<String> {
        let mut output = String::from("rule,status,duration_ms,metrics,message\n");

        for result in &report.results {
            let metrics: Vec<String> = result
                .metrics
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect();
            writeln!(
                output,
                "{},{},{},{},{}",
                Self::escape(&result.name),
                result.status,
                result.duration_ms,
                Self::escape(&metrics.join(";")),
                Self::escape(&result.message)
            )
            .unwrap();
        }

        Ok(output)
    }
}
