//! Prelude for commonly used types and traits in parity-guard.

pub use crate::backend::{MemoryBackend, QueryBackend};
pub use crate::cache::SqlCache;
pub use crate::config::ValidatorConfig;
pub use crate::core::{
    RuleKind, RuleResult, RuleStatus, TableRef, ValidationEngine, ValidationPlan,
    ValidationReport, ValidationRequest,
};
pub use crate::error::{ErrorContext, ParityError, Result};
pub use crate::formatters::{FormatterConfig, ReportFormatter};
pub use crate::translate::Translator;
