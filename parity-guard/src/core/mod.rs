//! Core validation types: plans, results, reports, and the engine.
//!
//! ## Architecture
//!
//! ```text
//! ValidationRequest ──▶ ValidationEngine ──▶ ValidationReport
//!        │                    │
//!        │          ┌─────────┼──────────┐
//!        ▼          ▼         ▼          ▼
//!   Translator   SqlCache  rules::   QueryBackend
//!   (free text)  (SQL by   build_sql (execute /
//!                fingerprint)         table_schema)
//! ```
//!
//! Plans are the typed unit of work ([`ValidationPlan`]); the engine turns
//! each into SQL, executes it, and classifies the outcome into a
//! [`RuleResult`]. Reports own their results in resolution order.

mod classify;
mod engine;
mod plan;
mod result;
mod table_ref;

pub use engine::{ValidationEngine, ValidationRequest};
pub use plan::{DateFilter, KeySpec, PlanHints, RuleKind, RuleParams, ValidationPlan};
pub use result::{Row, RuleResult, RuleStatus, ValidationReport};
pub use table_ref::TableRef;
