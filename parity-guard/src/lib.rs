//! # parity-guard: migration validation for remote SQL engines
//!
//! parity-guard validates that a legacy dataset and its migrated
//! production counterpart are equivalent, and profiles single datasets, by
//! generating SQL against a remote columnar query engine and interpreting
//! the results. Validation intents arrive either as explicit plans or as
//! natural-language requests resolved by a translation adapter, and a
//! fingerprinted, TTL-bounded cache amortizes the expensive SQL-generation
//! work across repeated requests.
//!
//! ## Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use parity_guard::backend::{MemoryBackend, QueryOutput};
//! use parity_guard::cache::SqlCache;
//! use parity_guard::config::ValidatorConfig;
//! use parity_guard::core::{
//!     RuleKind, RuleStatus, ValidationEngine, ValidationPlan, ValidationRequest,
//! };
//! use parity_guard::translate::NullTranslator;
//!
//! # async fn example() -> parity_guard::error::Result<()> {
//! // Any QueryBackend works; MemoryBackend answers from a script.
//! let backend = MemoryBackend::new()
//!     .with_response("FROM legacy.orders", QueryOutput::scalar("row_count", 1000))
//!     .with_response("FROM prod.orders", QueryOutput::scalar("row_count", 1000));
//!
//! let config = ValidatorConfig::default();
//! let engine = ValidationEngine::new(
//!     Arc::new(backend),
//!     Arc::new(NullTranslator),
//!     Arc::new(SqlCache::new(&config)),
//!     config,
//! );
//!
//! let plan = ValidationPlan::new(
//!     RuleKind::RowCount,
//!     vec!["legacy.orders".parse()?, "prod.orders".parse()?],
//! );
//! let report = engine.run(ValidationRequest::single(plan)).await?;
//! assert_eq!(report.overall, RuleStatus::Pass);
//! # Ok(())
//! # }
//! ```
//!
//! ## Rule kinds
//!
//! - **Row count**: tolerance-based comparison of `COUNT(*)` per side
//! - **Key uniqueness**: duplicate key-tuple groups per table, with samples
//! - **Schema comparison**: catalog set-difference over columns and types
//! - **Mismatch detection**: join-based side-by-side column comparison
//! - **Missing records**: anti-join union tagged `legacy_only`/`prod_only`
//! - **Profile**: null/distinct/top-value statistics for one table
//! - **Custom SQL**: caller- or translator-supplied read-only statements
//!
//! ## Caching
//!
//! The cache stores *generated SQL*, never row results: a hit skips
//! template generation and LLM translation but still re-executes against
//! the engine, so reported numbers are always fresh. Keys are canonical
//! SHA-256 fingerprints, stable under table/key reordering and request
//! text formatting. Entries expire by TTL and are evicted oldest-first at
//! capacity; any cache failure degrades to a miss, never to a failed
//! validation.
//!
//! ## Architecture
//!
//! - **[`core`]**: plans, results, reports, and the [`core::ValidationEngine`]
//! - **[`rules`]**: SQL template builders per rule kind
//! - **[`cache`]**: fingerprinted SQL cache
//! - **[`backend`]**: the query-engine seam ([`backend::QueryBackend`])
//! - **[`translate`]**: the natural-language seam ([`translate::Translator`])
//! - **[`formatters`]**: table / JSON / CSV report rendering
//! - **[`config`]**, **[`logging`]**, **[`error`]**: ambient plumbing

pub mod backend;
pub mod cache;
pub mod config;
pub mod core;
pub mod error;
pub mod formatters;
pub mod logging;
pub mod prelude;
pub mod rules;
pub mod translate;
