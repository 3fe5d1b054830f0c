//! The validation rule engine.
//!
//! Orchestrates one validation request end to end: resolve the request into
//! plans (directly or through the translation adapter), consult the SQL
//! cache, generate and execute SQL through the query backend, classify the
//! outcomes, and assemble the report. Plan executions are independent and
//! run concurrently under a configurable limit; one plan's failure never
//! prevents the others from completing.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio::sync::Notify;
use tracing::{debug, info, instrument, warn};

use crate::backend::{BackendError, QueryBackend, QueryOutput};
use crate::cache::{fingerprint_plan, fingerprint_request, PlannedSql, SqlCache};
use crate::config::ValidatorConfig;
use crate::core::classify::{classify, classify_schema, Executed};
use crate::core::{
    PlanHints, RuleKind, RuleResult, TableRef, ValidationPlan, ValidationReport,
};
use crate::error::{ParityError, Result};
use crate::rules::{build_sql, BuildContext, SqlSet, SqlStatement};
use crate::translate::Translator;

/// A validation request: explicit plans, or free text for the translator.
#[derive(Debug, Clone)]
pub enum ValidationRequest {
    /// Fully specified plans, executed as given.
    Plans(Vec<ValidationPlan>),
    /// A natural-language request plus whatever the caller already knows.
    NaturalLanguage {
        /// The request text.
        text: String,
        /// Partial plan information the translator may reuse.
        hints: PlanHints,
    },
}

impl ValidationRequest {
    /// Wraps a single plan.
    pub fn single(plan: ValidationPlan) -> Self {
        Self::Plans(vec![plan])
    }
}

/// One unit of work after request resolution.
enum Job {
    /// A plan that still needs SQL (explicit path; per-plan cache applies).
    Build(ValidationPlan),
    /// A plan with SQL already resolved (cache hit or fresh translation).
    Ready(PlannedSql),
    /// Resolution already failed; carries the ERROR result to report.
    Failed(Box<RuleResult>),
}

/// Orchestrates validation plans against a query backend.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use parity_guard::backend::MemoryBackend;
/// use parity_guard::cache::SqlCache;
/// use parity_guard::config::ValidatorConfig;
/// use parity_guard::core::{RuleKind, ValidationEngine, ValidationPlan, ValidationRequest};
/// use parity_guard::translate::NullTranslator;
///
/// # async fn example() -> parity_guard::error::Result<()> {
/// let config = ValidatorConfig::default();
/// let engine = ValidationEngine::new(
///     Arc::new(MemoryBackend::new()),
///     Arc::new(NullTranslator),
///     Arc::new(SqlCache::new(&config)),
///     config,
/// );
///
/// let plan = ValidationPlan::new(
///     RuleKind::RowCount,
///     vec!["legacy.orders".parse()?, "prod.orders".parse()?],
/// );
/// let report = engine.run(ValidationRequest::single(plan)).await?;
/// println!("{}", report.summary());
/// # Ok(())
/// # }
/// ```
pub struct ValidationEngine<B, T> {
    backend: Arc<B>,
    translator: Arc<T>,
    cache: Arc<SqlCache>,
    config: ValidatorConfig,
}

impl<B, T> ValidationEngine<B, T>
where
    B: QueryBackend + 'static,
    T: Translator + 'static,
{
    /// Creates an engine over the given adapters, cache, and configuration.
    pub fn new(
        backend: Arc<B>,
        translator: Arc<T>,
        cache: Arc<SqlCache>,
        config: ValidatorConfig,
    ) -> Self {
        Self {
            backend,
            translator,
            cache,
            config,
        }
    }

    /// The engine's SQL cache, for stats/clear surfaces.
    pub fn cache(&self) -> &Arc<SqlCache> {
        &self.cache
    }

    /// Probes that a table is reachable with a trivial statement.
    pub async fn probe_table(&self, table: &TableRef) -> std::result::Result<(), BackendError> {
        let sql = format!("SELECT 1 AS probe FROM {} LIMIT 1", table.qualified());
        self.execute_with_timeout(&sql).await.map(|_| ())
    }

    /// Runs a validation request to completion.
    #[instrument(skip(self, request))]
    pub async fn run(&self, request: ValidationRequest) -> Result<ValidationReport> {
        self.run_inner(request, None).await
    }

    /// Runs a validation request, stopping early when `shutdown` fires.
    ///
    /// In-flight backend calls are dropped rather than awaited; results
    /// already classified still make it into the report.
    pub async fn run_with_shutdown(
        &self,
        request: ValidationRequest,
        shutdown: &Notify,
    ) -> Result<ValidationReport> {
        self.run_inner(request, Some(shutdown)).await
    }

    async fn run_inner(
        &self,
        request: ValidationRequest,
        shutdown: Option<&Notify>,
    ) -> Result<ValidationReport> {
        let started_at = Utc::now();
        let start = Instant::now();

        let jobs = self.resolve(request).await?;
        info!(plans = jobs.len(), "request resolved");

        let mut indexed = stream::iter(jobs.into_iter().enumerate())
            .map(|(index, job)| async move { (index, self.execute_job(job).await) })
            .buffer_unordered(self.config.max_concurrency.max(1));

        let mut results: Vec<(usize, RuleResult)> = Vec::new();
        loop {
            let next = match shutdown {
                Some(shutdown) => {
                    tokio::select! {
                        biased;
                        _ = shutdown.notified() => {
                            warn!("request cancelled; assembling partial report");
                            break;
                        }
                        next = indexed.next() => next,
                    }
                }
                None => indexed.next().await,
            };
            match next {
                Some(result) => results.push(result),
                None => break,
            }
        }
        drop(indexed);

        results.sort_by_key(|(index, _)| *index);
        let results: Vec<RuleResult> = results.into_iter().map(|(_, r)| r).collect();

        let report = ValidationReport::assemble(
            results,
            started_at,
            start.elapsed().as_millis() as u64,
        );
        info!(
            overall = %report.overall,
            duration_ms = report.duration_ms,
            "validation completed: {}",
            report.summary()
        );
        Ok(report)
    }

    /// Resolves a request into executable jobs.
    ///
    /// Explicit plans must validate; a structurally invalid plan fails the
    /// whole request before anything executes. A natural-language request
    /// consults the intent cache first and only then the translator; a
    /// translation failure becomes a single ERROR result rather than an
    /// engine error, so plans from other requests are unaffected.
    async fn resolve(&self, request: ValidationRequest) -> Result<Vec<Job>> {
        match request {
            ValidationRequest::Plans(plans) => {
                if plans.is_empty() {
                    return Err(ParityError::configuration("no validation plans given"));
                }
                for plan in &plans {
                    plan.validate()?;
                }
                Ok(plans.into_iter().map(Job::Build).collect())
            }
            ValidationRequest::NaturalLanguage { text, hints } => {
                let key = fingerprint_request(&text, &hints);
                if let Some(planned) = self.cache.lookup(&key) {
                    debug!(key = key.short(), "translation served from cache");
                    return Ok(planned.into_iter().map(Job::Ready).collect());
                }

                let plans = match self.translator.translate(&text, &hints).await {
                    Ok(plans) => plans,
                    Err(e) => {
                        warn!(error = %e, "translation failed");
                        return Ok(vec![Job::Failed(Box::new(
                            RuleResult::error(RuleKind::CustomSql, e.to_string())
                                .with_name("Natural Language Request"),
                        ))]);
                    }
                };

                let mut jobs = Vec::with_capacity(plans.len());
                let mut cacheable = Vec::with_capacity(plans.len());
                for plan in plans {
                    match self.prepare_sql(&plan).await {
                        Ok(sql) => {
                            let planned = PlannedSql { plan, sql };
                            cacheable.push(planned.clone());
                            jobs.push(Job::Ready(planned));
                        }
                        Err(e) => {
                            jobs.push(Job::Failed(Box::new(RuleResult::error(
                                plan.kind,
                                e.to_string(),
                            ))));
                        }
                    }
                }
                if !cacheable.is_empty() {
                    self.cache.store(&key, cacheable);
                }
                Ok(jobs)
            }
        }
    }

    async fn execute_job(&self, job: Job) -> RuleResult {
        let start = Instant::now();
        let result = match job {
            Job::Failed(result) => *result,
            Job::Build(plan) => {
                let key = fingerprint_plan(&plan);
                let planned = match self.cache.lookup(&key) {
                    Some(mut cached) if !cached.is_empty() => cached.remove(0),
                    _ => match self.prepare_sql(&plan).await {
                        Ok(sql) => {
                            let planned = PlannedSql { plan, sql };
                            self.cache.store(&key, vec![planned.clone()]);
                            planned
                        }
                        Err(e) => {
                            return RuleResult::error(plan.kind, e.to_string())
                                .with_duration_ms(start.elapsed().as_millis() as u64)
                        }
                    },
                };
                self.execute_planned(planned).await
            }
            Job::Ready(planned) => self.execute_planned(planned).await,
        };
        result.with_duration_ms(start.elapsed().as_millis() as u64)
    }

    /// Builds the SQL set for a plan, fetching catalog schemas where the
    /// plan needs column knowledge.
    async fn prepare_sql(&self, plan: &ValidationPlan) -> Result<SqlSet> {
        let mut ctx = BuildContext::new(
            plan.params.sample_limit.unwrap_or(self.config.sample_limit),
        );

        let needs_schema = plan.date_filter.is_some()
            || (plan.kind == RuleKind::Profile && plan.params.profile_columns.is_empty());
        if needs_schema {
            for table in &plan.tables {
                let schema = self.backend.table_schema(table).await?;
                ctx = ctx.with_columns(table, schema.into_iter().map(|c| c.name));
            }
        }

        if let Some(filter) = &plan.date_filter {
            let applies_anywhere = plan
                .tables
                .iter()
                .any(|t| ctx.filter_applies(t, &filter.column));
            if !applies_anywhere {
                return Err(ParityError::configuration(format!(
                    "date filter column '{}' is not present on any involved table",
                    filter.column
                )));
            }
        }

        build_sql(plan, &ctx)
    }

    /// Executes a resolved plan's statements and classifies the outcome.
    async fn execute_planned(&self, planned: PlannedSql) -> RuleResult {
        let plan = &planned.plan;

        if plan.kind == RuleKind::SchemaComparison {
            return self.execute_schema_comparison(plan).await;
        }

        let mut executed = Vec::with_capacity(planned.sql.len());
        for statement in planned.sql {
            match self.execute_statement(&statement).await {
                Ok(output) => executed.push(Executed { statement, output }),
                Err(e) => {
                    warn!(
                        rule = plan.kind.as_str(),
                        label = %statement.label,
                        error = %e,
                        "statement failed"
                    );
                    return RuleResult::error(plan.kind, format!("{}: {e}", statement.label));
                }
            }
        }

        classify(
            plan,
            &executed,
            self.config.row_count_tolerance,
            plan.params.sample_limit.unwrap_or(self.config.sample_limit),
        )
    }

    async fn execute_schema_comparison(&self, plan: &ValidationPlan) -> RuleResult {
        let legacy = match self.backend.table_schema(plan.legacy()).await {
            Ok(schema) => schema,
            Err(e) => return RuleResult::error(plan.kind, e.to_string()),
        };
        let prod = match plan.prod() {
            None => None,
            Some(table) => match self.backend.table_schema(table).await {
                Ok(schema) => Some(schema),
                Err(e) => return RuleResult::error(plan.kind, e.to_string()),
            },
        };
        classify_schema(&legacy, prod.as_deref())
    }

    async fn execute_statement(&self, statement: &SqlStatement) -> Result<QueryOutput> {
        debug!(label = %statement.label, "executing statement");
        let output = self.execute_with_timeout(&statement.sql).await?;
        debug!(
            label = %statement.label,
            rows = output.rows.len(),
            duration_ms = output.duration_ms,
            "statement finished"
        );
        Ok(output)
    }

    async fn execute_with_timeout(
        &self,
        sql: &str,
    ) -> std::result::Result<QueryOutput, BackendError> {
        match tokio::time::timeout(self.config.query_timeout, self.backend.execute(sql)).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout {
                seconds: self.config.query_timeout.as_secs(),
            }),
        }
    }
}
