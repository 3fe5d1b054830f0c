//! The `parity` migration validation CLI.
//!
//! Thin glue over the parity-guard library: flag parsing, adapter
//! construction from the environment, and report rendering. All validation
//! logic lives in the library.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::Notify;
use tracing::warn;

use parity_guard::backend::{HttpBackendConfig, HttpQueryBackend};
use parity_guard::cache::SqlCache;
use parity_guard::config::{Secret, ValidatorConfig};
use parity_guard::core::{
    DateFilter, KeySpec, PlanHints, RuleKind, RuleParams, RuleResult, TableRef, ValidationEngine,
    ValidationPlan, ValidationReport, ValidationRequest,
};
use parity_guard::error::{ParityError, Result};
use parity_guard::formatters::{
    CsvFormatter, FormatterConfig, HumanFormatter, JsonFormatter, ReportFormatter,
};
use parity_guard::logging::{init_logging, LoggingConfig};
use parity_guard::translate::{ChatTranslator, ChatTranslatorConfig};

#[derive(Parser, Debug)]
#[command(name = "parity")]
#[command(about = "Validates legacy/production table parity on a remote SQL engine")]
#[command(version)]
struct Cli {
    /// Query gateway base URL
    #[arg(long, env = "QUERY_GATEWAY_URL", default_value = "http://localhost:8181")]
    gateway_url: String,

    /// Query gateway API token
    #[arg(long, env = "QUERY_GATEWAY_TOKEN", hide_env_values = true)]
    gateway_token: Option<String>,

    /// Translation service base URL (chat-completions compatible)
    #[arg(long, env = "LLM_API_URL", default_value = "https://caas.api.godaddy.com/v1")]
    llm_url: String,

    /// Translation service API token
    #[arg(long, env = "LLM_API_TOKEN", hide_env_values = true)]
    llm_token: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compare a legacy table against its production counterpart
    Validate {
        /// Legacy table name (e.g. ecomm_mart.fact_bill_line)
        #[arg(short, long)]
        legacy_table: String,

        /// Production table name
        #[arg(short, long)]
        prod_table: String,

        /// Primary key column(s), comma-separated for composite keys
        #[arg(short = 'k', long)]
        primary_key: Option<String>,

        /// Columns compared value-by-value (enables mismatch detection)
        #[arg(long, value_delimiter = ',')]
        compare_columns: Vec<String>,

        /// Detect records present on one side only (requires --primary-key)
        #[arg(long)]
        check_missing: bool,

        /// Skip the schema comparison
        #[arg(long)]
        no_schema: bool,

        /// Row-count tolerance percentage (default from ROW_COUNT_TOLERANCE)
        #[arg(long)]
        tolerance: Option<f64>,

        #[command(flatten)]
        dates: DateArgs,

        #[arg(short, long, value_enum, default_value = "table")]
        output_format: OutputFormat,
    },

    /// Profile a single table (and optionally check key uniqueness)
    ValidateSingle {
        /// Table name
        #[arg(short, long)]
        table: String,

        /// Primary key column(s), comma-separated
        #[arg(short = 'k', long)]
        primary_key: Option<String>,

        /// Columns to profile (defaults to the table's schema)
        #[arg(long, value_delimiter = ',')]
        profile_columns: Vec<String>,

        /// Columns given top-N category frequency breakdowns
        #[arg(long, value_delimiter = ',')]
        category_columns: Vec<String>,

        /// SCD2 current-record flag column
        #[arg(long)]
        current_flag: Option<String>,

        #[command(flatten)]
        dates: DateArgs,

        #[arg(short, long, value_enum, default_value = "table")]
        output_format: OutputFormat,
    },

    /// Resolve a natural-language validation request and run it
    LlmValidate {
        /// The validation request, in plain language
        request: String,

        /// Table names, comma-separated, legacy first
        #[arg(short, long, value_delimiter = ',')]
        tables: Vec<String>,

        /// Primary key column(s) for context
        #[arg(short = 'k', long)]
        primary_key: Option<String>,

        #[command(flatten)]
        dates: DateArgs,

        #[arg(short, long, value_enum, default_value = "table")]
        output_format: OutputFormat,
    },

    /// Run a custom SQL pair and compare the results
    CustomSql {
        /// Legacy table name
        #[arg(short, long)]
        legacy_table: String,

        /// Production table name
        #[arg(short, long)]
        prod_table: String,

        /// SQL for the legacy side
        #[arg(long)]
        legacy_sql: String,

        /// SQL for the production side
        #[arg(long)]
        prod_sql: String,

        #[arg(short, long, value_enum, default_value = "table")]
        output_format: OutputFormat,
    },

    /// Show SQL cache statistics
    CacheStats,

    /// Clear the SQL cache and reset its statistics
    CacheClear,

    /// Display the effective cache configuration
    CacheConfig,
}

#[derive(clap::Args, Debug)]
struct DateArgs {
    /// Date column for filtering
    #[arg(short = 'd', long)]
    date_column: Option<String>,

    /// Start date, inclusive (YYYY-MM-DD)
    #[arg(short = 's', long)]
    start_date: Option<String>,

    /// End date, inclusive (YYYY-MM-DD)
    #[arg(short = 'e', long)]
    end_date: Option<String>,
}

impl DateArgs {
    fn to_filter(&self) -> Result<Option<DateFilter>> {
        match (&self.date_column, &self.start_date, &self.end_date) {
            (None, None, None) => Ok(None),
            (Some(column), Some(start), Some(end)) => {
                let start = start.parse().map_err(|_| {
                    ParityError::configuration(format!("invalid start date '{start}'"))
                })?;
                let end = end.parse().map_err(|_| {
                    ParityError::configuration(format!("invalid end date '{end}'"))
                })?;
                Ok(Some(DateFilter::new(column.clone(), start, end)?))
            }
            _ => Err(ParityError::configuration(
                "date filtering requires --date-column, --start-date, and --end-date together",
            )),
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl OutputFormat {
    fn render(&self, report: &ValidationReport) -> Result<String> {
        match self {
            OutputFormat::Table => HumanFormatter::with_config(
                FormatterConfig::default().with_colors(std::io::IsTerminal::is_terminal(&std::io::stdout())),
            )
            .format(report),
            OutputFormat::Json => JsonFormatter::new().format(report),
            OutputFormat::Csv => CsvFormatter::new().format(report),
        }
    }
}

type Engine = ValidationEngine<HttpQueryBackend, ChatTranslator>;

fn build_engine(cli: &Cli, config: ValidatorConfig) -> Result<Engine> {
    let mut backend_config = HttpBackendConfig::new(cli.gateway_url.as_str())
        .with_query_timeout(config.query_timeout + Duration::from_secs(5));
    if let Some(token) = &cli.gateway_token {
        backend_config = backend_config.with_api_key(Secret::new(token.clone()));
    }
    let backend = HttpQueryBackend::new(backend_config)
        .map_err(|e| ParityError::configuration(e.to_string()))?;

    let llm_token = Secret::new(cli.llm_token.clone().unwrap_or_default());
    let translator = ChatTranslator::new(ChatTranslatorConfig::new(cli.llm_url.as_str(), llm_token))
        .map_err(|e| ParityError::configuration(e.to_string()))?;

    let cache = Arc::new(SqlCache::new(&config));
    Ok(ValidationEngine::new(
        Arc::new(backend),
        Arc::new(translator),
        cache,
        config,
    ))
}

/// Runs the request with Ctrl-C mapped onto the engine's shutdown path, so
/// partial results are still reported.
async fn run_request(engine: &Engine, request: ValidationRequest) -> Result<ValidationReport> {
    let shutdown = Arc::new(Notify::new());
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.notify_one();
        }
    });
    engine.run_with_shutdown(request, &shutdown).await
}

async fn preflight(engine: &Engine, tables: &[TableRef]) -> Option<ValidationReport> {
    for table in tables {
        if let Err(e) = engine.probe_table(table).await {
            warn!(table = %table, error = %e, "table access probe failed");
            let result = RuleResult::error(RuleKind::CustomSql, format!("cannot access {table}: {e}"))
                .with_name("Table Access");
            return Some(ValidationReport::assemble(
                vec![result],
                chrono::Utc::now(),
                0,
            ));
        }
    }
    None
}

fn exit_code(report: &ValidationReport) -> ExitCode {
    use parity_guard::core::RuleStatus;
    match report.overall {
        RuleStatus::Pass | RuleStatus::Info => ExitCode::SUCCESS,
        RuleStatus::Fail => ExitCode::from(2),
        RuleStatus::Error => ExitCode::FAILURE,
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = ValidatorConfig::from_env();

    match &cli.command {
        Command::Validate {
            legacy_table,
            prod_table,
            primary_key,
            compare_columns,
            check_missing,
            no_schema,
            tolerance,
            dates,
            output_format,
        } => {
            let legacy: TableRef = legacy_table.parse()?;
            let prod: TableRef = prod_table.parse()?;
            let keys = primary_key.as_deref().map(KeySpec::parse).transpose()?;
            let date_filter = dates.to_filter()?;
            let tables = vec![legacy.clone(), prod.clone()];

            let mut plans = Vec::new();

            let mut row_count_params = RuleParams::default();
            row_count_params.tolerance = *tolerance;
            let mut plan = ValidationPlan::new(RuleKind::RowCount, tables.clone())
                .with_params(row_count_params);
            plan.date_filter = date_filter.clone();
            plans.push(plan);

            if let Some(keys) = &keys {
                let mut plan = ValidationPlan::new(RuleKind::KeyUniqueness, tables.clone())
                    .with_keys(keys.clone());
                plan.date_filter = date_filter.clone();
                plans.push(plan);
            }

            if !no_schema {
                plans.push(ValidationPlan::new(RuleKind::SchemaComparison, tables.clone()));
            }

            if !compare_columns.is_empty() {
                let keys = keys.clone().ok_or_else(|| {
                    ParityError::configuration("--compare-columns requires --primary-key")
                })?;
                let mut params = RuleParams::default();
                params.compare_columns = compare_columns.clone();
                let mut plan = ValidationPlan::new(RuleKind::MismatchDetection, tables.clone())
                    .with_keys(keys)
                    .with_params(params);
                plan.date_filter = date_filter.clone();
                plans.push(plan);
            }

            if *check_missing {
                let keys = keys.clone().ok_or_else(|| {
                    ParityError::configuration("--check-missing requires --primary-key")
                })?;
                let mut plan = ValidationPlan::new(RuleKind::MissingRecords, tables.clone())
                    .with_keys(keys);
                plan.date_filter = date_filter.clone();
                plans.push(plan);
            }

            let engine = build_engine(&cli, config)?;
            let report = match preflight(&engine, &tables).await {
                Some(report) => report,
                None => run_request(&engine, ValidationRequest::Plans(plans)).await?,
            };
            println!("{}", output_format.render(&report)?);
            Ok(exit_code(&report))
        }

        Command::ValidateSingle {
            table,
            primary_key,
            profile_columns,
            category_columns,
            current_flag,
            dates,
            output_format,
        } => {
            let table: TableRef = table.parse()?;
            let date_filter = dates.to_filter()?;

            let mut params = RuleParams::default();
            params.profile_columns = profile_columns.clone();
            params.category_columns = category_columns.clone();
            params.current_flag = current_flag.clone();
            let mut profile = ValidationPlan::new(RuleKind::Profile, vec![table.clone()])
                .with_params(params);
            profile.date_filter = date_filter.clone();

            let mut plans = vec![profile];
            if let Some(spec) = primary_key {
                let mut plan = ValidationPlan::new(RuleKind::KeyUniqueness, vec![table.clone()])
                    .with_keys(KeySpec::parse(spec)?);
                plan.date_filter = date_filter;
                plans.push(plan);
            }

            let engine = build_engine(&cli, config)?;
            let report = run_request(&engine, ValidationRequest::Plans(plans)).await?;
            println!("{}", output_format.render(&report)?);
            Ok(exit_code(&report))
        }

        Command::LlmValidate {
            request,
            tables,
            primary_key,
            dates,
            output_format,
        } => {
            let mut hints = PlanHints::default();
            hints.tables = tables
                .iter()
                .map(|t| t.parse())
                .collect::<Result<Vec<_>>>()?;
            hints.keys = primary_key.as_deref().map(KeySpec::parse).transpose()?;
            hints.date_filter = dates.to_filter()?;

            let engine = build_engine(&cli, config)?;
            let report = run_request(
                &engine,
                ValidationRequest::NaturalLanguage {
                    text: request.clone(),
                    hints,
                },
            )
            .await?;
            println!("{}", output_format.render(&report)?);
            Ok(exit_code(&report))
        }

        Command::CustomSql {
            legacy_table,
            prod_table,
            legacy_sql,
            prod_sql,
            output_format,
        } => {
            let mut params = RuleParams::default();
            params.legacy_sql = Some(legacy_sql.clone());
            params.prod_sql = Some(prod_sql.clone());
            let plan = ValidationPlan::new(
                RuleKind::CustomSql,
                vec![legacy_table.parse()?, prod_table.parse()?],
            )
            .with_params(params);

            let engine = build_engine(&cli, config)?;
            let report = run_request(&engine, ValidationRequest::single(plan)).await?;
            println!("{}", output_format.render(&report)?);
            Ok(exit_code(&report))
        }

        Command::CacheStats => {
            let cache = SqlCache::new(&config);
            let stats = cache.stats();
            println!("entries:   {}", stats.entry_count);
            println!("hits:      {}", stats.hits);
            println!("misses:    {}", stats.misses);
            println!("evictions: {}", stats.evictions);
            println!("hit rate:  {:.1}%", stats.hit_rate());
            Ok(ExitCode::SUCCESS)
        }

        Command::CacheClear => {
            let cache = SqlCache::new(&config);
            cache.clear();
            println!("cache cleared");
            Ok(ExitCode::SUCCESS)
        }

        Command::CacheConfig => {
            println!("enabled:     {}", config.enable_sql_cache);
            println!("ttl:         {}h", config.sql_cache_ttl_hours);
            println!("max entries: {}", config.sql_cache_max_entries);
            println!("tolerance:   {}%", config.row_count_tolerance);
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let logging = if cli.verbose {
        LoggingConfig::development()
    } else {
        LoggingConfig::default()
    };
    if let Err(e) = init_logging(logging) {
        eprintln!("failed to initialize logging: {e}");
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
