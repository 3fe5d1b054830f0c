//! Validator configuration.
//!
//! Configuration is an explicitly constructed object handed to the engine
//! at startup; there is no ambient global state. [`ValidatorConfig::from_env`]
//! reads the recognized environment variables, and the `with_*` builders
//! cover programmatic setup and tests.

use std::fmt;
use std::time::Duration;

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Environment variable toggling the SQL cache (default: enabled).
pub const ENV_ENABLE_SQL_CACHE: &str = "ENABLE_SQL_CACHE";
/// Environment variable for cache entry time-to-live in hours (default: 24).
pub const ENV_SQL_CACHE_TTL_HOURS: &str = "SQL_CACHE_TTL_HOURS";
/// Environment variable for the maximum cache entry count (default: 1000).
pub const ENV_SQL_CACHE_MAX_ENTRIES: &str = "SQL_CACHE_MAX_ENTRIES";
/// Environment variable for the row-count tolerance percentage (default: 0.0).
pub const ENV_ROW_COUNT_TOLERANCE: &str = "ROW_COUNT_TOLERANCE";

/// A credential that is zeroized on drop and redacted in `Debug` output.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Secret(String);

impl Secret {
    /// Wraps a credential string.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Exposes the underlying value for request construction.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Returns true if the credential is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Runtime configuration for the validation engine and its SQL cache.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Whether the SQL cache is consulted at all.
    pub enable_sql_cache: bool,
    /// Cache entry time-to-live, in hours.
    pub sql_cache_ttl_hours: u64,
    /// Maximum number of cache entries before oldest-first eviction.
    pub sql_cache_max_entries: usize,
    /// Row-count tolerance as a percentage (1.0 means 1%); 0.0 is exact match.
    pub row_count_tolerance: f64,
    /// Maximum number of plans executed concurrently within one request.
    pub max_concurrency: usize,
    /// Per-statement backend timeout.
    pub query_timeout: Duration,
    /// Bound on sample rows attached to FAIL results.
    pub sample_limit: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            enable_sql_cache: true,
            sql_cache_ttl_hours: 24,
            sql_cache_max_entries: 1000,
            row_count_tolerance: 0.0,
            max_concurrency: num_cpus::get().min(8),
            query_timeout: Duration::from_secs(300),
            sample_limit: 10,
        }
    }
}

impl ValidatorConfig {
    /// Builds a configuration from the recognized environment variables,
    /// falling back to defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(enabled) = env_bool(ENV_ENABLE_SQL_CACHE) {
            config.enable_sql_cache = enabled;
        }
        if let Some(ttl) = env_parse::<u64>(ENV_SQL_CACHE_TTL_HOURS) {
            config.sql_cache_ttl_hours = ttl;
        }
        if let Some(max) = env_parse::<usize>(ENV_SQL_CACHE_MAX_ENTRIES) {
            config.sql_cache_max_entries = max;
        }
        if let Some(tolerance) = env_parse::<f64>(ENV_ROW_COUNT_TOLERANCE) {
            config.row_count_tolerance = tolerance;
        }

        config
    }

    /// Sets whether the SQL cache is enabled.
    pub fn with_sql_cache(mut self, enabled: bool) -> Self {
        self.enable_sql_cache = enabled;
        self
    }

    /// Sets the cache time-to-live in hours.
    pub fn with_cache_ttl_hours(mut self, hours: u64) -> Self {
        self.sql_cache_ttl_hours = hours;
        self
    }

    /// Sets the maximum cache entry count.
    pub fn with_cache_max_entries(mut self, max_entries: usize) -> Self {
        self.sql_cache_max_entries = max_entries;
        self
    }

    /// Sets the row-count tolerance percentage.
    pub fn with_row_count_tolerance(mut self, percent: f64) -> Self {
        self.row_count_tolerance = percent;
        self
    }

    /// Sets the plan concurrency limit (clamped to at least 1).
    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = limit.max(1);
        self
    }

    /// Sets the per-statement backend timeout.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Sets the sample-row bound for FAIL results.
    pub fn with_sample_limit(mut self, limit: usize) -> Self {
        self.sample_limit = limit;
        self
    }

    /// Cache time-to-live as a [`Duration`].
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.sql_cache_ttl_hours * 3600)
    }
}

fn env_bool(name: &str) -> Option<bool> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ValidatorConfig::default();
        assert!(config.enable_sql_cache);
        assert_eq!(config.sql_cache_ttl_hours, 24);
        assert_eq!(config.sql_cache_max_entries, 1000);
        assert_eq!(config.row_count_tolerance, 0.0);
        assert!(config.max_concurrency >= 1);
        assert_eq!(config.cache_ttl(), Duration::from_secs(24 * 3600));
    }

    #[test]
    fn test_builder_chain() {
        let config = ValidatorConfig::default()
            .with_sql_cache(false)
            .with_cache_ttl_hours(1)
            .with_cache_max_entries(2)
            .with_row_count_tolerance(1.5)
            .with_max_concurrency(0)
            .with_sample_limit(5);

        assert!(!config.enable_sql_cache);
        assert_eq!(config.sql_cache_ttl_hours, 1);
        assert_eq!(config.sql_cache_max_entries, 2);
        assert_eq!(config.row_count_tolerance, 1.5);
        // Concurrency is clamped to at least one worker.
        assert_eq!(config.max_concurrency, 1);
        assert_eq!(config.sample_limit, 5);
    }

    #[test]
    fn test_secret_debug_redacts() {
        let secret = Secret::new("api-token-value");
        assert_eq!(format!("{secret:?}"), "Secret(***)");
        assert_eq!(secret.expose(), "api-token-value");
    }
}
