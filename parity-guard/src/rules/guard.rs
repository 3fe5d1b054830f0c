//! Read-only guard for caller- and translator-supplied SQL.
//!
//! Generated templates never contain writes, but custom SQL arrives from
//! the CLI or the translation adapter and is executed verbatim. This guard
//! rejects statements that could modify data or schema before they reach
//! the backend.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::RwLock;

use crate::error::{ParityError, Result};

/// Cache for compiled keyword patterns to avoid recompiling
static PATTERN_CACHE: Lazy<RwLock<HashMap<&'static str, Regex>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

const FORBIDDEN_KEYWORDS: &[&str] = &[
    "DROP", "DELETE", "INSERT", "UPDATE", "CREATE", "ALTER", "TRUNCATE", "GRANT", "REVOKE",
    "MERGE", "CALL", "EXECUTE", "VACUUM", "MSCK", "UNLOAD",
];

/// Validates that a SQL statement is read-only.
///
/// Rejects data/schema modification keywords (word-boundary matched, so
/// `updated_at` passes), statement chaining via semicolons, and comment
/// sequences that could smuggle a second statement past the check.
///
/// # Examples
///
/// ```rust
/// use parity_guard::rules::ensure_read_only;
///
/// assert!(ensure_read_only("SELECT COUNT(*) FROM sales.orders").is_ok());
/// assert!(ensure_read_only("DROP TABLE sales.orders").is_err());
/// ```
pub fn ensure_read_only(sql: &str) -> Result<()> {
    let upper = sql.to_uppercase();

    for &keyword in FORBIDDEN_KEYWORDS {
        let matched = {
            let cache = PATTERN_CACHE
                .read()
                .map_err(|_| ParityError::internal("SQL guard pattern cache lock poisoned"))?;
            cache.get(keyword).map(|re| re.is_match(&upper))
        };

        let matched = match matched {
            Some(matched) => matched,
            None => {
                let pattern = format!(r"\b{keyword}\b");
                let re = Regex::new(&pattern)
                    .map_err(|e| ParityError::internal(format!("bad guard pattern: {e}")))?;
                let matched = re.is_match(&upper);
                let mut cache = PATTERN_CACHE
                    .write()
                    .map_err(|_| ParityError::internal("SQL guard pattern cache lock poisoned"))?;
                cache.insert(keyword, re);
                matched
            }
        };

        if matched {
            return Err(ParityError::RejectedSql(format!(
                "statement contains forbidden operation: {keyword}"
            )));
        }
    }

    if sql.contains(';') {
        return Err(ParityError::RejectedSql(
            "statement must not contain semicolons".to_string(),
        ));
    }

    if sql.contains("--") || sql.contains("/*") || sql.contains("*/") {
        return Err(ParityError::RejectedSql(
            "statement must not contain comments".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_read_only_statements() {
        assert!(ensure_read_only("SELECT COUNT(*) FROM sales.orders").is_ok());
        assert!(ensure_read_only(
            "SELECT a.id FROM legacy.orders a FULL OUTER JOIN prod.orders b ON a.id = b.id"
        )
        .is_ok());
        assert!(ensure_read_only("SELECT SUM(amount) FROM t GROUP BY region").is_ok());
    }

    #[test]
    fn test_rejects_writes() {
        assert!(ensure_read_only("DROP TABLE sales.orders").is_err());
        assert!(ensure_read_only("DELETE FROM sales.orders WHERE 1=1").is_err());
        assert!(ensure_read_only("INSERT INTO t VALUES (1)").is_err());
        assert!(ensure_read_only("create table t (id int)").is_err());
    }

    #[test]
    fn test_rejects_chaining_and_comments() {
        assert!(ensure_read_only("SELECT 1; SELECT 2").is_err());
        assert!(ensure_read_only("SELECT 1 -- trailing").is_err());
        assert!(ensure_read_only("SELECT /* inline */ 1").is_err());
    }

    #[test]
    fn test_word_boundaries() {
        assert!(ensure_read_only("SELECT updated_at FROM t").is_ok());
        assert!(ensure_read_only("SELECT is_deleted FROM t").is_ok());
        assert!(ensure_read_only("SELECT created_by FROM t").is_ok());
    }
}
