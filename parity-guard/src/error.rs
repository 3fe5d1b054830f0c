//! Error types for the parity-guard validation library.
//!
//! This module provides the crate-wide error handling strategy using
//! `thiserror` for automatic error trait implementations. Adapter-specific
//! failures (`BackendError`, `TranslationError`) live next to their adapters
//! and convert into [`ParityError`] at the engine boundary.

use thiserror::Error;

/// The main error type for the parity-guard library.
///
/// Errors are local to the plan they occurred in: the engine converts
/// backend and translation failures into `ERROR`-status rule results, so a
/// `ParityError` escaping [`crate::core::ValidationEngine::run`] means the
/// request itself was unusable (bad configuration, invalid plan), not that
/// a query failed.
#[derive(Error, Debug)]
pub enum ParityError {
    /// The request or plan is invalid and no execution was attempted.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A plan failed structural validation for its rule kind.
    #[error("Invalid plan for rule '{rule}': {message}")]
    InvalidPlan {
        /// Rule kind the plan was built for
        rule: String,
        /// What is missing or malformed
        message: String,
    },

    /// The remote query engine rejected or failed a statement.
    #[error("Backend error: {0}")]
    Backend(#[from] crate::backend::BackendError),

    /// The natural-language translator was unavailable or returned an
    /// unusable response.
    #[error("Translation error: {0}")]
    Translation(#[from] crate::translate::TranslationError),

    /// SQL supplied from outside the template builder failed the read-only
    /// guard.
    #[error("Rejected SQL: {0}")]
    RejectedSql(String),

    /// Error from serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Error from I/O operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error for unexpected conditions.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A type alias for `Result<T, ParityError>`.
///
/// This is the standard `Result` type used throughout the library.
pub type Result<T> = std::result::Result<T, ParityError>;

impl ParityError {
    /// Creates a configuration error with the given message.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Creates an invalid-plan error for the given rule kind.
    pub fn invalid_plan(rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPlan {
            rule: rule.into(),
            message: message.into(),
        }
    }

    /// Creates an internal error with the given message.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Adds context to an error.
    fn context(self, msg: &str) -> Result<T>;

    /// Adds context with a lazy message.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<ParityError>,
{
    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| {
            let base = e.into();
            ParityError::Internal(format!("{msg}: {base}"))
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let base = e.into();
            ParityError::Internal(format!("{}: {}", f(), base))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error() {
        let err = ParityError::configuration("date column 'ts' not present on either table");
        assert_eq!(
            err.to_string(),
            "Configuration error: date column 'ts' not present on either table"
        );
    }

    #[test]
    fn test_invalid_plan_error() {
        let err = ParityError::invalid_plan("mismatch_detection", "requires two tables");
        assert_eq!(
            err.to_string(),
            "Invalid plan for rule 'mismatch_detection': requires two tables"
        );
    }

    #[test]
    fn test_error_context() {
        fn failing_operation() -> Result<()> {
            Err(ParityError::internal("lock poisoned"))
        }

        let result = failing_operation().context("while reading cache stats");
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.to_string().contains("while reading cache stats"));
    }

    #[test]
    fn test_with_context_lazy() {
        let result: Result<()> =
            Err(ParityError::internal("boom")).with_context(|| format!("plan {}", 3));
        assert!(result.unwrap_err().to_string().contains("plan 3"));
    }
}
