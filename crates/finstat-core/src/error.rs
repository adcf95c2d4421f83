//! Error types for the statement pipeline.
//!
//! This module defines [`FinstatError`] which covers every failure the pipeline
//! distinguishes: provider authentication and transport problems, unexpected
//! payload shapes, per-batch merge failures, and storage errors.

use thiserror::Error;

/// Errors that can occur while fetching, normalizing, merging or persisting statements.
#[derive(Error, Debug)]
pub enum FinstatError {
    /// The provider token is absent or was rejected.
    #[error("Authentication failed for provider {0}")]
    Auth(String),

    /// The provider answered without the expected result keyword.
    #[error("Unexpected payload from {endpoint}: missing `{keyword}`")]
    Schema {
        /// Endpoint that produced the payload.
        endpoint: String,
        /// Result keyword that was expected.
        keyword: String,
        /// Raw payload, kept for diagnostics.
        payload: String,
    },

    /// Network-related errors (connection failures, timeouts, HTTP errors).
    #[error("Transport error: {0}")]
    Transport(String),

    /// Rate limit exceeded by a provider.
    #[error("Rate limited by {provider}: retry after {retry_after:?}")]
    RateLimited {
        /// The provider that rate limited the request.
        provider: String,
        /// Suggested time to wait before retrying.
        retry_after: Option<std::time::Duration>,
    },

    /// The three statement sources of a batch could not be aligned.
    #[error("Merge failed: {0}")]
    MergeFailure(String),

    /// A table lacks columns that its name dictionary requires.
    #[error("Missing columns in {table}: {columns:?}")]
    MissingColumns {
        /// Logical table being normalized.
        table: String,
        /// Domain names of the absent columns.
        columns: Vec<String>,
    },

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Error parsing data from a provider or a configuration file.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Error interacting with the persistent store.
    #[error("Store error: {0}")]
    Store(String),

    /// The requested table has never been written.
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// Invalid or incomplete configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Every batch succeeded but none of them returned rows.
    #[error("No data returned for {batches} batch(es)")]
    EmptyRun {
        /// Number of batches requested.
        batches: usize,
    },

    /// Every batch failed.
    #[error("All {batches} batch(es) failed")]
    AllBatchesFailed {
        /// Number of batches requested.
        batches: usize,
    },

    /// Error raised by a DataFrame operation.
    #[error("Frame error: {0}")]
    Frame(String),
}

impl FinstatError {
    /// Returns true if retrying the same request may succeed.
    ///
    /// Only transport failures and rate limiting qualify; authentication and
    /// schema failures would fail the same way again.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::RateLimited { .. })
    }

    /// Returns true if the error must abort a whole run rather than a single batch.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

impl From<polars::error::PolarsError> for FinstatError {
    fn from(e: polars::error::PolarsError) -> Self {
        Self::Frame(e.to_string())
    }
}

/// Result type alias using [`FinstatError`].
pub type Result<T> = std::result::Result<T, FinstatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_failures_are_retryable() {
        assert!(FinstatError::Transport("timeout".into()).is_retryable());
        assert!(
            FinstatError::RateLimited {
                provider: "CNINFO".into(),
                retry_after: None,
            }
            .is_retryable()
        );
        assert!(!FinstatError::Auth("cninfo".into()).is_retryable());
        assert!(
            !FinstatError::Schema {
                endpoint: "p_stock2301".into(),
                keyword: "records".into(),
                payload: "{}".into(),
            }
            .is_retryable()
        );
    }

    #[test]
    fn auth_is_fatal() {
        assert!(FinstatError::Auth("cninfo".into()).is_fatal());
        assert!(!FinstatError::MergeFailure("no key".into()).is_fatal());
    }
}
