//! Error types for each stage of the pipeline.
//!
//! Every per-cycle error is caught at a phase boundary by the cycle
//! orchestrator. Only [`ConfigError`] is allowed to stop the process, and only
//! during startup.

use thiserror::Error;

/// The news source could not be reached or its index page was unusable.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

/// The article store is unavailable or holds data it cannot interpret.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("unknown article status in database: {0:?}")]
    CorruptStatus(String),
}

/// The rewrite service failed for a single article.
#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("rewrite service error: {0}")]
    Api(String),

    /// The service answered, but with nothing usable.
    #[error("rewrite service returned empty text")]
    Empty,
}

impl RewriteError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Api(_))
    }
}

/// Startup configuration problems. Fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing rewrite API key (set REWRITE_API_KEY or pass --api-key)")]
    MissingApiKey,

    #[error("batch limit must be at least 1")]
    InvalidBatchLimit,

    #[error("schedule interval must be at least 1 second")]
    InvalidInterval,

    #[error("failed to load rewrite configuration: {0}")]
    Load(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_api_errors_are_transient() {
        assert!(RewriteError::Api("503".to_string()).is_transient());
        assert!(!RewriteError::Empty.is_transient());
    }

    #[test]
    fn test_storage_error_message_names_status() {
        let e = StorageError::CorruptStatus("archived".to_string());
        assert_eq!(e.to_string(), "unknown article status in database: \"archived\"");
    }

    #[test]
    fn test_config_error_mentions_env_var() {
        assert!(ConfigError::MissingApiKey.to_string().contains("REWRITE_API_KEY"));
    }
}
