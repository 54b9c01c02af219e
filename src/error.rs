//! Error types shared across the publication pipeline

use thiserror::Error;

/// Failures of the persistence layer.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid stored value: {0}")]
    Codec(String),
}

/// Per-account publication failures.
///
/// These are captured into outcome codes by the orchestrator and never
/// escape the per-account attempt.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PublishError {
    #[error("account {0} not found")]
    AccountNotFound(String),

    #[error("unsupported provider: {0}")]
    UnsupportedProvider(String),

    #[error("token refresh failed for account {account_id}: {reason}")]
    TokenRefreshFailed { account_id: String, reason: String },

    #[error("{message}")]
    ProviderPublishFailed {
        /// Position of the item that failed; earlier items were posted.
        item_index: usize,
        message: String,
        /// Raw error body returned by the provider, if any.
        payload: Option<String>,
    },

    #[error("thread has no target accounts")]
    NoTargetAccounts,

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<StoreError> for PublishError {
    fn from(e: StoreError) -> Self {
        PublishError::Storage(e.to_string())
    }
}

/// Invalid or missing configuration at startup.
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}
