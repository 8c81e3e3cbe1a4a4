use std::time::Duration;

use thiserror::Error;

/// Application-wide error types for newsmon.
#[derive(Error, Debug, Clone)]
pub enum AppError {
    /// Transport failure or non-success HTTP status.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Request timed out.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Response body did not have the expected JSON shape.
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// The service returned `null` (or a deleted/dead marker) for this item.
    #[error("Story {0} not found")]
    NotFound(u64),

    /// The top-stories list could not be fetched; nothing else can run.
    #[error("Pipeline failed: {0}")]
    PipelineError(#[source] Box<AppError>),

    /// Settings store read or write failed.
    #[error("Settings error: {0}")]
    SettingsError(String),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl AppError {
    /// Wrap a fatal id-list failure.
    pub fn pipeline(inner: AppError) -> Self {
        match inner {
            AppError::PipelineError(_) => inner,
            other => AppError::PipelineError(Box::new(other)),
        }
    }

    /// Returns true for transport-level failures, timeouts included.
    pub fn is_network(&self) -> bool {
        matches!(self, AppError::NetworkError(_) | AppError::Timeout(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::DecodeError(e.to_string())
    }
}
