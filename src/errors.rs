//! # Error Handling Module
//!
//! ## Purpose
//! Centralized error handling for the product search service, providing one
//! error type shared by the store client, cache client, loader and API layer.
//!
//! ## Input/Output Specification
//! - **Input**: Error conditions from collaborators (store, cache, feed) and
//!   from record normalization
//! - **Output**: Structured error variants with context, plus a `Result<T>`
//!   alias used throughout the crate
//! - **Error Categories**: Configuration, Network, Store, Cache, Ingestion,
//!   Client input
//!
//! ## Key Features
//! - Automatic conversion from collaborator error types
//! - Transient-vs-fatal classification for the startup readiness gate
//! - Short, user-safe messages (internal detail stays in logs)

use thiserror::Error;

/// Result type used throughout the application
pub type Result<T> = std::result::Result<T, SearchError>;

/// Error types for the product search service
#[derive(Debug, Error)]
pub enum SearchError {
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Network-level failures talking to a collaborator
    #[error("Network error during {operation}: {details}")]
    Network { operation: String, details: String },

    /// The store rejected or failed an operation
    #[error("Store error during {operation}: {details}")]
    Store { operation: String, details: String },

    /// The store answered but is not yet ready to serve schema reads.
    /// Treated as transient by the readiness gate only.
    #[error("Store not ready: {details}")]
    StoreNotReady { details: String },

    /// Cache transport errors
    #[error("Cache error during {operation}: {details}")]
    Cache { operation: String, details: String },

    /// A raw catalog record could not be normalized
    #[error("Invalid record at line {line}: {details}")]
    InvalidRecord { line: u64, details: String },

    /// Bulk ingestion failed; the run is aborted, partial progress remains
    #[error("Ingestion failed: {details}")]
    IngestionFailed { details: String },

    /// Malformed data from a collaborator
    #[error("Failed to parse data from {origin}: {details}")]
    DataParsing { origin: String, details: String },

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal system errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl SearchError {
    /// Whether the startup readiness gate may retry after this error.
    /// Only the not-yet-authorized class is transient; everything else
    /// propagates immediately.
    pub fn is_transient(&self) -> bool {
        matches!(self, SearchError::StoreNotReady { .. })
    }

    /// Error category for logging and metrics
    pub fn category(&self) -> &'static str {
        match self {
            SearchError::Config { .. } => "configuration",
            SearchError::Network { .. } | SearchError::DataParsing { .. } => "network",
            SearchError::Store { .. } | SearchError::StoreNotReady { .. } => "store",
            SearchError::Cache { .. } => "cache",
            SearchError::InvalidRecord { .. } | SearchError::IngestionFailed { .. } => "ingestion",
            SearchError::Json(_) | SearchError::Io(_) | SearchError::Internal { .. } => "internal",
        }
    }
}

impl From<reqwest::Error> for SearchError {
    fn from(err: reqwest::Error) -> Self {
        SearchError::Network {
            operation: err
                .url()
                .map(|u| u.path().to_string())
                .unwrap_or_else(|| "request".to_string()),
            details: err.to_string(),
        }
    }
}

impl From<redis::RedisError> for SearchError {
    fn from(err: redis::RedisError) -> Self {
        SearchError::Cache {
            operation: "command".to_string(),
            details: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for SearchError {
    fn from(err: toml::de::Error) -> Self {
        SearchError::Config {
            message: err.to_string(),
        }
    }
}
