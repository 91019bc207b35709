//! Core error types for haven-core.
//!
//! Each concern gets its own thiserror enum; [`CoreError`] wraps them all
//! for callers that only want one error type.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for haven-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Batch submission errors
    #[error("Submission error: {0}")]
    Submission(#[from] SubmissionError),

    /// Media prefetch errors
    #[error("Prefetch error: {0}")]
    Prefetch(#[from] PrefetchError),

    /// Content or label source errors
    #[error("Content error: {0}")]
    Content(#[from] ContentError),

    /// Wallet collaborator errors
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Durable store errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The store could not be opened at all
    #[error("Storage unavailable at {path}: {message}")]
    Unavailable { path: PathBuf, message: String },

    /// Query execution failed
    #[error("Query failed: {0}")]
    Query(String),

    /// Database is locked by another process
    #[error("Database is locked")]
    Locked,

    /// A persisted value could not be decoded
    #[error("Corrupt value under '{key}': {message}")]
    Corrupt { key: String, message: String },
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Key does not exist in the configuration tree
    #[error("Unknown config key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Wallet / auth collaborator errors.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Empty or malformed wallet address
    #[error("Invalid wallet address: {0:?}")]
    InvalidAddress(String),

    /// Connection state could not be persisted
    #[error("Failed to persist wallet state: {0}")]
    Persist(#[from] StorageError),
}

/// Batch submission errors.
#[derive(Error, Debug)]
pub enum SubmissionError {
    /// Wallet connection required but absent; rejected before any network call
    #[error("Wallet connection required before submitting")]
    NotConnected,

    /// Connectivity failure (transient)
    #[error("Network error: {0}")]
    Network(String),

    /// No response within the configured bound (transient)
    #[error("Submission timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Endpoint answered with a non-success status
    #[error("Submission rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    /// Local store could not be read or cleared
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl SubmissionError {
    /// Transient failures keep the batch and are worth retrying by the user.
    pub fn is_transient(&self) -> bool {
        match self {
            SubmissionError::Network(_) | SubmissionError::Timeout { .. } => true,
            SubmissionError::Rejected { status, .. } => *status >= 500,
            SubmissionError::NotConnected | SubmissionError::Storage(_) => false,
        }
    }
}

/// Media prefetch errors.
#[derive(Error, Debug)]
pub enum PrefetchError {
    /// Connectivity failure while streaming
    #[error("Network error: {0}")]
    Network(String),

    /// Fetch exceeded the configured bound
    #[error("Fetch timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Server answered with a non-success status
    #[error("HTTP error! status: {status}")]
    Http { status: u16 },

    /// Fetch cancelled by the caller
    #[error("Fetch aborted")]
    Aborted,

    /// Content item has no media URL
    #[error("Content {0} has no URL")]
    MissingUrl(String),

    /// Blob could not be materialized
    #[error("Blob store error: {0}")]
    Blob(#[from] std::io::Error),
}

/// Content and label source errors.
#[derive(Error, Debug)]
pub enum ContentError {
    /// Connectivity failure
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Source answered with an error status or envelope
    #[error("Source returned status {status}: {message}")]
    Status { status: u16, message: String },

    /// Invalid source URL in configuration
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, _msg)
                if code.code == rusqlite::ErrorCode::DatabaseBusy
                    || code.code == rusqlite::ErrorCode::DatabaseLocked =>
            {
                StorageError::Locked
            }
            _ => StorageError::Query(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for SubmissionError {
    fn from(err: reqwest::Error) -> Self {
        SubmissionError::Network(err.to_string())
    }
}

impl From<reqwest::Error> for PrefetchError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => PrefetchError::Http {
                status: status.as_u16(),
            },
            None => PrefetchError::Network(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(SubmissionError::Network("reset".into()).is_transient());
        assert!(SubmissionError::Timeout { secs: 20 }.is_transient());
        assert!(SubmissionError::Rejected {
            status: 503,
            message: String::new()
        }
        .is_transient());
        assert!(!SubmissionError::Rejected {
            status: 400,
            message: String::new()
        }
        .is_transient());
        assert!(!SubmissionError::NotConnected.is_transient());
    }

    #[test]
    fn rusqlite_error_maps_to_query() {
        let err: StorageError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, StorageError::Query(_)));
    }
}
