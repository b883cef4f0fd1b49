//! Core error types for lofocus-core.
//!
//! Only configuration errors reach the caller of a timer operation. Local and
//! remote persistence errors are logged by the recorder and never interrupt
//! the countdown; they still get typed variants so the storage layers can
//! report what went wrong.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for lofocus-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Local tier errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Remote tier errors
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
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

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown dot-path key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

impl ConfigError {
    pub(crate) fn invalid(key: &str, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

/// Local persistence errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to open the database
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// Stored value could not be (de)serialized
    #[error("Serialization failed for key '{key}': {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(#[from] std::io::Error),

    /// In-memory store poisoned by a panicking writer
    #[error("Store poisoned")]
    Poisoned,
}

/// Remote document store errors.
#[derive(Error, Debug)]
pub enum RemoteError {
    /// Store is unreachable
    #[error("Remote store offline")]
    Offline,

    /// Caller is not allowed to touch the document
    #[error("Permission denied for {path}")]
    PermissionDenied { path: String },

    /// Non-success HTTP status
    #[error("Remote store returned {status} for {path}")]
    Status { status: u16, path: String },

    /// Transport failure
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Response body was not a document
    #[error("Malformed response for {path}: {message}")]
    Malformed { path: String, message: String },

    /// Base URL could not be joined with a document path
    #[error("Invalid remote URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) if e.code == rusqlite::ErrorCode::DatabaseLocked => {
                StorageError::Locked
            }
            _ => StorageError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
