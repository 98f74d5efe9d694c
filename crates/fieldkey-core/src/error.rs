//! Error types for the fieldkey export engine.

use thiserror::Error;

/// Result type alias using fieldkey's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for fieldkey operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Datasource not found
    #[error("Datasource not found: {0}")]
    DatasourceNotFound(i32),

    /// Archive creation failed
    #[error("Archive error: {0}")]
    Archive(String),

    /// Snapshot build failed (step context, subprocess exit)
    #[error("Build failed: {0}")]
    BuildFailed(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(e: zip::result::ZipError) -> Self {
        Error::Archive(e.to_string())
    }
}
