//! Error types for the database layer.

use thiserror::Error;

/// Database operation result type.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Errors from database backend operations.
#[derive(Debug, Error)]
pub enum BackendError {
    /// SQLx error (connection, statement, decode)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Type conversion error: {0}")]
    TypeConversion(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Backend not available: {0}")]
    NotAvailable(String),

    /// IO error (runtime construction, file system operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackendError {
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    pub fn type_conversion(msg: impl Into<String>) -> Self {
        Self::TypeConversion(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}
