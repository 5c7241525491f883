//! Error types for dbal

use thiserror::Error;

/// Result type alias for dbal operations
pub type DbalResult<T> = Result<T, DbalError>;

/// Error types for building and executing queries
#[derive(Debug, Error)]
pub enum DbalError {
    /// An expression or structured input violated a construction rule
    #[error("Validation error: {0}")]
    Validation(String),

    /// Bad connection URI or unknown/duplicate driver scheme
    #[error("Config error: {0}")]
    Config(String),

    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution error reported by the driver
    #[error("Query error: {0}")]
    Query(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Row decode error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A result stream was polled after it was closed
    #[error("Result stream is closed")]
    Closed,

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl DbalError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Wrap a driver error raised while preparing or running a statement
    pub fn query(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Query(Box::new(err))
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Check if this is a configuration error
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

#[cfg(feature = "postgres")]
impl From<tokio_postgres::Error> for DbalError {
    fn from(err: tokio_postgres::Error) -> Self {
        Self::query(err)
    }
}
