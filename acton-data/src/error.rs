//! Crate-level error type

use thiserror::Error;

use crate::query::QueryError;
use crate::repository::RepositoryError;

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the crate
///
/// Large error variants are boxed to reduce stack size
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// Repository error
    #[error("{0}")]
    Repository(#[from] RepositoryError),

    /// Query compilation error
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    /// JSON (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

impl Error {
    /// Whether retrying the failed operation may succeed
    pub fn is_retriable(&self) -> bool {
        matches!(self, Error::Repository(e) if e.is_retriable())
    }
}
