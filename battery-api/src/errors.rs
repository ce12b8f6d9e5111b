use crate::db::PoolState;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid field: {0}")]
    InvalidField(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid value for {name}: {value}")]
    InvalidParameter { name: &'static str, value: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Statement timed out after {0:?}")]
    Timeout(Duration),

    #[error("Storage unavailable (pool {0})")]
    Unavailable(PoolState),

    #[error("Invalid database URL: {0}")]
    DatabaseUrl(#[source] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] confique::Error),
}

/// Coarse classification used by callers to decide how to report an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input from the caller; detected before any store access.
    ClientInput,
    /// The store rejected or failed a statement.
    Storage,
    /// The pool is not ready to serve statements.
    Unavailable,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidField(_)
            | Error::InvalidTimestamp(_)
            | Error::MissingParameter(_)
            | Error::InvalidParameter { .. }
            | Error::Validation(_) => ErrorKind::ClientInput,
            Error::Unavailable(_) => ErrorKind::Unavailable,
            Error::Database(_) | Error::Timeout(_) | Error::DatabaseUrl(_) | Error::Config(_) => {
                ErrorKind::Storage
            }
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.kind() == ErrorKind::ClientInput
    }
}

pub type Result<T> = std::result::Result<T, Error>;
