//! Domain error type shared by the services and mapped onto HTTP in `utils::response`.

use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum MarketError {
    /// Missing or malformed input.
    #[error("{0}")]
    Validation(String),

    /// No such record, or the caller may not see it.
    #[error("{0}")]
    NotFound(String),

    /// The caller's role cannot use this operation at all.
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Unauthorized(String),

    /// A conditional write lost, or a uniqueness rule was hit.
    #[error("{0}")]
    Conflict(String),

    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),

    /// Hashing or token signing failed.
    #[error("internal failure: {0}")]
    Internal(String),
}

impl MarketError {
    pub fn validation(message: impl Into<String>) -> Self {
        MarketError::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        MarketError::NotFound(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        MarketError::Forbidden(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        MarketError::Conflict(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        MarketError::Internal(message.into())
    }
}

pub type MarketResult<T> = Result<T, MarketError>;
