//! Internal error types for the campusfin service.
//!
//! HTTP-facing error envelopes live in `server::api_error`; this module holds
//! the internal error enum that the database layer, document storage, PDF
//! renderer, and bootstrap code return.

use thiserror::Error;

/// Errors raised by the service internals.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("database error: {0}")]
    DatabaseError(String),

    #[error("document storage error: {0}")]
    StorageError(String),

    #[error("pdf rendering error: {0}")]
    PdfError(String),

    #[error("server error: {0}")]
    ServerError(String),
}

/// Result alias used throughout the crate.
pub type ServiceResult<T> = Result<T, ServiceError>;
