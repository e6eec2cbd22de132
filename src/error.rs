//! Error types for the cache engine
//!
//! Provides unified error handling using thiserror. Absence of a key is not
//! an error in the engine API (lookups return `Option`); `NotFound` only
//! exists so the HTTP layer can map a miss to a 404.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Cache Error Enum ==
/// Unified error type for the cache engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CacheError {
    /// Invalid TTL or unsupported value type
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Conversion of a present value failed
    #[error("Cannot decode value at '{key}': {reason}")]
    Decode { key: String, reason: String },

    /// Producer failed or timed out during a cached fetch
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// Key not found (HTTP surface only)
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Store was closed and no longer accepts writes
    #[error("Store is closed")]
    Closed,

    /// Internal engine error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == Decode Error ==
/// Failure reported by the built-in value decoders.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("cannot read {kind} value as {target}: {reason}")]
pub struct DecodeError {
    /// Kind of the stored value ("text", "bytes", ...)
    pub kind: &'static str,
    /// Requested target type
    pub target: &'static str,
    /// Underlying reason
    pub reason: String,
}

impl DecodeError {
    pub fn new(kind: &'static str, target: &'static str, reason: impl Into<String>) -> Self {
        Self {
            kind,
            target,
            reason: reason.into(),
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::Validation(_) | CacheError::Decode { .. } => StatusCode::BAD_REQUEST,
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::Fetch(_) => StatusCode::BAD_GATEWAY,
            CacheError::Closed => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache engine.
pub type Result<T> = std::result::Result<T, CacheError>;
