//! Request DTOs for the cache server API
//!
//! Defines the structure of incoming HTTP request bodies.

use std::time::Duration;

use serde::Deserialize;

use crate::cache::Value;
use crate::error::{CacheError, Result};

/// Request body for the STORE operation (POST /store)
///
/// # Fields
/// - `value`: JSON string, integer, float, or array of bytes
/// - `ttl`: Optional TTL in seconds; omitted means the entry never expires
#[derive(Debug, Clone, Deserialize)]
pub struct StoreRequest {
    /// The value to store
    pub value: serde_json::Value,
    /// Optional TTL in seconds
    #[serde(default)]
    pub ttl: Option<i64>,
}

impl StoreRequest {
    /// Validates the request and converts it into engine arguments.
    pub fn into_parts(self) -> Result<(Value, Option<Duration>)> {
        let ttl = match self.ttl {
            Some(secs) if secs <= 0 => {
                return Err(CacheError::Validation(format!(
                    "TTL must be positive, got {}",
                    secs
                )))
            }
            Some(secs) => Some(Duration::from_secs(secs.unsigned_abs())),
            None => None,
        };

        Ok((Value::from_json(self.value)?, ttl))
    }
}
