//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::cache::Value;

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
///
/// Entries are immutable once stored; storing again creates a new entry.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The stored value
    pub value: Value,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub expires_at: Option<u64>,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry with optional TTL.
    ///
    /// The TTL is kept at millisecond resolution; callers validate that it
    /// is at least one millisecond.
    pub fn new(value: Value, ttl: Option<Duration>) -> Self {
        let now = current_timestamp_ms();
        let expires_at = ttl.map(|ttl| now.saturating_add(duration_ms(ttl)));

        Self {
            value,
            created_at: now,
            expires_at,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// Boundary condition: an entry is expired once the current time is
    /// greater than or equal to the expiration time, so the exact expiry
    /// instant already reads as absent.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    /// Expiry check against an explicit clock reading.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        match self.expires_at {
            Some(expires) => now_ms >= expires,
            None => false,
        }
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(duration_ms)
        .unwrap_or(0)
}

/// Whole milliseconds in a Duration, saturating at u64::MAX.
pub fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
