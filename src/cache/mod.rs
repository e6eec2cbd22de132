//! Cache Module
//!
//! Provides the in-memory entry store with generated keys and TTL expiration.

mod entry;
mod stats;
mod store;
mod value;


// Re-export public types
pub use entry::{current_timestamp_ms, CacheEntry};
pub use stats::{CacheStats, StatsCounters};
pub use store::{validate_ttl, validate_value, CacheStore, Lookup};
pub use value::{decode, Value};
