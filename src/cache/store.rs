//! Cache Store Module
//!
//! Entry storage with generated keys and TTL expiration. The store owns
//! every mutation; the engine wraps it in a lock for shared access.

use std::collections::HashMap;
use std::time::Duration;

use tracing::debug;
use uuid::Uuid;

use crate::cache::{CacheEntry, CacheStats, StatsCounters, Value};
use crate::error::{CacheError, Result};

/// Attempts at drawing a fresh key before giving up.
const MAX_KEY_ATTEMPTS: usize = 8;

// == Lookup ==
/// Outcome of a shared-access lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// Live entry
    Hit(Value),
    /// Entry exists but its TTL has elapsed; it should be reclaimed
    Expired,
    /// No entry under the key
    Missing,
}

impl Lookup {
    pub fn into_value(self) -> Option<Value> {
        match self {
            Lookup::Hit(value) => Some(value),
            Lookup::Expired | Lookup::Missing => None,
        }
    }
}

// == TTL Validation ==
/// Rejects TTLs that would store an already-expired entry.
///
/// `None` means no expiry. Anything below one millisecond (the store's
/// resolution) is treated as zero.
pub fn validate_ttl(ttl: Option<Duration>) -> Result<()> {
    match ttl {
        Some(ttl) if ttl.as_millis() == 0 => Err(CacheError::Validation(
            "TTL must be at least 1 millisecond".to_string(),
        )),
        _ => Ok(()),
    }
}

// == Value Validation ==
/// Rejects values that cannot be rendered back faithfully.
///
/// JSON has no NaN or infinity, so non-finite floats would come back as
/// `null` from the HTTP layer and the call history.
pub fn validate_value(value: &Value) -> Result<()> {
    match value {
        Value::Float(f) if !f.is_finite() => Err(CacheError::Validation(format!(
            "Float value must be finite, got {}",
            f
        ))),
        _ => Ok(()),
    }
}

// == Cache Store ==
/// Main cache storage with TTL support.
#[derive(Debug, Default)]
pub struct CacheStore {
    /// Key-value storage
    entries: HashMap<String, CacheEntry>,
    /// Performance statistics
    stats: StatsCounters,
    /// Set once the store stops accepting writes
    closed: bool,
}

impl CacheStore {
    // == Constructor ==
    /// Creates a new empty CacheStore.
    pub fn new() -> Self {
        Self::default()
    }

    // == Put ==
    /// Stores a value under a freshly generated key and returns the key.
    ///
    /// # Arguments
    /// * `value` - The value to store
    /// * `ttl` - Optional TTL; `None` never expires
    pub fn put(&mut self, value: Value, ttl: Option<Duration>) -> Result<String> {
        self.put_with(value, ttl, || Uuid::new_v4().to_string())
    }

    /// Put with a caller-supplied key generator.
    ///
    /// A generated key that clashes with a live entry is discarded and a new
    /// one drawn. A clash with an expired entry reclaims that entry.
    pub(crate) fn put_with(
        &mut self,
        value: Value,
        ttl: Option<Duration>,
        mut next_key: impl FnMut() -> String,
    ) -> Result<String> {
        self.ensure_open()?;
        validate_ttl(ttl)?;
        validate_value(&value)?;

        for _ in 0..MAX_KEY_ATTEMPTS {
            let key = next_key();
            match self.entries.get(&key) {
                Some(entry) if !entry.is_expired() => {
                    debug!("Generated key {} already in use, retrying", key);
                    continue;
                }
                Some(_) => {
                    self.entries.remove(&key);
                    self.stats.record_expirations(1);
                }
                None => {}
            }

            self.entries.insert(key.clone(), CacheEntry::new(value, ttl));
            return Ok(key);
        }

        Err(CacheError::Internal(format!(
            "Could not generate a unique key after {} attempts",
            MAX_KEY_ATTEMPTS
        )))
    }

    // == Set ==
    /// Stores a value under a caller-chosen key, replacing any previous entry.
    ///
    /// Any string is a valid key, including empty and very long ones.
    pub fn set(&mut self, key: String, value: Value, ttl: Option<Duration>) -> Result<()> {
        self.ensure_open()?;
        validate_ttl(ttl)?;
        validate_value(&value)?;

        self.entries.insert(key, CacheEntry::new(value, ttl));
        Ok(())
    }

    // == Lookup ==
    /// Looks up a key with shared access.
    ///
    /// Expired entries are reported but left in place; the caller reclaims
    /// them with [`CacheStore::remove_if_expired`] once it holds exclusive
    /// access.
    pub fn lookup(&self, key: &str) -> Lookup {
        match self.entries.get(key) {
            Some(entry) if !entry.is_expired() => {
                self.stats.record_hit();
                Lookup::Hit(entry.value.clone())
            }
            Some(_) => {
                self.stats.record_miss();
                Lookup::Expired
            }
            None => {
                self.stats.record_miss();
                Lookup::Missing
            }
        }
    }

    // == Get ==
    /// Retrieves a value by key with exclusive access.
    ///
    /// Returns None for unknown keys. Expired entries are removed and
    /// reported as absent.
    pub fn get(&mut self, key: &str) -> Option<Value> {
        let lookup = self.lookup(key);
        if lookup == Lookup::Expired {
            self.remove_if_expired(key);
        }
        lookup.into_value()
    }

    // == Remove If Expired ==
    /// Removes the entry under `key` only if it is still expired.
    ///
    /// Re-checks expiry because another writer may have replaced the entry
    /// between a shared lookup and this call.
    pub fn remove_if_expired(&mut self, key: &str) -> bool {
        let expired = self
            .entries
            .get(key)
            .map(CacheEntry::is_expired)
            .unwrap_or(false);

        if expired {
            self.entries.remove(key);
            self.stats.record_expirations(1);
            debug!("Reclaimed expired entry {}", key);
        }
        expired
    }

    // == Delete ==
    /// Removes an entry by key.
    ///
    /// Returns true only if a live entry was removed. An expired entry under
    /// the key is reclaimed but reported as false.
    pub fn delete(&mut self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some(entry) if entry.is_expired() => {
                self.stats.record_expirations(1);
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    // == Flush ==
    /// Removes every entry and returns how many were held.
    pub fn flush(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.entries.len())
    }

    // == Cleanup Expired ==
    /// Removes all expired entries from the cache.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());

        let count = before - self.entries.len();
        self.stats.record_expirations(count);
        count
    }

    // == Close ==
    /// Stops accepting writes. Reads, deletes and flushes still work.
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(CacheError::Closed)
        } else {
            Ok(())
        }
    }

    // == Length ==
    /// Returns the number of physically held entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // == Is Empty ==
    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
