//! Engine Module
//!
//! Public facade over the entry store, the instrumentation registry and the
//! fetch-through page cache. An [`Engine`] is a cheap handle: clones share
//! the same state, separate `Engine::new()` calls are fully isolated.

mod fetch;

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::cache::{decode, CacheStats, CacheStore, Lookup, Value};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::instrument::{Instrumentation, Replay};

use fetch::Flight;

/// Operation name under which [`Engine::store`] records its calls.
pub const STORE_OPERATION: &str = "store";

// == Engine Options ==
/// Tunables for the fetch-through cache.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Upper bound on a single producer call
    pub fetch_timeout: Duration,
    /// Collapse concurrent misses for one resource into a single producer call
    pub single_flight: bool,
    /// TTL used by [`Engine::fetch_page`]
    pub page_ttl: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(10),
            single_flight: false,
            page_ttl: Duration::from_secs(10),
        }
    }
}

struct EngineInner {
    store: RwLock<CacheStore>,
    /// Pages cached by resource key, kept apart from generated keys
    pages: RwLock<CacheStore>,
    instrumentation: Instrumentation,
    access_counts: RwLock<HashMap<String, u64>>,
    in_flight: DashMap<String, Flight>,
    next_flight_id: AtomicU64,
    options: EngineOptions,
}

// == Engine ==
/// Thread-safe cache engine handle.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    // == Constructors ==
    /// Creates an engine with default options.
    pub fn new() -> Self {
        Self::with_options(EngineOptions::default())
    }

    pub fn with_options(options: EngineOptions) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                store: RwLock::new(CacheStore::new()),
                pages: RwLock::new(CacheStore::new()),
                instrumentation: Instrumentation::new(),
                access_counts: RwLock::new(HashMap::new()),
                in_flight: DashMap::new(),
                next_flight_id: AtomicU64::new(0),
                options,
            }),
        }
    }

    /// Creates an engine using the fetch settings from the Config.
    pub fn from_config(config: &Config) -> Self {
        Self::with_options(EngineOptions {
            fetch_timeout: config.fetch_timeout_duration(),
            single_flight: config.single_flight,
            page_ttl: config.page_ttl_duration(),
        })
    }

    pub fn options(&self) -> &EngineOptions {
        &self.inner.options
    }

    // == Store ==
    /// Stores a value under a generated key and returns the key.
    ///
    /// Each call is counted and recorded under [`STORE_OPERATION`].
    ///
    /// # Errors
    /// - `Validation` if `ttl` is zero or the value is a non-finite float
    /// - `Closed` once the engine has been closed
    pub async fn store(&self, value: impl Into<Value>, ttl: Option<Duration>) -> Result<String> {
        let value = value.into();
        let args = value.to_json();

        self.inner
            .instrumentation
            .instrumented(STORE_OPERATION, &args, || async move {
                let key = self.inner.store.write().await.put(value, ttl)?;
                debug!("Stored entry {} (ttl: {:?})", key, ttl);
                Ok::<_, CacheError>(key)
            })
            .await
    }

    // == Retrieve ==
    /// Returns the value under `key`, or None if it is unknown or expired.
    ///
    /// Lookups share the read lock. An expired entry found on the way is
    /// reclaimed under the write lock before returning.
    pub async fn retrieve(&self, key: &str) -> Option<Value> {
        let lookup = self.inner.store.read().await.lookup(key);

        if lookup == Lookup::Expired {
            self.inner.store.write().await.remove_if_expired(key);
        }
        lookup.into_value()
    }

    /// Retrieves and converts a value.
    ///
    /// `decode` is only invoked when the key holds a live value; its failure
    /// surfaces as [`CacheError::Decode`].
    pub async fn retrieve_as<T, E, F>(&self, key: &str, decode: F) -> Result<Option<T>>
    where
        F: FnOnce(Value) -> std::result::Result<T, E>,
        E: Display,
    {
        match self.retrieve(key).await {
            Some(value) => decode(value).map(Some).map_err(|err| CacheError::Decode {
                key: key.to_string(),
                reason: err.to_string(),
            }),
            None => Ok(None),
        }
    }

    /// Retrieves a value as UTF-8 text.
    pub async fn retrieve_str(&self, key: &str) -> Result<Option<String>> {
        self.retrieve_as(key, decode::text).await
    }

    /// Retrieves a value as an integer.
    pub async fn retrieve_int(&self, key: &str) -> Result<Option<i64>> {
        self.retrieve_as(key, decode::integer).await
    }

    /// Retrieves a value as a float.
    pub async fn retrieve_float(&self, key: &str) -> Result<Option<f64>> {
        self.retrieve_as(key, decode::float).await
    }

    // == Delete / Flush ==
    /// Removes `key`. Returns true if a live entry was removed.
    pub async fn delete(&self, key: &str) -> bool {
        self.inner.store.write().await.delete(key)
    }

    /// Removes every entry and cached page and returns how many were held.
    pub async fn flush(&self) -> usize {
        let removed =
            self.inner.store.write().await.flush() + self.inner.pages.write().await.flush();
        info!("Flushed {} entries", removed);
        removed
    }

    // == Expiration ==
    /// Reclaims every expired entry and cached page. Used by the background
    /// cleanup task.
    pub async fn sweep_expired(&self) -> usize {
        let entries = self.inner.store.write().await.cleanup_expired();
        entries + self.inner.pages.write().await.cleanup_expired()
    }

    // == Instrumentation ==
    /// Runs `op` counted and recorded under `name`.
    pub async fn instrumented_call<A, F, Fut, T, E>(
        &self,
        name: &str,
        args: &A,
        op: F,
    ) -> std::result::Result<T, E>
    where
        A: Serialize + ?Sized,
        T: Serialize,
        E: Display,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        self.inner.instrumentation.instrumented(name, args, op).await
    }

    /// Count and history recorded under `name`.
    pub async fn replay(&self, name: &str) -> Replay {
        self.inner.instrumentation.replay(name).await
    }

    /// Clears the count and history recorded under `name`.
    pub async fn reset_history(&self, name: &str) -> bool {
        self.inner.instrumentation.reset(name).await
    }

    /// Direct access to the instrumentation registry for callers that only
    /// want counting or only history.
    pub fn instrumentation(&self) -> &Instrumentation {
        &self.inner.instrumentation
    }

    // == Stats ==
    /// Statistics for values saved with [`Engine::store`].
    pub async fn stats(&self) -> CacheStats {
        self.inner.store.read().await.stats()
    }

    /// Statistics for pages cached by [`Engine::fetch_with_cache`].
    pub async fn page_stats(&self) -> CacheStats {
        self.inner.pages.read().await.stats()
    }

    /// Number of stored entries physically held, including expired ones not
    /// yet reclaimed. Cached pages are not included.
    pub async fn len(&self) -> usize {
        self.inner.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.store.read().await.is_empty()
    }

    // == Close ==
    /// Stops accepting writes. Existing entries stay readable and no new
    /// pages are fetched.
    pub async fn close(&self) {
        self.inner.store.write().await.close();
        self.inner.pages.write().await.close();
        info!("Cache engine closed");
    }

    pub async fn is_closed(&self) -> bool {
        self.inner.store.read().await.is_closed()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::Outcome;
    use std::convert::Infallible;

    #[tokio::test]
    async fn test_store_and_retrieve_each_kind() {
        let engine = Engine::new();

        for value in [
            Value::from("text"),
            Value::from(vec![1u8, 2, 3]),
            Value::from(42i64),
            Value::from(2.5f64),
        ] {
            let key = engine.store(value.clone(), None).await.unwrap();
            assert_eq!(engine.retrieve(&key).await, Some(value));
        }
    }

    #[tokio::test]
    async fn test_retrieve_unknown_key() {
        let engine = Engine::new();
        assert_eq!(engine.retrieve("missing").await, None);
    }

    #[tokio::test]
    async fn test_store_rejects_zero_ttl() {
        let engine = Engine::new();

        let result = engine.store("v", Some(Duration::ZERO)).await;

        assert!(matches!(result, Err(CacheError::Validation(_))));
        assert!(engine.is_empty().await);
    }

    #[tokio::test]
    async fn test_store_is_recorded() {
        let engine = Engine::new();

        let k1 = engine.store("first", None).await.unwrap();
        let k2 = engine.store(7i64, None).await.unwrap();

        let replay = engine.replay(STORE_OPERATION).await;
        assert_eq!(replay.count, 2);
        assert_eq!(replay.history[0].input, "\"first\"");
        assert_eq!(replay.history[0].output, Outcome::Ok(format!("\"{}\"", k1)));
        assert_eq!(replay.history[1].input, "7");
        assert_eq!(replay.history[1].output, Outcome::Ok(format!("\"{}\"", k2)));
    }

    #[tokio::test]
    async fn test_failed_store_is_recorded() {
        let engine = Engine::new();

        let _ = engine.store("v", Some(Duration::ZERO)).await;

        let replay = engine.replay(STORE_OPERATION).await;
        assert_eq!(replay.count, 1);
        assert!(matches!(replay.history[0].output, Outcome::Failed(_)));
    }

    #[tokio::test]
    async fn test_store_rejects_non_finite_float() {
        let engine = Engine::new();

        let result = engine.store(f64::NAN, None).await;

        assert!(matches!(result, Err(CacheError::Validation(_))));
        assert!(engine.is_empty().await);
        let replay = engine.replay(STORE_OPERATION).await;
        assert_eq!(replay.history[0].input, "\"NaN\"");
        assert!(matches!(replay.history[0].output, Outcome::Failed(_)));
    }

    #[tokio::test]
    async fn test_retrieve_as_absent_skips_decode() {
        let engine = Engine::new();
        let mut called = false;

        let result = engine
            .retrieve_as("missing", |v| {
                called = true;
                decode::integer(v)
            })
            .await;

        assert_eq!(result, Ok(None));
        assert!(!called);
    }

    #[tokio::test]
    async fn test_retrieve_as_decode_error() {
        let engine = Engine::new();
        let key = engine.store("abc", None).await.unwrap();

        let result = engine.retrieve_int(&key).await;

        match result {
            Err(CacheError::Decode { key: failed, .. }) => assert_eq!(failed, key),
            other => panic!("expected decode error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_typed_getters() {
        let engine = Engine::new();

        let text = engine.store(b"foo".to_vec(), None).await.unwrap();
        let int = engine.store("42", None).await.unwrap();
        let float = engine.store(1.25f64, None).await.unwrap();

        assert_eq!(engine.retrieve_str(&text).await, Ok(Some("foo".to_string())));
        assert_eq!(engine.retrieve_int(&int).await, Ok(Some(42)));
        assert_eq!(engine.retrieve_float(&float).await, Ok(Some(1.25)));
    }

    #[tokio::test]
    async fn test_retrieve_reclaims_expired() {
        let engine = Engine::new();
        let key = engine
            .store("v", Some(Duration::from_millis(50)))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(engine.retrieve(&key).await, None);
        assert_eq!(engine.len().await, 0);
        assert_eq!(engine.stats().await.expirations, 1);
    }

    #[tokio::test]
    async fn test_delete_and_flush() {
        let engine = Engine::new();
        let a = engine.store("a", None).await.unwrap();
        let b = engine.store("b", None).await.unwrap();

        assert!(engine.delete(&a).await);
        assert!(!engine.delete(&a).await);

        assert_eq!(engine.flush().await, 1);
        assert_eq!(engine.retrieve(&b).await, None);
    }

    #[tokio::test]
    async fn test_instrumented_call() {
        let engine = Engine::new();

        for n in 1..=3i64 {
            let out = engine
                .instrumented_call("square", &n, || async move { Ok::<_, Infallible>(n * n) })
                .await
                .unwrap();
            assert_eq!(out, n * n);
        }

        let replay = engine.replay("square").await;
        assert_eq!(replay.count, 3);
        assert_eq!(
            replay.to_string(),
            "square was called 3 times:\nsquare(1) -> 1\nsquare(2) -> 4\nsquare(3) -> 9"
        );

        assert!(engine.reset_history("square").await);
        assert_eq!(engine.replay("square").await.count, 0);
    }

    #[tokio::test]
    async fn test_engines_are_isolated() {
        let first = Engine::new();
        let second = Engine::new();

        let key = first.store("v", None).await.unwrap();

        assert_eq!(second.retrieve(&key).await, None);
        assert_eq!(second.replay(STORE_OPERATION).await.count, 0);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let engine = Engine::new();
        let handle = engine.clone();

        let key = engine.store("shared", None).await.unwrap();
        assert_eq!(handle.retrieve(&key).await, Some(Value::from("shared")));
    }

    #[tokio::test]
    async fn test_close_rejects_store() {
        let engine = Engine::new();
        let key = engine.store("kept", None).await.unwrap();

        engine.close().await;

        assert!(engine.is_closed().await);
        assert_eq!(engine.store("v", None).await, Err(CacheError::Closed));
        assert_eq!(engine.retrieve(&key).await, Some(Value::from("kept")));
    }

    #[test]
    fn test_from_config() {
        let config = Config {
            fetch_timeout: 3,
            single_flight: true,
            ..Config::default()
        };

        let engine = Engine::from_config(&config);
        assert_eq!(engine.options().fetch_timeout, Duration::from_secs(3));
        assert!(engine.options().single_flight);
    }
}
