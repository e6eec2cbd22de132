//! Fetch-through page cache with access counting.
//!
//! Pages live in their own store, so a resource key never resolves to a
//! value saved with `Engine::store`.
//!
//! The producer always runs with no store lock held. With single-flight
//! enabled, concurrent misses for one resource wait on a `watch` channel
//! registered by the first caller instead of invoking the producer again.

use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::Ordering;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::Engine;
use crate::cache::{validate_ttl, Lookup, Value};
use crate::error::{CacheError, Result};

type FlightResult = Result<String>;

/// Registered in-flight fetch for one resource.
pub(super) struct Flight {
    id: u64,
    result: watch::Receiver<Option<FlightResult>>,
}

/// Held by the caller running the producer. Dropping it unregisters the
/// flight; if no result was published, waiting callers see the channel
/// close.
struct FlightGuard<'a> {
    flights: &'a DashMap<String, Flight>,
    key: String,
    id: u64,
    result: watch::Sender<Option<FlightResult>>,
}

impl FlightGuard<'_> {
    fn publish(&self, result: &FlightResult) {
        self.result.send_replace(Some(result.clone()));
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.flights.remove_if(&self.key, |_, flight| flight.id == self.id);
    }
}

enum Role<'a> {
    Leader(FlightGuard<'a>),
    Follower(watch::Receiver<Option<FlightResult>>),
}

impl Engine {
    // == Fetch With Cache ==
    /// Returns the cached page for `resource_key`, or runs `producer` and
    /// caches its output for `ttl`.
    ///
    /// Every call counts as one access to `resource_key`, hit or miss.
    ///
    /// # Errors
    /// - `Validation` if `ttl` is zero (nothing is counted)
    /// - `Fetch` if the producer fails or exceeds the fetch timeout; nothing
    ///   is cached in that case
    /// - `Closed` on a miss once the engine has been closed; the producer is
    ///   not run
    pub async fn fetch_with_cache<F, Fut, E>(
        &self,
        resource_key: &str,
        producer: F,
        ttl: Duration,
    ) -> Result<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<String, E>>,
        E: Display,
    {
        validate_ttl(Some(ttl))?;
        self.record_access(resource_key).await;

        if let Some(page) = self.cached_page(resource_key).await {
            debug!("Cache hit for {}", resource_key);
            return Ok(page);
        }
        debug!("Cache miss for {}", resource_key);

        if self.inner.pages.read().await.is_closed() {
            return Err(CacheError::Closed);
        }

        if !self.inner.options.single_flight {
            return self.fetch_and_store(resource_key, producer, ttl).await;
        }

        match self.join_flight(resource_key) {
            Role::Leader(guard) => {
                // A previous leader may have stored the page between our
                // miss and registering this flight
                let result = match self.cached_page(resource_key).await {
                    Some(page) => Ok(page),
                    None => self.fetch_and_store(resource_key, producer, ttl).await,
                };
                guard.publish(&result);
                result
            }
            Role::Follower(mut result) => {
                debug!("Waiting on in-flight fetch for {}", resource_key);
                let published = match result.wait_for(Option::is_some).await {
                    Ok(published) => (*published).clone(),
                    Err(_) => None,
                };
                published.unwrap_or_else(|| {
                    Err(CacheError::Fetch(format!(
                        "In-flight fetch for '{}' was abandoned",
                        resource_key
                    )))
                })
            }
        }
    }

    /// Live page cached under `resource_key`, if any. Does not count as an
    /// access.
    pub async fn cached_page(&self, resource_key: &str) -> Option<String> {
        let lookup = self.inner.pages.read().await.lookup(resource_key);

        match lookup {
            Lookup::Hit(Value::Text(page)) => Some(page),
            Lookup::Hit(_) | Lookup::Missing => None,
            Lookup::Expired => {
                self.inner.pages.write().await.remove_if_expired(resource_key);
                None
            }
        }
    }

    /// [`Engine::fetch_with_cache`] using the configured page TTL.
    pub async fn fetch_page<F, Fut, E>(&self, resource_key: &str, producer: F) -> Result<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<String, E>>,
        E: Display,
    {
        let ttl = self.inner.options.page_ttl;
        self.fetch_with_cache(resource_key, producer, ttl).await
    }

    async fn fetch_and_store<F, Fut, E>(
        &self,
        resource_key: &str,
        producer: F,
        ttl: Duration,
    ) -> Result<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<String, E>>,
        E: Display,
    {
        let timeout = self.inner.options.fetch_timeout;
        let page = match tokio::time::timeout(timeout, producer()).await {
            Ok(Ok(page)) => page,
            Ok(Err(err)) => {
                warn!("Fetch for {} failed: {}", resource_key, err);
                return Err(CacheError::Fetch(err.to_string()));
            }
            Err(_) => {
                warn!("Fetch for {} timed out after {:?}", resource_key, timeout);
                return Err(CacheError::Fetch(format!(
                    "Producer timed out after {:?}",
                    timeout
                )));
            }
        };

        self.inner.pages.write().await.set(
            resource_key.to_string(),
            Value::Text(page.clone()),
            Some(ttl),
        )?;
        Ok(page)
    }

    fn join_flight(&self, resource_key: &str) -> Role<'_> {
        match self.inner.in_flight.entry(resource_key.to_string()) {
            Entry::Occupied(flight) => Role::Follower(flight.get().result.clone()),
            Entry::Vacant(slot) => {
                let id = self.inner.next_flight_id.fetch_add(1, Ordering::Relaxed);
                let (tx, rx) = watch::channel(None);
                slot.insert(Flight { id, result: rx });
                Role::Leader(FlightGuard {
                    flights: &self.inner.in_flight,
                    key: resource_key.to_string(),
                    id,
                    result: tx,
                })
            }
        }
    }

    // == Access Counters ==
    async fn record_access(&self, resource_key: &str) {
        let mut counts = self.inner.access_counts.write().await;
        *counts.entry(resource_key.to_string()).or_insert(0) += 1;
    }

    /// Number of `fetch_with_cache` calls made for `resource_key`.
    pub async fn access_count(&self, resource_key: &str) -> u64 {
        let counts = self.inner.access_counts.read().await;
        counts.get(resource_key).copied().unwrap_or(0)
    }

    /// Clears the access counter for `resource_key`.
    pub async fn reset_access_count(&self, resource_key: &str) -> bool {
        self.inner
            .access_counts
            .write()
            .await
            .remove(resource_key)
            .is_some()
    }
}
