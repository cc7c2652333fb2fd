//! Stale-while-revalidate cache over a [`KeyValueStore`].
//!
//! Reads are served from storage while the entry is fresh. Anything older is
//! refetched, with concurrent requests for the same key collapsed into one
//! network call. The last good payload per key is kept so a failed refetch
//! never leaves the caller empty-handed.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use super::clock::{Clock, SystemClock};
use super::entry::CachedData;
use super::error::{FetchError, LoadError};
use crate::storage::{read_json, write_json, KeyValueStore};

/// Entries younger than this are served without a network round trip.
pub const DEFAULT_FRESHNESS: Duration = Duration::from_secs(60 * 60);

/// Requests for the same key started within this window share one fetch.
pub const DEFAULT_DEDUP_WINDOW: Duration = Duration::from_secs(60);

/// How often mounted views revalidate regardless of freshness.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Suffix of the sibling key holding an entry's epoch-millisecond timestamp.
const TIMESTAMP_SUFFIX: &str = "-timestamp";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    pub freshness: Duration,
    pub dedup_window: Duration,
    pub refresh_interval: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            freshness: DEFAULT_FRESHNESS,
            dedup_window: DEFAULT_DEDUP_WINDOW,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
        }
    }
}

/// Where a loaded payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Cache,
    Network,
}

/// A payload handed to callers. `data` is shared, so cloning is cheap.
#[derive(Debug)]
pub struct Loaded<T> {
    pub data: Arc<T>,
    pub origin: Origin,
    pub fetched_at: DateTime<Utc>,
}

impl<T> Clone for Loaded<T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            origin: self.origin,
            fetched_at: self.fetched_at,
        }
    }
}

impl<T> Loaded<T> {
    /// Age display relative to `now`, e.g. "5m ago".
    pub fn age_display(&self, now: DateTime<Utc>) -> String {
        CachedData::new((), self.fetched_at).age_display(now)
    }
}

type SharedFetch<T> = Shared<BoxFuture<'static, Result<Loaded<T>, FetchError>>>;

struct InFlight<T> {
    started_at: DateTime<Utc>,
    future: SharedFetch<T>,
}

struct Inner<T, S> {
    store: S,
    clock: Arc<dyn Clock>,
    settings: CacheSettings,
    in_flight: Mutex<HashMap<String, InFlight<T>>>,
    last_known: Mutex<HashMap<String, Loaded<T>>>,
}

/// Cheap to clone; clones share storage, in-flight requests and last-known data.
pub struct SwrCache<T, S> {
    inner: Arc<Inner<T, S>>,
}

impl<T, S> Clone for SwrCache<T, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn to_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}

impl<T, S> SwrCache<T, S>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
    S: KeyValueStore + 'static,
{
    pub fn new(store: S, settings: CacheSettings) -> Self {
        Self::with_clock(store, settings, Arc::new(SystemClock))
    }

    pub fn with_clock(store: S, settings: CacheSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                clock,
                settings,
                in_flight: Mutex::new(HashMap::new()),
                last_known: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn settings(&self) -> CacheSettings {
        self.inner.settings
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }

    /// Serve a fresh stored entry, or fetch.
    pub async fn load<F, Fut, E>(&self, key: &str, fetch: F) -> Result<Loaded<T>, LoadError<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: StdError + Send + Sync + 'static,
    {
        if let Some(entry) = self.inner.read_entry(key) {
            let now = self.inner.clock.now();
            if entry.is_fresh(now, to_delta(self.inner.settings.freshness)) {
                debug!(key = key, age = %entry.age_display(now), "Serving fresh cache entry");
                let loaded = Loaded {
                    data: Arc::new(entry.data),
                    origin: Origin::Cache,
                    fetched_at: entry.cached_at,
                };
                lock(&self.inner.last_known).insert(key.to_string(), loaded.clone());
                return Ok(loaded);
            }
            debug!(key = key, age = %entry.age_display(now), "Cache entry is stale, revalidating");
        } else {
            debug!(key = key, "Cache miss");
        }

        self.revalidate(key, fetch).await
    }

    /// Fetch regardless of freshness. Still de-duplicated.
    pub async fn revalidate<F, Fut, E>(&self, key: &str, fetch: F) -> Result<Loaded<T>, LoadError<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: StdError + Send + Sync + 'static,
    {
        let shared = self.shared_fetch(key, fetch);
        shared.await.map_err(|error| LoadError {
            error,
            previous: self.peek(key),
        })
    }

    /// Last-known data for `key`, however old. Memory first, then storage.
    pub fn peek(&self, key: &str) -> Option<Loaded<T>> {
        if let Some(loaded) = lock(&self.inner.last_known).get(key) {
            return Some(loaded.clone());
        }

        self.inner.read_entry(key).map(|entry| Loaded {
            data: Arc::new(entry.data),
            origin: Origin::Cache,
            fetched_at: entry.cached_at,
        })
    }

    fn shared_fetch<F, Fut, E>(&self, key: &str, fetch: F) -> SharedFetch<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: StdError + Send + Sync + 'static,
    {
        let now = self.inner.clock.now();
        let window = to_delta(self.inner.settings.dedup_window);

        let mut in_flight = lock(&self.inner.in_flight);
        in_flight.retain(|_, f| now - f.started_at < window);

        if let Some(existing) = in_flight.get(key) {
            debug!(key = key, "Joining in-flight fetch");
            return existing.future.clone();
        }

        debug!(key = key, "Starting fetch");
        let request = fetch();
        let weak: Weak<Inner<T, S>> = Arc::downgrade(&self.inner);
        let owned_key = key.to_string();
        let started_at = now;

        let future = async move {
            let result = request
                .await
                .map_err(|e| FetchError::new(&owned_key, e));
            match weak.upgrade() {
                Some(inner) => inner.complete(&owned_key, started_at, result),
                // Cache dropped mid-flight; nothing left to write back to
                None => result.map(|data| Loaded {
                    data: Arc::new(data),
                    origin: Origin::Network,
                    fetched_at: started_at,
                }),
            }
        }
        .boxed()
        .shared();

        in_flight.insert(
            key.to_string(),
            InFlight {
                started_at,
                future: future.clone(),
            },
        );
        future
    }
}

impl<T, S> Inner<T, S>
where
    T: Serialize + DeserializeOwned,
    S: KeyValueStore,
{
    fn timestamp_key(key: &str) -> String {
        format!("{}{}", key, TIMESTAMP_SUFFIX)
    }

    /// Storage failures and corrupt entries read as "nothing cached".
    fn read_entry(&self, key: &str) -> Option<CachedData<T>> {
        let data: T = match read_json(&self.store, key) {
            Ok(Some(data)) => data,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = key, error = %e, "Ignoring unreadable cache entry");
                return None;
            }
        };

        let millis: Option<i64> = match read_json(&self.store, &Self::timestamp_key(key)) {
            Ok(millis) => millis,
            Err(e) => {
                debug!(key = key, error = %e, "Unreadable cache timestamp, treating entry as stale");
                None
            }
        };
        // Missing timestamp: keep the data but force revalidation
        let cached_at = millis
            .and_then(DateTime::from_timestamp_millis)
            .unwrap_or(DateTime::UNIX_EPOCH);

        Some(CachedData::new(data, cached_at))
    }

    fn write_entry(&self, key: &str, data: &T, cached_at: DateTime<Utc>) {
        let written = write_json(&self.store, key, data).and_then(|()| {
            write_json(
                &self.store,
                &Self::timestamp_key(key),
                &cached_at.timestamp_millis(),
            )
        });
        if let Err(e) = written {
            warn!(key = key, error = %e, "Failed to persist cache entry");
        }
    }

    fn complete(
        &self,
        key: &str,
        started_at: DateTime<Utc>,
        result: Result<T, FetchError>,
    ) -> Result<Loaded<T>, FetchError> {
        match result {
            Ok(data) => {
                let fetched_at = self.clock.now();
                self.write_entry(key, &data, fetched_at);
                let loaded = Loaded {
                    data: Arc::new(data),
                    origin: Origin::Network,
                    fetched_at,
                };
                lock(&self.last_known).insert(key.to_string(), loaded.clone());
                debug!(key = key, "Fetch complete, cache updated");
                Ok(loaded)
            }
            Err(error) => {
                // Let the next caller retry instead of replaying this failure
                let mut in_flight = lock(&self.in_flight);
                if in_flight
                    .get(key)
                    .is_some_and(|f| f.started_at == started_at)
                {
                    in_flight.remove(key);
                }
                warn!(key = key, error = %error, "Fetch failed");
                Err(error)
            }
        }
    }
}
