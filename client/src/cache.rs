//! Process-wide response cache shared by every hook of a [`ClientContext`].
//!
//! Entries are indexed by [`CanonicalQueryKey`]. Concurrent fetches of the
//! same key share one request. Invalidating a collection evicts its
//! entries, except those a hook is watching, which are kept as stale data
//! until the hook's refetch lands. Clearing drops every entry at once (used
//! when the session credential changes).
//!
//! [`ClientContext`]: crate::ClientContext

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use derive_more::Display;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use payloads::{CanonicalQueryKey, ClientError};
use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::SharedError;

type CachedValue = Arc<dyn Any + Send + Sync>;
type SharedRequest =
    Shared<BoxFuture<'static, Result<CachedValue, SharedError>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum FetchStatus {
    /// Nothing requested yet, or the last request was discarded.
    #[default]
    Idle,
    /// First request for the key, no data to show.
    Loading,
    /// Refetching while previous data is still shown.
    Fetching,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    Invalidated { collection: String },
    Cleared,
}

/// A point-in-time view of one cache entry.
#[derive(Debug)]
pub struct Snapshot<T> {
    pub data: Option<Arc<T>>,
    pub status: FetchStatus,
    pub error: Option<SharedError>,
    pub is_stale: bool,
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Self {
            data: None,
            status: FetchStatus::Idle,
            error: None,
            is_stale: false,
        }
    }
}

impl<T> Snapshot<T> {
    pub fn is_loading(&self) -> bool {
        self.status == FetchStatus::Loading
    }

    /// True for any request in flight, including the first one.
    pub fn is_fetching(&self) -> bool {
        matches!(self.status, FetchStatus::Loading | FetchStatus::Fetching)
    }
}

#[derive(Default)]
struct CacheEntry {
    status: FetchStatus,
    data: Option<CachedValue>,
    error: Option<SharedError>,
    in_flight: Option<SharedRequest>,
    fetched_at: Option<Instant>,
    stale: bool,
    /// Bumped on invalidation so requests issued before it cannot write.
    generation: u64,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<CanonicalQueryKey, CacheEntry>,
    /// Live watchers per key. Survives `clear()`, since the hooks do.
    watched: HashMap<CanonicalQueryKey, usize>,
    /// Bumped on clear so requests issued before it cannot write.
    epoch: u64,
}

#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<Mutex<CacheInner>>,
    events: broadcast::Sender<CacheEvent>,
    stale_time: Duration,
}

enum Lookup {
    Fresh(CachedValue),
    Join(SharedRequest),
    Start(SharedRequest),
}

impl QueryCache {
    pub fn new(stale_time: Duration) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(Mutex::new(CacheInner::default())),
            events,
            stale_time,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the cached value if it is still fresh, otherwise join the
    /// in-flight request for `key` or start `request`.
    pub async fn fetch<T, F>(
        &self,
        key: &CanonicalQueryKey,
        request: F,
    ) -> Result<Arc<T>, SharedError>
    where
        T: Send + Sync + 'static,
        F: Future<Output = Result<T, ClientError>> + Send + 'static,
    {
        self.run(key, request, false).await
    }

    /// Like [`fetch`](Self::fetch) but ignores freshness. An in-flight
    /// request is still joined rather than duplicated.
    pub async fn refetch<T, F>(
        &self,
        key: &CanonicalQueryKey,
        request: F,
    ) -> Result<Arc<T>, SharedError>
    where
        T: Send + Sync + 'static,
        F: Future<Output = Result<T, ClientError>> + Send + 'static,
    {
        self.run(key, request, true).await
    }

    async fn run<T, F>(
        &self,
        key: &CanonicalQueryKey,
        request: F,
        force: bool,
    ) -> Result<Arc<T>, SharedError>
    where
        T: Send + Sync + 'static,
        F: Future<Output = Result<T, ClientError>> + Send + 'static,
    {
        let lookup = {
            let mut inner = self.lock();
            let epoch = inner.epoch;
            let entry = inner.entries.entry(key.clone()).or_default();
            if let Some(in_flight) = &entry.in_flight {
                Lookup::Join(in_flight.clone())
            } else if !force
                && let Some(data) = self.fresh_data(entry)
            {
                Lookup::Fresh(data)
            } else {
                entry.status = match entry.data {
                    Some(_) => FetchStatus::Fetching,
                    None => FetchStatus::Loading,
                };
                let generation = entry.generation;
                let cache = self.clone();
                let settle_key = key.clone();
                let shared = async move {
                    let result = request
                        .await
                        .map(|value| Arc::new(value) as CachedValue)
                        .map_err(Arc::new);
                    cache.settle(&settle_key, epoch, generation, &result);
                    result
                }
                .boxed()
                .shared();
                entry.in_flight = Some(shared.clone());
                Lookup::Start(shared)
            }
        };

        let value = match lookup {
            Lookup::Fresh(data) => data,
            Lookup::Join(shared) => shared.await?,
            Lookup::Start(shared) => {
                // Driven on its own task so the entry settles even when
                // every caller stops waiting.
                tracing::debug!(%key, "request started");
                tokio::spawn(shared.clone());
                shared.await?
            }
        };
        downcast(key, value)
    }

    fn fresh_data(&self, entry: &CacheEntry) -> Option<CachedValue> {
        let fresh = !entry.stale
            && entry
                .fetched_at
                .is_some_and(|at| at.elapsed() < self.stale_time);
        fresh.then(|| entry.data.clone()).flatten()
    }

    fn settle(
        &self,
        key: &CanonicalQueryKey,
        epoch: u64,
        generation: u64,
        result: &Result<CachedValue, SharedError>,
    ) {
        let mut inner = self.lock();
        if inner.epoch != epoch {
            tracing::debug!(%key, "discarding response from before clear");
            return;
        }
        let Some(entry) = inner.entries.get_mut(key) else {
            return;
        };
        if entry.generation != generation {
            tracing::debug!(
                %key,
                "discarding response from before invalidation"
            );
            return;
        }
        entry.in_flight = None;
        match result {
            Ok(value) => {
                entry.data = Some(value.clone());
                entry.error = None;
                entry.status = FetchStatus::Success;
                entry.fetched_at = Some(Instant::now());
                entry.stale = false;
            }
            Err(e) => {
                entry.error = Some(e.clone());
                entry.status = FetchStatus::Error;
            }
        }
    }

    /// Invalidate every entry of `collection` and notify subscribers.
    ///
    /// Takes effect before this returns. Entries nobody watches and nothing
    /// is loading are evicted. The rest are marked stale and keep their
    /// data for display, and a request still in flight for one of them is
    /// detached so its response will not be stored. Returns the number of
    /// entries affected.
    pub fn invalidate_collection(&self, collection: &str) -> usize {
        let (count, evicted) = {
            let mut guard = self.lock();
            let CacheInner {
                entries, watched, ..
            } = &mut *guard;
            let before = entries.len();
            let mut count = 0;
            entries.retain(|key, entry| {
                if key.collection() != collection {
                    return true;
                }
                count += 1;
                let loading = entry.in_flight.take().is_some();
                if !loading && !watched.contains_key(key) {
                    return false;
                }
                entry.stale = true;
                entry.generation += 1;
                if loading {
                    entry.status = match entry.data {
                        Some(_) => FetchStatus::Success,
                        None => FetchStatus::Idle,
                    };
                }
                true
            });
            (count, before - entries.len())
        };
        tracing::debug!(collection, count, evicted, "invalidated");
        // No receivers is fine.
        let _ = self.events.send(CacheEvent::Invalidated {
            collection: collection.to_string(),
        });
        count
    }

    /// Register a watcher for `key` until the returned guard is dropped.
    /// Watched entries survive invalidation as stale data.
    pub fn watch(&self, key: &CanonicalQueryKey) -> WatchGuard {
        *self.lock().watched.entry(key.clone()).or_default() += 1;
        WatchGuard {
            cache: Arc::downgrade(&self.inner),
            key: key.clone(),
        }
    }

    /// Incremented by every [`clear`](Self::clear). Work started under an
    /// older epoch belongs to a previous credential.
    pub fn epoch(&self) -> u64 {
        self.lock().epoch
    }

    /// Drop every entry. Responses to requests issued before the clear are
    /// discarded when they arrive.
    pub fn clear(&self) {
        {
            let mut inner = self.lock();
            inner.entries.clear();
            inner.epoch += 1;
        }
        tracing::debug!("cache cleared");
        let _ = self.events.send(CacheEvent::Cleared);
    }

    pub fn snapshot<T: Send + Sync + 'static>(
        &self,
        key: &CanonicalQueryKey,
    ) -> Snapshot<T> {
        let inner = self.lock();
        let Some(entry) = inner.entries.get(key) else {
            return Snapshot::default();
        };
        Snapshot {
            data: entry
                .data
                .clone()
                .and_then(|data| data.downcast::<T>().ok()),
            status: entry.status,
            error: entry.error.clone(),
            is_stale: entry.stale,
        }
    }

    pub fn is_stale(&self, key: &CanonicalQueryKey) -> bool {
        self.lock().entries.get(key).is_some_and(|entry| entry.stale)
    }

    pub fn is_watched(&self, key: &CanonicalQueryKey) -> bool {
        self.lock().watched.contains_key(key)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Keeps an entry watched while alive.
#[derive(Debug)]
pub struct WatchGuard {
    cache: Weak<Mutex<CacheInner>>,
    key: CanonicalQueryKey,
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        let Some(inner) = self.cache.upgrade() else {
            return;
        };
        let mut inner = inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(count) = inner.watched.get_mut(&self.key) {
            *count -= 1;
            if *count == 0 {
                inner.watched.remove(&self.key);
            }
        }
    }
}

fn downcast<T: Send + Sync + 'static>(
    key: &CanonicalQueryKey,
    value: CachedValue,
) -> Result<Arc<T>, SharedError> {
    value
        .downcast::<T>()
        .map_err(|_| Arc::new(ClientError::UnexpectedShape(key.to_string())))
}
