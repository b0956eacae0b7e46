//! Bidirectional incremental loading over a long ordered collection.
//!
//! Pages are fetched through the shared cache with ordinary list keys, so
//! they are deduplicated and invalidated like any other list. The window
//! can start at an arbitrary offset and grow in both directions.
//!
//! The loaded pages belong to the cache epoch they were fetched in. A
//! cache clear empties the window at once and pages requested before it
//! are dropped when they arrive.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::join_all;
use payloads::{FetchSpecification, SessionId, SortOrder, collections};
use tokio::sync::broadcast::error::RecvError;

use super::TaskGuard;
use crate::models::Capture;
use crate::{CacheEvent, ClientContext, Entity, Page, SharedError};

pub struct WindowedList<E: Entity> {
    inner: Arc<WindowInner<E>>,
    _watcher: TaskGuard,
}

struct WindowInner<E> {
    ctx: ClientContext,
    /// Without pagination; each page adds its own.
    spec: FetchSpecification,
    page_size: u64,
    first_page: u64,
    /// Set by the first load, so a clear only reloads a window in use.
    started: AtomicBool,
    window: Mutex<Window<E>>,
}

struct Window<E> {
    epoch: u64,
    /// Keyed by page index, so iteration is in collection order.
    pages: BTreeMap<u64, Arc<Page<E>>>,
    count: Option<u64>,
    fetching_next: bool,
    fetching_previous: bool,
    error: Option<SharedError>,
}

impl<E> Default for Window<E> {
    fn default() -> Self {
        Self {
            epoch: 0,
            pages: BTreeMap::new(),
            count: None,
            fetching_next: false,
            fetching_previous: false,
            error: None,
        }
    }
}

impl<E> Window<E> {
    fn has_next(&self, page_size: u64) -> bool {
        let (Some((index, last)), Some(count)) =
            (self.pages.last_key_value(), self.count)
        else {
            return false;
        };
        let end = index * page_size + last.len() as u64;
        last.len() as u64 == page_size && end < count
    }

    fn has_previous(&self) -> bool {
        self.pages.first_key_value().is_some_and(|(index, _)| *index > 0)
    }

    fn store(&mut self, page: Arc<Page<E>>) {
        self.count = Some(page.count);
        self.pages.insert(page.page, page);
    }
}

#[derive(Debug)]
pub struct WindowState<E> {
    pages: Vec<Arc<Page<E>>>,
    pub count: Option<u64>,
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub is_fetching_next_page: bool,
    pub is_fetching_previous_page: bool,
    pub error: Option<SharedError>,
}

impl<E: Entity> WindowState<E> {
    /// Every loaded record in collection order, each exactly once even
    /// where neighbouring pages overlap.
    pub fn items(&self) -> Vec<&E> {
        let mut seen = HashSet::new();
        self.pages
            .iter()
            .flat_map(|page| page.results.iter())
            .filter(|item| seen.insert(item.id()))
            .collect()
    }

    /// Offset of the first loaded record.
    pub fn first_offset(&self, page_size: u64) -> Option<u64> {
        self.pages.first().map(|page| page.page * page_size)
    }
}

pub fn use_windowed_list<E: Entity>(
    ctx: &ClientContext,
    mut spec: FetchSpecification,
    start_offset: u64,
) -> WindowedList<E> {
    spec.collection = E::COLLECTION.to_string();
    spec.pagination = None;
    let page_size = ctx.config().window_page_size.max(1);
    let inner = Arc::new(WindowInner {
        ctx: ctx.clone(),
        spec,
        page_size,
        first_page: start_offset / page_size,
        started: AtomicBool::new(false),
        window: Mutex::new(Window {
            epoch: ctx.cache().epoch(),
            ..Window::default()
        }),
    });
    WindowedList {
        _watcher: watch(&inner),
        inner,
    }
}

/// Captures of one session in time order, starting from the page that
/// contains `start_offset`.
pub fn use_session_captures(
    ctx: &ClientContext,
    session_id: SessionId,
    start_offset: u64,
) -> WindowedList<Capture> {
    let spec = FetchSpecification::new(collections::CAPTURES)
        .filter("event", session_id.to_string())
        .sort("timestamp", SortOrder::Asc);
    use_windowed_list(ctx, spec, start_offset)
}

fn watch<E: Entity>(inner: &Arc<WindowInner<E>>) -> TaskGuard {
    let mut events = inner.ctx.cache().subscribe();
    // The task must not keep the window alive on its own.
    let weak = Arc::downgrade(inner);
    TaskGuard::spawn(async move {
        loop {
            let stale = match events.recv().await {
                Ok(CacheEvent::Invalidated { collection }) => weak
                    .upgrade()
                    .is_some_and(|inner| collection == inner.spec.collection),
                Ok(CacheEvent::Cleared) | Err(RecvError::Lagged(_)) => true,
                Err(RecvError::Closed) => break,
            };
            if !stale {
                continue;
            }
            let Some(inner) = weak.upgrade() else { break };
            if let Err(e) = inner.refresh().await {
                tracing::warn!(
                    collection = %inner.spec.collection,
                    "window refetch failed: {e}"
                );
            }
        }
    })
}

impl<E: Entity> WindowInner<E> {
    /// Lock the window, first emptying it if the cache was cleared since
    /// its pages were loaded.
    fn lock(&self) -> MutexGuard<'_, Window<E>> {
        let mut window =
            self.window.lock().unwrap_or_else(PoisonError::into_inner);
        let epoch = self.ctx.cache().epoch();
        if window.epoch != epoch {
            tracing::debug!(collection = %self.spec.collection, "window reset");
            *window = Window {
                epoch,
                ..Window::default()
            };
        }
        window
    }

    async fn load(
        &self,
        index: u64,
        force: bool,
    ) -> Result<Arc<Page<E>>, SharedError> {
        let spec = self.spec.clone().page(index, self.page_size);
        let key = spec.key();
        let client = self.ctx.api_client();
        let request = async move {
            let response = client.list::<E::Record>(&spec).await?;
            Ok(Page::from_response(response, index, E::from_record))
        };
        let cache = self.ctx.cache();
        if force {
            cache.refetch(&key, request).await
        } else {
            cache.fetch(&key, request).await
        }
    }

    /// Store a page loaded in `epoch`, or the error that prevented it.
    /// Results from an earlier epoch are returned but not stored.
    fn settle(
        &self,
        epoch: u64,
        result: Result<Arc<Page<E>>, SharedError>,
    ) -> Result<(), SharedError> {
        let mut window = self.lock();
        if window.epoch != epoch {
            tracing::debug!(
                collection = %self.spec.collection,
                "discarding page from before clear"
            );
            return result.map(|_| ());
        }
        match result {
            Ok(page) => {
                window.store(page);
                window.error = None;
                Ok(())
            }
            Err(e) => {
                window.error = Some(e.clone());
                Err(e)
            }
        }
    }

    async fn load_first(&self) -> Result<(), SharedError> {
        self.started.store(true, Ordering::SeqCst);
        // Read before the request picks up the credential.
        let epoch = self.ctx.cache().epoch();
        let result = self.load(self.first_page, false).await;
        self.settle(epoch, result)
    }

    /// Reload every loaded page. A window emptied by a clear starts over
    /// from its first page.
    async fn refresh(&self) -> Result<(), SharedError> {
        let epoch = self.ctx.cache().epoch();
        let mut indices: Vec<u64> = self.lock().pages.keys().copied().collect();
        if indices.is_empty() {
            if !self.started.load(Ordering::SeqCst) {
                return Ok(());
            }
            indices.push(self.first_page);
        }
        let results =
            join_all(indices.into_iter().map(|index| self.load(index, true)))
                .await;

        let mut window = self.lock();
        if window.epoch != epoch {
            return Ok(());
        }
        let mut failure = None;
        for result in results {
            match result {
                Ok(page) => window.store(page),
                Err(e) => failure = Some(e),
            }
        }
        window.error = failure.clone();
        failure.map_or(Ok(()), Err)
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Next,
    Previous,
}

/// Marks a page load in one direction, cleared when the load finishes or
/// its caller gives up on it.
struct Fetching<'a, E: Entity> {
    inner: &'a WindowInner<E>,
    direction: Direction,
}

impl<E: Entity> Drop for Fetching<'_, E> {
    fn drop(&mut self) {
        let mut window = self.inner.lock();
        match self.direction {
            Direction::Next => window.fetching_next = false,
            Direction::Previous => window.fetching_previous = false,
        }
    }
}

impl<E: Entity> WindowedList<E> {
    pub fn page_size(&self) -> u64 {
        self.inner.page_size
    }

    /// Load the page containing the start offset.
    pub async fn fetch_initial_page(&self) -> Result<(), SharedError> {
        self.inner.load_first().await
    }

    /// Load the page after the last loaded one. Returns `Ok(false)` without
    /// a request when there is no such page or it is already being loaded.
    pub async fn fetch_next_page(&self) -> Result<bool, SharedError> {
        let epoch = self.inner.ctx.cache().epoch();
        let index = {
            let mut window = self.inner.lock();
            match window.pages.keys().next_back().copied() {
                None => None,
                Some(last) => {
                    if window.fetching_next
                        || !window.has_next(self.inner.page_size)
                    {
                        return Ok(false);
                    }
                    window.fetching_next = true;
                    Some(last + 1)
                }
            }
        };
        let Some(index) = index else {
            self.fetch_initial_page().await?;
            return Ok(true);
        };
        let fetching = Fetching {
            inner: self.inner.as_ref(),
            direction: Direction::Next,
        };
        let result = self.inner.load(index, false).await;
        drop(fetching);
        self.inner.settle(epoch, result).map(|()| true)
    }

    /// Load the page before the first loaded one.
    pub async fn fetch_previous_page(&self) -> Result<bool, SharedError> {
        let epoch = self.inner.ctx.cache().epoch();
        let index = {
            let mut window = self.inner.lock();
            let Some(first) = window.pages.keys().next().copied() else {
                return Ok(false);
            };
            if window.fetching_previous || first == 0 {
                return Ok(false);
            }
            window.fetching_previous = true;
            first - 1
        };
        let fetching = Fetching {
            inner: self.inner.as_ref(),
            direction: Direction::Previous,
        };
        let result = self.inner.load(index, false).await;
        drop(fetching);
        self.inner.settle(epoch, result).map(|()| true)
    }

    /// Reload every page currently in the window.
    pub async fn refetch(&self) -> Result<(), SharedError> {
        self.inner.refresh().await
    }

    pub fn state(&self) -> WindowState<E> {
        let window = self.inner.lock();
        WindowState {
            pages: window.pages.values().cloned().collect(),
            count: window.count,
            has_next_page: window.has_next(self.inner.page_size),
            has_previous_page: window.has_previous(),
            is_fetching_next_page: window.fetching_next,
            is_fetching_previous_page: window.fetching_previous,
            error: window.error.clone(),
        }
    }
}
