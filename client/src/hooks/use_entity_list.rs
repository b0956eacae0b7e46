use std::sync::Arc;

use futures::FutureExt;
use payloads::{APIClient, FetchSpecification};

use super::{Query, TaskGuard};
use crate::{ClientContext, Entity, Page, SharedError};

/// Current state of a list hook, as a view would render it.
#[derive(Debug)]
pub struct ListState<E> {
    pub page: Option<Arc<Page<E>>>,
    /// Only the first request for the current key, with nothing to show.
    pub is_loading: bool,
    /// Any request in flight, including background refetches.
    pub is_fetching: bool,
    pub is_stale: bool,
    pub error: Option<SharedError>,
}

impl<E> ListState<E> {
    pub fn items(&self) -> &[E] {
        self.page.as_deref().map(|p| p.results.as_slice()).unwrap_or(&[])
    }

    pub fn total(&self) -> Option<u64> {
        self.page.as_ref().map(|p| p.count)
    }
}

/// One page of a collection, kept in sync with the shared cache.
///
/// Refetches when its collection is invalidated or the cache is cleared,
/// and on a fixed interval while polling is enabled. Both background tasks
/// stop when the list is dropped.
pub struct EntityList<E: Entity> {
    ctx: ClientContext,
    spec: FetchSpecification,
    query: Query<Page<E>>,
    _watcher: TaskGuard,
    poller: Option<TaskGuard>,
}

/// Create a list hook for `spec`. The collection is always the entity's.
/// Nothing is requested until [`EntityList::fetch`] is called.
pub fn use_entity_list<E: Entity>(
    ctx: &ClientContext,
    mut spec: FetchSpecification,
) -> EntityList<E> {
    spec.collection = E::COLLECTION.to_string();
    let query = list_query::<E>(ctx, &spec);
    EntityList {
        ctx: ctx.clone(),
        _watcher: query.watch(),
        spec,
        query,
        poller: None,
    }
}

fn list_query<E: Entity>(
    ctx: &ClientContext,
    spec: &FetchSpecification,
) -> Query<Page<E>> {
    let page = spec.pagination.map(|p| p.page).unwrap_or_default();
    let request_spec = spec.clone();
    Query::new(ctx.clone(), spec.key(), move |client: APIClient| {
        let spec = request_spec.clone();
        async move {
            let response = client.list::<E::Record>(&spec).await?;
            Ok(Page::from_response(response, page, E::from_record))
        }
        .boxed()
    })
}

impl<E: Entity> EntityList<E> {
    pub async fn fetch(&self) -> Result<Arc<Page<E>>, SharedError> {
        self.query.fetch().await
    }

    pub async fn refetch(&self) -> Result<Arc<Page<E>>, SharedError> {
        self.query.refetch().await
    }

    pub fn spec(&self) -> &FetchSpecification {
        &self.spec
    }

    /// Switch to a new specification. Fetches only when the canonical key
    /// changed; responses still in flight for the old key are never shown
    /// by this list.
    pub async fn set_spec(
        &mut self,
        mut spec: FetchSpecification,
    ) -> Result<Arc<Page<E>>, SharedError> {
        spec.collection = E::COLLECTION.to_string();
        if spec.key() == *self.query.key() {
            self.spec = spec;
            return self.fetch().await;
        }

        let polling = self.is_polling();
        self.query = list_query::<E>(&self.ctx, &spec);
        self.spec = spec;
        self._watcher = self.query.watch();
        self.set_poll(false);
        self.set_poll(polling);
        self.fetch().await
    }

    /// Start or stop polling. Turning polling off cancels the timer
    /// immediately.
    pub fn set_poll(&mut self, poll: bool) {
        match (poll, self.poller.is_some()) {
            (true, false) => {
                tracing::debug!(key = %self.query.key(), "polling started");
                self.poller =
                    Some(self.query.poll(self.ctx.config().poll_interval));
            }
            (false, true) => {
                tracing::debug!(key = %self.query.key(), "polling stopped");
                self.poller = None;
            }
            _ => {}
        }
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_some()
    }

    pub fn state(&self) -> ListState<E> {
        let snapshot = self.query.snapshot();
        ListState {
            is_loading: snapshot.is_loading(),
            is_fetching: snapshot.is_fetching(),
            is_stale: snapshot.is_stale,
            page: snapshot.data,
            error: snapshot.error,
        }
    }
}
