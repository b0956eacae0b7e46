use std::sync::Arc;

use futures::FutureExt;
use payloads::{APIClient, CanonicalQueryKey};

use super::{Query, TaskGuard};
use crate::{ClientContext, Entity, SharedError};

#[derive(Debug)]
pub struct DetailsState<E> {
    pub item: Option<Arc<E>>,
    pub is_loading: bool,
    pub is_fetching: bool,
    pub error: Option<SharedError>,
}

/// A single resource, refetched when its collection is invalidated.
pub struct EntityDetails<E: Entity> {
    query: Query<E>,
    _watcher: TaskGuard,
}

pub fn use_entity_details<E: Entity>(
    ctx: &ClientContext,
    id: E::Id,
    project_id: Option<&str>,
) -> EntityDetails<E> {
    let key = CanonicalQueryKey::details(E::COLLECTION, id, project_id);
    let project_id = project_id.map(str::to_string);
    let query = Query::new(ctx.clone(), key, move |client: APIClient| {
        let project_id = project_id.clone();
        async move {
            let record = client
                .details::<E::Record>(E::COLLECTION, id, project_id.as_deref())
                .await?;
            Ok(E::from_record(record))
        }
        .boxed()
    });
    EntityDetails {
        _watcher: query.watch(),
        query,
    }
}

impl<E: Entity> EntityDetails<E> {
    pub async fn fetch(&self) -> Result<Arc<E>, SharedError> {
        self.query.fetch().await
    }

    pub async fn refetch(&self) -> Result<Arc<E>, SharedError> {
        self.query.refetch().await
    }

    pub fn state(&self) -> DetailsState<E> {
        let snapshot = self.query.snapshot();
        DetailsState {
            is_loading: snapshot.is_loading(),
            is_fetching: snapshot.is_fetching(),
            item: snapshot.data,
            error: snapshot.error,
        }
    }
}
