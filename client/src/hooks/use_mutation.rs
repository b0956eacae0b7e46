use std::iter;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use derive_more::Display;
use futures::FutureExt;
use futures::future::BoxFuture;
use payloads::{APIClient, ClientError};
use serde::Serialize;

use super::TaskGuard;
use super::subscription::detached;
use crate::{ClientContext, Entity, SharedError};

type Action<I, O> = Arc<
    dyn Fn(APIClient, I) -> BoxFuture<'static, Result<O, ClientError>>
        + Send
        + Sync,
>;

/// A remote write and the collections it makes stale.
pub struct MutationSpec<I, O> {
    action: Action<I, O>,
    invalidates: Vec<&'static str>,
}

impl<I, O> Clone for MutationSpec<I, O> {
    fn clone(&self) -> Self {
        Self {
            action: self.action.clone(),
            invalidates: self.invalidates.clone(),
        }
    }
}

impl<I, O> MutationSpec<I, O> {
    pub fn new<F>(
        action: F,
        invalidates: impl IntoIterator<Item = &'static str>,
    ) -> Self
    where
        F: Fn(APIClient, I) -> BoxFuture<'static, Result<O, ClientError>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            action: Arc::new(action),
            invalidates: invalidates.into_iter().collect(),
        }
    }

    pub fn invalidates(&self) -> &[&'static str] {
        &self.invalidates
    }

    pub fn call(
        &self,
        client: APIClient,
        input: I,
    ) -> BoxFuture<'static, Result<O, ClientError>> {
        (self.action)(client, input)
    }

    /// Mark every affected collection stale. Synchronous, so lists read
    /// after this returns already see the invalidation.
    pub fn invalidate(&self, ctx: &ClientContext) {
        for collection in &self.invalidates {
            ctx.cache().invalidate_collection(collection);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum MutationStatus {
    #[default]
    Idle,
    Pending,
    Success,
    Error,
}

#[derive(Debug, Clone, Default)]
pub struct MutationState {
    pub status: MutationStatus,
    pub error: Option<SharedError>,
}

impl MutationState {
    pub fn is_loading(&self) -> bool {
        self.status == MutationStatus::Pending
    }

    pub fn is_success(&self) -> bool {
        self.status == MutationStatus::Success
    }
}

#[derive(Default)]
struct MutationInner {
    state: MutationState,
    /// Bumped on every call and reset, so a delayed reset only applies to
    /// the success that scheduled it.
    generation: u64,
    reset: Option<TaskGuard>,
}

type OnSuccess<O> = Arc<dyn Fn(&O) + Send + Sync>;

/// A single remote write with transient success state.
///
/// After a success the affected collections are invalidated, the
/// `on_success` callback runs, and the mutation reports success until it
/// resets itself after the configured delay. While pending or successful,
/// further calls are ignored.
pub struct Mutation<I, O> {
    ctx: ClientContext,
    spec: MutationSpec<I, O>,
    on_success: Option<OnSuccess<O>>,
    inner: Arc<Mutex<MutationInner>>,
}

impl<I, O> Mutation<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    pub fn new(ctx: &ClientContext, spec: MutationSpec<I, O>) -> Self {
        Self {
            ctx: ctx.clone(),
            spec,
            on_success: None,
            inner: Arc::default(),
        }
    }

    pub fn on_success(
        mut self,
        callback: impl Fn(&O) + Send + Sync + 'static,
    ) -> Self {
        self.on_success = Some(Arc::new(callback));
        self
    }

    fn lock(&self) -> MutexGuard<'_, MutationInner> {
        lock(&self.inner)
    }

    /// Perform the write. Returns `Ok(None)` without contacting the server
    /// when a previous call is still pending or its success is still being
    /// shown.
    ///
    /// The write runs on its own task: if the caller stops waiting, the
    /// request still completes and the state still settles.
    pub async fn mutate(&self, input: I) -> Result<Option<O>, SharedError> {
        let generation = {
            let mut inner = self.lock();
            if matches!(
                inner.state.status,
                MutationStatus::Pending | MutationStatus::Success
            ) {
                tracing::debug!(
                    status = %inner.state.status,
                    "mutation ignored"
                );
                return Ok(None);
            }
            inner.state = MutationState {
                status: MutationStatus::Pending,
                error: None,
            };
            inner.generation += 1;
            inner.reset = None;
            inner.generation
        };

        let request = self.spec.call(self.ctx.api_client(), input);
        let ctx = self.ctx.clone();
        let spec = self.spec.clone();
        let on_success = self.on_success.clone();
        let state = self.inner.clone();
        detached(async move {
            match request.await {
                Ok(output) => {
                    spec.invalidate(&ctx);
                    if let Some(callback) = &on_success {
                        callback(&output);
                    }
                    let mut inner = lock(&state);
                    if inner.generation == generation {
                        inner.state.status = MutationStatus::Success;
                        inner.reset = Some(schedule_reset(
                            Arc::downgrade(&state),
                            generation,
                            ctx.config().mutation_reset_delay,
                        ));
                    }
                    Ok(Some(output))
                }
                Err(e) => {
                    let e = Arc::new(e);
                    let mut inner = lock(&state);
                    if inner.generation == generation {
                        inner.state = MutationState {
                            status: MutationStatus::Error,
                            error: Some(e.clone()),
                        };
                    }
                    Err(e)
                }
            }
        })
        .await
    }

    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.state = MutationState::default();
        inner.generation += 1;
        inner.reset = None;
    }

    pub fn state(&self) -> MutationState {
        self.lock().state.clone()
    }
}

fn lock(inner: &Mutex<MutationInner>) -> MutexGuard<'_, MutationInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

fn schedule_reset(
    inner: Weak<Mutex<MutationInner>>,
    generation: u64,
    delay: Duration,
) -> TaskGuard {
    TaskGuard::spawn(async move {
        tokio::time::sleep(delay).await;
        let Some(inner) = inner.upgrade() else {
            return;
        };
        let mut inner = lock(&inner);
        if inner.generation == generation
            && inner.state.status == MutationStatus::Success
        {
            inner.state = MutationState::default();
        }
    })
}

/// The entity's own collection plus the ones embedding it.
fn entity_invalidations<E: Entity>() -> Vec<&'static str> {
    iter::once(E::COLLECTION)
        .chain(E::RELATED.iter().copied())
        .collect()
}

/// Create a resource and convert the server's answer into a view-model.
pub fn create_spec<E, B>() -> MutationSpec<B, E>
where
    E: Entity,
    B: Serialize + Send + Sync + 'static,
{
    MutationSpec::new(
        |client: APIClient, body: B| {
            async move {
                let record: E::Record =
                    client.create(E::COLLECTION, &body).await?;
                Ok(E::from_record(record))
            }
            .boxed()
        },
        entity_invalidations::<E>(),
    )
}

pub fn use_create_entity<E, B>(ctx: &ClientContext) -> Mutation<B, E>
where
    E: Entity,
    B: Serialize + Send + Sync + 'static,
{
    Mutation::new(ctx, create_spec::<E, B>())
}

pub fn use_update_entity<E, B>(ctx: &ClientContext) -> Mutation<(E::Id, B), E>
where
    E: Entity,
    B: Serialize + Send + Sync + 'static,
{
    let spec = MutationSpec::new(
        |client: APIClient, (id, body): (E::Id, B)| {
            async move {
                let record: E::Record =
                    client.update(E::COLLECTION, id, &body).await?;
                Ok(E::from_record(record))
            }
            .boxed()
        },
        entity_invalidations::<E>(),
    );
    Mutation::new(ctx, spec)
}

pub fn use_delete_entity<E: Entity>(
    ctx: &ClientContext,
) -> Mutation<E::Id, ()> {
    let spec = MutationSpec::new(
        |client: APIClient, id: E::Id| {
            async move { client.delete(E::COLLECTION, id).await }.boxed()
        },
        entity_invalidations::<E>(),
    );
    Mutation::new(ctx, spec)
}

/// A server-side action on one resource, e.g. `run` on a job or `sync` on
/// a deployment.
pub fn use_entity_action<E: Entity>(
    ctx: &ClientContext,
    action: &'static str,
) -> Mutation<E::Id, ()> {
    let spec = MutationSpec::new(
        move |client: APIClient, id: E::Id| {
            async move { client.action(E::COLLECTION, id, action).await }
                .boxed()
        },
        entity_invalidations::<E>(),
    );
    Mutation::new(ctx, spec)
}
