use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use payloads::{APIClient, CanonicalQueryKey, ClientError};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::{CacheEvent, ClientContext, SharedError, Snapshot};

/// Owns a background task and aborts it when dropped.
#[derive(Debug)]
pub struct TaskGuard(JoinHandle<()>);

impl TaskGuard {
    pub fn spawn<F>(task: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self(tokio::spawn(task))
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Run `work` on its own task and wait for it. The work runs to the end,
/// and so settles whatever state it owns, even if the caller stops waiting.
pub(crate) async fn detached<F>(work: F) -> F::Output
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    match tokio::spawn(work).await {
        Ok(output) => output,
        // The handle is never aborted, so this is a panic in `work`.
        Err(e) => std::panic::resume_unwind(e.into_panic()),
    }
}

type Request<T> = Arc<
    dyn Fn(APIClient) -> BoxFuture<'static, Result<T, ClientError>>
        + Send
        + Sync,
>;

/// A cached read: one canonical key plus the request that fills it.
pub struct Query<T> {
    ctx: ClientContext,
    key: CanonicalQueryKey,
    request: Request<T>,
}

impl<T> Clone for Query<T> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
            key: self.key.clone(),
            request: self.request.clone(),
        }
    }
}

impl<T: Send + Sync + 'static> Query<T> {
    pub fn new<F>(
        ctx: ClientContext,
        key: CanonicalQueryKey,
        request: F,
    ) -> Self
    where
        F: Fn(APIClient) -> BoxFuture<'static, Result<T, ClientError>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            ctx,
            key,
            request: Arc::new(request),
        }
    }

    pub fn key(&self) -> &CanonicalQueryKey {
        &self.key
    }

    /// The client is built per call so the request carries the credential
    /// current at that moment.
    pub async fn fetch(&self) -> Result<Arc<T>, SharedError> {
        let request = (self.request)(self.ctx.api_client());
        self.ctx.cache().fetch(&self.key, request).await
    }

    pub async fn refetch(&self) -> Result<Arc<T>, SharedError> {
        let request = (self.request)(self.ctx.api_client());
        self.ctx.cache().refetch(&self.key, request).await
    }

    pub fn snapshot(&self) -> Snapshot<T> {
        self.ctx.cache().snapshot(&self.key)
    }

    /// Refetch whenever the key's collection is invalidated or the cache is
    /// cleared. The entry stays watched, and so survives invalidation, for
    /// as long as the returned guard lives.
    pub fn watch(&self) -> TaskGuard {
        // Subscribe before spawning so no event sent after this call is
        // missed.
        let mut events = self.ctx.cache().subscribe();
        let watching = self.ctx.cache().watch(&self.key);
        let query = self.clone();
        TaskGuard::spawn(async move {
            let _watching = watching;
            loop {
                let stale = match events.recv().await {
                    Ok(CacheEvent::Invalidated { collection }) => {
                        collection == query.key.collection()
                    }
                    Ok(CacheEvent::Cleared) => true,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "cache events lagged");
                        true
                    }
                    Err(RecvError::Closed) => break,
                };
                if stale && let Err(e) = query.refetch().await {
                    tracing::warn!(key = %query.key, "refetch failed: {e}");
                }
            }
        })
    }

    /// Refetch every `period`, starting one period from now.
    pub fn poll(&self, period: Duration) -> TaskGuard {
        let query = self.clone();
        TaskGuard::spawn(async move {
            let mut ticks = tokio::time::interval(period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticks.tick().await;
            loop {
                ticks.tick().await;
                tracing::trace!(key = %query.key, "poll");
                if let Err(e) = query.refetch().await {
                    tracing::warn!(key = %query.key, "poll failed: {e}");
                }
            }
        })
    }
}
