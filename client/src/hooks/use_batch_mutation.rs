//! Fan-out writes with per-item outcomes.
//!
//! Every item is sent concurrently and all results are awaited, so one
//! failure never blocks the others. Outcomes are index-aligned with the
//! items. Running again after a partial failure only resends the items
//! that failed.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::join_all;
use payloads::requests::CreateIdentification;

use super::subscription::detached;
use super::use_mutation::{MutationSpec, create_spec};
use crate::models::Identification;
use crate::{ClientContext, SharedError};

/// Result of one item of the most recent run.
pub type Outcome<O> = Result<Arc<O>, SharedError>;

/// How to name the items in aggregate error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLabel {
    pub singular: &'static str,
    pub plural: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BatchError {
    #[error("{failed}/{total} {plural} could not be saved")]
    Partial {
        failed: usize,
        total: usize,
        plural: &'static str,
    },
    #[error("The {singular} could not be saved")]
    Single { singular: &'static str },
}

#[derive(Debug)]
pub struct BatchState<O> {
    pub outcomes: Option<Vec<Outcome<O>>>,
    pub error: Option<BatchError>,
    pub is_loading: bool,
}

impl<O> BatchState<O> {
    pub fn is_success(&self) -> bool {
        !self.is_loading && self.error.is_none() && self.outcomes.is_some()
    }

    pub fn failed_indices(&self) -> Vec<usize> {
        self.outcomes
            .iter()
            .flatten()
            .enumerate()
            .filter(|(_, outcome)| outcome.is_err())
            .map(|(i, _)| i)
            .collect()
    }
}

struct BatchInner<I, O> {
    items: Vec<I>,
    outcomes: Option<Vec<Outcome<O>>>,
    error: Option<BatchError>,
    is_loading: bool,
}

pub struct BatchMutation<I, O> {
    ctx: ClientContext,
    spec: MutationSpec<I, O>,
    label: BatchLabel,
    inner: Arc<Mutex<BatchInner<I, O>>>,
}

pub fn use_batch_mutation<I, O>(
    ctx: &ClientContext,
    spec: MutationSpec<I, O>,
    label: BatchLabel,
    items: Vec<I>,
) -> BatchMutation<I, O> {
    BatchMutation {
        ctx: ctx.clone(),
        spec,
        label,
        inner: Arc::new(Mutex::new(BatchInner {
            items,
            outcomes: None,
            error: None,
            is_loading: false,
        })),
    }
}

/// Submit one identification per occurrence.
pub fn use_create_identifications(
    ctx: &ClientContext,
    items: Vec<CreateIdentification>,
) -> BatchMutation<CreateIdentification, Identification> {
    let spec = create_spec::<Identification, CreateIdentification>();
    let label = BatchLabel {
        singular: "identification",
        plural: "identifications",
    };
    use_batch_mutation(ctx, spec, label, items)
}

impl<I, O> BatchMutation<I, O>
where
    I: Clone + Send + 'static,
    O: Send + Sync + 'static,
{
    fn lock(&self) -> MutexGuard<'_, BatchInner<I, O>> {
        lock(&self.inner)
    }

    /// Replace the items. A different number of items forgets the previous
    /// outcomes, since indices no longer line up.
    pub fn set_items(&self, items: Vec<I>) {
        let mut inner = self.lock();
        if items.len() != inner.items.len() {
            inner.outcomes = None;
            inner.error = None;
        }
        inner.items = items;
    }

    /// Send the items and wait for every outcome.
    ///
    /// After a failed run with the same number of items, only the items
    /// that failed are sent. Does nothing while a run is in progress.
    ///
    /// The run continues on its own task if the caller stops waiting, so
    /// every outcome is still recorded.
    pub async fn run(&self) -> Result<(), BatchError> {
        let (sends, previous, total) = {
            let mut inner = self.lock();
            if inner.is_loading {
                return Ok(());
            }
            let total = inner.items.len();
            let previous = inner.outcomes.take();
            let retry = match &previous {
                Some(outcomes) if inner.error.is_some() => {
                    outcomes.len() == total
                }
                _ => false,
            };
            let previous = previous.filter(|_| retry);
            let sends: Vec<(usize, I)> = inner
                .items
                .iter()
                .cloned()
                .enumerate()
                .filter(|(i, _)| {
                    previous
                        .as_ref()
                        .is_none_or(|outcomes| outcomes[*i].is_err())
                })
                .collect();
            inner.is_loading = true;
            inner.error = None;
            (sends, previous, total)
        };
        tracing::debug!(sending = sends.len(), total, "batch run");

        let client = self.ctx.api_client();
        let requests: Vec<_> = sends
            .into_iter()
            .map(|(i, item)| (i, self.spec.call(client.clone(), item)))
            .collect();
        let ctx = self.ctx.clone();
        let spec = self.spec.clone();
        let label = self.label;
        let state = self.inner.clone();
        detached(async move {
            let results =
                join_all(requests.into_iter().map(|(i, request)| async move {
                    (i, request.await.map(Arc::new).map_err(Arc::new))
                }))
                .await;

            if results.iter().any(|(_, outcome)| outcome.is_ok()) {
                spec.invalidate(&ctx);
            }

            let mut merged: Vec<Option<Outcome<O>>> = match previous {
                Some(outcomes) => outcomes.into_iter().map(Some).collect(),
                None => (0..total).map(|_| None).collect(),
            };
            for (i, outcome) in results {
                merged[i] = Some(outcome);
            }

            let mut inner = lock(&state);
            inner.is_loading = false;
            let Some(outcomes) = merged
                .into_iter()
                .collect::<Option<Vec<_>>>()
                .filter(|_| inner.items.len() == total)
            else {
                tracing::debug!("items changed during batch run");
                return Ok(());
            };

            let failed = outcomes.iter().filter(|o| o.is_err()).count();
            inner.outcomes = Some(outcomes);
            if failed == 0 {
                return Ok(());
            }
            let error = if total == 1 {
                BatchError::Single {
                    singular: label.singular,
                }
            } else {
                BatchError::Partial {
                    failed,
                    total,
                    plural: label.plural,
                }
            };
            tracing::warn!("{error}");
            inner.error = Some(error.clone());
            Err(error)
        })
        .await
    }

    pub fn state(&self) -> BatchState<O> {
        let inner = self.lock();
        BatchState {
            outcomes: inner.outcomes.clone(),
            error: inner.error.clone(),
            is_loading: inner.is_loading,
        }
    }
}

fn lock<I, O>(
    inner: &Mutex<BatchInner<I, O>>,
) -> MutexGuard<'_, BatchInner<I, O>> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}
