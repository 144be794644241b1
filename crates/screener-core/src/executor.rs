//! Concurrency-bounded fan-out with keyed fan-in.
//!
//! Each admitted operation holds one semaphore permit for its whole
//! lifetime and sends its result back over a completion channel.
//! Results are collected by key, never by position.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Outcome of one [`BoundedExecutor::run`] call.
#[derive(Debug)]
pub struct Execution<T> {
    pub completed: BTreeMap<String, T>,
    /// Keys never admitted because cancellation was requested first
    pub skipped: Vec<String>,
    /// Keys whose task panicked before sending a result
    pub lost: Vec<String>,
}

impl<T> Execution<T> {
    /// True when every submitted key produced a result.
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty() && self.lost.is_empty()
    }
}

/// Runs at most `max_concurrent` operations at once.
pub struct BoundedExecutor {
    permits: Arc<Semaphore>,
    max_concurrent: usize,
    cancel: CancellationToken,
}

impl std::fmt::Debug for BoundedExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedExecutor")
            .field("max_concurrent", &self.max_concurrent)
            .field("available", &self.permits.available_permits())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl BoundedExecutor {
    /// Create an executor; `max_concurrent` is clamped to at least 1.
    pub fn new(max_concurrent: usize, cancel: CancellationToken) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            cancel,
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Run `op` once per `(key, input)` pair and collect results by key.
    ///
    /// Admission stops as soon as the cancellation token fires; operations
    /// already admitted run to completion. Returns after every admitted
    /// task has finished.
    pub async fn run<I, T, F, Fut>(&self, items: Vec<(String, I)>, op: F) -> Execution<T>
    where
        I: Send + 'static,
        T: Send + 'static,
        F: Fn(String, I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let op = Arc::new(op);
        let (tx, mut rx) = mpsc::unbounded_channel::<(String, T)>();
        let mut tasks = JoinSet::new();
        let mut admitted = BTreeSet::new();
        let mut skipped = Vec::new();

        let mut pending = items.into_iter();
        for (key, input) in pending.by_ref() {
            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                permit = self.permits.clone().acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                skipped.push(key);
                break;
            };

            admitted.insert(key.clone());
            let tx = tx.clone();
            let op = op.clone();
            tasks.spawn(async move {
                let _permit = permit;
                let value = op(key.clone(), input).await;
                // Receiver outlives every task; a send error means the caller is gone
                let _ = tx.send((key, value));
            });
        }
        skipped.extend(pending.map(|(key, _)| key));
        if !skipped.is_empty() {
            log::warn!(
                "executor: cancellation requested, {} items not admitted",
                skipped.len()
            );
        }

        // Close our sender so the channel ends once every task is done
        drop(tx);
        let mut completed = BTreeMap::new();
        while let Some((key, value)) = rx.recv().await {
            completed.insert(key, value);
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                log::error!("executor: task failed: {e}");
            }
        }

        let lost: Vec<String> = admitted
            .into_iter()
            .filter(|key| !completed.contains_key(key))
            .collect();

        Execution {
            completed,
            skipped,
            lost,
        }
    }
}
