//! Bounded fan-out executor for chunk tasks
//!
//! Each unit of work is spawned onto the tokio runtime, so on the multi-threaded
//! runtime chunk fetches run in parallel. At most `limit` tasks are in flight at
//! any moment; the next one is spawned only when a running one finishes.
//!
//! The first failure cancels the pool's [`CancellationToken`], aborts every
//! running task, and never starts the ones still queued.

use crate::error::{Error, Result};
use std::future::Future;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Runs futures with a fixed upper bound on how many are in flight
#[derive(Debug)]
pub struct ConcurrencyPool {
    limit: usize,
    cancel: CancellationToken,
}

impl ConcurrencyPool {
    /// Create a pool allowing at most `limit` tasks in flight
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when `limit` is zero.
    pub fn new(limit: usize) -> Result<Self> {
        if limit == 0 {
            return Err(Error::config("concurrency", "concurrency must be at least 1"));
        }
        Ok(Self {
            limit,
            cancel: CancellationToken::new(),
        })
    }

    /// Run every future, returning their outputs in input order
    ///
    /// `on_complete` is invoked once per successful task, in completion order,
    /// on the caller's task.
    ///
    /// # Errors
    ///
    /// Returns the first task error after cancelling the remaining tasks. A task
    /// that panics is reported as [`Error::Other`].
    pub async fn run<I, Fut, T, C>(&self, tasks: I, mut on_complete: C) -> Result<Vec<T>>
    where
        I: IntoIterator<Item = Fut>,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
        C: FnMut(&T),
    {
        let mut queued = tasks.into_iter().enumerate();
        let mut in_flight: JoinSet<(usize, Option<Result<T>>)> = JoinSet::new();
        let mut outputs: Vec<Option<T>> = Vec::new();

        loop {
            while in_flight.len() < self.limit && !self.cancel.is_cancelled() {
                let Some((index, task)) = queued.next() else {
                    break;
                };
                outputs.push(None);
                let token = self.cancel.clone();
                in_flight.spawn(async move {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => (index, None),
                        result = task => (index, Some(result)),
                    }
                });
            }

            let Some(joined) = in_flight.join_next().await else {
                break;
            };

            match joined {
                Ok((index, Some(Ok(value)))) => {
                    on_complete(&value);
                    outputs[index] = Some(value);
                }
                Ok((_, Some(Err(e)))) => {
                    self.abort(&mut in_flight).await;
                    return Err(e);
                }
                // Lost the race with cancellation
                Ok((_, None)) => {}
                Err(join_err) => {
                    self.abort(&mut in_flight).await;
                    return Err(Error::Other(format!("task failed to complete: {join_err}")));
                }
            }
        }

        outputs
            .into_iter()
            .collect::<Option<Vec<T>>>()
            .ok_or_else(|| Error::Other("task finished without output".to_string()))
    }

    async fn abort<T: 'static>(&self, in_flight: &mut JoinSet<T>) {
        self.cancel.cancel();
        in_flight.abort_all();
        while in_flight.join_next().await.is_some() {}
    }
}
