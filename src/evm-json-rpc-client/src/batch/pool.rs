use std::sync::{Mutex, PoisonError};

use futures::future::join_all;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use super::{BatchElem, BatchTransport, Chunk};
use crate::error::{ChunkFailure, JsonRpcError};

/// Executes chunks with a bounded number of concurrent workers.
///
/// Workers take chunks from a shared queue, one at a time, and send each of
/// them through the transport. The pool returns once every chunk has been
/// sent, has failed, or was skipped because of cancellation.
///
/// Workers run as futures on the task that awaits [`WorkerPool::run`]; their
/// network I/O overlaps, which is what bounds the load on the remote node.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    workers: usize,
}

impl WorkerPool {
    /// Creates a pool with at most `workers` chunks in flight. A value of 0 is treated as 1.
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Runs all `chunks` and returns the failures of those that could not complete.
    ///
    /// A failing chunk does not stop the others. Once `cancel` is triggered,
    /// chunks still in the queue are not sent and are reported as
    /// [`JsonRpcError::Cancelled`].
    pub async fn run<'a, T, R>(
        &self,
        transport: &T,
        chunks: Vec<Chunk<'a, BatchElem<R>>>,
        cancel: &CancellationToken,
    ) -> Vec<ChunkFailure>
    where
        T: BatchTransport,
        R: DeserializeOwned + Send,
    {
        let workers = self.workers.min(chunks.len());
        log::debug!(
            "running {} chunks with {workers} workers",
            chunks.len()
        );

        let queue = Mutex::new(chunks.into_iter());

        join_all((0..workers).map(|worker_id| worker(worker_id, &queue, transport, cancel)))
            .await
            .into_iter()
            .flatten()
            .collect()
    }
}

async fn worker<'a, I, T, R>(
    worker_id: usize,
    queue: &Mutex<I>,
    transport: &T,
    cancel: &CancellationToken,
) -> Vec<ChunkFailure>
where
    I: Iterator<Item = Chunk<'a, BatchElem<R>>>,
    T: BatchTransport,
    R: DeserializeOwned + Send + 'a,
{
    let mut failures = Vec::new();

    while let Some(Chunk { range, elements }) = next_chunk(queue) {
        if cancel.is_cancelled() {
            failures.push(ChunkFailure {
                range,
                error: JsonRpcError::Cancelled,
            });
            continue;
        }

        log::trace!(
            "worker {worker_id} - sending chunk {}..{}",
            range.start,
            range.end
        );

        if let Err(error) = transport.send_batch(elements, cancel).await {
            log::warn!(
                "worker {worker_id} - chunk {}..{} failed: {error}",
                range.start,
                range.end
            );
            failures.push(ChunkFailure { range, error });
        }
    }

    failures
}

fn next_chunk<I: Iterator>(queue: &Mutex<I>) -> Option<I::Item> {
    // Workers never panic while holding the lock, but a poisoned queue is still usable.
    queue
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .next()
}
