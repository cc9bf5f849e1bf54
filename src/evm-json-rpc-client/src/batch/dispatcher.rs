use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use super::{plan_chunks, split_chunks, BatchElem, BatchTransport, WorkerPool};
use crate::config::BatchConfig;
use crate::error::{DispatchError, JsonRpcError, JsonRpcResult};

/// Sends `elements` as size-bounded batches with bounded concurrency and
/// writes every reply back into the element it answers.
///
/// `concurrency`, if greater than 0, overrides `config.worker_count` for
/// this call.
///
/// `Ok(())` means every batch completed its round trip. It does **not** mean
/// every request succeeded: per-request RPC errors are stored in
/// [`BatchElem::error`] and must be checked on each element.
///
/// `Err` means at least one batch could not complete:
/// - [`JsonRpcError::EmptyMethod`] if an element has no method name; nothing is sent;
/// - [`JsonRpcError::Cancelled`] if `cancel` was triggered before or during the call;
/// - [`JsonRpcError::Dispatch`] listing the failed chunks otherwise.
///
/// Elements of failed chunks may be left untouched. Results of chunks that
/// completed before a failure or a cancellation are kept.
pub async fn dispatch_batch<T, R>(
    transport: &T,
    config: &BatchConfig,
    elements: &mut [BatchElem<R>],
    cancel: &CancellationToken,
    concurrency: Option<usize>,
) -> JsonRpcResult<()>
where
    T: BatchTransport,
    R: DeserializeOwned + Send,
{
    if let Some(index) = elements.iter().position(|elem| elem.method.is_empty()) {
        return Err(JsonRpcError::EmptyMethod { index });
    }

    if elements.is_empty() {
        return Ok(());
    }

    if cancel.is_cancelled() {
        return Err(JsonRpcError::Cancelled);
    }

    let plan = plan_chunks(elements.len(), config.max_chunk_size);
    let total_chunks = plan.len();
    let workers = concurrency
        .filter(|workers| *workers > 0)
        .unwrap_or(config.worker_count);

    log::debug!(
        "dispatching {} requests in {total_chunks} chunks of at most {} with {workers} workers",
        elements.len(),
        config.max_chunk_size
    );

    let chunks = split_chunks(elements, &plan);
    let failures = WorkerPool::new(workers)
        .run(transport, chunks, cancel)
        .await;

    if failures.is_empty() {
        return Ok(());
    }

    if cancel.is_cancelled() && failures.iter().any(|failure| failure.error.is_cancelled()) {
        log::debug!("batch dispatch cancelled, {} chunks not completed", failures.len());
        return Err(JsonRpcError::Cancelled);
    }

    Err(DispatchError::new(total_chunks, failures).into())
}
