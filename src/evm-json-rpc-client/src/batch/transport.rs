use futures::future::BoxFuture;
use jsonrpc_core::{Call, Id, MethodCall, Output, Request, Response, Version};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use super::BatchElem;
use crate::error::{JsonRpcError, JsonRpcResult};
use crate::Client;

/// Sends one chunk of requests as a single wire-level batch.
pub trait BatchTransport: Send + Sync {
    /// Performs one round trip for all elements of `chunk`.
    ///
    /// On success every element has either its result or its error set; a
    /// JSON-RPC error returned for one request is stored on that element and
    /// does not fail the round trip.
    ///
    /// An `Err` means the round trip itself failed (connection error,
    /// cancellation, malformed reply). In that case nothing is guaranteed
    /// about the elements of the chunk.
    fn send_batch<'a, R>(
        &'a self,
        chunk: &'a mut [BatchElem<R>],
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, JsonRpcResult<()>>
    where
        R: DeserializeOwned + Send + 'a;
}

impl<C: Client> BatchTransport for C {
    fn send_batch<'a, R>(
        &'a self,
        chunk: &'a mut [BatchElem<R>],
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, JsonRpcResult<()>>
    where
        R: DeserializeOwned + Send + 'a,
    {
        Box::pin(async move {
            if cancel.is_cancelled() {
                return Err(JsonRpcError::Cancelled);
            }

            let request = batch_request(chunk);

            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(JsonRpcError::Cancelled),
                response = self.send_rpc_request(request) => response?,
            };

            apply_response(chunk, response)
        })
    }
}

/// Builds a batch request, using the position of each element in the chunk as its id.
fn batch_request<R>(chunk: &[BatchElem<R>]) -> Request {
    let calls = chunk
        .iter()
        .enumerate()
        .map(|(index, elem)| {
            Call::MethodCall(MethodCall {
                jsonrpc: Some(Version::V2),
                method: elem.method.clone(),
                params: elem.params.clone(),
                id: Id::Num(index as u64),
            })
        })
        .collect();

    Request::Batch(calls)
}

/// Writes the outputs of a batch reply into the elements they answer.
///
/// Outputs are matched to elements by id, since servers are free to answer
/// batch requests in any order.
fn apply_response<R: DeserializeOwned>(
    chunk: &mut [BatchElem<R>],
    response: Response,
) -> JsonRpcResult<()> {
    let outputs = match response {
        Response::Batch(outputs) => outputs,
        // Some nodes answer a one-element batch with a bare object.
        Response::Single(output) if chunk.len() == 1 => {
            apply_output(&mut chunk[0], output);
            return Ok(());
        }
        Response::Single(output) => {
            return Err(JsonRpcError::UnexpectedSingle {
                expected: chunk.len(),
                output: format!("{output:?}"),
            });
        }
    };

    if outputs.len() != chunk.len() {
        return Err(JsonRpcError::UnexpectedResultsAmount {
            expected: chunk.len(),
            actual: outputs.len(),
        });
    }

    let mut answered = vec![false; chunk.len()];
    for output in outputs {
        let index = match output.id() {
            Id::Num(id) => usize::try_from(*id).ok(),
            _ => None,
        };

        match index {
            Some(index) if index < chunk.len() && !answered[index] => {
                answered[index] = true;
                apply_output(&mut chunk[index], output);
            }
            _ => log::warn!("dropping batch output with unknown id {:?}", output.id()),
        }
    }

    for (index, elem) in chunk.iter_mut().enumerate() {
        if !answered[index] {
            elem.set_error(JsonRpcError::MissingResponse(Id::Num(index as u64)));
        }
    }

    Ok(())
}

fn apply_output<R: DeserializeOwned>(elem: &mut BatchElem<R>, output: Output) {
    match output {
        Output::Success(success) => match serde_json::from_value::<R>(success.result) {
            Ok(result) => elem.set_result(result),
            Err(err) => elem.set_error(err.into()),
        },
        Output::Failure(failure) => elem.set_error(JsonRpcError::Rpc(failure.error)),
    }
}
