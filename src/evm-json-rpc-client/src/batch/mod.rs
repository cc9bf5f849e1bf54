//! Batch call dispatching.
//!
//! A list of independent requests is split into size-bounded chunks
//! ([`planner`]), every chunk is sent as one wire-level JSON-RPC batch
//! ([`transport`]) and at most a bounded number of chunks are in flight at
//! the same time ([`pool`]). [`dispatcher::dispatch_batch`] ties these
//! together.

use jsonrpc_core::{Id, Params};
use serde_json::Value;

use crate::error::{JsonRpcError, JsonRpcResult};

pub mod dispatcher;
pub mod planner;
pub mod pool;
pub mod transport;

pub use dispatcher::dispatch_batch;
pub use planner::{plan_chunks, split_chunks, Chunk};
pub use pool::WorkerPool;
pub use transport::BatchTransport;

/// One request of a batch call.
///
/// After a successful dispatch exactly one of `result` and `error` is set.
/// If the chunk containing this element failed as a whole, both may be left
/// untouched and the call-level error is the authoritative outcome.
#[derive(Debug)]
pub struct BatchElem<R = Value> {
    /// Remote method name.
    pub method: String,
    /// Method parameters.
    pub params: Params,
    /// Decoded reply payload.
    pub result: Option<R>,
    /// Per-request RPC or decode error.
    pub error: Option<JsonRpcError>,
}

impl<R> BatchElem<R> {
    /// Creates a new element with an empty result and error slot.
    pub fn new(method: impl Into<String>, params: Params) -> Self {
        Self {
            method: method.into(),
            params,
            result: None,
            error: None,
        }
    }

    /// Returns `true` if the element has a result and no error.
    pub fn is_ok(&self) -> bool {
        self.error.is_none() && self.result.is_some()
    }

    /// Clears the result and error slots so the element can be dispatched again.
    pub fn reset(&mut self) {
        self.result = None;
        self.error = None;
    }

    /// Records a successful reply.
    pub(crate) fn set_result(&mut self, result: R) {
        self.result = Some(result);
        self.error = None;
    }

    /// Records a per-request failure.
    pub(crate) fn set_error(&mut self, error: JsonRpcError) {
        self.result = None;
        self.error = Some(error);
    }

    /// Consumes the element, returning its outcome.
    ///
    /// `None` means the element was never answered, which only happens when
    /// its chunk failed or it was not dispatched at all.
    pub fn into_result(self) -> Option<JsonRpcResult<R>> {
        match (self.result, self.error) {
            (_, Some(err)) => Some(Err(err)),
            (Some(result), None) => Some(Ok(result)),
            (None, None) => None,
        }
    }

    /// Like [`BatchElem::into_result`], but reports a missing outcome as
    /// [`JsonRpcError::MissingResponse`] for the given id.
    pub(crate) fn into_result_or_missing(self, id: Id) -> JsonRpcResult<R> {
        self.into_result()
            .unwrap_or(Err(JsonRpcError::MissingResponse(id)))
    }
}
