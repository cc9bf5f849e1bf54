//! Error types for the EVM JSON-RPC client.

use std::fmt;
use std::ops::Range;

use thiserror::Error;

/// Result type for the EVM JSON-RPC client.
pub type JsonRpcResult<T> = std::result::Result<T, JsonRpcError>;

/// Error type for the EVM JSON-RPC client.
///
/// The same type is used at two levels:
/// - as the call-level error returned by the dispatch entry points;
/// - as the per-element error stored in [`crate::BatchElem::error`].
///
/// Only [`JsonRpcError::Rpc`], [`JsonRpcError::Json`] and
/// [`JsonRpcError::MissingResponse`] are ever stored on an element.
#[derive(Error, Debug)]
pub enum JsonRpcError {
    /// The node processed the request and answered with a JSON-RPC error object.
    #[error("RPC error: {0}")]
    Rpc(jsonrpc_core::Error),
    /// Error while parsing the JSON response.
    #[error("Invalid JSON response: {0}")]
    Json(#[from] serde_json::Error),
    /// The batch reply did not contain an output for the request with this id.
    #[error("missing response for request id {0:?}")]
    MissingResponse(jsonrpc_core::Id),
    /// A request in the batch has an empty method name.
    #[error("request at index {index} has an empty method name")]
    EmptyMethod { index: usize },
    /// The operation was cancelled through its cancellation token.
    #[error("operation cancelled")]
    Cancelled,
    /// One or more chunks could not complete their round trip.
    #[error(transparent)]
    Dispatch(DispatchError),
    /// A single request was sent, but a batch response was received.
    #[error("unexpected batch response: expected single but got batch")]
    UnexpectedBatch,
    /// A batch request was sent, but a single response was received.
    #[error("unexpected single response to a batch of {expected} requests: {output}")]
    UnexpectedSingle { expected: usize, output: String },
    /// A batch request was sent, but the number of responses is not equal to the number of requests.
    #[error("unexpected response: expected {expected} but got {actual}")]
    UnexpectedResultsAmount { expected: usize, actual: usize },
    /// HTTP error.
    #[cfg(feature = "reqwest")]
    #[error("HTTP error {code}: {text}")]
    Http {
        /// HTTP status code.
        code: reqwest::StatusCode,
        /// HTTP response text.
        text: String,
    },
    /// Reqwest error.
    #[cfg(feature = "reqwest")]
    #[error("Reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
    /// Any other failure reported by a custom transport.
    #[error("Transport error: {0}")]
    Transport(#[from] anyhow::Error),
}

impl JsonRpcError {
    /// Returns `true` if this error was caused by the cancellation token.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, JsonRpcError::Cancelled)
    }
}

impl From<jsonrpc_core::Error> for JsonRpcError {
    fn from(err: jsonrpc_core::Error) -> Self {
        JsonRpcError::Rpc(err)
    }
}

impl From<DispatchError> for JsonRpcError {
    fn from(err: DispatchError) -> Self {
        JsonRpcError::Dispatch(err)
    }
}

/// A chunk whose round trip could not be completed.
#[derive(Debug)]
pub struct ChunkFailure {
    /// Index range of the failed chunk in the caller's element list.
    pub range: Range<usize>,
    /// The transport error of the chunk.
    pub error: JsonRpcError,
}

/// Aggregated transport failures of one dispatch call.
///
/// Failures are ordered by the position of their chunk in the element list,
/// so the first failure is always the one closest to the start of the list,
/// regardless of which chunk finished first.
#[derive(Debug)]
pub struct DispatchError {
    total_chunks: usize,
    failures: Vec<ChunkFailure>,
}

impl DispatchError {
    pub(crate) fn new(total_chunks: usize, mut failures: Vec<ChunkFailure>) -> Self {
        failures.sort_by_key(|failure| failure.range.start);
        Self {
            total_chunks,
            failures,
        }
    }

    /// Number of chunks the element list was split into.
    pub fn total_chunks(&self) -> usize {
        self.total_chunks
    }

    /// All chunk failures, ordered by chunk position.
    pub fn failures(&self) -> &[ChunkFailure] {
        &self.failures
    }

    /// The failure of the lowest-indexed failed chunk.
    pub fn first(&self) -> Option<&ChunkFailure> {
        self.failures.first()
    }

    /// Returns `true` if the element at `index` belongs to a failed chunk.
    pub fn is_failed(&self, index: usize) -> bool {
        self.failures
            .iter()
            .any(|failure| failure.range.contains(&index))
    }

    /// Consumes the error and returns the chunk failures.
    pub fn into_failures(self) -> Vec<ChunkFailure> {
        self.failures
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} batch chunks failed",
            self.failures.len(),
            self.total_chunks
        )?;
        if let Some(first) = self.first() {
            write!(
                f,
                "; first at elements {}..{}: {}",
                first.range.start, first.range.end, first.error
            )?;
        }
        Ok(())
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.first()
            .map(|failure| &failure.error as &(dyn std::error::Error + 'static))
    }
}
