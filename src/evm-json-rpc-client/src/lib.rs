use std::future::Future;
use std::pin::Pin;

pub use jsonrpc_core::{Call, Id, MethodCall, Output, Params, Request, Response, Version};
use serde::de::DeserializeOwned;
pub use tokio_util::sync::CancellationToken;
#[doc(hidden)]
pub use serde_json;

pub mod batch;
pub mod config;
pub mod error;

#[cfg(feature = "reqwest")]
pub mod reqwest;

pub use batch::{dispatch_batch, BatchElem, BatchTransport};
pub use config::BatchConfig;
pub use error::{ChunkFailure, DispatchError, JsonRpcError, JsonRpcResult};

/// Builds a [`Params::Array`] from serializable values.
///
/// Must be used in a function returning a [`JsonRpcResult`].
#[macro_export]
macro_rules! make_params_array {
    ($($items:expr),* $(,)?) => {
        $crate::Params::Array(vec![$($crate::serde_json::to_value($items)?, )*])
    };
}

/// A client for interacting with an EVM node over JSON-RPC.
#[derive(Clone)]
pub struct EthJsonRpcClient<C: Client> {
    client: C,
    batch_config: BatchConfig,
}

impl<C: Client> EthJsonRpcClient<C> {
    /// Create a new client with the default [`BatchConfig`].
    ///
    /// # Arguments
    /// * `client` - The JSON-RPC transport.
    pub fn new(client: C) -> Self {
        Self::with_config(client, BatchConfig::default())
    }

    /// Create a new client with the given batch settings.
    pub fn with_config(client: C, batch_config: BatchConfig) -> Self {
        Self {
            client,
            batch_config: batch_config.validated(),
        }
    }

    /// Returns the batch settings of this client.
    pub fn batch_config(&self) -> &BatchConfig {
        &self.batch_config
    }

    /// Performs a request.
    pub async fn request(&self, request: Request) -> JsonRpcResult<Response> {
        self.client.send_rpc_request(request).await
    }

    /// Performs a single request.
    pub async fn single_request<R: DeserializeOwned>(
        &self,
        method: String,
        params: Params,
        id: Id,
    ) -> JsonRpcResult<R> {
        let request = Request::Single(Call::MethodCall(MethodCall {
            jsonrpc: Some(Version::V2),
            method,
            params,
            id,
        }));

        let response = self.client.send_rpc_request(request).await?;

        match response {
            Response::Single(Output::Success(result)) => Ok(serde_json::from_value(result.result)?),
            Response::Single(Output::Failure(err)) => Err(JsonRpcError::Rpc(err.error)),
            Response::Batch(_) => Err(JsonRpcError::UnexpectedBatch),
        }
    }

    /// Sends all `elements` as batches, without a cancellation signal.
    ///
    /// See [`EthJsonRpcClient::batch_call_with_cancel`].
    pub async fn batch_call<R>(&self, elements: &mut [BatchElem<R>]) -> JsonRpcResult<()>
    where
        R: DeserializeOwned + Send,
    {
        self.batch_call_with_cancel(elements, &CancellationToken::new(), None)
            .await
    }

    /// Sends all `elements` as size-bounded batches, with at most
    /// `concurrency` (or the configured worker count) batches in flight.
    ///
    /// A successful return only means every batch completed its round trip;
    /// each element's [`BatchElem::error`] must still be checked.
    /// See [`dispatch_batch`] for the error cases.
    pub async fn batch_call_with_cancel<R>(
        &self,
        elements: &mut [BatchElem<R>],
        cancel: &CancellationToken,
        concurrency: Option<usize>,
    ) -> JsonRpcResult<()>
    where
        R: DeserializeOwned + Send,
    {
        dispatch_batch(
            &self.client,
            &self.batch_config,
            elements,
            cancel,
            concurrency,
        )
        .await
    }

    /// Calls `method` once per params entry and returns the outcomes in input order.
    ///
    /// The outer error is the call-level error of [`EthJsonRpcClient::batch_call`];
    /// the inner errors are the per-request failures.
    pub async fn batch_request<R>(
        &self,
        method: &str,
        params: impl IntoIterator<Item = Params>,
    ) -> JsonRpcResult<Vec<JsonRpcResult<R>>>
    where
        R: DeserializeOwned + Send,
    {
        let mut elements = params
            .into_iter()
            .map(|params| BatchElem::new(method, params))
            .collect::<Vec<BatchElem<R>>>();

        self.batch_call(&mut elements).await?;

        Ok(elements
            .into_iter()
            .enumerate()
            .map(|(index, elem)| elem.into_result_or_missing(Id::Num(index as u64)))
            .collect())
    }
}

/// A JSON-RPC transport.
///
/// Sends one envelope, either a single call or a batch, and returns the
/// decoded reply. Any implementation can be used for batch dispatching
/// through the blanket [`BatchTransport`] implementation.
pub trait Client: Clone + Send + Sync {
    /// Send RPC request.
    fn send_rpc_request(
        &self,
        request: Request,
    ) -> Pin<Box<dyn Future<Output = JsonRpcResult<Response>> + Send>>;
}
