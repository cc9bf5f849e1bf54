use std::time::Duration;

use evm_json_rpc_client::{
    make_params_array, BatchConfig, BatchElem, CancellationToken, EthJsonRpcClient, JsonRpcError,
    JsonRpcResult, Params,
};
use jsonrpc_core::ErrorCode;
use serde_json::{json, Value};

use crate::stub::{StubNode, BROKEN_METHOD, ECHO_METHOD};


fn init_logger() {
    let _ = env_logger::Builder::new()
        .parse_filters("debug")
        .is_test(true)
        .try_init();
}

fn client(node: &StubNode, max_chunk_size: usize, worker_count: usize) -> EthJsonRpcClient<StubNode> {
    EthJsonRpcClient::with_config(
        node.clone(),
        BatchConfig::new(max_chunk_size, worker_count),
    )
}

fn echo_elems(count: usize) -> Vec<BatchElem> {
    (0..count)
        .map(|index| BatchElem::new(ECHO_METHOD, Params::Array(vec![json!(index)])))
        .collect()
}

#[tokio::test]
async fn should_dispatch_all_elements_in_chunks() {
    init_logger();
    let node = StubNode::new();
    let mut elements = echo_elems(10);

    client(&node, 3, 2)
        .batch_call(&mut elements)
        .await
        .unwrap();

    assert_eq!(node.calls(), 4);
    let mut chunk_sizes = node.chunk_sizes();
    chunk_sizes.sort_unstable();
    assert_eq!(chunk_sizes, vec![1, 3, 3, 3]);

    for (index, elem) in elements.iter().enumerate() {
        assert!(elem.error.is_none(), "element {index} failed");
        assert_eq!(elem.result, Some(json!(index)));
    }
}

#[tokio::test]
async fn unknown_methods_should_fail_per_element_only() {
    init_logger();
    let node = StubNode::new();
    let mut elements = (0..7)
        .map(|index| BatchElem::<Value>::new(format!("eth_unknown{index}"), Params::None))
        .collect::<Vec<_>>();

    client(&node, 3, 2)
        .batch_call(&mut elements)
        .await
        .unwrap();

    for elem in &elements {
        assert!(elem.result.is_none());
        match &elem.error {
            Some(JsonRpcError::Rpc(err)) => assert_eq!(err.code, ErrorCode::MethodNotFound),
            other => panic!("unexpected element error: {other:?}"),
        }
    }
}

#[tokio::test]
async fn small_list_should_be_sent_as_one_batch() {
    let node = StubNode::new();
    let mut elements = echo_elems(5);

    client(&node, 100, 4)
        .batch_call(&mut elements)
        .await
        .unwrap();

    assert_eq!(node.chunk_sizes(), vec![5]);
}

#[tokio::test]
async fn empty_list_should_not_touch_the_network() {
    let node = StubNode::new();
    let mut elements = echo_elems(0);

    client(&node, 3, 2)
        .batch_call(&mut elements)
        .await
        .unwrap();

    assert_eq!(node.calls(), 0);
}

#[tokio::test]
async fn single_element_should_be_sent_alone() {
    let node = StubNode::new();
    let mut elements = echo_elems(1);

    client(&node, 1, 1)
        .batch_call(&mut elements)
        .await
        .unwrap();

    assert_eq!(node.chunk_sizes(), vec![1]);
    assert_eq!(elements[0].result, Some(json!(0)));
}

#[tokio::test]
async fn pre_cancelled_call_should_not_touch_the_network() {
    let node = StubNode::new();
    let mut elements = echo_elems(6);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = client(&node, 2, 2)
        .batch_call_with_cancel(&mut elements, &cancel, None)
        .await;

    assert!(result.unwrap_err().is_cancelled());
    assert_eq!(node.calls(), 0);
    assert!(elements.iter().all(|elem| elem.result.is_none()));
}

#[tokio::test]
async fn cancellation_should_keep_completed_results() {
    init_logger();
    let cancel = CancellationToken::new();
    let node = StubNode::cancelling_on_call(2, cancel.clone(), Duration::from_millis(20));
    let mut elements = echo_elems(5);

    let result = client(&node, 1, 1)
        .batch_call_with_cancel(&mut elements, &cancel, None)
        .await;

    assert!(matches!(result, Err(JsonRpcError::Cancelled)));
    // The third round trip was started and aborted, the rest never sent.
    assert_eq!(node.calls(), 3);
    assert_eq!(elements[0].result, Some(json!(0)));
    assert_eq!(elements[1].result, Some(json!(1)));
    assert!(elements[2..].iter().all(|elem| elem.result.is_none()));
}

#[tokio::test]
async fn transport_failure_should_not_abort_sibling_chunks() {
    init_logger();
    let node = StubNode::new();
    let mut elements = echo_elems(9);
    elements[4] = BatchElem::new(BROKEN_METHOD, Params::None);

    let result = client(&node, 3, 3).batch_call(&mut elements).await;

    let Err(JsonRpcError::Dispatch(err)) = result else {
        panic!("expected a dispatch error");
    };
    assert_eq!(err.total_chunks(), 3);
    assert_eq!(err.failures().len(), 1);
    assert_eq!(err.first().unwrap().range, 3..6);
    assert!(err.to_string().contains("connection reset by peer"));

    assert_eq!(node.calls(), 3);
    for index in [0, 1, 2, 6, 7, 8] {
        assert_eq!(elements[index].result, Some(json!(index)));
    }
}

#[tokio::test]
async fn concurrency_override_should_apply_to_one_call() {
    let node = StubNode::with_delay(Duration::from_millis(5));
    let client = client(&node, 1, 1);
    let mut elements = echo_elems(4);

    client
        .batch_call_with_cancel(&mut elements, &CancellationToken::new(), Some(4))
        .await
        .unwrap();

    assert!(elements.iter().all(BatchElem::is_ok));
    assert_eq!(client.batch_config().worker_count, 1);
}

async fn mixed_batch_outcome(
    client: &EthJsonRpcClient<StubNode>,
) -> Vec<(Option<Value>, Option<String>)> {
    let mut elements = echo_elems(5);
    elements.push(BatchElem::new("eth_chainId", Params::Array(vec![])));
    elements.push(BatchElem::new("eth_unknown", Params::Array(vec![])));

    client.batch_call(&mut elements).await.unwrap();

    elements
        .into_iter()
        .map(|elem| (elem.result, elem.error.map(|err| err.to_string())))
        .collect()
}

#[tokio::test]
async fn repeated_dispatch_should_give_identical_results() {
    let node = StubNode::new();
    let client = client(&node, 2, 3);

    let first = mixed_batch_outcome(&client).await;
    let second = mixed_batch_outcome(&client).await;

    assert_eq!(first, second);
    assert_eq!(first[5].0, Some(json!("0x1")));
    assert!(first[6].1.is_some());
    assert_eq!(node.calls(), 8);
}

#[tokio::test]
async fn reused_elements_should_be_reset_first() {
    let node = StubNode::new();
    let client = client(&node, 2, 2);
    let mut elements = vec![BatchElem::<Value>::new("eth_unknown", Params::None)];

    client.batch_call(&mut elements).await.unwrap();
    assert!(elements[0].error.is_some());

    elements[0].reset();
    elements[0].method = "eth_chainId".to_string();
    client.batch_call(&mut elements).await.unwrap();

    assert!(elements[0].is_ok());
}

#[tokio::test]
async fn batch_request_should_return_typed_outcomes_in_order() {
    let node = StubNode::new();
    let client = client(&node, 2, 2);

    let params = vec![
        Params::Array(vec![json!(1)]),
        Params::Array(vec![json!("not a number")]),
        Params::Array(vec![json!(3)]),
    ];
    let results = client
        .batch_request::<u64>(ECHO_METHOD, params)
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(*results[0].as_ref().unwrap(), 1);
    assert!(matches!(results[1], Err(JsonRpcError::Json(_))));
    assert_eq!(*results[2].as_ref().unwrap(), 3);
}

#[tokio::test]
async fn empty_method_should_fail_the_whole_call() {
    let node = StubNode::new();
    let mut elements = echo_elems(3);
    elements[1].method = String::new();

    let result = client(&node, 2, 2).batch_call(&mut elements).await;

    assert!(matches!(result, Err(JsonRpcError::EmptyMethod { index: 1 })));
    assert_eq!(node.calls(), 0);
}

fn echo_params(value: u64) -> JsonRpcResult<Params> {
    Ok(make_params_array!(value, "latest"))
}

#[tokio::test]
async fn params_built_by_macro_should_be_sent() {
    let node = StubNode::new();
    let params = (10..13).map(echo_params).collect::<JsonRpcResult<Vec<_>>>().unwrap();

    let results = client(&node, 2, 2)
        .batch_request::<u64>(ECHO_METHOD, params)
        .await
        .unwrap();

    let results = results.into_iter().map(Result::unwrap).collect::<Vec<_>>();
    assert_eq!(results, vec![10, 11, 12]);
}
