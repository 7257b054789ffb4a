//! HTTP binding of the gateway.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;

use serde_derive::Deserialize;
use serde_json::Value;
use storage_messages::BlockRange;
use storage_messages::ErrorReply;
use tracing::error;
use tracing::info;
use tracing::warn;
use warp::filters::body::BodyDeserializeError;
use warp::http::StatusCode;
use warp::reject::LengthRequired;
use warp::reject::MethodNotAllowed;
use warp::reject::PayloadTooLarge;
use warp::reject::UnsupportedMediaType;
use warp::reply::Response;
use warp::Filter;
use warp::Rejection;
use warp::Reply;

use crate::error::GatewayError;
use crate::gateway::StateGateway;
use crate::metrics::Metrics;
use crate::rpc::NodeClient;

const GET_VALUE: &str = "get_value";
const GET_EVENTS: &str = "get_events";
const PREPARE_WRITE: &str = "prepare_write";

const MAX_BODY_SIZE: u64 = 16 * 1024;

#[derive(Deserialize, Debug)]
struct WriteBody {
    value: Value,
}

/// All routes served by the gateway.
///
/// `default_window` is applied to event queries that leave a bound out. Every failure,
/// including requests warp itself refuses, is answered with an [`ErrorReply`].
pub fn routes<N: NodeClient + 'static>(
    gateway: Arc<StateGateway<N>>,
    default_window: BlockRange,
    metrics: Metrics,
) -> impl Filter<Extract = (Response,), Error = Infallible> + Clone {
    let value = warp::path!("blockchain" / "value")
        .and(warp::get())
        .and(with_gateway(gateway.clone()))
        .and(with_metrics(metrics))
        .and_then(get_value::<N>);

    let events = warp::path!("blockchain" / "events")
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(with_gateway(gateway.clone()))
        .and(with_metrics(metrics))
        .and_then(
            move |query: HashMap<String, String>,
                  gateway: Arc<StateGateway<N>>,
                  metrics: Metrics| {
                get_events(gateway, metrics, query, default_window)
            },
        );

    let write = warp::path!("blockchain" / "prepare-write")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_SIZE))
        .and(warp::body::json::<WriteBody>())
        .and(with_gateway(gateway))
        .and(with_metrics(metrics))
        .and_then(prepare_write::<N>);

    let readiness = warp::path!("readiness")
        .map(|| warp::reply::with_status("OK", StatusCode::OK).into_response());

    value
        .or(events)
        .unify()
        .or(write)
        .unify()
        .or(readiness)
        .unify()
        .recover(handle_rejection)
        .unify()
}

fn with_gateway<N: NodeClient + 'static>(
    gateway: Arc<StateGateway<N>>
) -> impl Filter<Extract = (Arc<StateGateway<N>>,), Error = Infallible> + Clone {
    warp::any().map(move || gateway.clone())
}

fn with_metrics(metrics: Metrics) -> impl Filter<Extract = (Metrics,), Error = Infallible> + Clone {
    warp::any().map(move || metrics)
}

async fn get_value<N: NodeClient>(
    gateway: Arc<StateGateway<N>>,
    metrics: Metrics,
) -> Result<Response, Infallible> {
    metrics.increment_requests(GET_VALUE);
    let start = Instant::now();

    let result = gateway.get_latest_value().await;
    metrics.observe_request_duration(GET_VALUE, start.elapsed().as_secs_f64());

    Ok(match result {
        Ok(reply) => warp::reply::json(&reply).into_response(),
        Err(err) => error_reply(&metrics, GET_VALUE, &err),
    })
}

async fn get_events<N: NodeClient>(
    gateway: Arc<StateGateway<N>>,
    metrics: Metrics,
    query: HashMap<String, String>,
    default_window: BlockRange,
) -> Result<Response, Infallible> {
    metrics.increment_requests(GET_EVENTS);
    let start = Instant::now();

    let from_block = query.get("fromBlock").cloned().map(Value::String);
    let to_block = query.get("toBlock").cloned().map(Value::String);
    let result = gateway
        .get_update_events(from_block.as_ref(), to_block.as_ref(), default_window)
        .await;
    metrics.observe_request_duration(GET_EVENTS, start.elapsed().as_secs_f64());

    Ok(match result {
        Ok(events) => {
            info!("Returning {} update events", events.len());
            metrics.observe_events_returned(events.len());
            warp::reply::json(&events).into_response()
        },
        Err(err) => error_reply(&metrics, GET_EVENTS, &err),
    })
}

async fn prepare_write<N: NodeClient>(
    body: WriteBody,
    gateway: Arc<StateGateway<N>>,
    metrics: Metrics,
) -> Result<Response, Infallible> {
    metrics.increment_requests(PREPARE_WRITE);

    let raw = match body.value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    };

    Ok(match gateway.prepare_write(&raw) {
        Ok(request) => warp::reply::json(&request).into_response(),
        Err(err) => error_reply(&metrics, PREPARE_WRITE, &err),
    })
}

fn error_reply(
    metrics: &Metrics,
    operation: &str,
    err: &GatewayError,
) -> Response {
    metrics.increment_failures(operation, err.kind());

    let status = if err.is_client_error() {
        warn!("Rejected {} request: {}", operation, err);
        StatusCode::BAD_REQUEST
    } else {
        error!("RPC Error during {}: {}", operation, err);
        StatusCode::INTERNAL_SERVER_ERROR
    };

    json_error(status, err.to_string())
}

/// Requests refused before reaching a handler.
async fn handle_rejection(rejection: Rejection) -> Result<Response, Infallible> {
    let (status, message) = if rejection.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found".to_string())
    } else if let Some(err) = rejection.find::<BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, format!("Invalid request body: {err}"))
    } else if rejection.find::<MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".to_string())
    } else if rejection.find::<LengthRequired>().is_some() {
        (StatusCode::LENGTH_REQUIRED, "Content-Length is required".to_string())
    } else if rejection.find::<PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Request body is too large".to_string())
    } else if rejection.find::<UnsupportedMediaType>().is_some() {
        (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "Request body must be JSON".to_string(),
        )
    } else {
        error!("Unhandled rejection: {:?}", rejection);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error".to_string(),
        )
    };

    Ok(json_error(status, message))
}

fn json_error(
    status: StatusCode,
    message: String,
) -> Response {
    warp::reply::with_status(warp::reply::json(&ErrorReply::new(message)), status).into_response()
}

#[cfg(test)]
mod tests {
    use alloy::primitives::B256;
    use alloy::primitives::U256;
    use serde_json::json;

    use super::*;
    use crate::rpc::dummy_node::*;
    use crate::rpc::RpcAdapter;

    const DEFAULT_WINDOW: BlockRange = BlockRange {
        from_block: 50511090,
        to_block: 50513090,
    };

    fn filter(node: DummyNode) -> impl Filter<Extract = (Response,), Error = Infallible> + Clone {
        let gateway = StateGateway::new(RpcAdapter::new(dummy_endpoint(), node));
        routes(Arc::new(gateway), DEFAULT_WINDOW, Metrics::new())
    }

    fn body<B: AsRef<[u8]>>(response: &warp::http::Response<B>) -> Value {
        serde_json::from_slice(response.body().as_ref()).unwrap()
    }

    #[tokio::test]
    async fn test_get_value() {
        let response = warp::test::request()
            .method("GET")
            .path("/blockchain/value")
            .reply(&filter(DummyNode::storing(U256::from(42))))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(&response), json!({"success": true, "value": "42"}));
    }

    #[tokio::test]
    async fn test_get_value_node_down() {
        let response = warp::test::request()
            .method("GET")
            .path("/blockchain/value")
            .reply(&filter(DummyNode::failing("connection refused")))
            .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body(&response),
            json!({"success": false, "message": "Blockchain Error: connection refused"})
        );
    }

    #[tokio::test]
    async fn test_get_events_default_window() {
        let tx_hash = B256::repeat_byte(0xab);
        let node = DummyNode::storing(U256::ZERO).with_logs(vec![value_updated_log(
            50511500,
            0,
            U256::from(42),
            tx_hash,
        )]);

        let response = warp::test::request()
            .method("GET")
            .path("/blockchain/events")
            .reply(&filter(node))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body(&response),
            json!([{"blockNumber": "50511500", "value": "42", "txHash": tx_hash.to_string()}])
        );
    }

    #[tokio::test]
    async fn test_get_events_with_bounds() {
        let response = warp::test::request()
            .method("GET")
            .path("/blockchain/events?fromBlock=100&toBlock=0x6e")
            .reply(&filter(DummyNode::storing(U256::ZERO)))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(&response), json!([]));
    }

    #[tokio::test]
    async fn test_get_events_invalid_range() {
        for path in [
            "/blockchain/events?fromBlock=abc",
            "/blockchain/events?fromBlock=-1&toBlock=10",
            "/blockchain/events?fromBlock=1.5",
            "/blockchain/events?fromBlock=&toBlock=10",
            "/blockchain/events?fromBlock=20&toBlock=10",
        ] {
            let response = warp::test::request()
                .method("GET")
                .path(path)
                .reply(&filter(DummyNode::storing(U256::ZERO)))
                .await;

            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{path}");
            assert_eq!(body(&response)["success"], json!(false));
        }
    }

    #[tokio::test]
    async fn test_get_events_node_rejects_range() {
        let node = DummyNode::storing(U256::ZERO).with_logs_error("maximum is set to 2048");

        let response = warp::test::request()
            .method("GET")
            .path("/blockchain/events?fromBlock=0&toBlock=90000000")
            .reply(&filter(node))
            .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body(&response)["message"],
            json!("Blockchain Error: maximum is set to 2048")
        );
    }

    #[tokio::test]
    async fn test_prepare_write() {
        let response = warp::test::request()
            .method("POST")
            .path("/blockchain/prepare-write")
            .json(&json!({"value": 42}))
            .reply(&filter(DummyNode::storing(U256::ZERO)))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        let reply = body(&response);
        assert_eq!(reply["chainId"], json!(FUJI));
        assert_eq!(reply["value"], json!("42"));

        let response = warp::test::request()
            .method("POST")
            .path("/blockchain/prepare-write")
            .json(&json!({"value": "-3"}))
            .reply(&filter(DummyNode::storing(U256::ZERO)))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_readiness() {
        let response = warp::test::request()
            .method("GET")
            .path("/readiness")
            .reply(&filter(DummyNode::failing("down")))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body().as_ref(), b"OK");
    }

    #[tokio::test]
    async fn test_refused_requests_use_error_reply() {
        let response = warp::test::request()
            .method("POST")
            .path("/blockchain/prepare-write")
            .header("content-type", "application/json")
            .body("{not json")
            .reply(&filter(DummyNode::storing(U256::ZERO)))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let reply = body(&response);
        assert_eq!(reply["success"], json!(false));
        assert!(reply["message"]
            .as_str()
            .unwrap()
            .starts_with("Invalid request body"));

        let response = warp::test::request()
            .method("GET")
            .path("/blockchain/prepare-write")
            .reply(&filter(DummyNode::storing(U256::ZERO)))
            .await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(
            body(&response),
            json!({"success": false, "message": "Method not allowed"})
        );

        let response = warp::test::request()
            .method("GET")
            .path("/blockchain/unknown")
            .reply(&filter(DummyNode::storing(U256::ZERO)))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body(&response),
            json!({"success": false, "message": "Not found"})
        );
    }
}
