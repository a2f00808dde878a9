use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use blocks_chain_client::ChainClient;
use blocks_conductor::Conductor;
use blocks_conductor_api::{router, AppState};
use blocks_store::memory::MemoryStore;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn test_app(chain_height: u64) -> axum::Router {
    let server = wiremock::MockServer::start().await;
    wiremock::Mock::given(wiremock::matchers::method("POST"))
        .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 0,
            "result": format!("0x{:x}", chain_height),
        })))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let chain = Arc::new(ChainClient::new(&server.uri(), None).unwrap());
    let conductor = Conductor::new(store, chain, 10).await.unwrap();
    router(AppState::new(conductor))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn index_returns_success_envelope() {
    let app = test_app(3).await;
    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], json!(true));
}

#[tokio::test]
async fn job_request_without_uuid_is_a_business_error_not_a_bad_request() {
    let app = test_app(3).await;
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/job-request")
                .header("content-type", "application/json")
                .body(Body::from(json!({"type": "BLOCK"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn job_request_then_submit_round_trips() {
    let app = test_app(3).await;

    let consumer_uuid = uuid::Uuid::new_v4();
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/job-request")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({"uuid": consumer_uuid, "type": "BLOCK"}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["success"], json!(true));
    let job_uuid = body["data"]["job_uuid"].as_str().unwrap().to_string();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/job-submit")
                .header("content-type", "application/json")
                .body(Body::from(json!({"job_uuid": job_uuid}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["success"], json!(true));
}
