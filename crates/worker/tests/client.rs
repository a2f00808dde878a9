use blocks_types::WorkerType;
use blocks_worker::{ClientError, ConductorClient};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn ping_succeeds_on_ok_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .mount(&server)
        .await;

    let client = ConductorClient::new(server.uri());
    client.ping(uuid::Uuid::new_v4()).await.unwrap();
}

#[tokio::test]
async fn job_request_decodes_block_job() {
    let server = MockServer::start().await;
    let job_uuid = uuid::Uuid::new_v4();
    let consumer_uuid = uuid::Uuid::new_v4();
    Mock::given(method("POST"))
        .and(path("/job-request"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {
                "type": "BLOCK",
                "job_uuid": job_uuid,
                "consumer_uuid": consumer_uuid,
                "block_numbers": [1, 2, 3],
            }
        })))
        .mount(&server)
        .await;

    let client = ConductorClient::new(server.uri());
    let job = client.job_request(consumer_uuid, WorkerType::Block).await.unwrap();
    assert_eq!(job.job_uuid(), job_uuid);
}

#[tokio::test]
async fn business_error_surfaces_as_client_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/job-submit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "error": true,
            "message": "Invalid job UUID",
        })))
        .mount(&server)
        .await;

    let client = ConductorClient::new(server.uri());
    // job_submit never surfaces business errors, only transport ones.
    client.job_submit(uuid::Uuid::new_v4()).await.unwrap();

    Mock::given(method("POST"))
        .and(path("/job-reject"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "error": true,
            "message": "Invalid job UUID",
        })))
        .mount(&server)
        .await;
    let err = client.job_reject(uuid::Uuid::new_v4(), "bad").await.unwrap_err();
    assert!(matches!(err, ClientError::Business(_)));
}
