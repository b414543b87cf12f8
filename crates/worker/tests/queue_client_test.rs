//! Queue client against a mocked queue backend

use mockito::{Matcher, Server};
use relay_config::BackendConfig;
use relay_domain::{JobQueue, RelayError};
use relay_worker::QueueClient;

fn client(server: &Server) -> QueueClient {
    QueueClient::new(&BackendConfig {
        base_url: server.url(),
        worker_key: "test-worker-key".to_string(),
        request_timeout_seconds: 5,
    })
    .expect("Failed to build queue client")
}

#[tokio::test]
async fn fetch_next_job_returns_job() {
    //* Given
    let mut server = Server::new_async().await;
    let next_mock = server
        .mock("GET", "/api/worker/jobs/next")
        .match_header("x-worker-key", "test-worker-key")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"job":{"jobId":"abc123","url":"https://shopee.vn/prod-i.111.222"}}"#)
        .expect(1)
        .create_async()
        .await;

    //* When
    let job = client(&server)
        .fetch_next_job()
        .await
        .expect("Failed to fetch job");

    //* Then
    next_mock.assert_async().await;
    let job = job.expect("queue should return a job");
    assert_eq!(job.job_id, "abc123");
    assert_eq!(job.url, "https://shopee.vn/prod-i.111.222");
}

#[tokio::test]
async fn fetch_next_job_keeps_job_without_url() {
    //* Given
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/worker/jobs/next")
        .with_status(200)
        .with_body(r#"{"job":{"jobId":"j1","url":null}}"#)
        .create_async()
        .await;
    let mut numeric = Server::new_async().await;
    numeric
        .mock("GET", "/api/worker/jobs/next")
        .with_status(200)
        .with_body(r#"{"job":{"jobId":42}}"#)
        .create_async()
        .await;

    //* When
    let null_url = client(&server).fetch_next_job().await;
    let missing_url = client(&numeric).fetch_next_job().await;

    //* Then
    let job = null_url.expect("job with null url").expect("job present");
    assert_eq!(job.job_id, "j1");
    assert_eq!(job.url, "");
    let job = missing_url.expect("job without url").expect("job present");
    assert_eq!(job.job_id, "42");
    assert_eq!(job.url, "");
}

#[tokio::test]
async fn fetch_next_job_without_job_id_is_queue_error() {
    //* Given
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/worker/jobs/next")
        .with_status(200)
        .with_body(r#"{"job":{"url":"https://shopee.vn/prod-i.111.222"}}"#)
        .create_async()
        .await;

    //* When
    let result = client(&server).fetch_next_job().await;

    //* Then
    let err = result.unwrap_err();
    assert!(matches!(err, RelayError::Queue(_)));
    assert_eq!(err.to_string(), "Queue error: Queue returned a job without a jobId.");
}

#[tokio::test]
async fn fetch_next_job_empty_queue() {
    //* Given
    let mut server = Server::new_async().await;
    let next_mock = server
        .mock("GET", "/api/worker/jobs/next")
        .with_status(200)
        .with_body(r#"{"job":null}"#)
        .expect(1)
        .create_async()
        .await;

    //* When
    let job = client(&server).fetch_next_job().await;

    //* Then
    next_mock.assert_async().await;
    assert!(matches!(job, Ok(None)));
}

#[tokio::test]
async fn fetch_next_job_error_uses_body_message() {
    //* Given
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/worker/jobs/next")
        .with_status(401)
        .with_body(r#"{"error":"Invalid worker key."}"#)
        .create_async()
        .await;
    let mut other = Server::new_async().await;
    other
        .mock("GET", "/api/worker/jobs/next")
        .with_status(500)
        .with_body("oops")
        .create_async()
        .await;

    //* When
    let with_body = client(&server).fetch_next_job().await;
    let without_body = client(&other).fetch_next_job().await;

    //* Then
    match with_body {
        Err(RelayError::Queue(message)) => assert_eq!(message, "Invalid worker key."),
        other => panic!("unexpected result: {other:?}"),
    }
    match without_body {
        Err(RelayError::Queue(message)) => {
            assert_eq!(message, "Could not fetch job (HTTP 500).")
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn report_complete_posts_aff_link() {
    //* Given
    let mut server = Server::new_async().await;
    let complete_mock = server
        .mock("POST", "/api/worker/jobs/job%2F1/complete")
        .match_header("x-worker-key", "test-worker-key")
        .match_body(Matcher::Json(serde_json::json!({
            "affLink": "https://s.shopee.vn/xYz"
        })))
        .with_status(200)
        .with_body(r#"{"ok":true}"#)
        .expect(1)
        .create_async()
        .await;

    //* When
    let result = client(&server)
        .report_complete("job/1", "https://s.shopee.vn/xYz")
        .await;

    //* Then
    complete_mock.assert_async().await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn report_fail_posts_error_and_surfaces_failure() {
    //* Given
    let mut server = Server::new_async().await;
    let fail_mock = server
        .mock("POST", "/api/worker/jobs/abc/fail")
        .match_body(Matcher::Json(serde_json::json!({
            "error": "[cookie/direct] API error HTTP 403"
        })))
        .with_status(409)
        .expect(1)
        .create_async()
        .await;

    //* When
    let result = client(&server)
        .report_fail("abc", "[cookie/direct] API error HTTP 403")
        .await;

    //* Then
    fail_mock.assert_async().await;
    match result {
        Err(RelayError::Queue(message)) => {
            assert_eq!(message, "Could not mark job failed (HTTP 409).")
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn check_health_reports_server_time() {
    //* Given
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/health")
        .with_status(200)
        .with_body(r#"{"ok":true,"time":"2026-01-01T00:00:00Z"}"#)
        .create_async()
        .await;

    //* When
    let health = client(&server).check_health().await;

    //* Then
    assert!(health.ok);
    assert_eq!(health.status, 200);
    assert_eq!(health.server_time.as_deref(), Some("2026-01-01T00:00:00Z"));
    assert!(health.error.is_none());
    assert!(health.checked_at >= health.started_at);
}

#[tokio::test]
async fn check_health_unhealthy_and_unreachable() {
    //* Given
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/health")
        .with_status(503)
        .with_body(r#"{"error":"db down"}"#)
        .create_async()
        .await;
    let unreachable = QueueClient::new(&BackendConfig {
        base_url: "http://127.0.0.1:9".to_string(),
        worker_key: "k".to_string(),
        request_timeout_seconds: 2,
    })
    .unwrap();

    //* When
    let unhealthy = client(&server).check_health().await;
    let down = unreachable.check_health().await;

    //* Then
    assert!(!unhealthy.ok);
    assert_eq!(unhealthy.status, 503);
    assert_eq!(unhealthy.error.as_deref(), Some("db down"));
    assert!(!down.ok);
    assert_eq!(down.status, 0);
    assert!(down.error.is_some());
}
