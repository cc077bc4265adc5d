// Integration tests for `Gateway` using wiremock.

use std::sync::Arc;
use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use chrono::NaiveDate;
use reqwest::cookie::Jar;
use taskflow_api::{Error, Gateway, GatewayConfig, TaskPayload};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, Gateway) {
    let server = MockServer::start().await;
    let config = GatewayConfig::new(server.uri().parse().expect("mock server uri"));
    let gateway = Gateway::new(config).expect("gateway build");
    (server, gateway)
}

fn draft(title: &str, completed: bool) -> TaskPayload {
    TaskPayload {
        title: title.into(),
        completed,
        due_date: NaiveDate::from_ymd_opt(2026, 3, 1).expect("valid date"),
    }
}

// ── Happy-path tests ────────────────────────────────────────────────

#[tokio::test]
async fn test_create_task() {
    let (server, gateway) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/tasks"))
        .and(body_json(json!({
            "title": "Water plants",
            "completed": false,
            "due_date": "2026-03-01"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "message": "Task created"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let ack = gateway
        .create_task(&draft("Water plants", false))
        .await
        .expect("create_task");

    assert_eq!(ack.message, "Task created");
}

#[tokio::test]
async fn test_update_task() {
    let (server, gateway) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/api/tasks/42"))
        .and(body_json(json!({
            "title": "Water plants",
            "completed": true,
            "due_date": "2026-03-01"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "Task updated"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let ack = gateway
        .update_task(42, &draft("Water plants", true))
        .await
        .expect("update_task");

    assert_eq!(ack.message, "Task updated");
}

#[tokio::test]
async fn test_delete_task() {
    let (server, gateway) = setup().await;

    Mock::given(method("DELETE"))
        .and(path("/api/tasks/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "Task deleted"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let ack = gateway.delete_task(7).await.expect("delete_task");
    assert_eq!(ack.message, "Task deleted");
}

// ── CSRF contract ───────────────────────────────────────────────────

#[tokio::test]
async fn test_csrf_cookie_mirrored_into_header() {
    let server = MockServer::start().await;
    let base: reqwest::Url = server.uri().parse().expect("mock server uri");

    let jar = Arc::new(Jar::default());
    jar.add_cookie_str("csrf_token=tok-abc; Path=/", &base);

    let gateway = Gateway::new(GatewayConfig::new(base).with_cookie_jar(jar)).expect("gateway");

    Mock::given(method("POST"))
        .and(path("/api/tasks"))
        .and(header("X-CSRF-Token", "tok-abc"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "message": "Task created"
        })))
        .expect(1)
        .mount(&server)
        .await;

    gateway
        .create_task(&draft("CSRF check", false))
        .await
        .expect("create_task with CSRF header");
}

// ── Retry pipeline ──────────────────────────────────────────────────

#[tokio::test]
async fn test_retry_then_fail_makes_exactly_two_attempts() {
    let (server, gateway) = setup().await;

    Mock::given(method("DELETE"))
        .and(path("/api/tasks/1"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let started = Instant::now();
    let result = gateway.delete_task(1).await;
    let elapsed = started.elapsed();

    assert!(matches!(result, Err(Error::Status { status: 500, .. })));
    assert!(
        elapsed >= Duration::from_secs(1),
        "retry should wait 1s between attempts, took {elapsed:?}"
    );
    // `.expect(2)` verifies exactly two attempts when the server drops.
}

#[tokio::test]
async fn test_retry_recovers_from_one_failure() {
    let (server, gateway) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/tasks"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/tasks"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "message": "Task created"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let ack = gateway
        .create_task(&draft("Second try", false))
        .await
        .expect("retry should recover");

    assert_eq!(ack.message, "Task created");
}

// ── Response validation ─────────────────────────────────────────────

#[tokio::test]
async fn test_empty_body_is_rejected_without_retry() {
    let (server, gateway) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/tasks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let result = gateway.create_task(&draft("Empty ack", false)).await;

    assert!(matches!(result, Err(Error::EmptyBody)));
    let message = result.expect_err("empty body must fail").to_string();
    assert_eq!(message, "Response body is empty!");
}

#[tokio::test]
async fn test_missing_body_is_rejected() {
    let (server, gateway) = setup().await;

    Mock::given(method("DELETE"))
        .and(path("/api/tasks/3"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let result = gateway.delete_task(3).await;
    assert!(matches!(result, Err(Error::EmptyBody)));
}

// ── Error normalization ─────────────────────────────────────────────

#[tokio::test]
async fn test_client_error_carries_server_message() {
    let (server, gateway) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/api/tasks/99"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "message": "Task not found"
        })))
        .expect(2)
        .mount(&server)
        .await;

    let result = gateway.update_task(99, &draft("Ghost", false)).await;

    match result {
        Err(Error::Status { status, message }) => {
            assert_eq!(status, 404);
            assert!(message.contains("Task not found"));
        }
        other => panic!("expected status error, got {other:?}"),
    }
}
