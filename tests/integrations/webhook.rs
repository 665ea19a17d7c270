//! End-to-end tests of the `/alert` endpoint against a running app.

#[path = "../helpers/mod.rs"]
mod helpers;

use helpers::app::TestAppBuilder;
use helpers::recording_notifier::RecordingNotifier;
use serde_json::{json, Value};
use std::time::Duration;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn envelope_alert_is_formatted_and_delivered() {
    let app = TestAppBuilder::new().start().await.unwrap();

    let body = r#"{"alerts":[{"status":"firing","labels":{"alertname":"DiskFull","instance":"db1"},"annotations":{"summary":"disk at 95%"}}]}"#;
    let response = app.post_alert(body, None).await;

    assert_eq!(response.status(), 200);
    let result: Value = response.json().await.unwrap();
    assert_eq!(
        result,
        json!({"received_raw_count": 1, "processed": 1, "skipped": 0, "errors": []})
    );
    assert_eq!(
        app.recorder.messages(),
        vec!["[firing] DiskFull on db1 — disk at 95%".to_string()]
    );

    app.shutdown(SHUTDOWN_TIMEOUT).await.unwrap();
}

#[tokio::test]
async fn unparsable_body_is_rejected_with_its_length() {
    let app = TestAppBuilder::new().start().await.unwrap();

    let response = app.post_alert("not json", None).await;

    assert_eq!(response.status(), 400);
    let result: Value = response.json().await.unwrap();
    assert_eq!(result, json!({"error": "invalid_json", "raw_length": 8}));
    assert!(app.recorder.messages().is_empty());

    app.shutdown(SHUTDOWN_TIMEOUT).await.unwrap();
}

#[tokio::test]
async fn scalar_body_is_rejected() {
    let app = TestAppBuilder::new().start().await.unwrap();

    for body in ["42", "true", "null"] {
        let response = app.post_alert(body, None).await;
        assert_eq!(response.status(), 400, "body {} should be rejected", body);
    }
    assert!(app.recorder.messages().is_empty());

    app.shutdown(SHUTDOWN_TIMEOUT).await.unwrap();
}

#[tokio::test]
async fn mixed_array_skips_only_the_unprocessable_element() {
    let app = TestAppBuilder::new().start().await.unwrap();

    let body = r#"[{"bad":1}, "not-a-json-string", {"status":"ok","labels":{},"annotations":{}}]"#;
    let response = app.post_alert(body, None).await;

    assert_eq!(response.status(), 200);
    let result: Value = response.json().await.unwrap();
    assert_eq!(result["received_raw_count"], 3);
    assert_eq!(result["processed"], 2);
    assert_eq!(result["skipped"], 1);
    assert_eq!(result["errors"], json!([]));
    assert_eq!(app.recorder.messages().len(), 2);

    app.shutdown(SHUTDOWN_TIMEOUT).await.unwrap();
}

#[tokio::test]
async fn single_mapping_is_one_alert() {
    let app = TestAppBuilder::new().start().await.unwrap();

    let body = r#"{"status":"resolved","labels":{"alertname":"HighLoad"}}"#;
    let result: Value = app.post_alert(body, None).await.json().await.unwrap();

    assert_eq!(result["received_raw_count"], 1);
    assert_eq!(result["processed"], 1);
    assert_eq!(
        app.recorder.messages(),
        vec!["[resolved] HighLoad on <unknown> — ".to_string()]
    );

    app.shutdown(SHUTDOWN_TIMEOUT).await.unwrap();
}

#[tokio::test]
async fn double_encoded_envelope_is_unwrapped() {
    let app = TestAppBuilder::new().start().await.unwrap();

    let inner = json!({"alerts": [
        {"status": "firing", "labels": {"alertname": "A"}},
        {"status": "firing", "labels": {"alertname": "B"}},
    ]})
    .to_string();
    // The whole envelope arrives as a JSON string literal.
    let body = Value::String(inner).to_string();
    let result: Value = app.post_alert(body, None).await.json().await.unwrap();

    assert_eq!(result["received_raw_count"], 1);
    assert_eq!(result["processed"], 1);
    assert_eq!(result["skipped"], 0);

    app.shutdown(SHUTDOWN_TIMEOUT).await.unwrap();
}

#[tokio::test]
async fn double_encoded_array_is_used_directly() {
    let app = TestAppBuilder::new().start().await.unwrap();

    let inner = json!([
        {"labels": {"alertname": "A"}},
        {"labels": {"alertname": "B"}},
    ])
    .to_string();
    let body = Value::String(inner).to_string();
    let result: Value = app.post_alert(body, None).await.json().await.unwrap();

    assert_eq!(result["received_raw_count"], 2);
    assert_eq!(result["processed"], 2);
    assert_eq!(
        app.recorder.messages(),
        vec![
            "[?] A on <unknown> — ".to_string(),
            "[?] B on <unknown> — ".to_string(),
        ]
    );

    app.shutdown(SHUTDOWN_TIMEOUT).await.unwrap();
}

#[tokio::test]
async fn encoded_elements_inside_an_envelope_are_decoded() {
    let app = TestAppBuilder::new().start().await.unwrap();

    let element = json!({"status": "firing", "labels": {"alertname": "Nested", "instance": "n1"}}).to_string();
    let body = json!({"alerts": [element]}).to_string();
    let result: Value = app.post_alert(body, None).await.json().await.unwrap();

    assert_eq!(result["processed"], 1);
    assert_eq!(
        app.recorder.messages(),
        vec!["[firing] Nested on n1 — ".to_string()]
    );

    app.shutdown(SHUTDOWN_TIMEOUT).await.unwrap();
}

#[tokio::test]
async fn wrong_token_is_rejected_before_processing() {
    let app = TestAppBuilder::new().with_token("s3cret").start().await.unwrap();

    let body = r#"{"alerts":[{"labels":{"alertname":"A"}}]}"#;
    let response = app.post_alert(body, Some("wrong")).await;

    assert_eq!(response.status(), 401);
    let result: Value = response.json().await.unwrap();
    assert_eq!(result, json!({"error": "unauthorized"}));
    assert!(app.recorder.messages().is_empty());

    app.shutdown(SHUTDOWN_TIMEOUT).await.unwrap();
}

#[tokio::test]
async fn missing_token_is_rejected_when_auth_is_enabled() {
    let app = TestAppBuilder::new().with_token("s3cret").start().await.unwrap();

    let response = app.post_alert("[]", None).await;
    assert_eq!(response.status(), 401);

    app.shutdown(SHUTDOWN_TIMEOUT).await.unwrap();
}

#[tokio::test]
async fn correct_token_is_accepted() {
    let app = TestAppBuilder::new().with_token("s3cret").start().await.unwrap();

    let body = r#"{"alerts":[{"labels":{"alertname":"A"}}]}"#;
    let response = app.post_alert(body, Some("s3cret")).await;

    assert_eq!(response.status(), 200);
    assert_eq!(app.recorder.messages().len(), 1);

    app.shutdown(SHUTDOWN_TIMEOUT).await.unwrap();
}

#[tokio::test]
async fn auth_is_skipped_when_no_token_is_configured() {
    let app = TestAppBuilder::new().start().await.unwrap();

    let response = app.post_alert("[]", Some("anything")).await;
    assert_eq!(response.status(), 200);

    app.shutdown(SHUTDOWN_TIMEOUT).await.unwrap();
}

#[tokio::test]
async fn failed_deliveries_do_not_fail_the_request() {
    let app = TestAppBuilder::new()
        .with_recorder(RecordingNotifier::failing())
        .start()
        .await
        .unwrap();

    let body = r#"[{"labels":{"alertname":"A"}},{"labels":{"alertname":"B"}}]"#;
    let response = app.post_alert(body, None).await;

    assert_eq!(response.status(), 200);
    let result: Value = response.json().await.unwrap();
    assert_eq!(
        result,
        json!({"received_raw_count": 2, "processed": 2, "skipped": 0, "errors": []})
    );

    app.shutdown(SHUTDOWN_TIMEOUT).await.unwrap();
}

#[tokio::test]
async fn oversized_body_is_refused() {
    let app = TestAppBuilder::new()
        .with_config_modifier(|config| config.server.max_body_bytes = 64)
        .start()
        .await
        .unwrap();

    let body = format!(r#"{{"alerts":[{{"labels":{{"alertname":"{}"}}}}]}}"#, "x".repeat(256));
    let response = app.post_alert(body, None).await;

    assert_eq!(response.status(), 413);
    assert!(app.recorder.messages().is_empty());

    app.shutdown(SHUTDOWN_TIMEOUT).await.unwrap();
}

#[tokio::test]
async fn healthz_answers_ok() {
    let app = TestAppBuilder::new().with_token("s3cret").start().await.unwrap();

    let response = app.client.get(app.url("/healthz")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "ok");

    app.shutdown(SHUTDOWN_TIMEOUT).await.unwrap();
}

#[tokio::test]
async fn app_shuts_down_cleanly_after_serving() {
    let app = TestAppBuilder::new().start().await.unwrap();
    let response = app.post_alert("[]", None).await;
    assert_eq!(response.status(), 200);

    app.shutdown(SHUTDOWN_TIMEOUT).await.unwrap();
}
