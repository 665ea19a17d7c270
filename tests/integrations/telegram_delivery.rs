//! Delivery behaviour of the Telegram channel against a mock Bot API.

#[path = "../helpers/mod.rs"]
mod helpers;

use alertrelay::core::Notifier;
use alertrelay::notification::{ChatId, RetryPolicy, TelegramCredentials, TelegramNotifier};
use helpers::app::TestAppBuilder;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SEND_PATH: &str = "/bot123:abc/sendMessage";

fn credentials() -> Option<TelegramCredentials> {
    Some(TelegramCredentials {
        bot_token: "123:abc".to_string(),
        chat_id: ChatId::from("-1001"),
    })
}

/// Same shape as the production policy with millisecond backoff.
fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        attempt_timeout: Duration::from_millis(300),
        backoff_unit: Duration::from_millis(5),
    }
}

fn notifier(base_url: String) -> TelegramNotifier {
    TelegramNotifier::new(base_url, credentials(), fast_policy())
}

#[tokio::test]
async fn server_errors_are_retried_until_exhausted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .expect(3)
        .mount(&server)
        .await;

    let outcome = notifier(server.uri()).deliver("hello").await;

    assert!(!outcome.is_success());
    assert_eq!(outcome.attempts(), 3);
    assert_eq!(outcome.detail(), "max_retries_exceeded");
}

#[tokio::test]
async fn server_error_backoff_grows_exponentially() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let policy = RetryPolicy {
        backoff_unit: Duration::from_millis(20),
        ..fast_policy()
    };
    let started = Instant::now();
    TelegramNotifier::new(server.uri(), credentials(), policy)
        .deliver("hello")
        .await;

    // 2 and 4 units between the three attempts, none after the last.
    assert!(started.elapsed() >= Duration::from_millis(120));
}

#[tokio::test]
async fn recovers_when_a_server_error_is_followed_by_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": {"message_id": 7}})))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = notifier(server.uri()).deliver("hello").await;

    assert!(outcome.is_success());
    assert_eq!(outcome.attempts(), 2);
    assert!(outcome.detail().contains("message_id"));
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string("Bad Request: chat not found"))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = notifier(server.uri()).deliver("hello").await;

    assert!(!outcome.is_success());
    assert_eq!(outcome.attempts(), 1);
    assert!(outcome.detail().contains("400"));
    assert!(outcome.detail().contains("chat not found"));
}

#[tokio::test]
async fn undecodable_success_response_is_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = notifier(server.uri()).deliver("hello").await;

    assert!(!outcome.is_success());
    assert_eq!(outcome.attempts(), 1);
    assert!(outcome.detail().contains("<html>proxy</html>"));
}

#[tokio::test]
async fn slow_responses_time_out_and_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"ok": true}))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let outcome = notifier(server.uri()).deliver("hello").await;

    assert!(!outcome.is_success());
    assert_eq!(outcome.attempts(), 3);
    assert_eq!(outcome.detail(), "max_retries_exceeded");
}

#[tokio::test]
async fn unreachable_endpoint_exhausts_attempts() {
    // Reserve a port, then free it so nothing is listening there.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let outcome = notifier(format!("http://{}", addr)).deliver("hello").await;

    assert!(!outcome.is_success());
    assert_eq!(outcome.attempts(), 3);
    assert_eq!(outcome.detail(), "max_retries_exceeded");
}

#[tokio::test]
async fn missing_credentials_skip_the_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(0)
        .mount(&server)
        .await;

    let outcome = TelegramNotifier::new(server.uri(), None, fast_policy())
        .deliver("hello")
        .await;

    assert!(!outcome.is_success());
    assert_eq!(outcome.attempts(), 0);
    assert_eq!(outcome.detail(), "no-creds");
}

#[tokio::test]
async fn webhook_alerts_reach_the_bot_api_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .and(body_string_contains("chat_id=-1001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(2)
        .mount(&server)
        .await;

    let app = TestAppBuilder::new()
        .with_notifier(Arc::new(notifier(server.uri())))
        .start()
        .await
        .unwrap();

    let body = json!({"alerts": [
        {"status": "firing", "labels": {"alertname": "First", "instance": "a"}},
        {"status": "firing", "labels": {"alertname": "Second", "instance": "b"}},
    ]})
    .to_string();
    let result: Value = app.post_alert(body, None).await.json().await.unwrap();
    assert_eq!(result["processed"], 2);

    let requests = server.received_requests().await.unwrap();
    let bodies: Vec<String> = requests
        .iter()
        .map(|r| String::from_utf8_lossy(&r.body).into_owned())
        .collect();
    assert_eq!(bodies.len(), 2);
    assert!(bodies[0].contains("First"));
    assert!(bodies[1].contains("Second"));

    app.shutdown(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn rejected_delivery_still_counts_as_processed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden: bot was kicked"))
        .expect(1)
        .mount(&server)
        .await;

    let app = TestAppBuilder::new()
        .with_notifier(Arc::new(notifier(server.uri())))
        .start()
        .await
        .unwrap();

    let response = app
        .post_alert(r#"{"labels":{"alertname":"Lonely"}}"#, None)
        .await;
    assert_eq!(response.status(), 200);
    let result: Value = response.json().await.unwrap();
    assert_eq!(
        result,
        json!({"received_raw_count": 1, "processed": 1, "skipped": 0, "errors": []})
    );

    app.shutdown(Duration::from_secs(5)).await.unwrap();
}
