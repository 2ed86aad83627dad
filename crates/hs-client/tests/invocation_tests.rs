//! End-to-end invocation against a local mock server

use std::sync::Arc;
use std::time::Duration;

use hs_client::{HttpInvoker, ReqwestTransport, RetryPolicy};
use hs_common::{HttpMethod, HttpRequest, SERVER_ERROR_STATUS_CODE};
use hs_config::HttpClientSettings;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn invoker(retries: u32) -> HttpInvoker {
    let transport = ReqwestTransport::new(HttpClientSettings::default()).unwrap();
    let policy = RetryPolicy {
        max_retries: retries,
        initial_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
        jitter: Duration::ZERO,
        ..RetryPolicy::default()
    };
    HttpInvoker::new(Arc::new(transport), policy)
}

fn post(url: String) -> HttpRequest {
    HttpRequest::builder()
        .url(url)
        .method(HttpMethod::Post)
        .header("Content-Type", "application/json")
        .correlation_id("corr-1")
        .request_id("req-1")
        .body_as_string(r#"{"id":1}"#)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_post_succeeds_first_time() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .and(header("content-type", "application/json"))
        .and(body_string(r#"{"id":1}"#))
        .respond_with(ResponseTemplate::new(200).set_body_string("accepted"))
        .expect(1)
        .mount(&server)
        .await;

    let exchange = invoker(3)
        .execute(post(format!("{}/orders", server.uri())))
        .await
        .unwrap();

    assert!(exchange.is_success());
    assert_eq!(exchange.attempts(), 1);
    assert_eq!(exchange.response().status_code(), 200);
    assert_eq!(exchange.response().body(), "accepted");
    assert_eq!(exchange.request().correlation_id(), Some("corr-1"));
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    let exchange = invoker(3)
        .execute(post(format!("{}/orders", server.uri())))
        .await
        .unwrap();

    assert!(exchange.is_success());
    assert_eq!(exchange.attempts(), 3);
    assert_eq!(exchange.response().body(), "ok");

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 3);
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such order"))
        .expect(1)
        .mount(&server)
        .await;

    let exchange = invoker(3)
        .execute(post(format!("{}/orders", server.uri())))
        .await
        .unwrap();

    assert!(exchange.is_success());
    assert_eq!(exchange.attempts(), 1);
    assert_eq!(exchange.response().status_code(), 404);
    assert_eq!(exchange.response().body(), "no such order");
}

#[tokio::test]
async fn test_persistent_unavailability_exhausts_retries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(503)
                .insert_header("Retry-After", "1")
                .set_body_string("down"),
        )
        .expect(3)
        .mount(&server)
        .await;

    let exchange = invoker(2)
        .execute(post(format!("{}/orders", server.uri())))
        .await
        .unwrap();

    assert!(!exchange.is_success());
    assert_eq!(exchange.attempts(), 3);
    assert_eq!(exchange.response().status_code(), 503);
    assert_eq!(exchange.response().body(), "down");
    assert_eq!(
        exchange.response().headers().get("retry-after"),
        Some(&vec!["1".to_string()])
    );
}

#[tokio::test]
async fn test_timeout_produces_synthetic_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let request = HttpRequest::builder()
        .url(format!("{}/slow", server.uri()))
        .method(HttpMethod::Get)
        .timeout_ms(50)
        .build()
        .unwrap();

    let exchange = invoker(1).execute(request).await.unwrap();

    assert!(!exchange.is_success());
    assert_eq!(exchange.attempts(), 2);
    assert_eq!(exchange.response().status_code(), SERVER_ERROR_STATUS_CODE);
    assert_eq!(exchange.response().body(), "");
    assert!(!exchange.response().status_message().is_empty());
}

#[tokio::test]
async fn test_connection_refused_produces_synthetic_response() {
    // bind then drop to get a port nobody listens on
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let exchange = invoker(1)
        .execute(post(format!("http://127.0.0.1:{}/orders", port)))
        .await
        .unwrap();

    assert!(!exchange.is_success());
    assert_eq!(exchange.attempts(), 2);
    assert_eq!(exchange.response().status_code(), SERVER_ERROR_STATUS_CODE);
    assert_eq!(exchange.response().body(), "");
}

#[tokio::test]
async fn test_per_call_success_pattern() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let client = invoker(3);
    let policy = client.default_policy().clone().with_success_pattern("200");
    let exchange = client
        .execute_with_policy(post(format!("{}/orders", server.uri())), &policy)
        .await
        .unwrap();

    assert!(!exchange.is_success());
    assert_eq!(exchange.attempts(), 1);
    assert_eq!(exchange.response().status_code(), 202);
}
