//! Sink -> queue -> source against a mock HTTP server

use std::sync::Arc;

use hs_config::SinkConfig;
use hs_sink::{AckSourceTask, ExchangeBroker, HttpSinkTask, SinkRecord};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config() -> SinkConfig {
    let mut config = SinkConfig::default();
    config.retry.retries = 1;
    config.retry.retry_delay_ms = 5;
    config.retry.retry_jitter_ms = 0;
    config.sink.publish_to_in_memory_queue = true;
    config.sink.queue_name = "acks".to_string();
    config
        .sink
        .static_request_headers
        .insert("X-Origin".to_string(), "hs-sink".to_string());
    config.source.enabled = true;
    config.source.queue_name = "acks".to_string();
    config.source.success_topic = "http-success".to_string();
    config.source.errors_topic = "http-errors".to_string();
    config
}

#[tokio::test]
async fn test_records_flow_to_topics() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ok"))
        .and(header("x-origin", "hs-sink"))
        .respond_with(ResponseTemplate::new(200).set_body_string("fine"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(2)
        .mount(&server)
        .await;

    let config = config();
    let broker = Arc::new(ExchangeBroker::new());
    let sink = HttpSinkTask::from_config(&config, broker.clone()).unwrap();
    let mut source = AckSourceTask::new(broker, config.source.clone());
    source.start().unwrap();

    let records = vec![
        SinkRecord::new(
            "requests",
            json!({
                "url": format!("{}/ok", server.uri()),
                "method": "POST",
                "correlationId": "order-1",
                "bodyAsString": "{}"
            }),
        ),
        SinkRecord::new(
            "requests",
            json!({
                "url": format!("{}/broken", server.uri()),
                "method": "POST",
                "correlationId": "order-2"
            }),
        ),
    ];

    let results = sink.put(records).await;
    assert!(results.iter().all(|r| r.is_ok()));

    let mut out = source.poll();
    out.sort_by(|a, b| a.key.cmp(&b.key));
    assert_eq!(out.len(), 2);

    assert_eq!(out[0].topic, "http-success");
    assert_eq!(out[0].key.as_deref(), Some("order-1"));
    assert_eq!(out[0].value["httpResponse"]["responseBody"], "fine");
    assert_eq!(out[0].value["attempts"], 1);
    assert_eq!(out[0].schema, "hs.HttpExchange");

    assert_eq!(out[1].topic, "http-errors");
    assert_eq!(out[1].key.as_deref(), Some("order-2"));
    assert_eq!(out[1].value["httpResponse"]["statusCode"], 500);
    assert_eq!(out[1].value["attempts"], 2);
    assert_eq!(out[1].value["httpRequest"]["headers"]["X-Origin"][0], "hs-sink");
}

#[tokio::test]
async fn test_nothing_queued_without_consumer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let config = config();
    let broker = Arc::new(ExchangeBroker::new());
    let sink = HttpSinkTask::from_config(&config, broker.clone()).unwrap();

    let results = sink
        .put(vec![SinkRecord::new(
            "requests",
            json!({"url": server.uri(), "method": "GET"}),
        )])
        .await;
    assert!(results[0].as_ref().unwrap().is_success());
    assert!(broker.get_queue("acks").is_empty());
}
