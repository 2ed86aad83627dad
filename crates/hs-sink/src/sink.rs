//! HttpSinkTask - turns inbound records into HTTP calls
//!
//! For each record:
//! 1. parse the value as an `HttpRequestRecord` and build the request
//! 2. merge static headers and fill in missing identifiers
//! 3. execute it, honouring a per-record success pattern header
//! 4. publish the exchange to the configured queue when someone consumes it

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use metrics::counter;
use tracing::{debug, info, warn};
use uuid::Uuid;

use hs_client::HttpInvoker;
use hs_common::schema::HttpRequestRecord;
use hs_common::{HttpExchange, HttpRequest, Result, SinkError};
use hs_config::{SinkConfig, SinkTaskSettings};

use crate::record::SinkRecord;
use crate::ExchangeBroker;

/// Record header carrying a success pattern for that record only
pub const SUCCESS_CODE_HEADER: &str = "ws-success-code";

pub struct HttpSinkTask {
    invoker: Arc<HttpInvoker>,
    broker: Arc<ExchangeBroker>,
    settings: SinkTaskSettings,
}

impl HttpSinkTask {
    pub fn new(invoker: Arc<HttpInvoker>, broker: Arc<ExchangeBroker>, settings: SinkTaskSettings) -> Self {
        Self {
            invoker,
            broker,
            settings,
        }
    }

    pub fn from_config(config: &SinkConfig, broker: Arc<ExchangeBroker>) -> Result<Self> {
        let invoker = HttpInvoker::from_settings(&config.http, &config.retry)?
            .require_correlation_id(config.sink.require_correlation_id);

        info!(
            queue = %config.sink.queue_name,
            publish = config.sink.publish_to_in_memory_queue,
            concurrency = config.sink.concurrency,
            "Sink task configured"
        );
        Ok(Self::new(Arc::new(invoker), broker, config.sink.clone()))
    }

    /// Build the outbound request a record describes
    pub fn build_http_request(&self, record: &SinkRecord) -> Result<HttpRequest> {
        let value = record.value.clone().ok_or(SinkError::MissingField("value"))?;
        let parsed: HttpRequestRecord = serde_json::from_value(value)?;
        let request = HttpRequest::try_from(parsed)?;

        let mut builder = self
            .settings
            .static_request_headers
            .iter()
            .fold(request.clone().into_builder(), |builder, (name, value)| {
                builder.default_header(name, value)
            });

        if self.settings.generate_missing_ids {
            if request.request_id().is_none() {
                builder = builder.request_id(Uuid::new_v4().to_string());
            }
            if request.correlation_id().is_none() {
                builder = builder.correlation_id(Uuid::new_v4().to_string());
            }
        } else if self.settings.require_correlation_id && request.correlation_id().is_none() {
            return Err(SinkError::MissingField("correlationId"));
        }

        builder.build()
    }

    /// Execute one record and publish its exchange
    pub async fn process(&self, record: &SinkRecord) -> Result<HttpExchange> {
        let request = self.build_http_request(record)?;

        let exchange = match record.header(SUCCESS_CODE_HEADER) {
            Some(pattern) => {
                let policy = self
                    .invoker
                    .default_policy()
                    .clone()
                    .with_success_pattern(pattern);
                self.invoker.execute_with_policy(request, &policy).await?
            }
            None => self.invoker.execute(request).await?,
        };

        self.publish(&exchange);
        Ok(exchange)
    }

    /// Execute a batch with bounded concurrency; results keep record order
    pub async fn put(&self, records: Vec<SinkRecord>) -> Vec<Result<HttpExchange>> {
        debug!(count = records.len(), "Processing records");
        let concurrency = self.settings.concurrency.max(1);

        stream::iter(records.iter())
            .map(|record| self.process(record))
            .buffered(concurrency)
            .collect()
            .await
    }

    fn publish(&self, exchange: &HttpExchange) {
        if !self.settings.publish_to_in_memory_queue {
            return;
        }

        let queue = &self.settings.queue_name;
        match self.broker.publish_if_consumed(queue, exchange.clone()) {
            Ok(()) => {
                counter!("hs_queue_published_total").increment(1);
            }
            Err(_) => {
                counter!("hs_queue_dropped_total").increment(1);
                warn!(
                    queue = %queue,
                    correlation_id = exchange.request().correlation_id().unwrap_or_default(),
                    "No consumer registered for queue, exchange dropped"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use hs_client::{HttpTransport, RetryPolicy, TransportError};
    use hs_common::{Headers, HttpBody, HttpMethod, HttpResponse};
    use serde_json::json;
    use std::time::Duration;

    /// Answers every request with a fixed status and records what it saw
    struct FixedStatus {
        status: u16,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl FixedStatus {
        fn new(status: u16) -> Arc<Self> {
            Arc::new(Self {
                status,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl HttpTransport for FixedStatus {
        async fn send(&self, request: &HttpRequest) -> std::result::Result<HttpResponse, TransportError> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(HttpResponse::new(self.status, "", "", Headers::new()))
        }
    }

    fn task(transport: Arc<FixedStatus>, settings: SinkTaskSettings) -> (HttpSinkTask, Arc<ExchangeBroker>) {
        let policy = RetryPolicy {
            max_retries: 1,
            initial_delay: Duration::from_millis(1),
            jitter: Duration::ZERO,
            ..RetryPolicy::default()
        };
        let invoker = Arc::new(HttpInvoker::new(transport, policy));
        let broker = Arc::new(ExchangeBroker::new());
        (HttpSinkTask::new(invoker, broker.clone(), settings), broker)
    }

    fn record(value: serde_json::Value) -> SinkRecord {
        SinkRecord::new("http-requests", value)
    }

    #[test]
    fn test_build_request_from_record() {
        let (task, _) = task(FixedStatus::new(200), SinkTaskSettings::default());
        let request = task
            .build_http_request(&record(json!({
                "url": "http://svc/orders",
                "method": "PUT",
                "headers": {"X-A": ["1"]},
                "bodyType": "STRING",
                "bodyAsString": "hello",
                "retries": 5
            })))
            .unwrap();

        assert_eq!(request.url(), "http://svc/orders");
        assert_eq!(request.method(), HttpMethod::Put);
        assert_eq!(request.body(), &HttpBody::String("hello".to_string()));
        assert_eq!(request.retry_overrides().retries, Some(5));
        assert_eq!(request.header_values("x-a"), Some(&["1".to_string()][..]));
    }

    #[test]
    fn test_missing_value_rejected() {
        let (task, _) = task(FixedStatus::new(200), SinkTaskSettings::default());
        let mut record = record(json!({}));
        record.value = None;
        assert!(matches!(
            task.build_http_request(&record),
            Err(SinkError::MissingField("value"))
        ));
    }

    #[test]
    fn test_malformed_value_rejected() {
        let (task, _) = task(FixedStatus::new(200), SinkTaskSettings::default());
        assert!(matches!(
            task.build_http_request(&record(json!({"method": "GET"}))),
            Err(SinkError::Serialization(_))
        ));
    }

    #[test]
    fn test_static_headers_do_not_override_record_headers() {
        let mut settings = SinkTaskSettings::default();
        settings
            .static_request_headers
            .insert("Content-Type".to_string(), "application/json".to_string());
        settings
            .static_request_headers
            .insert("X-Source".to_string(), "sink".to_string());
        let (task, _) = task(FixedStatus::new(200), settings);

        let request = task
            .build_http_request(&record(json!({
                "url": "http://svc/",
                "method": "POST",
                "headers": {"content-type": ["text/plain"]}
            })))
            .unwrap();

        assert_eq!(
            request.header_values("Content-Type"),
            Some(&["text/plain".to_string()][..])
        );
        assert_eq!(request.header_values("X-Source"), Some(&["sink".to_string()][..]));
    }

    #[test]
    fn test_missing_ids_are_generated() {
        let (task, _) = task(FixedStatus::new(200), SinkTaskSettings::default());
        let request = task
            .build_http_request(&record(json!({"url": "http://svc/", "method": "GET"})))
            .unwrap();

        assert!(request.request_id().is_some_and(|id| Uuid::parse_str(id).is_ok()));
        assert!(request.correlation_id().is_some());

        let kept = task
            .build_http_request(&record(json!({
                "url": "http://svc/",
                "method": "GET",
                "correlationId": "mine"
            })))
            .unwrap();
        assert_eq!(kept.correlation_id(), Some("mine"));
    }

    #[test]
    fn test_required_correlation_id() {
        let settings = SinkTaskSettings {
            generate_missing_ids: false,
            require_correlation_id: true,
            ..Default::default()
        };
        let (task, _) = task(FixedStatus::new(200), settings);
        assert!(matches!(
            task.build_http_request(&record(json!({"url": "http://svc/", "method": "GET"}))),
            Err(SinkError::MissingField("correlationId"))
        ));
    }

    #[tokio::test]
    async fn test_success_code_header_overrides_pattern() {
        let transport = FixedStatus::new(404);
        let (task, _) = task(transport.clone(), SinkTaskSettings::default());
        let value = json!({"url": "http://svc/", "method": "GET"});

        let default = task.process(&record(value.clone())).await.unwrap();
        assert!(default.is_success());

        let strict = task
            .process(&record(value).with_header(SUCCESS_CODE_HEADER, "2[0-9][0-9]"))
            .await
            .unwrap();
        assert!(!strict.is_success());
        assert_eq!(strict.attempts(), 1);
        assert_eq!(transport.seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_put_keeps_record_order() {
        let (task, _) = task(FixedStatus::new(200), SinkTaskSettings::default());
        let records = (0..5)
            .map(|i| record(json!({"url": format!("http://svc/{}", i), "method": "GET"})))
            .collect();

        let results = task.put(records).await;
        let urls: Vec<_> = results
            .iter()
            .map(|r| r.as_ref().unwrap().request().url().to_string())
            .collect();
        assert_eq!(
            urls,
            (0..5).map(|i| format!("http://svc/{}", i)).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn test_put_reports_bad_records_individually() {
        let (task, _) = task(FixedStatus::new(200), SinkTaskSettings::default());
        let records = vec![
            record(json!({"url": "http://svc/", "method": "GET"})),
            record(json!({"url": "http://svc/", "method": "BREW"})),
        ];

        let results = task.put(records).await;
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(SinkError::InvalidMethod(_))));
    }

    #[tokio::test]
    async fn test_exchange_published_only_when_consumed() {
        let settings = SinkTaskSettings {
            publish_to_in_memory_queue: true,
            queue_name: "acks".to_string(),
            ..Default::default()
        };
        let (task, broker) = task(FixedStatus::new(200), settings);
        let value = json!({"url": "http://svc/", "method": "GET"});

        task.process(&record(value.clone())).await.unwrap();
        assert!(broker.get_queue("acks").is_empty());

        broker.register_consumer("acks").unwrap();
        let exchange = task.process(&record(value)).await.unwrap();
        assert_eq!(broker.get_queue("acks").poll(), Some(exchange));
    }

    #[tokio::test]
    async fn test_publishing_disabled() {
        let (task, broker) = task(FixedStatus::new(200), SinkTaskSettings::default());
        broker.register_consumer("default").unwrap();

        task.process(&record(json!({"url": "http://svc/", "method": "GET"})))
            .await
            .unwrap();
        assert!(broker.default_queue().is_empty());
    }
}
