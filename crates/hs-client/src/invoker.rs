//! HttpInvoker - one logical call, many attempts
//!
//! Runs attempts until the retry classifier says stop, sleeping for the
//! backoff delay between them. Whatever happens, a call that passes
//! validation produces exactly one `HttpExchange`:
//! - the last real response when one was received
//! - a synthetic 500 with a blank body and the error text otherwise

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use metrics::counter;
use tracing::{debug, info, warn};

use hs_common::{HttpExchange, HttpRequest, HttpResponse, Result, SinkError};
use hs_config::{HttpClientSettings, RetryConfig};

use crate::retry::{AttemptOutcome, RetryClassifier, RetryDecision, RetryPolicy};
use crate::transport::{HttpTransport, ReqwestTransport};

pub struct HttpInvoker {
    transport: Arc<dyn HttpTransport>,
    classifier: RetryClassifier,
    default_policy: RetryPolicy,
    require_correlation_id: bool,
}

impl HttpInvoker {
    pub fn new(transport: Arc<dyn HttpTransport>, default_policy: RetryPolicy) -> Self {
        Self {
            transport,
            classifier: RetryClassifier::new(),
            default_policy,
            require_correlation_id: false,
        }
    }

    /// Invoker over a reqwest transport built from configuration
    pub fn from_settings(http: &HttpClientSettings, retry: &RetryConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(http.clone())
            .map_err(|e| SinkError::InvalidRequest(e.to_string()))?;
        Ok(Self::new(Arc::new(transport), RetryPolicy::from(retry)))
    }

    /// Reject requests without a correlation id before any attempt is made
    pub fn require_correlation_id(mut self, required: bool) -> Self {
        self.require_correlation_id = required;
        self
    }

    pub fn default_policy(&self) -> &RetryPolicy {
        &self.default_policy
    }

    /// Execute under the default policy, with the request's own overrides applied
    pub async fn execute(&self, request: HttpRequest) -> Result<HttpExchange> {
        self.execute_with_policy(request, &self.default_policy).await
    }

    /// Execute under `policy`, with the request's own overrides applied on top
    pub async fn execute_with_policy(
        &self,
        request: HttpRequest,
        policy: &RetryPolicy,
    ) -> Result<HttpExchange> {
        if self.require_correlation_id && request.correlation_id().is_none() {
            return Err(SinkError::MissingField("correlationId"));
        }

        let policy = policy.with_overrides(request.retry_overrides());
        // fail on a bad pattern before anything goes over the wire
        self.classifier.pattern(&policy.success_pattern)?;
        let backoff = policy.backoff();

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let moment = Utc::now();
            let started = Instant::now();

            debug!(
                url = %request.url(),
                method = %request.method(),
                attempt = attempt,
                "Sending request"
            );
            let result = self.transport.send(&request).await;
            let duration_ms = started.elapsed().as_millis() as u64;
            counter!("hs_http_attempts_total").increment(1);

            let (response, decision) = match result {
                Ok(response) => {
                    let outcome = AttemptOutcome::Status(response.status_code());
                    let decision = self.classifier.decide(&policy, attempt, outcome)?;
                    (response, decision)
                }
                Err(e) => {
                    let decision = if e.is_retryable() {
                        self.classifier
                            .decide(&policy, attempt, AttemptOutcome::TransportError)?
                    } else {
                        RetryDecision::StopFailure
                    };
                    debug!(
                        url = %request.url(),
                        attempt = attempt,
                        error = %e,
                        "Request attempt failed"
                    );
                    (HttpResponse::transport_failure(e.to_string()), decision)
                }
            };

            if decision == RetryDecision::Retry {
                let delay = backoff.compute_delay(attempt);
                warn!(
                    url = %request.url(),
                    attempt = attempt,
                    status = response.status_code(),
                    error = %response.status_message(),
                    delay_ms = delay.as_millis() as u64,
                    "Retrying request"
                );
                counter!("hs_http_retries_total").increment(1);
                tokio::time::sleep(delay).await;
                continue;
            }

            let success = decision == RetryDecision::StopSuccess;
            let label = if success { "true" } else { "false" };
            counter!("hs_http_exchanges_total", "success" => label).increment(1);

            if success {
                info!(
                    url = %request.url(),
                    status = response.status_code(),
                    attempts = attempt,
                    duration_ms = duration_ms,
                    "Request completed"
                );
            } else {
                warn!(
                    url = %request.url(),
                    status = response.status_code(),
                    attempts = attempt,
                    "Request failed"
                );
            }

            return Ok(HttpExchange::new(
                request,
                response,
                duration_ms,
                moment,
                attempt,
                success,
            ));
        }
    }
}
