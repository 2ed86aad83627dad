//! HttpSink common types
//!
//! Shared data model for the HTTP sink:
//! - HttpRequest: immutable description of one outbound call
//! - HttpResponse: the response of one attempt
//! - HttpExchange: request + final response + attempts + timing
//! - Acknowledgement: flattened, header-oriented projection of an exchange
//! - schema: versioned structured records used on the wire

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub mod schema;

/// Header name to ordered header values
pub type Headers = IndexMap<String, Vec<String>>;

/// Status code carried by the synthetic response built after a transport failure
pub const SERVER_ERROR_STATUS_CODE: u16 = 500;

pub const BLANK_RESPONSE_CONTENT: &str = "";

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Trace,
    Connect,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Trace => "TRACE",
            HttpMethod::Connect => "CONNECT",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = SinkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            "TRACE" => Ok(HttpMethod::Trace),
            "CONNECT" => Ok(HttpMethod::Connect),
            _ => Err(SinkError::InvalidMethod(s.to_string())),
        }
    }
}

/// Discriminator of the active body representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BodyType {
    String,
    ByteArray,
    Multipart,
}

impl BodyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BodyType::String => "STRING",
            BodyType::ByteArray => "BYTE_ARRAY",
            BodyType::Multipart => "MULTIPART",
        }
    }
}

/// Request body, exactly one representation is active
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HttpBody {
    String(String),
    ByteArray(Vec<u8>),
    /// One byte sequence per part
    Multipart(Vec<Vec<u8>>),
}

impl HttpBody {
    pub fn body_type(&self) -> BodyType {
        match self {
            HttpBody::String(_) => BodyType::String,
            HttpBody::ByteArray(_) => BodyType::ByteArray,
            HttpBody::Multipart(_) => BodyType::Multipart,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            HttpBody::String(s) => s.is_empty(),
            HttpBody::ByteArray(b) => b.is_empty(),
            HttpBody::Multipart(parts) => parts.is_empty(),
        }
    }

    /// Text rendering used by acknowledgements: byte bodies are base64 encoded,
    /// multipart parts are encoded individually and joined with ','
    pub fn as_text(&self) -> String {
        match self {
            HttpBody::String(s) => s.clone(),
            HttpBody::ByteArray(b) => BASE64.encode(b),
            HttpBody::Multipart(parts) => parts
                .iter()
                .map(|p| BASE64.encode(p))
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

impl Default for HttpBody {
    fn default() -> Self {
        HttpBody::String(String::new())
    }
}

/// Per-call overrides of the configured retry policy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetryOverrides {
    pub retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub retry_max_delay_ms: Option<u64>,
    pub retry_delay_factor: Option<f64>,
    pub retry_jitter_ms: Option<u64>,
}

impl RetryOverrides {
    pub fn is_empty(&self) -> bool {
        self == &RetryOverrides::default()
    }
}

/// Immutable description of one outbound HTTP call.
///
/// Built through [`HttpRequestBuilder`]; there are no setters once built.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    request_id: Option<String>,
    correlation_id: Option<String>,
    url: String,
    method: HttpMethod,
    headers: Headers,
    timeout_ms: Option<u64>,
    retry: RetryOverrides,
    body: HttpBody,
}

impl HttpRequest {
    pub fn builder() -> HttpRequestBuilder {
        HttpRequestBuilder::default()
    }

    /// Reopen this request as a builder, e.g. to fill in generated identifiers
    pub fn into_builder(self) -> HttpRequestBuilder {
        let mut builder = HttpRequestBuilder {
            request_id: self.request_id,
            correlation_id: self.correlation_id,
            url: Some(self.url),
            method: Some(self.method),
            headers: self.headers,
            timeout_ms: self.timeout_ms,
            retry: self.retry,
            ..Default::default()
        };
        builder.set_body(self.body);
        builder
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Case-insensitive header lookup
    pub fn header_values(&self, name: &str) -> Option<&[String]> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_slice())
    }

    pub fn timeout_ms(&self) -> Option<u64> {
        self.timeout_ms
    }

    pub fn retry_overrides(&self) -> &RetryOverrides {
        &self.retry
    }

    pub fn body(&self) -> &HttpBody {
        &self.body
    }

    pub fn body_type(&self) -> BodyType {
        self.body.body_type()
    }
}

/// Builder for [`HttpRequest`]. At most one body representation may be set.
#[derive(Debug, Clone, Default)]
pub struct HttpRequestBuilder {
    request_id: Option<String>,
    correlation_id: Option<String>,
    url: Option<String>,
    method: Option<HttpMethod>,
    headers: Headers,
    timeout_ms: Option<u64>,
    retry: RetryOverrides,
    body_as_string: Option<String>,
    body_as_byte_array: Option<Vec<u8>>,
    body_as_multipart: Option<Vec<Vec<u8>>>,
}

impl HttpRequestBuilder {
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn method(mut self, method: HttpMethod) -> Self {
        self.method = Some(method);
        self
    }

    pub fn request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Append a value to a header, keeping earlier values
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.entry(name.into()).or_default().push(value.into());
        self
    }

    pub fn headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    /// Add a header only when no header with that name (case-insensitive) exists
    pub fn default_header(self, name: &str, value: &str) -> Self {
        if self.headers.keys().any(|k| k.eq_ignore_ascii_case(name)) {
            self
        } else {
            self.header(name, value)
        }
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn retry_overrides(mut self, retry: RetryOverrides) -> Self {
        self.retry = retry;
        self
    }

    pub fn body_as_string(mut self, body: impl Into<String>) -> Self {
        self.body_as_string = Some(body.into());
        self
    }

    pub fn body_as_byte_array(mut self, body: Vec<u8>) -> Self {
        self.body_as_byte_array = Some(body);
        self
    }

    pub fn body_as_multipart(mut self, parts: Vec<Vec<u8>>) -> Self {
        self.body_as_multipart = Some(parts);
        self
    }

    pub fn body(mut self, body: HttpBody) -> Self {
        self.set_body(body);
        self
    }

    fn set_body(&mut self, body: HttpBody) {
        match body {
            HttpBody::String(s) => self.body_as_string = Some(s),
            HttpBody::ByteArray(b) => self.body_as_byte_array = Some(b),
            HttpBody::Multipart(parts) => self.body_as_multipart = Some(parts),
        }
    }

    pub fn build(self) -> Result<HttpRequest> {
        let url = self
            .url
            .filter(|u| !u.trim().is_empty())
            .ok_or(SinkError::MissingField("url"))?;
        let method = self.method.ok_or(SinkError::MissingField("method"))?;

        let supplied = [
            self.body_as_string.is_some(),
            self.body_as_byte_array.is_some(),
            self.body_as_multipart.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count();
        if supplied > 1 {
            return Err(SinkError::AmbiguousBody);
        }

        let body = match (self.body_as_string, self.body_as_byte_array, self.body_as_multipart) {
            (Some(s), _, _) => HttpBody::String(s),
            (_, Some(b), _) => HttpBody::ByteArray(b),
            (_, _, Some(parts)) => HttpBody::Multipart(parts),
            _ => HttpBody::default(),
        };

        Ok(HttpRequest {
            request_id: self.request_id,
            correlation_id: self.correlation_id,
            url,
            method,
            headers: self.headers,
            timeout_ms: self.timeout_ms,
            retry: self.retry,
            body,
        })
    }
}

// ============================================================================
// Response Types
// ============================================================================

/// Response of a single attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    status_code: u16,
    status_message: String,
    body: String,
    headers: Headers,
}

impl HttpResponse {
    pub fn new(
        status_code: u16,
        status_message: impl Into<String>,
        body: impl Into<String>,
        headers: Headers,
    ) -> Self {
        Self {
            status_code,
            status_message: status_message.into(),
            body: body.into(),
            headers,
        }
    }

    /// Synthetic response standing in for an attempt that never got a response
    pub fn transport_failure(message: impl Into<String>) -> Self {
        Self::new(
            SERVER_ERROR_STATUS_CODE,
            message,
            BLANK_RESPONSE_CONTENT,
            Headers::new(),
        )
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }
}

// ============================================================================
// Exchange Types
// ============================================================================

/// Complete record of one logical call: the request, the last attempt's
/// response, and timing / attempt metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpExchange {
    request: HttpRequest,
    response: HttpResponse,
    /// Elapsed time of the last attempt
    duration_ms: u64,
    /// When the last attempt began
    moment: DateTime<Utc>,
    attempts: u32,
    success: bool,
}

impl HttpExchange {
    /// `attempts` is clamped to at least one.
    ///
    /// `success` is the caller's verdict on the final response (the invoker
    /// sets it from the success pattern), not a function of the status alone.
    pub fn new(
        request: HttpRequest,
        response: HttpResponse,
        duration_ms: u64,
        moment: DateTime<Utc>,
        attempts: u32,
        success: bool,
    ) -> Self {
        Self {
            request,
            response,
            duration_ms,
            moment,
            attempts: attempts.max(1),
            success,
        }
    }

    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    pub fn response(&self) -> &HttpResponse {
        &self.response
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn moment(&self) -> DateTime<Utc> {
        self.moment
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_success(&self) -> bool {
        self.success
    }
}

// ============================================================================
// Acknowledgement Types
// ============================================================================

/// Flattened exchange used when correlation context travels in message headers.
///
/// Headers are ordered key/value pairs; a header with several values yields
/// one pair per value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Acknowledgement {
    pub request_id: String,
    pub correlation_id: String,
    pub status_code: u16,
    pub status_message: String,
    pub response_headers: Vec<(String, String)>,
    pub response_body: String,
    pub request_uri: String,
    pub request_headers: Vec<(String, String)>,
    pub method: String,
    pub request_body: String,
    pub duration_ms: u64,
    pub moment: DateTime<Utc>,
    pub attempts: u32,
    pub success: bool,
}

impl TryFrom<&HttpExchange> for Acknowledgement {
    type Error = SinkError;

    fn try_from(exchange: &HttpExchange) -> Result<Self> {
        let request = exchange.request();
        let response = exchange.response();
        let correlation_id = request
            .correlation_id()
            .ok_or(SinkError::MissingField("correlationId"))?;
        let request_id = request
            .request_id()
            .ok_or(SinkError::MissingField("requestId"))?;

        Ok(Self {
            request_id: request_id.to_string(),
            correlation_id: correlation_id.to_string(),
            status_code: response.status_code(),
            status_message: response.status_message().to_string(),
            response_headers: flatten_headers(response.headers()),
            response_body: response.body().to_string(),
            request_uri: request.url().to_string(),
            request_headers: flatten_headers(request.headers()),
            method: request.method().to_string(),
            request_body: request.body().as_text(),
            duration_ms: exchange.duration_ms(),
            moment: exchange.moment(),
            attempts: exchange.attempts(),
            success: exchange.is_success(),
        })
    }
}

pub fn flatten_headers(headers: &Headers) -> Vec<(String, String)> {
    headers
        .iter()
        .flat_map(|(name, values)| values.iter().map(move |v| (name.clone(), v.clone())))
        .collect()
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("'{0}' is required but missing")]
    MissingField(&'static str),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("More than one body representation supplied")]
    AmbiguousBody,

    #[error("Unsupported HTTP method: {0}")]
    InvalidMethod(String),

    #[error("Invalid success pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for SinkError {
    fn from(e: serde_json::Error) -> Self {
        SinkError::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SinkError>;
