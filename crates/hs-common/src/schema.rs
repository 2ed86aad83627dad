//! Versioned structured records
//!
//! Wire shape of requests, responses and exchanges. Field names are fixed
//! (camelCase) and byte bodies travel base64 encoded in JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    BodyType, Headers, HttpBody, HttpExchange, HttpMethod, HttpRequest, HttpResponse,
    RetryOverrides, Result, SinkError,
};

/// Version stamped on every emitted record value
pub const VERSION: u32 = 1;
pub const EXCHANGE_SCHEMA_NAME: &str = "hs.HttpExchange";
pub const ACKNOWLEDGEMENT_SCHEMA_NAME: &str = "hs.Acknowledgement";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpRequestRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_in_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_delay_in_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_max_delay_in_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_delay_factor: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_jitter: Option<u64>,
    pub url: String,
    #[serde(default)]
    pub headers: Headers,
    pub method: String,
    #[serde(default = "default_body_type")]
    pub body_type: BodyType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_as_string: Option<String>,
    #[serde(default, with = "base64_bytes", skip_serializing_if = "Option::is_none")]
    pub body_as_byte_array: Option<Vec<u8>>,
    #[serde(default, with = "base64_parts", skip_serializing_if = "Vec::is_empty")]
    pub body_as_multipart: Vec<Vec<u8>>,
}

fn default_body_type() -> BodyType {
    BodyType::String
}

impl From<&HttpRequest> for HttpRequestRecord {
    fn from(request: &HttpRequest) -> Self {
        let retry = request.retry_overrides();
        let (body_as_string, body_as_byte_array, body_as_multipart) = match request.body() {
            HttpBody::String(s) => (Some(s.clone()), None, Vec::new()),
            HttpBody::ByteArray(b) => (None, Some(b.clone()), Vec::new()),
            HttpBody::Multipart(parts) => (None, None, parts.clone()),
        };

        Self {
            request_id: request.request_id().map(str::to_string),
            correlation_id: request.correlation_id().map(str::to_string),
            timeout_in_ms: request.timeout_ms(),
            retries: retry.retries,
            retry_delay_in_ms: retry.retry_delay_ms,
            retry_max_delay_in_ms: retry.retry_max_delay_ms,
            retry_delay_factor: retry.retry_delay_factor,
            retry_jitter: retry.retry_jitter_ms,
            url: request.url().to_string(),
            headers: request.headers().clone(),
            method: request.method().to_string(),
            body_type: request.body_type(),
            body_as_string,
            body_as_byte_array,
            body_as_multipart,
        }
    }
}

impl TryFrom<HttpRequestRecord> for HttpRequest {
    type Error = SinkError;

    /// The `bodyType` discriminator selects the body; any other populated
    /// body field is rejected.
    fn try_from(record: HttpRequestRecord) -> Result<Self> {
        let method: HttpMethod = record.method.parse()?;

        let stray_string = record.body_as_string.as_ref().is_some_and(|s| !s.is_empty());
        let stray_bytes = record.body_as_byte_array.as_ref().is_some_and(|b| !b.is_empty());
        let stray_parts = !record.body_as_multipart.is_empty();

        let body = match record.body_type {
            BodyType::String => {
                if stray_bytes || stray_parts {
                    return Err(SinkError::AmbiguousBody);
                }
                HttpBody::String(record.body_as_string.unwrap_or_default())
            }
            BodyType::ByteArray => {
                if stray_string || stray_parts {
                    return Err(SinkError::AmbiguousBody);
                }
                HttpBody::ByteArray(record.body_as_byte_array.unwrap_or_default())
            }
            BodyType::Multipart => {
                if stray_string || stray_bytes {
                    return Err(SinkError::AmbiguousBody);
                }
                HttpBody::Multipart(record.body_as_multipart)
            }
        };

        let mut builder = HttpRequest::builder()
            .url(record.url)
            .method(method)
            .headers(record.headers)
            .body(body)
            .retry_overrides(RetryOverrides {
                retries: record.retries,
                retry_delay_ms: record.retry_delay_in_ms,
                retry_max_delay_ms: record.retry_max_delay_in_ms,
                retry_delay_factor: record.retry_delay_factor,
                retry_jitter_ms: record.retry_jitter,
            });
        if let Some(id) = record.request_id {
            builder = builder.request_id(id);
        }
        if let Some(id) = record.correlation_id {
            builder = builder.correlation_id(id);
        }
        if let Some(timeout) = record.timeout_in_ms {
            builder = builder.timeout_ms(timeout);
        }
        builder.build()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpResponseRecord {
    pub status_code: u16,
    #[serde(default)]
    pub status_message: String,
    #[serde(default)]
    pub response_body: String,
    #[serde(default)]
    pub response_headers: Headers,
}

impl From<&HttpResponse> for HttpResponseRecord {
    fn from(response: &HttpResponse) -> Self {
        Self {
            status_code: response.status_code(),
            status_message: response.status_message().to_string(),
            response_body: response.body().to_string(),
            response_headers: response.headers().clone(),
        }
    }
}

impl TryFrom<HttpResponseRecord> for HttpResponse {
    type Error = SinkError;

    fn try_from(record: HttpResponseRecord) -> Result<Self> {
        if record.status_code == 0 {
            return Err(SinkError::InvalidRequest(
                "response status code must be positive".to_string(),
            ));
        }
        Ok(HttpResponse::new(
            record.status_code,
            record.status_message,
            record.response_body,
            record.response_headers,
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpExchangeRecord {
    pub duration_in_millis: u64,
    pub moment: DateTime<Utc>,
    pub attempts: u32,
    pub success: bool,
    pub http_request: HttpRequestRecord,
    pub http_response: HttpResponseRecord,
}

impl HttpExchangeRecord {
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

impl From<&HttpExchange> for HttpExchangeRecord {
    fn from(exchange: &HttpExchange) -> Self {
        Self {
            duration_in_millis: exchange.duration_ms(),
            moment: exchange.moment(),
            attempts: exchange.attempts(),
            success: exchange.is_success(),
            http_request: HttpRequestRecord::from(exchange.request()),
            http_response: HttpResponseRecord::from(exchange.response()),
        }
    }
}

impl TryFrom<HttpExchangeRecord> for HttpExchange {
    type Error = SinkError;

    fn try_from(record: HttpExchangeRecord) -> Result<Self> {
        Ok(HttpExchange::new(
            HttpRequest::try_from(record.http_request)?,
            HttpResponse::try_from(record.http_response)?,
            record.duration_in_millis,
            record.moment,
            record.attempts,
            record.success,
        ))
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => serializer.serialize_some(&BASE64.encode(b)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        encoded
            .map(|s| BASE64.decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

mod base64_parts {
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine as _;
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(parts: &[Vec<u8>], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(parts.len()))?;
        for part in parts {
            seq.serialize_element(&BASE64.encode(part))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Vec<u8>>, D::Error> {
        let encoded: Vec<String> = Vec::deserialize(deserializer)?;
        encoded
            .into_iter()
            .map(|s| BASE64.decode(s).map_err(serde::de::Error::custom))
            .collect()
    }
}
