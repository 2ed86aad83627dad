use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordHeader {
    pub key: String,
    pub value: String,
}

/// Inbound record; `value` holds an `HttpRequestRecord` as JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinkRecord {
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<RecordHeader>,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
}

impl SinkRecord {
    pub fn new(topic: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            topic: topic.into(),
            key: None,
            headers: Vec::new(),
            value: Some(value),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(RecordHeader {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// Last value for `key`, as record headers may repeat
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .rev()
            .find(|h| h.key == key)
            .map(|h| h.value.as_str())
    }
}

/// Outbound record; `schema` names the shape of `value`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub schema: String,
    pub schema_version: u32,
    pub value: serde_json::Value,
}
