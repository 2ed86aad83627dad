use thiserror::Error;

/// Failure of a single attempt before any HTTP response was received
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Request failed: {0}")]
    Request(String),

    /// The request could not be turned into a native call (bad header, bad URL)
    #[error("Could not build request: {0}")]
    Build(String),
}

impl TransportError {
    /// Everything but a build failure may succeed on another attempt
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TransportError::Build(_))
    }

    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_builder() {
            TransportError::Build(e.to_string())
        } else if e.is_timeout() {
            TransportError::Timeout(e.to_string())
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else {
            TransportError::Request(e.to_string())
        }
    }
}
