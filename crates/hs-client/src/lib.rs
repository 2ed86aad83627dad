//! HttpSink invocation engine
//!
//! This crate executes one logical HTTP call with retries:
//! - RetryPolicy / RetryClassifier: retry-or-stop decisions from the success pattern
//! - Backoff: exponential delay with jitter between attempts
//! - HttpTransport: native call seam, ReqwestTransport in production
//! - HttpInvoker: attempt loop producing exactly one HttpExchange per call

pub mod backoff;
pub mod error;
pub mod invoker;
pub mod retry;
pub mod transport;

pub use backoff::Backoff;
pub use error::TransportError;
pub use invoker::HttpInvoker;
pub use retry::{AttemptOutcome, RetryClassifier, RetryDecision, RetryPolicy};
pub use transport::{HttpTransport, ReqwestTransport};
