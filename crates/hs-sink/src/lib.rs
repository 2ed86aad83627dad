//! HttpSink adapter layer
//!
//! Connects the invocation engine to record streams:
//! - `HttpSinkTask`: inbound records -> HTTP calls -> exchanges published to a named queue
//! - `AckSourceTask`: drains that queue into outbound records on a success or errors topic

pub mod record;
pub mod sink;
pub mod source;

pub use record::{RecordHeader, SinkRecord, SourceRecord};
pub use sink::{HttpSinkTask, SUCCESS_CODE_HEADER};
pub use source::AckSourceTask;

/// Payload carried through the in-memory queue between sink and source
pub type ExchangeBroker = hs_queue::QueueBroker<hs_common::HttpExchange>;
