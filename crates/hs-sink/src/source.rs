//! AckSourceTask - drains exchanges from a named queue into outbound records
//!
//! Registering as the queue's consumer is what makes the sink side start
//! publishing, so nothing accumulates before `start` is called.
//!
//! Each record value is either the structured exchange record or the
//! flattened acknowledgement, per `SourceTaskSettings::record_format`.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tracing::{debug, info, warn};

use hs_common::schema::{
    HttpExchangeRecord, ACKNOWLEDGEMENT_SCHEMA_NAME, EXCHANGE_SCHEMA_NAME, VERSION,
};
use hs_common::{Acknowledgement, HttpExchange, Result};
use hs_config::{SourceRecordFormat, SourceTaskSettings};
use hs_queue::MessageQueue;

use crate::record::SourceRecord;
use crate::ExchangeBroker;

pub struct AckSourceTask {
    broker: Arc<ExchangeBroker>,
    settings: SourceTaskSettings,
    queue: Option<Arc<MessageQueue<HttpExchange>>>,
}

impl AckSourceTask {
    pub fn new(broker: Arc<ExchangeBroker>, settings: SourceTaskSettings) -> Self {
        Self {
            broker,
            settings,
            queue: None,
        }
    }

    /// Register as consumer of the configured queue
    pub fn start(&mut self) -> hs_queue::Result<()> {
        self.broker.register_consumer(&self.settings.queue_name)?;
        self.queue = Some(self.broker.get_queue(&self.settings.queue_name));
        info!(
            queue = %self.settings.queue_name,
            success_topic = %self.settings.success_topic,
            errors_topic = %self.settings.errors_topic,
            format = ?self.settings.record_format,
            "Ack source started"
        );
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.queue.is_some()
    }

    /// Drain up to `poll_batch_size` exchanges without waiting.
    ///
    /// Exchanges that cannot be converted are logged and skipped.
    pub fn poll(&self) -> Vec<SourceRecord> {
        let Some(queue) = &self.queue else {
            return Vec::new();
        };
        let batch = queue.drain(self.settings.poll_batch_size.max(1));
        if !batch.is_empty() {
            debug!(queue = %queue.name(), count = batch.len(), "Polled exchanges");
        }
        self.convert(batch.iter())
    }

    /// Wait up to `timeout` for the first exchange, then drain like `poll`
    pub async fn poll_wait(&self, timeout: Duration) -> Vec<SourceRecord> {
        let Some(queue) = &self.queue else {
            return Vec::new();
        };
        let Some(first) = queue.recv_timeout(timeout).await else {
            return Vec::new();
        };

        let rest = queue.drain(self.settings.poll_batch_size.max(1) - 1);
        self.convert(std::iter::once(&first).chain(rest.iter()))
    }

    fn convert<'a>(&self, exchanges: impl Iterator<Item = &'a HttpExchange>) -> Vec<SourceRecord> {
        exchanges
            .filter_map(|exchange| match self.to_source_record(exchange) {
                Ok(record) => Some(record),
                Err(e) => {
                    counter!("hs_source_skipped_total").increment(1);
                    warn!(
                        url = %exchange.request().url(),
                        error = %e,
                        "Skipping exchange that cannot be emitted"
                    );
                    None
                }
            })
            .collect()
    }

    /// Route an exchange to the success or errors topic, keyed by correlation id
    pub fn to_source_record(&self, exchange: &HttpExchange) -> Result<SourceRecord> {
        let topic = if exchange.is_success() {
            &self.settings.success_topic
        } else {
            &self.settings.errors_topic
        };

        let (schema, value) = match self.settings.record_format {
            SourceRecordFormat::Exchange => (
                EXCHANGE_SCHEMA_NAME,
                HttpExchangeRecord::from(exchange).to_json()?,
            ),
            SourceRecordFormat::Acknowledgement => (
                ACKNOWLEDGEMENT_SCHEMA_NAME,
                serde_json::to_value(Acknowledgement::try_from(exchange)?)?,
            ),
        };

        Ok(SourceRecord {
            topic: topic.clone(),
            key: exchange.request().correlation_id().map(str::to_string),
            schema: schema.to_string(),
            schema_version: VERSION,
            value,
        })
    }
}
