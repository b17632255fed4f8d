//! Ingest side: encode an order event and append it to the log.

use std::sync::Arc;

use orderflow_core::{encode, OrderEvent};
use orderflow_log::{EventLog, RecordPosition};

use crate::error::Result;

/// Appends order events to one topic, keyed by user id.
///
/// Keying by user keeps every event of a user in one partition, and so in
/// submission order. There is no retry and no deduplication: a caller that
/// resubmits produces a second record.
#[derive(Clone)]
pub struct OrderProducer {
    log: Arc<dyn EventLog>,
    topic: String,
}

impl OrderProducer {
    /// Create a producer for `topic`.
    #[must_use]
    pub fn new(log: Arc<dyn EventLog>, topic: impl Into<String>) -> Self {
        Self {
            log,
            topic: topic.into(),
        }
    }

    /// Topic this producer appends to.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Encode and append `event`, returning once the log acknowledged it.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Log` if the append fails.
    pub fn submit(&self, event: &OrderEvent) -> Result<RecordPosition> {
        let value = encode(event);
        let position = self
            .log
            .append(&self.topic, event.user_id.as_bytes(), &value)?;

        tracing::debug!(
            user_id = %event.user_id,
            partition = position.partition,
            offset = position.offset,
            "Order appended"
        );

        Ok(position)
    }
}
