//! The consumer loop: POLL, DECODE, APPLY, COMMIT.
//!
//! Delivery is at-least-once. A record's offset is committed after the handler
//! returns, whether it succeeded or not, so a failed apply is logged and never
//! retried while a crash before commit redelivers the record. Undecodable
//! records are logged and committed past without reaching the handler.

use std::time::Duration;

use orderflow_core::decode;
use orderflow_log::{LogConsumer, LogRecord};
use tokio::sync::watch;

use crate::error::Result;
use crate::writer::{OrderHandler, StorageWriter, WriteOutcome};

/// Pause after a failed poll when no other backoff is configured.
pub const DEFAULT_POLL_BACKOFF: Duration = Duration::from_millis(250);

/// Result of processing one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Decoded and fully applied.
    Applied(WriteOutcome),
    /// Could not be decoded; the handler was not invoked.
    Dropped,
    /// Decoded, but the handler reported an error.
    Failed,
}

/// Per-loop record tallies.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConsumerStats {
    /// Records applied.
    pub applied: u64,
    /// Records dropped as undecodable.
    pub dropped: u64,
    /// Records whose apply failed.
    pub failed: u64,
}

impl ConsumerStats {
    /// Count one outcome.
    pub fn record(&mut self, outcome: &RecordOutcome) {
        match outcome {
            RecordOutcome::Applied(_) => self.applied += 1,
            RecordOutcome::Dropped => self.dropped += 1,
            RecordOutcome::Failed => self.failed += 1,
        }
    }

    /// Total records processed.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.applied + self.dropped + self.failed
    }

    fn merge(&mut self, other: Self) {
        self.applied += other.applied;
        self.dropped += other.dropped;
        self.failed += other.failed;
    }
}

/// Drives records from a [`LogConsumer`] into an [`OrderHandler`].
///
/// Records are processed one at a time, so per-partition (and per-user) order
/// is preserved.
pub struct ConsumerLoop<H = StorageWriter> {
    consumer: LogConsumer,
    handler: H,
    poll_backoff: Duration,
}

impl<H: OrderHandler> ConsumerLoop<H> {
    /// Create a loop feeding `handler` from `consumer`.
    #[must_use]
    pub fn new(consumer: LogConsumer, handler: H) -> Self {
        Self {
            consumer,
            handler,
            poll_backoff: DEFAULT_POLL_BACKOFF,
        }
    }

    /// Set the pause after a failed poll.
    #[must_use]
    pub fn with_poll_backoff(mut self, backoff: Duration) -> Self {
        self.poll_backoff = backoff;
        self
    }

    /// The underlying log consumer.
    #[must_use]
    pub fn consumer(&self) -> &LogConsumer {
        &self.consumer
    }

    /// Decode and apply one record. Does not commit.
    pub async fn process(&self, record: &LogRecord) -> RecordOutcome {
        let event = match decode(&record.value) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(
                    partition = record.partition,
                    offset = record.offset,
                    error = %e,
                    payload = %String::from_utf8_lossy(&record.value),
                    "Dropping undecodable record"
                );
                return RecordOutcome::Dropped;
            }
        };

        match self.handler.apply(&event).await {
            Ok(outcome) => RecordOutcome::Applied(outcome),
            Err(e) => {
                tracing::error!(
                    partition = record.partition,
                    offset = record.offset,
                    user_id = %event.user_id,
                    menu_type = %event.menu_type,
                    error = %e,
                    "Failed to apply order"
                );
                RecordOutcome::Failed
            }
        }
    }

    /// Process and commit one record.
    async fn handle(&self, record: &LogRecord) -> RecordOutcome {
        let outcome = self.process(record).await;
        if let Err(e) = self.consumer.commit(record) {
            // The record will be delivered again after a restart.
            tracing::warn!(
                partition = record.partition,
                offset = record.offset,
                error = %e,
                "Failed to commit offset"
            );
        }
        outcome
    }

    /// Poll one batch and process every record in it.
    ///
    /// # Errors
    ///
    /// Returns an error if the poll fails; nothing was processed then.
    pub async fn run_once(&mut self) -> Result<ConsumerStats> {
        let batch = self.consumer.poll().await?;
        let mut stats = ConsumerStats::default();
        for record in &batch {
            stats.record(&self.handle(record).await);
        }
        Ok(stats)
    }

    /// Run until `shutdown` turns `true` or its sender is dropped.
    ///
    /// Poll errors are logged and retried after the backoff; they never end
    /// the loop. Shutdown is observed while waiting for records and between
    /// records, so a record being applied is finished and committed first.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> ConsumerStats {
        let mut stats = ConsumerStats::default();
        tracing::info!(
            topic = %self.consumer.topic(),
            group = %self.consumer.member().group_id,
            partitions = ?self.consumer.assignment(),
            "Consumer loop started"
        );

        'poll: while !*shutdown.borrow() {
            let polled = tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break 'poll;
                    }
                    continue;
                }
                polled = self.consumer.poll() => polled,
            };

            let batch = match polled {
                Ok(batch) => batch,
                Err(e) => {
                    tracing::warn!(error = %e, "Poll failed; retrying");
                    tokio::select! {
                        biased;
                        changed = shutdown.changed() => {
                            if changed.is_err() {
                                break 'poll;
                            }
                        }
                        () = tokio::time::sleep(self.poll_backoff) => {}
                    }
                    continue;
                }
            };

            let mut batch_stats = ConsumerStats::default();
            for record in &batch {
                if *shutdown.borrow() {
                    break;
                }
                batch_stats.record(&self.handle(record).await);
            }
            stats.merge(batch_stats);
        }

        tracing::info!(
            applied = stats.applied,
            dropped = stats.dropped,
            failed = stats.failed,
            "Consumer loop stopped"
        );
        stats
    }
}
