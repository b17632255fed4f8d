//! Durable partitioned log for orderflow.
//!
//! The log is an append-only, ordered message transport. A topic is split
//! into a fixed number of partitions; a message's key picks its partition, so
//! all messages sharing a key are totally ordered. Consumers read a partition
//! from an offset and record progress per consumer group.
//!
//! # Backends
//!
//! - [`RocksLog`]: durable storage in `RocksDB` column families (feature
//!   `rocksdb-backend`, on by default)
//! - [`MemoryLog`]: process-local, for tests and ephemeral runs
//!
//! # Example
//!
//! ```no_run
//! use orderflow_log::{EventLog, MemoryLog};
//!
//! let log = MemoryLog::new();
//! log.create_topic("order-logs", 4).unwrap();
//! let position = log.append("order-logs", b"u1", b"payload").unwrap();
//! let records = log.read("order-logs", position.partition, 0, 1024).unwrap();
//! assert_eq!(records[0].value, b"payload");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod consumer;
pub mod error;
pub mod memory;
pub mod partition;
#[cfg(feature = "rocksdb-backend")]
pub mod rocks;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

pub use consumer::{FetchPolicy, GroupMember, LogConsumer};
pub use error::{LogError, Result};
pub use memory::MemoryLog;
pub use partition::partition_for;
#[cfg(feature = "rocksdb-backend")]
pub use rocks::RocksLog;

/// Where an appended record landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPosition {
    /// Partition the record was written to.
    pub partition: u32,
    /// Offset within the partition.
    pub offset: u64,
}

/// A record read back from the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Topic name.
    pub topic: String,
    /// Partition number.
    pub partition: u32,
    /// Offset within the partition.
    pub offset: u64,
    /// Message key (the partitioning key).
    pub key: Vec<u8>,
    /// Message value.
    pub value: Vec<u8>,
    /// When the log acknowledged the append.
    pub appended_at: DateTime<Utc>,
}

impl LogRecord {
    /// Size counted against fetch byte limits.
    #[must_use]
    pub fn size(&self) -> usize {
        self.key.len() + self.value.len()
    }
}

/// The log trait defining all transport operations.
///
/// Implementations must be safe for concurrent use: appends from many request
/// handlers and reads from many consumer loops share one instance.
pub trait EventLog: Send + Sync {
    /// Create a topic with `partitions` partitions.
    ///
    /// Creating an existing topic is a no-op; the existing partition count is
    /// returned either way.
    ///
    /// # Errors
    ///
    /// Returns `LogError::InvalidTopic` for an empty name or zero partitions.
    fn create_topic(&self, topic: &str, partitions: u32) -> Result<u32>;

    /// Number of partitions of a topic.
    ///
    /// # Errors
    ///
    /// Returns `LogError::UnknownTopic` if the topic does not exist.
    fn partition_count(&self, topic: &str) -> Result<u32>;

    /// Append a message; the key selects the partition.
    ///
    /// Returns only after the backend has accepted the write.
    ///
    /// # Errors
    ///
    /// Returns an error if the topic is unknown or the write fails.
    fn append(&self, topic: &str, key: &[u8], value: &[u8]) -> Result<RecordPosition>;

    /// Read records of one partition starting at `from_offset`.
    ///
    /// Stops before exceeding `max_bytes`, but always returns the first
    /// available record even if it alone is larger.
    ///
    /// # Errors
    ///
    /// Returns an error if the topic or partition is unknown or the read fails.
    fn read(
        &self,
        topic: &str,
        partition: u32,
        from_offset: u64,
        max_bytes: usize,
    ) -> Result<Vec<LogRecord>>;

    /// The offset the next append to this partition will receive.
    ///
    /// # Errors
    ///
    /// Returns an error if the topic or partition is unknown.
    fn end_offset(&self, topic: &str, partition: u32) -> Result<u64>;

    /// The committed offset of a consumer group, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend read fails.
    fn committed(&self, group: &str, topic: &str, partition: u32) -> Result<Option<u64>>;

    /// Record that `group` has processed everything before `next_offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend write fails.
    fn commit(&self, group: &str, topic: &str, partition: u32, next_offset: u64) -> Result<()>;

    /// Signalled after every successful append.
    fn notifier(&self) -> Arc<Notify>;
}

/// Longest accepted topic name, in bytes.
pub const MAX_TOPIC_LEN: usize = 249;

/// Reject empty or overlong topic names and zero partition counts.
pub(crate) fn validate_topic(topic: &str, partitions: u32) -> Result<()> {
    if topic.is_empty() {
        return Err(LogError::InvalidTopic("topic name must not be empty".into()));
    }
    if topic.len() > MAX_TOPIC_LEN {
        return Err(LogError::InvalidTopic(format!(
            "topic name longer than {MAX_TOPIC_LEN} bytes"
        )));
    }
    if partitions == 0 {
        return Err(LogError::InvalidTopic(format!(
            "topic {topic} needs at least one partition"
        )));
    }
    Ok(())
}

/// Take records from the front of `records` within the byte budget.
///
/// The first record is always taken, however large. Iteration stops at the
/// first record that would overflow the budget or at the first error, so the
/// backends only decode what they return.
pub(crate) fn take_within_budget(
    records: impl Iterator<Item = Result<LogRecord>>,
    max_bytes: usize,
) -> Result<Vec<LogRecord>> {
    let mut out = Vec::new();
    let mut used = 0usize;
    for record in records {
        let record = record?;
        let size = record.size();
        if !out.is_empty() && used + size > max_bytes {
            break;
        }
        used += size;
        out.push(record);
    }
    Ok(out)
}
