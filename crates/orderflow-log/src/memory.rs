//! In-memory log implementation.
//!
//! Same semantics as the `RocksDB` backend without durability across process
//! restarts. A single `Arc<MemoryLog>` shared by several consumers behaves like
//! one broker.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tokio::sync::Notify;

use crate::error::{LogError, Result};
use crate::{partition_for, take_within_budget, validate_topic, EventLog, LogRecord, RecordPosition};

#[derive(Default)]
struct Inner {
    /// Topic name to partitions, each an offset-indexed vector.
    topics: HashMap<String, Vec<Vec<LogRecord>>>,
    /// `(group, topic, partition)` to the next offset to consume.
    offsets: HashMap<(String, String, u32), u64>,
}

/// Process-local log backend.
#[derive(Default)]
pub struct MemoryLog {
    inner: Mutex<Inner>,
    notify: Arc<Notify>,
}

impl MemoryLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| LogError::Database("memory log lock poisoned".into()))
    }
}

fn partition<'a>(
    inner: &'a Inner,
    topic: &str,
    partition: u32,
) -> Result<&'a Vec<LogRecord>> {
    let partitions = inner
        .topics
        .get(topic)
        .ok_or_else(|| LogError::UnknownTopic(topic.to_string()))?;
    partitions
        .get(partition as usize)
        .ok_or_else(|| LogError::PartitionOutOfRange {
            topic: topic.to_string(),
            partition,
            partitions: partition_len(partitions),
        })
}

#[allow(clippy::cast_possible_truncation)]
fn partition_len(partitions: &[Vec<LogRecord>]) -> u32 {
    partitions.len() as u32
}

impl EventLog for MemoryLog {
    fn create_topic(&self, topic: &str, partitions: u32) -> Result<u32> {
        validate_topic(topic, partitions)?;
        let mut inner = self.lock()?;
        let existing = inner
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| vec![Vec::new(); partitions as usize]);
        Ok(partition_len(existing))
    }

    fn partition_count(&self, topic: &str) -> Result<u32> {
        let inner = self.lock()?;
        inner
            .topics
            .get(topic)
            .map(|p| partition_len(p))
            .ok_or_else(|| LogError::UnknownTopic(topic.to_string()))
    }

    fn append(&self, topic: &str, key: &[u8], value: &[u8]) -> Result<RecordPosition> {
        let position = {
            let mut inner = self.lock()?;
            let partitions = inner
                .topics
                .get_mut(topic)
                .ok_or_else(|| LogError::UnknownTopic(topic.to_string()))?;
            let partition = partition_for(key, partition_len(partitions));
            let records = &mut partitions[partition as usize];
            let offset = records.len() as u64;
            records.push(LogRecord {
                topic: topic.to_string(),
                partition,
                offset,
                key: key.to_vec(),
                value: value.to_vec(),
                appended_at: Utc::now(),
            });
            RecordPosition { partition, offset }
        };

        self.notify.notify_waiters();
        Ok(position)
    }

    fn read(
        &self,
        topic: &str,
        partition_id: u32,
        from_offset: u64,
        max_bytes: usize,
    ) -> Result<Vec<LogRecord>> {
        let inner = self.lock()?;
        let records = partition(&inner, topic, partition_id)?;
        let start = usize::try_from(from_offset).unwrap_or(usize::MAX);
        take_within_budget(records.iter().skip(start).cloned().map(Ok), max_bytes)
    }

    fn end_offset(&self, topic: &str, partition_id: u32) -> Result<u64> {
        let inner = self.lock()?;
        Ok(partition(&inner, topic, partition_id)?.len() as u64)
    }

    fn committed(&self, group: &str, topic: &str, partition: u32) -> Result<Option<u64>> {
        let inner = self.lock()?;
        Ok(inner
            .offsets
            .get(&(group.to_string(), topic.to_string(), partition))
            .copied())
    }

    fn commit(&self, group: &str, topic: &str, partition: u32, next_offset: u64) -> Result<()> {
        let mut inner = self.lock()?;
        inner
            .offsets
            .insert((group.to_string(), topic.to_string(), partition), next_offset);
        Ok(())
    }

    fn notifier(&self) -> Arc<Notify> {
        Arc::clone(&self.notify)
    }
}
