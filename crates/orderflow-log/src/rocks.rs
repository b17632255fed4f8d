//! `RocksDB` log implementation.
//!
//! Column families:
//!
//! - `log_topics`: topic name to partition count (`u32` big-endian)
//! - `log_records`: `len(topic) || topic || partition || offset` to the CBOR record
//! - `log_offsets`: `len(group) || group || len(topic) || topic || partition` to
//!   the next offset to consume (`u64` big-endian)
//!
//! All integers in keys are big-endian so a partition's records sort by offset.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use crate::error::{LogError, Result};
use crate::{
    partition_for, take_within_budget, validate_topic, EventLog, LogRecord, RecordPosition,
};

/// Column family names.
pub mod cf {
    /// Topic metadata.
    pub const TOPICS: &str = "log_topics";
    /// Partition records.
    pub const RECORDS: &str = "log_records";
    /// Consumer group offsets.
    pub const OFFSETS: &str = "log_offsets";
}

fn all_column_families() -> Vec<&'static str> {
    vec![cf::TOPICS, cf::RECORDS, cf::OFFSETS]
}

/// Record body as persisted; position comes from the key.
#[derive(Serialize, Deserialize)]
struct StoredRecord {
    key: Vec<u8>,
    value: Vec<u8>,
    appended_at: DateTime<Utc>,
}

#[derive(Default)]
struct State {
    topics: HashMap<String, u32>,
    next_offsets: HashMap<(String, u32), u64>,
}

/// RocksDB-backed log.
pub struct RocksLog {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    /// Serializes appends so offsets stay dense and ordered.
    state: Mutex<State>,
    notify: Arc<Notify>,
}

fn push_str(buf: &mut Vec<u8>, s: &str) -> Result<()> {
    let len = u16::try_from(s.len())
        .map_err(|_| LogError::InvalidTopic(format!("name too long: {} bytes", s.len())))?;
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(s.as_bytes());
    Ok(())
}

fn partition_prefix(topic: &str, partition: u32) -> Result<Vec<u8>> {
    let mut key = Vec::with_capacity(2 + topic.len() + 12);
    push_str(&mut key, topic)?;
    key.extend_from_slice(&partition.to_be_bytes());
    Ok(key)
}

fn record_key(topic: &str, partition: u32, offset: u64) -> Result<Vec<u8>> {
    let mut key = partition_prefix(topic, partition)?;
    key.extend_from_slice(&offset.to_be_bytes());
    Ok(key)
}

fn offset_key(group: &str, topic: &str, partition: u32) -> Result<Vec<u8>> {
    let mut key = Vec::new();
    push_str(&mut key, group)?;
    push_str(&mut key, topic)?;
    key.extend_from_slice(&partition.to_be_bytes());
    Ok(key)
}

fn offset_from_key(key: &[u8]) -> Result<u64> {
    let tail: [u8; 8] = key
        .len()
        .checked_sub(8)
        .and_then(|start| key[start..].try_into().ok())
        .ok_or_else(|| LogError::Serialization("record key too short".into()))?;
    Ok(u64::from_be_bytes(tail))
}

fn decode_u64(data: &[u8]) -> Result<u64> {
    let bytes: [u8; 8] = data
        .try_into()
        .map_err(|_| LogError::Serialization("expected 8-byte offset".into()))?;
    Ok(u64::from_be_bytes(bytes))
}

fn decode_u32(data: &[u8]) -> Result<u32> {
    let bytes: [u8; 4] = data
        .try_into()
        .map_err(|_| LogError::Serialization("expected 4-byte partition count".into()))?;
    Ok(u32::from_be_bytes(bytes))
}

impl RocksLog {
    /// Open or create a log at the given path.
    ///
    /// Existing topics are loaded and each partition's end offset recovered.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or its metadata is corrupt.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| LogError::Database(e.to_string()))?;

        let log = Self {
            db: Arc::new(db),
            state: Mutex::new(State::default()),
            notify: Arc::new(Notify::new()),
        };
        log.recover()?;
        Ok(log)
    }

    fn recover(&self) -> Result<()> {
        let cf_topics = self.cf(cf::TOPICS)?;
        let mut topics = HashMap::new();
        for item in self.db.iterator_cf(&cf_topics, IteratorMode::Start) {
            let (key, value) = item.map_err(|e| LogError::Database(e.to_string()))?;
            let topic = String::from_utf8(key.to_vec())
                .map_err(|e| LogError::Serialization(e.to_string()))?;
            topics.insert(topic, decode_u32(&value)?);
        }

        let mut next_offsets = HashMap::new();
        for (topic, partitions) in &topics {
            for partition in 0..*partitions {
                let next = self.scan_end_offset(topic, partition)?;
                next_offsets.insert((topic.clone(), partition), next);
            }
            tracing::debug!(topic = %topic, partitions = partitions, "Recovered log topic");
        }

        let mut state = self.lock()?;
        state.topics = topics;
        state.next_offsets = next_offsets;
        Ok(())
    }

    /// Find the offset after the last stored record of a partition.
    fn scan_end_offset(&self, topic: &str, partition: u32) -> Result<u64> {
        let cf_records = self.cf(cf::RECORDS)?;
        let prefix = partition_prefix(topic, partition)?;
        let upper = record_key(topic, partition, u64::MAX)?;

        let mut iter = self
            .db
            .iterator_cf(&cf_records, IteratorMode::From(&upper, Direction::Reverse));
        match iter.next() {
            Some(item) => {
                let (key, _) = item.map_err(|e| LogError::Database(e.to_string()))?;
                if key.starts_with(&prefix) {
                    Ok(offset_from_key(&key)? + 1)
                } else {
                    Ok(0)
                }
            }
            None => Ok(0),
        }
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| LogError::Database(format!("column family not found: {name}")))
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| LogError::Database("log state lock poisoned".into()))
    }

    fn check_partition(state: &State, topic: &str, partition: u32) -> Result<()> {
        let partitions = *state
            .topics
            .get(topic)
            .ok_or_else(|| LogError::UnknownTopic(topic.to_string()))?;
        if partition >= partitions {
            return Err(LogError::PartitionOutOfRange {
                topic: topic.to_string(),
                partition,
                partitions,
            });
        }
        Ok(())
    }

    /// Serialize a value using CBOR.
    fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| LogError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| LogError::Serialization(e.to_string()))
    }
}

impl EventLog for RocksLog {
    fn create_topic(&self, topic: &str, partitions: u32) -> Result<u32> {
        validate_topic(topic, partitions)?;
        let mut state = self.lock()?;
        if let Some(existing) = state.topics.get(topic) {
            return Ok(*existing);
        }

        let cf_topics = self.cf(cf::TOPICS)?;
        self.db
            .put_cf(&cf_topics, topic.as_bytes(), partitions.to_be_bytes())
            .map_err(|e| LogError::Database(e.to_string()))?;

        state.topics.insert(topic.to_string(), partitions);
        for partition in 0..partitions {
            state.next_offsets.insert((topic.to_string(), partition), 0);
        }
        tracing::info!(topic = %topic, partitions = partitions, "Created log topic");
        Ok(partitions)
    }

    fn partition_count(&self, topic: &str) -> Result<u32> {
        let state = self.lock()?;
        state
            .topics
            .get(topic)
            .copied()
            .ok_or_else(|| LogError::UnknownTopic(topic.to_string()))
    }

    fn append(&self, topic: &str, key: &[u8], value: &[u8]) -> Result<RecordPosition> {
        let position = {
            let mut state = self.lock()?;
            let partitions = *state
                .topics
                .get(topic)
                .ok_or_else(|| LogError::UnknownTopic(topic.to_string()))?;
            let partition = partition_for(key, partitions);
            let offset = state
                .next_offsets
                .get(&(topic.to_string(), partition))
                .copied()
                .unwrap_or(0);

            let stored = StoredRecord {
                key: key.to_vec(),
                value: value.to_vec(),
                appended_at: Utc::now(),
            };
            let cf_records = self.cf(cf::RECORDS)?;
            self.db
                .put_cf(
                    &cf_records,
                    record_key(topic, partition, offset)?,
                    Self::serialize(&stored)?,
                )
                .map_err(|e| LogError::Database(e.to_string()))?;

            state
                .next_offsets
                .insert((topic.to_string(), partition), offset + 1);
            RecordPosition { partition, offset }
        };

        self.notify.notify_waiters();
        Ok(position)
    }

    fn read(
        &self,
        topic: &str,
        partition: u32,
        from_offset: u64,
        max_bytes: usize,
    ) -> Result<Vec<LogRecord>> {
        Self::check_partition(&*self.lock()?, topic, partition)?;

        let cf_records = self.cf(cf::RECORDS)?;
        let prefix = partition_prefix(topic, partition)?;
        let start = record_key(topic, partition, from_offset)?;

        let records = self
            .db
            .iterator_cf(&cf_records, IteratorMode::From(&start, Direction::Forward))
            .map(|item| item.map_err(|e| LogError::Database(e.to_string())))
            .take_while(|item| item.as_ref().map_or(true, |(key, _)| key.starts_with(&prefix)))
            .map(|item| -> Result<LogRecord> {
                let (key, data) = item?;
                let stored: StoredRecord = Self::deserialize(&data)?;
                Ok(LogRecord {
                    topic: topic.to_string(),
                    partition,
                    offset: offset_from_key(&key)?,
                    key: stored.key,
                    value: stored.value,
                    appended_at: stored.appended_at,
                })
            });

        take_within_budget(records, max_bytes)
    }

    fn end_offset(&self, topic: &str, partition: u32) -> Result<u64> {
        let state = self.lock()?;
        Self::check_partition(&state, topic, partition)?;
        Ok(state
            .next_offsets
            .get(&(topic.to_string(), partition))
            .copied()
            .unwrap_or(0))
    }

    fn committed(&self, group: &str, topic: &str, partition: u32) -> Result<Option<u64>> {
        let cf_offsets = self.cf(cf::OFFSETS)?;
        self.db
            .get_cf(&cf_offsets, offset_key(group, topic, partition)?)
            .map_err(|e| LogError::Database(e.to_string()))?
            .map(|data| decode_u64(&data))
            .transpose()
    }

    fn commit(&self, group: &str, topic: &str, partition: u32, next_offset: u64) -> Result<()> {
        let cf_offsets = self.cf(cf::OFFSETS)?;
        self.db
            .put_cf(
                &cf_offsets,
                offset_key(group, topic, partition)?,
                next_offset.to_be_bytes(),
            )
            .map_err(|e| LogError::Database(e.to_string()))?;
        Ok(())
    }

    fn notifier(&self) -> Arc<Notify> {
        Arc::clone(&self.notify)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_log() -> (RocksLog, TempDir) {
        let dir = TempDir::new().unwrap();
        let log = RocksLog::open(dir.path()).unwrap();
        (log, dir)
    }

    #[test]
    fn append_and_read() {
        let (log, _dir) = create_test_log();
        log.create_topic("order-logs", 4).unwrap();

        let a = log.append("order-logs", b"u1", b"first").unwrap();
        let b = log.append("order-logs", b"u1", b"second").unwrap();
        assert_eq!(a.partition, b.partition);
        assert_eq!((a.offset, b.offset), (0, 1));

        let records = log.read("order-logs", a.partition, 0, usize::MAX).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].value, b"first");
        assert_eq!(records[1].value, b"second");
        assert_eq!(records[1].offset, 1);
        assert_eq!(records[0].key, b"u1");

        let tail = log.read("order-logs", a.partition, 1, usize::MAX).unwrap();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].value, b"second");
    }

    #[test]
    fn reopen_recovers_topics_and_offsets() {
        let dir = TempDir::new().unwrap();
        let partition = {
            let log = RocksLog::open(dir.path()).unwrap();
            log.create_topic("order-logs", 3).unwrap();
            log.append("order-logs", b"u1", b"a").unwrap();
            let p = log.append("order-logs", b"u1", b"b").unwrap().partition;
            log.commit("g", "order-logs", p, 1).unwrap();
            p
        };

        let log = RocksLog::open(dir.path()).unwrap();
        assert_eq!(log.partition_count("order-logs").unwrap(), 3);
        assert_eq!(log.end_offset("order-logs", partition).unwrap(), 2);
        assert_eq!(log.committed("g", "order-logs", partition).unwrap(), Some(1));

        let next = log.append("order-logs", b"u1", b"c").unwrap();
        assert_eq!(next.offset, 2);
    }

    #[test]
    fn partitions_do_not_bleed_into_each_other() {
        let (log, _dir) = create_test_log();
        log.create_topic("t", 2).unwrap();
        log.create_topic("t2", 2).unwrap();
        for i in 0..20 {
            log.append("t", format!("user-{i}").as_bytes(), b"x").unwrap();
            log.append("t2", format!("user-{i}").as_bytes(), b"y").unwrap();
        }

        let total: usize = (0..2)
            .map(|p| log.read("t", p, 0, usize::MAX).unwrap().len())
            .sum();
        assert_eq!(total, 20);
        for p in 0..2 {
            assert!(log
                .read("t", p, 0, usize::MAX)
                .unwrap()
                .iter()
                .all(|r| r.value == b"x" && r.partition == p));
        }
    }

    #[test]
    fn read_byte_budget() {
        let (log, _dir) = create_test_log();
        log.create_topic("t", 1).unwrap();
        for _ in 0..4 {
            log.append("t", b"k", &[7u8; 99]).unwrap();
        }
        assert_eq!(log.read("t", 0, 0, 250).unwrap().len(), 2);
        assert_eq!(log.read("t", 0, 0, 10).unwrap().len(), 1);
    }

    #[test]
    fn unknown_topic() {
        let (log, _dir) = create_test_log();
        assert!(matches!(log.append("nope", b"k", b"v"), Err(LogError::UnknownTopic(_))));
        assert!(matches!(log.read("nope", 0, 0, 1), Err(LogError::UnknownTopic(_))));
        assert!(matches!(log.partition_count("nope"), Err(LogError::UnknownTopic(_))));
    }
}
