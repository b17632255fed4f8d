//! Consumer-group member fetching from a set of partitions.
//!
//! A [`LogConsumer`] owns the partitions its [`GroupMember`] is assigned,
//! resumes each from the group's committed offset (earliest when nothing was
//! committed) and hands out batches shaped by a [`FetchPolicy`]. Progress is
//! only persisted by an explicit [`LogConsumer::commit`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{LogError, Result};
use crate::{EventLog, LogRecord};

/// Batch shaping for [`LogConsumer::poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPolicy {
    /// Return as soon as at least this many bytes are buffered.
    pub min_bytes: usize,
    /// Never buffer more than this many bytes (one oversized record is still returned).
    pub max_bytes: usize,
    /// Return a smaller, non-empty batch once this much time has passed.
    pub max_wait: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            min_bytes: 10_000,
            max_bytes: 10_000_000,
            max_wait: Duration::from_millis(500),
        }
    }
}

/// Static membership in a consumer group.
///
/// Member `i` of `n` owns every partition `p` with `p % n == i`, so members
/// sharing a group id divide a topic's partitions without overlap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMember {
    /// Shared consumer group name.
    pub group_id: String,
    /// Index of this member, `0..member_count`.
    pub member_index: u32,
    /// Number of members in the group.
    pub member_count: u32,
}

impl GroupMember {
    /// The sole member of a group.
    #[must_use]
    pub fn single(group_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            member_index: 0,
            member_count: 1,
        }
    }

    /// Partitions owned by this member.
    ///
    /// # Errors
    ///
    /// Returns `LogError::InvalidAssignment` if the index is out of range.
    pub fn assigned_partitions(&self, partition_count: u32) -> Result<Vec<u32>> {
        if self.member_count == 0 || self.member_index >= self.member_count {
            return Err(LogError::InvalidAssignment {
                member_index: self.member_index,
                member_count: self.member_count,
            });
        }
        Ok((0..partition_count)
            .filter(|p| p % self.member_count == self.member_index)
            .collect())
    }
}

/// A consumer over the partitions assigned to one group member.
pub struct LogConsumer {
    log: Arc<dyn EventLog>,
    topic: String,
    member: GroupMember,
    policy: FetchPolicy,
    /// Next offset to fetch, per owned partition.
    positions: BTreeMap<u32, u64>,
    /// Index into the owned partitions where the next poll starts reading.
    cursor: usize,
}

impl LogConsumer {
    /// Join `topic` as `member`, resuming from committed offsets.
    ///
    /// # Errors
    ///
    /// Returns an error if the topic is unknown, the assignment is invalid, or
    /// committed offsets cannot be read.
    pub fn new(
        log: Arc<dyn EventLog>,
        topic: impl Into<String>,
        member: GroupMember,
        policy: FetchPolicy,
    ) -> Result<Self> {
        let topic = topic.into();
        let partitions = member.assigned_partitions(log.partition_count(&topic)?)?;

        let mut positions = BTreeMap::new();
        for partition in partitions {
            let start = log
                .committed(&member.group_id, &topic, partition)?
                .unwrap_or(0);
            positions.insert(partition, start);
        }

        tracing::debug!(
            topic = %topic,
            group = %member.group_id,
            member = member.member_index,
            partitions = ?positions,
            "Consumer joined"
        );

        Ok(Self {
            log,
            topic,
            member,
            policy,
            positions,
            cursor: 0,
        })
    }

    /// Topic being consumed.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Group membership of this consumer.
    #[must_use]
    pub fn member(&self) -> &GroupMember {
        &self.member
    }

    /// Owned partitions.
    #[must_use]
    pub fn assignment(&self) -> Vec<u32> {
        self.positions.keys().copied().collect()
    }

    /// Next offset this consumer will fetch from `partition`.
    #[must_use]
    pub fn position(&self, partition: u32) -> Option<u64> {
        self.positions.get(&partition).copied()
    }

    /// Wait for the next batch.
    ///
    /// Blocks until at least one record is available. Returns early once
    /// `min_bytes` are buffered, otherwise after `max_wait` with whatever has
    /// arrived. Records of one partition keep their log order. Each poll
    /// starts reading at the partition after the previous poll's start, so a
    /// busy partition cannot starve the others of the byte budget.
    ///
    /// Cancelling the returned future loses nothing: positions only advance
    /// when a batch is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the log fails.
    pub async fn poll(&mut self) -> Result<Vec<LogRecord>> {
        let notify = self.log.notifier();
        let deadline = Instant::now() + self.policy.max_wait;
        let mut next = self.positions.clone();
        let mut batch = Vec::new();
        let mut buffered = 0usize;

        loop {
            // Register interest before reading so an append between the read
            // and the wait still wakes us.
            let notified = notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            self.fill(&mut next, &mut batch, &mut buffered)?;

            let full = buffered >= self.policy.max_bytes;
            if !batch.is_empty()
                && (full || buffered >= self.policy.min_bytes || Instant::now() >= deadline)
            {
                self.positions = next;
                self.cursor = (self.cursor + 1) % self.positions.len().max(1);
                return Ok(batch);
            }

            if batch.is_empty() {
                // Nothing yet: wait for an append, re-checking periodically.
                let _ = tokio::time::timeout(self.policy.max_wait, notified).await;
            } else {
                let _ = tokio::time::timeout_at(deadline, notified).await;
            }
        }
    }

    /// Read every owned partition once, starting at the cursor, appending to
    /// `batch` within the byte budget.
    fn fill(
        &self,
        next: &mut BTreeMap<u32, u64>,
        batch: &mut Vec<LogRecord>,
        buffered: &mut usize,
    ) -> Result<()> {
        let partitions: Vec<u32> = next.keys().copied().collect();
        let count = partitions.len();
        for i in 0..count {
            let partition = partitions[(self.cursor + i) % count];
            let Some(offset) = next.get_mut(&partition) else {
                continue;
            };
            let budget = self.policy.max_bytes.saturating_sub(*buffered);
            if budget == 0 && !batch.is_empty() {
                break;
            }

            let records = self.log.read(&self.topic, partition, *offset, budget)?;
            for record in records {
                if !batch.is_empty() && *buffered + record.size() > self.policy.max_bytes {
                    break;
                }
                *offset = record.offset + 1;
                *buffered += record.size();
                batch.push(record);
            }
        }
        Ok(())
    }

    /// Persist that `record` and everything before it in its partition is processed.
    ///
    /// # Errors
    ///
    /// Returns an error if the offset write fails.
    pub fn commit(&self, record: &LogRecord) -> Result<()> {
        self.log.commit(
            &self.member.group_id,
            &self.topic,
            record.partition,
            record.offset + 1,
        )?;
        tracing::trace!(
            group = %self.member.group_id,
            partition = record.partition,
            offset = record.offset,
            "Committed offset"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{partition_for, MemoryLog};

    fn log_with_topic(partitions: u32) -> Arc<MemoryLog> {
        let log = Arc::new(MemoryLog::new());
        log.create_topic("t", partitions).unwrap();
        log
    }

    fn eager() -> FetchPolicy {
        FetchPolicy {
            min_bytes: 1,
            max_bytes: 1_000_000,
            max_wait: Duration::from_millis(20),
        }
    }

    #[test]
    fn assignment_divides_partitions() {
        let a = GroupMember {
            group_id: "g".into(),
            member_index: 0,
            member_count: 2,
        };
        let b = GroupMember {
            member_index: 1,
            ..a.clone()
        };
        assert_eq!(a.assigned_partitions(5).unwrap(), vec![0, 2, 4]);
        assert_eq!(b.assigned_partitions(5).unwrap(), vec![1, 3]);

        let bad = GroupMember {
            member_index: 2,
            ..a
        };
        assert!(matches!(
            bad.assigned_partitions(5),
            Err(LogError::InvalidAssignment { .. })
        ));
    }

    #[tokio::test]
    async fn poll_returns_available_records_in_order() {
        let log = log_with_topic(1);
        for i in 0..3u8 {
            log.append("t", b"u1", &[i]).unwrap();
        }

        let mut consumer = LogConsumer::new(log, "t", GroupMember::single("g"), eager()).unwrap();
        let batch = consumer.poll().await.unwrap();
        let values: Vec<u8> = batch.iter().map(|r| r.value[0]).collect();
        assert_eq!(values, vec![0, 1, 2]);
        assert_eq!(consumer.position(0), Some(3));
    }

    #[tokio::test]
    async fn poll_waits_for_append() {
        let log = log_with_topic(2);
        let mut consumer =
            LogConsumer::new(log.clone(), "t", GroupMember::single("g"), eager()).unwrap();

        let writer = log.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            writer.append("t", b"late", b"v").unwrap();
        });

        let batch = tokio::time::timeout(Duration::from_secs(5), consumer.poll())
            .await
            .expect("poll should wake on append")
            .unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].key, b"late");
    }

    #[tokio::test]
    async fn poll_honors_max_bytes() {
        let log = log_with_topic(1);
        for _ in 0..10 {
            log.append("t", b"k", &[0u8; 99]).unwrap();
        }
        let policy = FetchPolicy {
            min_bytes: 1,
            max_bytes: 350,
            max_wait: Duration::from_millis(20),
        };
        let mut consumer = LogConsumer::new(log, "t", GroupMember::single("g"), policy).unwrap();
        assert_eq!(consumer.poll().await.unwrap().len(), 3);
        assert_eq!(consumer.poll().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn busy_partition_does_not_starve_the_others() {
        let log = log_with_topic(2);
        let hot = (0..)
            .map(|i| format!("hot-{i}"))
            .find(|k| partition_for(k.as_bytes(), 2) == 0)
            .unwrap();
        let cold = (0..)
            .map(|i| format!("cold-{i}"))
            .find(|k| partition_for(k.as_bytes(), 2) == 1)
            .unwrap();
        for _ in 0..5 {
            log.append("t", hot.as_bytes(), &[0u8; 95]).unwrap();
        }
        log.append("t", cold.as_bytes(), &[0u8; 95]).unwrap();

        let policy = FetchPolicy {
            min_bytes: 1,
            max_bytes: 150,
            max_wait: Duration::from_millis(20),
        };
        let mut consumer =
            LogConsumer::new(log.clone(), "t", GroupMember::single("g"), policy).unwrap();

        let mut cold_seen = 0;
        for _ in 0..4 {
            log.append("t", hot.as_bytes(), &[0u8; 95]).unwrap();
            let batch = consumer.poll().await.unwrap();
            cold_seen += batch.iter().filter(|r| r.partition == 1).count();
        }
        assert_eq!(cold_seen, 1);
        assert_eq!(consumer.position(1), Some(1));
    }

    #[tokio::test]
    async fn small_batch_returned_after_max_wait() {
        let log = log_with_topic(1);
        log.append("t", b"k", b"tiny").unwrap();
        let policy = FetchPolicy {
            min_bytes: 10_000,
            max_bytes: 1_000_000,
            max_wait: Duration::from_millis(30),
        };
        let mut consumer = LogConsumer::new(log, "t", GroupMember::single("g"), policy).unwrap();
        let batch = tokio::time::timeout(Duration::from_secs(5), consumer.poll())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(batch.len(), 1);
    }

    #[tokio::test]
    async fn resumes_from_committed_offset() {
        let log = log_with_topic(1);
        for i in 0..4u8 {
            log.append("t", b"u1", &[i]).unwrap();
        }

        {
            let mut consumer =
                LogConsumer::new(log.clone(), "t", GroupMember::single("g"), eager()).unwrap();
            let batch = consumer.poll().await.unwrap();
            // Only the first two are committed before the "crash".
            consumer.commit(&batch[0]).unwrap();
            consumer.commit(&batch[1]).unwrap();
        }

        let mut consumer =
            LogConsumer::new(log.clone(), "t", GroupMember::single("g"), eager()).unwrap();
        assert_eq!(consumer.position(0), Some(2));
        let values: Vec<u8> = consumer
            .poll()
            .await
            .unwrap()
            .iter()
            .map(|r| r.value[0])
            .collect();
        assert_eq!(values, vec![2, 3]);

        // A different group starts from the beginning.
        let other = LogConsumer::new(log, "t", GroupMember::single("other"), eager()).unwrap();
        assert_eq!(other.position(0), Some(0));
    }
}
