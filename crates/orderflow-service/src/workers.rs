//! Background tasks: consumer loops and the aggregation schedule.

use std::sync::Arc;
use std::time::Duration;

use orderflow_log::{EventLog, GroupMember, LogConsumer};
use orderflow_pipeline::{Aggregator, ConsumerLoop, ConsumerStats, StorageWriter};
use orderflow_store::Store;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::ServiceConfig;

/// Spawn `consumer_workers` consumer loops sharing the configured group.
///
/// Member `i` of `n` owns the partitions `p` with `p % n == i`.
///
/// # Errors
///
/// Returns an error if the topic is unknown or committed offsets cannot be read.
pub fn spawn_consumers(
    log: &Arc<dyn EventLog>,
    store: &Arc<dyn Store>,
    config: &ServiceConfig,
    shutdown: &watch::Receiver<bool>,
) -> orderflow_log::Result<Vec<JoinHandle<ConsumerStats>>> {
    let member_count = config.consumer_workers.max(1);
    let writer = StorageWriter::new(Arc::clone(store), config.write_timeout());

    let mut handles = Vec::with_capacity(member_count as usize);
    for member_index in 0..member_count {
        let member = GroupMember {
            group_id: config.consumer_group.clone(),
            member_index,
            member_count,
        };
        let consumer = LogConsumer::new(
            Arc::clone(log),
            config.log_topic.clone(),
            member,
            config.fetch_policy(),
        )?;
        let consumer_loop =
            ConsumerLoop::new(consumer, writer.clone()).with_poll_backoff(config.poll_backoff());
        handles.push(tokio::spawn(consumer_loop.run(shutdown.clone())));
    }

    tracing::info!(
        workers = member_count,
        group = %config.consumer_group,
        topic = %config.log_topic,
        "Consumer loops spawned"
    );

    Ok(handles)
}

/// Spawn the periodic aggregation of the previous UTC day, if configured.
#[must_use]
pub fn spawn_aggregation(
    aggregator: &Aggregator,
    config: &ServiceConfig,
    shutdown: &watch::Receiver<bool>,
) -> Option<JoinHandle<()>> {
    let every = Duration::from_secs(config.aggregate_interval_seconds?);
    Some(tokio::spawn(
        aggregator.clone().run_periodic(every, shutdown.clone()),
    ))
}
