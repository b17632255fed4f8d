//! Common test utilities for orderflow integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum_test::TestServer;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use orderflow_core::UserId;
use orderflow_log::{EventLog, MemoryLog};
use orderflow_pipeline::ConsumerStats;
use orderflow_service::{create_router, spawn_consumers, AppState, ServiceConfig};
use orderflow_store::{MemoryStore, Store};

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// The durable log behind the service.
    pub log: Arc<dyn EventLog>,
    /// The analytical store behind the service.
    pub store: Arc<dyn Store>,
    /// Configuration the service was built with.
    pub config: ServiceConfig,
    shutdown: watch::Sender<bool>,
    consumers: Vec<JoinHandle<ConsumerStats>>,
}

impl TestHarness {
    /// Create a harness over fresh in-memory backends, without consumer loops.
    pub fn new() -> Self {
        let config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            data_dir: "unused".into(),
            log_partitions: 4,
            fetch_min_bytes: 1,
            fetch_max_wait_ms: 20,
            write_timeout_seconds: 5,
            ..ServiceConfig::default()
        };

        let log: Arc<dyn EventLog> = Arc::new(MemoryLog::new());
        log.create_topic(&config.log_topic, config.log_partitions)
            .expect("Failed to create topic");
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());

        let state = AppState::new(Arc::clone(&log), Arc::clone(&store), config.clone());
        let router: Router = create_router(state);
        let server = TestServer::new(router).expect("Failed to create test server");
        let (shutdown, _) = watch::channel(false);

        Self {
            server,
            log,
            store,
            config,
            shutdown,
            consumers: Vec::new(),
        }
    }

    /// Create a harness with `workers` consumer loops running.
    pub fn with_consumers(workers: u32) -> Self {
        let mut harness = Self::new();
        harness.config.consumer_workers = workers;
        harness.consumers = spawn_consumers(
            &harness.log,
            &harness.store,
            &harness.config,
            &harness.shutdown.subscribe(),
        )
        .expect("Failed to spawn consumers");
        harness
    }

    /// Stop the consumer loops and collect their stats.
    pub async fn stop_consumers(&mut self) -> Vec<ConsumerStats> {
        let _ = self.shutdown.send(true);
        let mut stats = Vec::new();
        for handle in self.consumers.drain(..) {
            stats.push(handle.await.expect("consumer loop panicked"));
        }
        stats
    }

    /// Wait until `user` has `total` counted orders.
    pub async fn wait_for_counts(&self, user: &str, total: i64) {
        let user_id = UserId::new(user).unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Some(counts) = self.store.get_user_counts(&user_id).unwrap() {
                    if counts.washoku_cnt + counts.yoshoku_cnt >= total {
                        return;
                    }
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("orders were not applied in time");
    }

    /// Total records appended to the topic.
    pub fn log_len(&self) -> u64 {
        (0..self.config.log_partitions)
            .map(|p| self.log.end_offset(&self.config.log_topic, p).unwrap())
            .sum()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
