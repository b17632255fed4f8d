//! Service configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use orderflow_log::FetchPolicy;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Root of the `RocksDB` data (default: "/data/orderflow").
    pub data_dir: String,

    /// Topic carrying order events (default: "order-logs").
    pub log_topic: String,

    /// Partition count used when the topic is first created (default: 8).
    pub log_partitions: u32,

    /// Consumer group shared by every consumer loop (default: "log-consumer-group").
    pub consumer_group: String,

    /// Consumer loops run by this process (default: 1).
    pub consumer_workers: u32,

    /// Poll returns early once this many bytes are buffered.
    pub fetch_min_bytes: usize,

    /// Upper bound of one poll batch.
    pub fetch_max_bytes: usize,

    /// Longest wait for a poll batch to fill, in milliseconds.
    pub fetch_max_wait_ms: u64,

    /// Pause after a failed poll, in milliseconds.
    pub poll_error_backoff_ms: u64,

    /// Bound on each storage writer step, in seconds.
    pub write_timeout_seconds: u64,

    /// Period of the background aggregation of the previous day (disabled when unset).
    pub aggregate_interval_seconds: Option<u64>,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,
}

/// Parse an optional raw value, falling back to `default` when absent or invalid.
fn parse_or<T: FromStr>(raw: Option<String>, default: T) -> T {
    raw.and_then(|s| s.trim().parse().ok()).unwrap_or(default)
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    parse_or(std::env::var(name).ok(), default)
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    ///
    /// Unset or unparsable values fall back to the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            data_dir: std::env::var("DATA_DIR").unwrap_or(defaults.data_dir),
            log_topic: std::env::var("LOG_TOPIC").unwrap_or(defaults.log_topic),
            log_partitions: env_or("LOG_PARTITIONS", defaults.log_partitions).max(1),
            consumer_group: std::env::var("CONSUMER_GROUP").unwrap_or(defaults.consumer_group),
            consumer_workers: env_or("CONSUMER_WORKERS", defaults.consumer_workers).max(1),
            fetch_min_bytes: env_or("FETCH_MIN_BYTES", defaults.fetch_min_bytes),
            fetch_max_bytes: env_or("FETCH_MAX_BYTES", defaults.fetch_max_bytes),
            fetch_max_wait_ms: env_or("FETCH_MAX_WAIT_MS", defaults.fetch_max_wait_ms).max(1),
            poll_error_backoff_ms: env_or("POLL_ERROR_BACKOFF_MS", defaults.poll_error_backoff_ms),
            write_timeout_seconds: env_or("WRITE_TIMEOUT_SECONDS", defaults.write_timeout_seconds)
                .max(1),
            aggregate_interval_seconds: std::env::var("AGGREGATE_INTERVAL_SECONDS")
                .ok()
                .and_then(|s| s.trim().parse().ok())
                .filter(|secs| *secs > 0),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: env_or("MAX_BODY_BYTES", defaults.max_body_bytes),
            request_timeout_seconds: env_or(
                "REQUEST_TIMEOUT_SECONDS",
                defaults.request_timeout_seconds,
            ),
        }
    }

    /// Directory of the durable log.
    #[must_use]
    pub fn log_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("log")
    }

    /// Directory of the analytical store.
    #[must_use]
    pub fn store_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("store")
    }

    /// Batch shaping for consumer polls. The wait is at least one millisecond.
    #[must_use]
    pub fn fetch_policy(&self) -> FetchPolicy {
        FetchPolicy {
            min_bytes: self.fetch_min_bytes,
            max_bytes: self.fetch_max_bytes,
            max_wait: Duration::from_millis(self.fetch_max_wait_ms.max(1)),
        }
    }

    /// Bound on each storage writer step, at least one second.
    #[must_use]
    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_seconds.max(1))
    }

    /// Pause after a failed poll.
    #[must_use]
    pub fn poll_backoff(&self) -> Duration {
        Duration::from_millis(self.poll_error_backoff_ms)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            data_dir: "/data/orderflow".into(),
            log_topic: "order-logs".into(),
            log_partitions: 8,
            consumer_group: "log-consumer-group".into(),
            consumer_workers: 1,
            fetch_min_bytes: 10_000,
            fetch_max_bytes: 10_000_000,
            fetch_max_wait_ms: 500,
            poll_error_backoff_ms: 250,
            write_timeout_seconds: 10,
            aggregate_interval_seconds: None,
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024, // 1MB
            request_timeout_seconds: 30,
        }
    }
}
