//! Application state.

use std::sync::Arc;

use orderflow_log::EventLog;
use orderflow_pipeline::{Aggregator, OrderProducer};
use orderflow_store::Store;

use crate::config::ServiceConfig;

/// Application state shared across handlers.
///
/// Every handle is passed in explicitly; there is no process-wide store.
#[derive(Clone)]
pub struct AppState {
    /// The durable log.
    pub log: Arc<dyn EventLog>,

    /// The analytical store (read-only from handlers, except aggregation).
    pub store: Arc<dyn Store>,

    /// Producer appending ingested orders to the configured topic.
    pub producer: OrderProducer,

    /// Daily aggregation over the store.
    pub aggregator: Aggregator,

    /// Service configuration.
    pub config: ServiceConfig,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(log: Arc<dyn EventLog>, store: Arc<dyn Store>, config: ServiceConfig) -> Self {
        let producer = OrderProducer::new(Arc::clone(&log), config.log_topic.clone());
        let aggregator = Aggregator::new(Arc::clone(&store));

        Self {
            log,
            store,
            producer,
            aggregator,
            config,
        }
    }
}
