//! Storage writer: applies one decoded event to the analytical store.
//!
//! Two steps run in order:
//!
//! 1. Insert the raw fact row. On failure nothing else runs.
//! 2. Resolve the counter column and atomically increment it. On failure the
//!    fact row from step 1 stays; facts and counters drift.
//!
//! Each step runs on the blocking pool and is bounded by the write timeout.
//! A step that times out may still complete in the background.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use orderflow_core::{FactId, MenuType, OrderEvent, RawOrder};
use orderflow_store::Store;

use crate::error::{PipelineError, Result};

/// What a successful apply wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOutcome {
    /// Id of the inserted fact row.
    pub fact_id: FactId,
    /// Counter column that was incremented.
    pub menu: MenuType,
}

/// Applies decoded events; the consumer loop's downstream.
#[async_trait]
pub trait OrderHandler: Send + Sync {
    /// Apply one event.
    ///
    /// # Errors
    ///
    /// Returns an error if the event could not be fully applied.
    async fn apply(&self, event: &OrderEvent) -> Result<WriteOutcome>;
}

/// Writes raw facts and user counters.
#[derive(Clone)]
pub struct StorageWriter {
    store: Arc<dyn Store>,
    write_timeout: Duration,
}

impl StorageWriter {
    /// Create a writer bounding each store step by `write_timeout`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, write_timeout: Duration) -> Self {
        Self {
            store,
            write_timeout,
        }
    }

    /// Insert the fact row, then increment the user's counter.
    ///
    /// # Errors
    ///
    /// - `PipelineError::Store` or `WriteTimeout` from either step
    /// - `PipelineError::InvalidMenuType` if `menu_type` is not a known menu;
    ///   the fact row has been inserted by then
    pub async fn apply(&self, event: &OrderEvent) -> Result<WriteOutcome> {
        let row = RawOrder::from_event(event);
        let fact_id = row.fact_id;
        self.run_step("insert_raw_order", move |store| store.insert_raw_order(&row))
            .await?;

        let menu = event
            .menu()
            .map_err(|_| PipelineError::InvalidMenuType(event.menu_type.clone()))?;

        let user_id = event.user_id.clone();
        self.run_step("increment_counter", move |store| {
            store.increment_counter(&user_id, menu)
        })
        .await?;

        tracing::debug!(
            user_id = %event.user_id,
            menu = %menu,
            fact_id = %fact_id,
            "Order applied"
        );

        Ok(WriteOutcome { fact_id, menu })
    }

    async fn run_step<F>(&self, step: &'static str, f: F) -> Result<()>
    where
        F: FnOnce(&dyn Store) -> orderflow_store::Result<()> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let task = tokio::task::spawn_blocking(move || f(store.as_ref()));

        match tokio::time::timeout(self.write_timeout, task).await {
            Ok(Ok(result)) => result.map_err(PipelineError::from),
            Ok(Err(join_error)) => Err(PipelineError::Task(join_error.to_string())),
            Err(_) => Err(PipelineError::WriteTimeout {
                step,
                timeout: self.write_timeout,
            }),
        }
    }
}

#[async_trait]
impl OrderHandler for StorageWriter {
    async fn apply(&self, event: &OrderEvent) -> Result<WriteOutcome> {
        StorageWriter::apply(self, event).await
    }
}
