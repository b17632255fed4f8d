//! Daily aggregation of raw facts into summaries and user preferences.
//!
//! For one UTC date the aggregator:
//!
//! 1. Counts the date's fact rows per menu type and overwrites both
//!    `daily_order_summaries` rows (zero counts included). Rows with an
//!    unknown menu type are skipped.
//! 2. For every user with a fact row that day, reads the running counters and
//!    stores `washoku` as the preference if `washoku_cnt > yoshoku_cnt`,
//!    otherwise `yoshoku`.
//!
//! Re-running for the same date is safe: every write is an overwrite.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Days, NaiveDate, Utc};
use orderflow_core::{DailySummary, MenuType, UserCounts};
use orderflow_store::Store;
use serde::Serialize;
use tokio::sync::watch;

use crate::error::{PipelineError, Result};

/// Summary of one aggregation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateReport {
    /// Aggregated date.
    pub date: NaiveDate,
    /// Washoku orders on that date.
    pub washoku: i64,
    /// Yoshoku orders on that date.
    pub yoshoku: i64,
    /// Fact rows with an unknown menu type.
    pub skipped: u64,
    /// Users whose preference was recomputed.
    pub users_updated: usize,
}

/// Builds daily summaries and user preferences from the raw facts.
#[derive(Clone)]
pub struct Aggregator {
    store: Arc<dyn Store>,
}

impl Aggregator {
    /// Create an aggregator over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// The UTC day before `now`.
    #[must_use]
    pub fn previous_day(now: DateTime<Utc>) -> NaiveDate {
        let today = now.date_naive();
        today.checked_sub_days(Days::new(1)).unwrap_or(today)
    }

    /// Aggregate `date`.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Store` if a read or write fails. Writes made
    /// before the failure are kept.
    pub fn aggregate(&self, date: NaiveDate) -> Result<AggregateReport> {
        let rows = self.store.raw_orders_on(date)?;

        let mut washoku = 0i64;
        let mut yoshoku = 0i64;
        let mut skipped = 0u64;
        let mut users = BTreeSet::new();
        for row in rows {
            match row.menu_type.parse::<MenuType>() {
                Ok(MenuType::Washoku) => washoku += 1,
                Ok(MenuType::Yoshoku) => yoshoku += 1,
                Err(_) => skipped += 1,
            }
            users.insert(row.user_id);
        }

        for (menu_type, count) in [(MenuType::Washoku, washoku), (MenuType::Yoshoku, yoshoku)] {
            self.store.put_daily_summary(&DailySummary {
                date,
                menu_type,
                count,
            })?;
        }

        for user_id in &users {
            let counts = self
                .store
                .get_user_counts(user_id)?
                .unwrap_or_else(|| UserCounts::zero(user_id.clone()));
            self.store
                .set_user_preference(user_id, counts.preference())?;
        }

        let report = AggregateReport {
            date,
            washoku,
            yoshoku,
            skipped,
            users_updated: users.len(),
        };

        tracing::info!(
            date = %report.date,
            washoku = report.washoku,
            yoshoku = report.yoshoku,
            skipped = report.skipped,
            users = report.users_updated,
            "Aggregated orders"
        );

        Ok(report)
    }

    /// [`Aggregator::aggregate`] on the blocking pool.
    ///
    /// # Errors
    ///
    /// Returns the aggregation error, or `PipelineError::Task` if the task panicked.
    pub async fn aggregate_blocking(&self, date: NaiveDate) -> Result<AggregateReport> {
        let aggregator = self.clone();
        tokio::task::spawn_blocking(move || aggregator.aggregate(date))
            .await
            .map_err(|e| PipelineError::Task(e.to_string()))?
    }

    /// Aggregate the previous UTC day every `every` until `shutdown` turns `true`.
    ///
    /// Failures are logged; the schedule keeps running.
    pub async fn run_periodic(self, every: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(every_secs = every.as_secs(), "Aggregation schedule started");

        while !*shutdown.borrow() {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    let date = Self::previous_day(Utc::now());
                    if let Err(e) = self.aggregate_blocking(date).await {
                        tracing::error!(date = %date, error = %e, "Scheduled aggregation failed");
                    }
                }
            }
        }

        tracing::info!("Aggregation schedule stopped");
    }
}
