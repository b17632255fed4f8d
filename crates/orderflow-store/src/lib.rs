//! Analytical storage layer for orderflow.
//!
//! This crate holds the raw fact table, the per-user counters, and the
//! aggregate tables read by the query API.
//!
//! # Architecture
//!
//! The `RocksDB` backend uses the following column families:
//!
//! - `raw_orders`: Fact rows, keyed by `user_id || fact_id`
//! - `raw_orders_by_date`: The same rows keyed by `order_date || user_id || fact_id`
//! - `user_order_counts`: Counter cells keyed by `user_id || column`, combined by a
//!   merge operator
//! - `daily_order_summaries`: Orders per menu type per day
//! - `user_preferences`: Users keyed by `preferred_menu_type || user_id`
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "rocksdb-backend")]
//! # fn main() {
//! use orderflow_core::{MenuType, UserId};
//! use orderflow_store::{RocksStore, Store};
//!
//! let store = RocksStore::open("/tmp/orderflow-store").unwrap();
//! let user_id = UserId::new("u1").unwrap();
//! store.increment_counter(&user_id, MenuType::Washoku).unwrap();
//! let counts = store.get_user_counts(&user_id).unwrap();
//! # }
//! # #[cfg(not(feature = "rocksdb-backend"))]
//! # fn main() {}
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod memory;
#[cfg(feature = "rocksdb-backend")]
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
#[cfg(feature = "rocksdb-backend")]
pub use rocks::RocksStore;

use chrono::NaiveDate;
use orderflow_core::{DailySummary, DateFilter, MenuType, RawOrder, UserCounts, UserId};

/// The storage trait defining all database operations.
///
/// This trait abstracts the storage layer, allowing for different implementations
/// (e.g., `RocksDB`, in-memory for testing). Implementations must be safe for
/// concurrent writers.
pub trait Store: Send + Sync {
    // =========================================================================
    // Raw Facts
    // =========================================================================

    /// Append a raw fact row.
    ///
    /// Never deduplicates: inserting the same event twice yields two rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn insert_raw_order(&self, order: &RawOrder) -> Result<()>;

    /// All fact rows of a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn raw_orders_for_user(&self, user_id: &UserId) -> Result<Vec<RawOrder>>;

    /// All fact rows whose `order_date` is `date`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn raw_orders_on(&self, date: NaiveDate) -> Result<Vec<RawOrder>>;

    // =========================================================================
    // User Counters
    // =========================================================================

    /// Atomically add one to the user's counter column for `menu`.
    ///
    /// Creates the counter row on first use, with both columns at zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn increment_counter(&self, user_id: &UserId, menu: MenuType) -> Result<()>;

    /// Counter row of a user, if it was ever touched.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_user_counts(&self, user_id: &UserId) -> Result<Option<UserCounts>>;

    /// Every counter row, ordered by user.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_user_counts(&self) -> Result<Vec<UserCounts>>;

    // =========================================================================
    // Aggregates
    // =========================================================================

    /// Insert or overwrite the order count of one day and menu type.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_daily_summary(&self, summary: &DailySummary) -> Result<()>;

    /// Daily summaries passing `filter`, ordered by date then menu type.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_daily_summaries(&self, filter: DateFilter) -> Result<Vec<DailySummary>>;

    /// Record the preferred menu type of a user, replacing the opposite one.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn set_user_preference(&self, user_id: &UserId, menu: MenuType) -> Result<()>;

    /// Every `(user, preferred menu type)` pair, ordered by menu type then user.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_user_preferences(&self) -> Result<Vec<(UserId, MenuType)>>;
}
