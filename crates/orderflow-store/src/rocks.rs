//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait.
//! Counter cells are never read-modify-written: increments are merge operands
//! folded by an associative `i64` add, so concurrent writers never lose updates.

use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MergeOperands, MultiThreaded, Options, WriteBatch,
};

use orderflow_core::{DailySummary, DateFilter, MenuType, RawOrder, UserCounts, UserId};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf, COUNTER_MERGE_OPERATOR};
use crate::Store;

/// Decode a counter cell, treating malformed operands as zero.
fn counter_value(data: &[u8]) -> i64 {
    data.try_into().map_or_else(
        |_| {
            tracing::warn!(len = data.len(), "Malformed counter cell, counting as zero");
            0
        },
        i64::from_le_bytes,
    )
}

fn counter_add(_key: &[u8], existing: Option<&[u8]>, operands: &MergeOperands) -> Option<Vec<u8>> {
    let total = operands
        .iter()
        .fold(existing.map_or(0, counter_value), |acc, op| {
            acc.wrapping_add(counter_value(op))
        });
    Some(total.to_le_bytes().to_vec())
}

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| {
                let mut cf_opts = Options::default();
                if name == cf::USER_ORDER_COUNTS {
                    cf_opts.set_merge_operator_associative(COUNTER_MERGE_OPERATOR, counter_add);
                }
                ColumnFamilyDescriptor::new(name, cf_opts)
            })
            .collect();

        let path = path.as_ref();
        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        tracing::debug!(path = %path.display(), "Store opened");

        Ok(Self { db: Arc::new(db) })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Every `(key, value)` of `table` starting with `prefix`, in key order.
    fn scan_prefix(&self, table: &str, prefix: &[u8]) -> Result<Vec<(Box<[u8]>, Box<[u8]>)>> {
        let cf = self.cf(table)?;
        let mode = if prefix.is_empty() {
            IteratorMode::Start
        } else {
            IteratorMode::From(prefix, Direction::Forward)
        };

        let mut rows = Vec::new();
        for item in self.db.iterator_cf(&cf, mode) {
            let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(prefix) {
                break;
            }
            rows.push((key, value));
        }
        Ok(rows)
    }
}

impl Store for RocksStore {
    // =========================================================================
    // Raw Facts
    // =========================================================================

    fn insert_raw_order(&self, order: &RawOrder) -> Result<()> {
        let cf_raw = self.cf(cf::RAW_ORDERS)?;
        let cf_by_date = self.cf(cf::RAW_ORDERS_BY_DATE)?;
        let value = Self::serialize(order)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(
            &cf_raw,
            keys::raw_order_key(&order.user_id, &order.fact_id)?,
            &value,
        );
        batch.put_cf(
            &cf_by_date,
            keys::raw_order_date_key(order.order_date, &order.user_id, &order.fact_id)?,
            &value,
        );

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn raw_orders_for_user(&self, user_id: &UserId) -> Result<Vec<RawOrder>> {
        self.scan_prefix(cf::RAW_ORDERS, &keys::user_prefix(user_id)?)?
            .iter()
            .map(|(_, value)| Self::deserialize(value))
            .collect()
    }

    fn raw_orders_on(&self, date: NaiveDate) -> Result<Vec<RawOrder>> {
        self.scan_prefix(cf::RAW_ORDERS_BY_DATE, &keys::date_key(date))?
            .iter()
            .map(|(_, value)| Self::deserialize(value))
            .collect()
    }

    // =========================================================================
    // User Counters
    // =========================================================================

    fn increment_counter(&self, user_id: &UserId, menu: MenuType) -> Result<()> {
        let cf = self.cf(cf::USER_ORDER_COUNTS)?;
        let mut batch = WriteBatch::default();
        // Both cells are touched so a new row starts with zeros in each column.
        for column in MenuType::ALL {
            let delta: i64 = i64::from(column == menu);
            batch.merge_cf(&cf, keys::counter_key(user_id, column)?, delta.to_le_bytes());
        }

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn get_user_counts(&self, user_id: &UserId) -> Result<Option<UserCounts>> {
        let cf = self.cf(cf::USER_ORDER_COUNTS)?;
        let mut counts = UserCounts::zero(user_id.clone());
        let mut found = false;

        for menu in MenuType::ALL {
            let cell = self
                .db
                .get_cf(&cf, keys::counter_key(user_id, menu)?)
                .map_err(|e| StoreError::Database(e.to_string()))?;
            if let Some(data) = cell {
                found = true;
                let value = counter_value(&data);
                match menu {
                    MenuType::Washoku => counts.washoku_cnt = value,
                    MenuType::Yoshoku => counts.yoshoku_cnt = value,
                }
            }
        }

        Ok(found.then_some(counts))
    }

    fn list_user_counts(&self) -> Result<Vec<UserCounts>> {
        let mut rows: Vec<UserCounts> = Vec::new();
        for (key, value) in self.scan_prefix(cf::USER_ORDER_COUNTS, &[])? {
            let (user_id, menu) = keys::split_counter_key(&key)?;
            let value = counter_value(&value);

            // Cells of one user are adjacent.
            if rows.last().map_or(true, |row| row.user_id != user_id) {
                rows.push(UserCounts::zero(user_id));
            }
            let Some(row) = rows.last_mut() else {
                continue;
            };
            match menu {
                MenuType::Washoku => row.washoku_cnt = value,
                MenuType::Yoshoku => row.yoshoku_cnt = value,
            }
        }
        // Key order is by encoded length first; present users lexicographically.
        rows.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(rows)
    }

    // =========================================================================
    // Aggregates
    // =========================================================================

    fn put_daily_summary(&self, summary: &DailySummary) -> Result<()> {
        let cf = self.cf(cf::DAILY_ORDER_SUMMARIES)?;
        let key = keys::summary_key(summary.date, summary.menu_type);
        let value = Self::serialize(summary)?;

        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn list_daily_summaries(&self, filter: DateFilter) -> Result<Vec<DailySummary>> {
        let cf = self.cf(cf::DAILY_ORDER_SUMMARIES)?;
        let (start, end) = match filter {
            DateFilter::All => (None, None),
            DateFilter::On(date) => (Some(date), Some(date)),
            DateFilter::Between(from, to) => (Some(from), Some(to)),
        };

        let start_key = start.map(keys::date_key);
        let mode = match &start_key {
            Some(key) => IteratorMode::From(&key[..], Direction::Forward),
            None => IteratorMode::Start,
        };

        let mut summaries = Vec::new();
        for item in self.db.iterator_cf(&cf, mode) {
            let (_, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            let summary: DailySummary = Self::deserialize(&value)?;
            if end.is_some_and(|end| summary.date > end) {
                break;
            }
            summaries.push(summary);
        }
        Ok(summaries)
    }

    fn set_user_preference(&self, user_id: &UserId, menu: MenuType) -> Result<()> {
        let cf = self.cf(cf::USER_PREFERENCES)?;

        let mut batch = WriteBatch::default();
        batch.delete_cf(&cf, keys::preference_key(menu.opposite(), user_id)?);
        batch.put_cf(&cf, keys::preference_key(menu, user_id)?, b"");

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn list_user_preferences(&self) -> Result<Vec<(UserId, MenuType)>> {
        self.scan_prefix(cf::USER_PREFERENCES, &[])?
            .iter()
            .map(|(key, _)| keys::split_preference_key(key))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use orderflow_core::FactId;
    use tempfile::TempDir;

    fn create_test_store() -> (RocksStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = RocksStore::open(temp_dir.path()).unwrap();
        (store, temp_dir)
    }

    fn user(s: &str) -> UserId {
        UserId::new(s).unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn raw(user_id: &str, ts: &str, menu: &str) -> RawOrder {
        let timestamp = DateTime::parse_from_rfc3339(ts).unwrap();
        RawOrder {
            fact_id: FactId::generate(),
            user_id: user(user_id),
            timestamp,
            order_date: timestamp.naive_utc().date(),
            menu_type: menu.to_string(),
        }
    }

    #[test]
    fn raw_orders_are_never_deduplicated() {
        let (store, _dir) = create_test_store();
        let a = raw("u1", "2025-06-01T08:00:00+09:00", "washoku");
        let b = RawOrder {
            fact_id: FactId::generate(),
            ..a.clone()
        };
        store.insert_raw_order(&a).unwrap();
        store.insert_raw_order(&b).unwrap();

        let rows = store.raw_orders_for_user(&user("u1")).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(store.raw_orders_for_user(&user("u")).unwrap().is_empty());

        let on_date = store.raw_orders_on(date("2025-05-31")).unwrap();
        assert_eq!(on_date.len(), 2);
        assert!(store.raw_orders_on(date("2025-06-01")).unwrap().is_empty());
    }

    #[test]
    fn counters_start_at_zero_and_accumulate() {
        let (store, _dir) = create_test_store();
        let u1 = user("u1");
        assert!(store.get_user_counts(&u1).unwrap().is_none());

        store.increment_counter(&u1, MenuType::Yoshoku).unwrap();
        let counts = store.get_user_counts(&u1).unwrap().unwrap();
        assert_eq!((counts.washoku_cnt, counts.yoshoku_cnt), (0, 1));

        store.increment_counter(&u1, MenuType::Washoku).unwrap();
        store.increment_counter(&u1, MenuType::Washoku).unwrap();
        let counts = store.get_user_counts(&u1).unwrap().unwrap();
        assert_eq!((counts.washoku_cnt, counts.yoshoku_cnt), (2, 1));
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let (store, _dir) = create_test_store();
        let store = Arc::new(store);
        let u1 = user("u1");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let u1 = u1.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        store.increment_counter(&u1, MenuType::Washoku).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let counts = store.get_user_counts(&u1).unwrap().unwrap();
        assert_eq!(counts.washoku_cnt, 400);
        assert_eq!(counts.yoshoku_cnt, 0);
    }

    #[test]
    fn counters_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        {
            let store = RocksStore::open(temp_dir.path()).unwrap();
            store.increment_counter(&user("u1"), MenuType::Washoku).unwrap();
        }
        let store = RocksStore::open(temp_dir.path()).unwrap();
        store.increment_counter(&user("u1"), MenuType::Washoku).unwrap();
        let counts = store.get_user_counts(&user("u1")).unwrap().unwrap();
        assert_eq!(counts.washoku_cnt, 2);
    }

    #[test]
    fn malformed_counter_cell_counts_as_zero() {
        let (store, _dir) = create_test_store();
        let cf = store.cf(cf::USER_ORDER_COUNTS).unwrap();
        store
            .db
            .put_cf(&cf, keys::counter_key(&user("u1"), MenuType::Washoku).unwrap(), b"bad")
            .unwrap();
        drop(cf);

        store.increment_counter(&user("u1"), MenuType::Washoku).unwrap();
        let counts = store.get_user_counts(&user("u1")).unwrap().unwrap();
        assert_eq!(counts.washoku_cnt, 1);
    }

    #[test]
    fn list_user_counts_groups_cells() {
        let (store, _dir) = create_test_store();
        store.increment_counter(&user("u10"), MenuType::Yoshoku).unwrap();
        store.increment_counter(&user("u2"), MenuType::Washoku).unwrap();
        store.increment_counter(&user("u2"), MenuType::Yoshoku).unwrap();

        let rows = store.list_user_counts().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].user_id, user("u10"));
        assert_eq!((rows[0].washoku_cnt, rows[0].yoshoku_cnt), (0, 1));
        assert_eq!(rows[1].user_id, user("u2"));
        assert_eq!((rows[1].washoku_cnt, rows[1].yoshoku_cnt), (1, 1));
    }

    #[test]
    fn daily_summaries_filter_and_order() {
        let (store, _dir) = create_test_store();
        for (d, menu, count) in [
            ("2025-06-02", MenuType::Yoshoku, 4),
            ("2025-06-01", MenuType::Yoshoku, 2),
            ("2025-06-01", MenuType::Washoku, 3),
            ("2025-06-03", MenuType::Washoku, 1),
        ] {
            store
                .put_daily_summary(&DailySummary {
                    date: date(d),
                    menu_type: menu,
                    count,
                })
                .unwrap();
        }

        let all = store.list_daily_summaries(DateFilter::All).unwrap();
        let order: Vec<_> = all.iter().map(|s| (s.date, s.menu_type)).collect();
        assert_eq!(
            order,
            vec![
                (date("2025-06-01"), MenuType::Washoku),
                (date("2025-06-01"), MenuType::Yoshoku),
                (date("2025-06-02"), MenuType::Yoshoku),
                (date("2025-06-03"), MenuType::Washoku),
            ]
        );

        let on = store
            .list_daily_summaries(DateFilter::On(date("2025-06-02")))
            .unwrap();
        assert_eq!(on.len(), 1);
        assert_eq!(on[0].count, 4);

        let between = store
            .list_daily_summaries(DateFilter::Between(date("2025-06-02"), date("2025-06-03")))
            .unwrap();
        assert_eq!(between.len(), 2);

        // Overwrite keeps one row per key.
        store
            .put_daily_summary(&DailySummary {
                date: date("2025-06-02"),
                menu_type: MenuType::Yoshoku,
                count: 9,
            })
            .unwrap();
        let on = store
            .list_daily_summaries(DateFilter::On(date("2025-06-02")))
            .unwrap();
        assert_eq!(on.len(), 1);
        assert_eq!(on[0].count, 9);
    }

    #[test]
    fn preference_replaces_opposite() {
        let (store, _dir) = create_test_store();
        store.set_user_preference(&user("u1"), MenuType::Washoku).unwrap();
        store.set_user_preference(&user("u2"), MenuType::Yoshoku).unwrap();
        store.set_user_preference(&user("u1"), MenuType::Yoshoku).unwrap();

        let prefs = store.list_user_preferences().unwrap();
        assert_eq!(
            prefs,
            vec![
                (user("u1"), MenuType::Yoshoku),
                (user("u2"), MenuType::Yoshoku),
            ]
        );
    }
}
