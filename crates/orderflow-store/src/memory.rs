//! In-memory storage implementation for tests and ephemeral runs.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDate;
use orderflow_core::{DailySummary, DateFilter, MenuType, RawOrder, UserCounts, UserId};

use crate::error::{Result, StoreError};
use crate::Store;

#[derive(Default)]
struct Tables {
    raw_orders: Vec<RawOrder>,
    counts: BTreeMap<UserId, UserCounts>,
    summaries: BTreeMap<(NaiveDate, MenuType), i64>,
    preferences: BTreeSet<(MenuType, UserId)>,
}

/// Store keeping every table in process memory.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Database("memory store lock poisoned".into()))
    }
}

impl Store for MemoryStore {
    fn insert_raw_order(&self, order: &RawOrder) -> Result<()> {
        self.lock()?.raw_orders.push(order.clone());
        Ok(())
    }

    fn raw_orders_for_user(&self, user_id: &UserId) -> Result<Vec<RawOrder>> {
        Ok(self
            .lock()?
            .raw_orders
            .iter()
            .filter(|o| &o.user_id == user_id)
            .cloned()
            .collect())
    }

    fn raw_orders_on(&self, date: NaiveDate) -> Result<Vec<RawOrder>> {
        Ok(self
            .lock()?
            .raw_orders
            .iter()
            .filter(|o| o.order_date == date)
            .cloned()
            .collect())
    }

    fn increment_counter(&self, user_id: &UserId, menu: MenuType) -> Result<()> {
        let mut tables = self.lock()?;
        let row = tables
            .counts
            .entry(user_id.clone())
            .or_insert_with(|| UserCounts::zero(user_id.clone()));
        match menu {
            MenuType::Washoku => row.washoku_cnt += 1,
            MenuType::Yoshoku => row.yoshoku_cnt += 1,
        }
        Ok(())
    }

    fn get_user_counts(&self, user_id: &UserId) -> Result<Option<UserCounts>> {
        Ok(self.lock()?.counts.get(user_id).cloned())
    }

    fn list_user_counts(&self) -> Result<Vec<UserCounts>> {
        Ok(self.lock()?.counts.values().cloned().collect())
    }

    fn put_daily_summary(&self, summary: &DailySummary) -> Result<()> {
        self.lock()?
            .summaries
            .insert((summary.date, summary.menu_type), summary.count);
        Ok(())
    }

    fn list_daily_summaries(&self, filter: DateFilter) -> Result<Vec<DailySummary>> {
        Ok(self
            .lock()?
            .summaries
            .iter()
            .filter(|((date, _), _)| filter.contains(*date))
            .map(|(&(date, menu_type), &count)| DailySummary {
                date,
                menu_type,
                count,
            })
            .collect())
    }

    fn set_user_preference(&self, user_id: &UserId, menu: MenuType) -> Result<()> {
        let mut tables = self.lock()?;
        tables
            .preferences
            .remove(&(menu.opposite(), user_id.clone()));
        tables.preferences.insert((menu, user_id.clone()));
        Ok(())
    }

    fn list_user_preferences(&self) -> Result<Vec<(UserId, MenuType)>> {
        Ok(self
            .lock()?
            .preferences
            .iter()
            .map(|(menu, user)| (user.clone(), *menu))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(s: &str) -> UserId {
        UserId::new(s).unwrap()
    }

    #[test]
    fn counters_and_preferences() {
        let store = MemoryStore::new();
        let u1 = user("u1");
        assert!(store.get_user_counts(&u1).unwrap().is_none());

        store.increment_counter(&u1, MenuType::Washoku).unwrap();
        store.increment_counter(&u1, MenuType::Washoku).unwrap();
        let counts = store.get_user_counts(&u1).unwrap().unwrap();
        assert_eq!((counts.washoku_cnt, counts.yoshoku_cnt), (2, 0));

        store.set_user_preference(&u1, MenuType::Washoku).unwrap();
        store.set_user_preference(&u1, MenuType::Yoshoku).unwrap();
        assert_eq!(
            store.list_user_preferences().unwrap(),
            vec![(u1, MenuType::Yoshoku)]
        );
    }

    #[test]
    fn summaries_ordered_by_date_then_menu() {
        let store = MemoryStore::new();
        let d1: NaiveDate = "2025-06-01".parse().unwrap();
        let d2: NaiveDate = "2025-06-02".parse().unwrap();
        for (date, menu_type) in [
            (d2, MenuType::Washoku),
            (d1, MenuType::Yoshoku),
            (d1, MenuType::Washoku),
        ] {
            store
                .put_daily_summary(&DailySummary {
                    date,
                    menu_type,
                    count: 1,
                })
                .unwrap();
        }

        let keys: Vec<_> = store
            .list_daily_summaries(DateFilter::All)
            .unwrap()
            .into_iter()
            .map(|s| (s.date, s.menu_type))
            .collect();
        assert_eq!(
            keys,
            vec![
                (d1, MenuType::Washoku),
                (d1, MenuType::Yoshoku),
                (d2, MenuType::Washoku),
            ]
        );
        assert_eq!(
            store
                .list_daily_summaries(DateFilter::On(d2))
                .unwrap()
                .len(),
            1
        );
    }
}
