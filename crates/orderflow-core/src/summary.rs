//! Stored rows and read models.
//!
//! These are the shapes written by the storage writer and the aggregator, and
//! read back by the query API.

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{FactId, MenuType, OrderEvent, UserId};

/// One immutable raw fact row per accepted event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawOrder {
    /// Row identity; unique per insert, not per event.
    pub fact_id: FactId,

    /// The ordering user.
    pub user_id: UserId,

    /// Order timestamp as received.
    pub timestamp: DateTime<FixedOffset>,

    /// UTC date of `timestamp`, stored for date-range scans.
    pub order_date: NaiveDate,

    /// Raw menu type, stored before validation.
    pub menu_type: String,
}

impl RawOrder {
    /// Build a fresh fact row for an event.
    #[must_use]
    pub fn from_event(event: &OrderEvent) -> Self {
        Self {
            fact_id: FactId::generate(),
            user_id: event.user_id.clone(),
            timestamp: event.timestamp,
            order_date: event.order_date(),
            menu_type: event.menu_type.clone(),
        }
    }
}

/// Running per-user order totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCounts {
    /// The user.
    pub user_id: UserId,
    /// Number of washoku orders counted.
    pub washoku_cnt: i64,
    /// Number of yoshoku orders counted.
    pub yoshoku_cnt: i64,
}

impl UserCounts {
    /// A zeroed counter row.
    #[must_use]
    pub fn zero(user_id: UserId) -> Self {
        Self {
            user_id,
            washoku_cnt: 0,
            yoshoku_cnt: 0,
        }
    }

    /// Counter value for a menu type.
    #[must_use]
    pub fn get(&self, menu: MenuType) -> i64 {
        match menu {
            MenuType::Washoku => self.washoku_cnt,
            MenuType::Yoshoku => self.yoshoku_cnt,
        }
    }

    /// The user's preferred menu type: washoku only on a strict majority.
    #[must_use]
    pub fn preference(&self) -> MenuType {
        if self.washoku_cnt > self.yoshoku_cnt {
            MenuType::Washoku
        } else {
            MenuType::Yoshoku
        }
    }
}

/// Orders per menu type on one UTC day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySummary {
    /// The day.
    pub date: NaiveDate,
    /// The menu type.
    pub menu_type: MenuType,
    /// Number of orders.
    pub count: i64,
}

/// Users grouped by preferred menu type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// The preferred menu type.
    pub segment: MenuType,
    /// Number of users in the segment.
    pub count: usize,
    /// Members, sorted.
    pub users: Vec<UserId>,
}

/// Date selection for summary queries. Bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateFilter {
    /// Every date.
    #[default]
    All,
    /// A single date.
    On(NaiveDate),
    /// An inclusive range.
    Between(NaiveDate, NaiveDate),
}

impl DateFilter {
    /// Whether `date` passes the filter.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        match *self {
            Self::All => true,
            Self::On(d) => date == d,
            Self::Between(from, to) => from <= date && date <= to,
        }
    }
}
