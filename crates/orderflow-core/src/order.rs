//! Order event types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::OrderError;
use crate::UserId;

/// An order placed by a user, as received at the ingest boundary.
///
/// `menu_type` is kept as the raw string the caller sent. Membership in
/// [`MenuType`] is checked by [`OrderEvent::menu`], which only the storage
/// writer calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderEvent {
    /// The ordering user; also the log partition key.
    pub user_id: UserId,

    /// When the order happened, with the caller's UTC offset preserved.
    pub timestamp: DateTime<FixedOffset>,

    /// Raw menu type (`washoku` or `yoshoku` for valid events).
    pub menu_type: String,
}

impl OrderEvent {
    /// Create a new order event.
    #[must_use]
    pub fn new(
        user_id: UserId,
        timestamp: DateTime<FixedOffset>,
        menu_type: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            timestamp,
            menu_type: menu_type.into(),
        }
    }

    /// Resolve the raw menu type.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::InvalidMenuType` for anything other than
    /// `washoku` or `yoshoku`.
    pub fn menu(&self) -> Result<MenuType, OrderError> {
        self.menu_type.parse()
    }

    /// The order instant in UTC.
    #[must_use]
    pub fn timestamp_utc(&self) -> DateTime<Utc> {
        self.timestamp.with_timezone(&Utc)
    }

    /// The UTC calendar date of the order (timestamp truncated to UTC midnight).
    #[must_use]
    pub fn order_date(&self) -> NaiveDate {
        self.timestamp_utc().date_naive()
    }
}

/// The two menu families tracked by the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MenuType {
    /// Japanese cuisine.
    Washoku,
    /// Western cuisine.
    Yoshoku,
}

impl MenuType {
    /// Every menu type, in display order.
    pub const ALL: [MenuType; 2] = [MenuType::Washoku, MenuType::Yoshoku];

    /// Get the menu type name as a string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Washoku => "washoku",
            Self::Yoshoku => "yoshoku",
        }
    }

    /// Name of the user counter column incremented for this menu type.
    #[must_use]
    pub const fn counter_column(self) -> &'static str {
        match self {
            Self::Washoku => "washoku_cnt",
            Self::Yoshoku => "yoshoku_cnt",
        }
    }

    /// The other menu type.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Washoku => Self::Yoshoku,
            Self::Yoshoku => Self::Washoku,
        }
    }
}

impl FromStr for MenuType {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "washoku" => Ok(Self::Washoku),
            "yoshoku" => Ok(Self::Yoshoku),
            other => Err(OrderError::InvalidMenuType(other.to_string())),
        }
    }
}

impl fmt::Display for MenuType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(ts: &str, menu: &str) -> OrderEvent {
        OrderEvent::new(
            UserId::new("u1").unwrap(),
            DateTime::parse_from_rfc3339(ts).unwrap(),
            menu,
        )
    }

    #[test]
    fn menu_type_resolution() {
        assert_eq!(event("2025-05-31T10:00:00Z", "washoku").menu(), Ok(MenuType::Washoku));
        assert_eq!(event("2025-05-31T10:00:00Z", "yoshoku").menu(), Ok(MenuType::Yoshoku));
        assert_eq!(
            event("2025-05-31T10:00:00Z", "dessert").menu(),
            Err(OrderError::InvalidMenuType("dessert".into()))
        );
        // Case sensitive, like the counter column names.
        assert!(event("2025-05-31T10:00:00Z", "Washoku").menu().is_err());
    }

    #[test]
    fn counter_columns() {
        assert_eq!(MenuType::Washoku.counter_column(), "washoku_cnt");
        assert_eq!(MenuType::Yoshoku.counter_column(), "yoshoku_cnt");
        assert_eq!(MenuType::Washoku.opposite(), MenuType::Yoshoku);
    }

    #[test]
    fn order_date_truncates_in_utc() {
        let e = event("2025-05-31T10:00:00Z", "washoku");
        assert_eq!(e.order_date(), NaiveDate::from_ymd_opt(2025, 5, 31).unwrap());

        // 2025-06-01 08:30 in Tokyo is still 2025-05-31 in UTC.
        let e = event("2025-06-01T08:30:00+09:00", "washoku");
        assert_eq!(e.order_date(), NaiveDate::from_ymd_opt(2025, 5, 31).unwrap());
    }

    #[test]
    fn menu_type_serde() {
        let json = serde_json::to_string(&MenuType::Yoshoku).unwrap();
        assert_eq!(json, "\"yoshoku\"");
    }
}
