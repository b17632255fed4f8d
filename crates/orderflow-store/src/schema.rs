//! Database schema definitions and column families.

/// Column family (table) names.
pub mod cf {
    /// Raw fact rows, keyed by `user_id || fact_id`.
    pub const RAW_ORDERS: &str = "raw_orders";

    /// Raw fact rows, keyed by `order_date || user_id || fact_id`.
    /// Written in the same batch as `RAW_ORDERS`.
    pub const RAW_ORDERS_BY_DATE: &str = "raw_orders_by_date";

    /// Counter cells, keyed by `user_id || column`. Values are `i64` little-endian.
    pub const USER_ORDER_COUNTS: &str = "user_order_counts";

    /// Daily totals, keyed by `order_date || menu_type`.
    pub const DAILY_ORDER_SUMMARIES: &str = "daily_order_summaries";

    /// Preferences, keyed by `preferred_menu_type || user_id`. Value is empty.
    pub const USER_PREFERENCES: &str = "user_preferences";
}

/// Name of the merge operator combining counter cells.
pub const COUNTER_MERGE_OPERATOR: &str = "orderflow_counter_add";

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::RAW_ORDERS,
        cf::RAW_ORDERS_BY_DATE,
        cf::USER_ORDER_COUNTS,
        cf::DAILY_ORDER_SUMMARIES,
        cf::USER_PREFERENCES,
    ]
}
