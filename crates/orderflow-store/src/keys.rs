//! Key encoding utilities for `RocksDB`.
//!
//! Variable-length parts are prefixed with their length as `u32` big-endian,
//! so a user's prefix never matches a longer user id. Dates are encoded as
//! sign-flipped big-endian day numbers and sort chronologically.

use chrono::{Datelike, NaiveDate};
use orderflow_core::{FactId, MenuType, UserId};

use crate::error::{Result, StoreError};

/// Length of an encoded date.
pub const DATE_LEN: usize = 4;

/// Length of an encoded fact id.
pub const FACT_ID_LEN: usize = 16;

fn push_str(buf: &mut Vec<u8>, s: &str) -> Result<()> {
    let len = u32::try_from(s.len())
        .map_err(|_| StoreError::Database(format!("key part too long: {} bytes", s.len())))?;
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(s.as_bytes());
    Ok(())
}

/// Split a length-prefixed string off the front of `data`.
fn take_str<'a>(data: &'a [u8], table: &'static str) -> Result<(&'a str, &'a [u8])> {
    let corrupt = || StoreError::CorruptKey { table };
    let len_bytes: [u8; 4] = data
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(corrupt)?;
    let len = usize::try_from(u32::from_be_bytes(len_bytes)).map_err(|_| corrupt())?;
    let end = 4usize.checked_add(len).ok_or_else(corrupt)?;
    let raw = data.get(4..end).ok_or_else(corrupt)?;
    let s = std::str::from_utf8(raw).map_err(|_| corrupt())?;
    Ok((s, &data[end..]))
}

fn user_from(s: &str, table: &'static str) -> Result<UserId> {
    UserId::new(s).map_err(|_| StoreError::CorruptKey { table })
}

/// Encode a date so keys sort chronologically.
#[must_use]
pub fn date_key(date: NaiveDate) -> [u8; DATE_LEN] {
    let mut bytes = date.num_days_from_ce().to_be_bytes();
    bytes[0] ^= 0x80;
    bytes
}

/// Decode a date written by [`date_key`].
#[must_use]
pub fn date_from_key(mut bytes: [u8; DATE_LEN]) -> Option<NaiveDate> {
    bytes[0] ^= 0x80;
    NaiveDate::from_num_days_from_ce_opt(i32::from_be_bytes(bytes))
}

/// Prefix shared by every key of one user.
///
/// # Errors
///
/// Returns an error if the user id does not fit a key.
pub fn user_prefix(user_id: &UserId) -> Result<Vec<u8>> {
    let mut key = Vec::with_capacity(4 + user_id.as_str().len());
    push_str(&mut key, user_id.as_str())?;
    Ok(key)
}

/// Raw fact key.
///
/// Format: `len(user_id) || user_id || fact_id (16 bytes)`
///
/// Fact ids are ULIDs, so a user's rows sort by insert time.
///
/// # Errors
///
/// Returns an error if the user id does not fit a key.
pub fn raw_order_key(user_id: &UserId, fact_id: &FactId) -> Result<Vec<u8>> {
    let mut key = user_prefix(user_id)?;
    key.extend_from_slice(&fact_id.to_bytes());
    Ok(key)
}

/// Date index key for a raw fact.
///
/// Format: `order_date (4 bytes) || raw_order_key`
///
/// # Errors
///
/// Returns an error if the user id does not fit a key.
pub fn raw_order_date_key(date: NaiveDate, user_id: &UserId, fact_id: &FactId) -> Result<Vec<u8>> {
    let mut key = date_key(date).to_vec();
    key.extend(raw_order_key(user_id, fact_id)?);
    Ok(key)
}

/// Counter cell key.
///
/// Format: `len(user_id) || user_id || column`
///
/// # Errors
///
/// Returns an error if the user id does not fit a key.
pub fn counter_key(user_id: &UserId, menu: MenuType) -> Result<Vec<u8>> {
    let mut key = user_prefix(user_id)?;
    key.extend_from_slice(menu.counter_column().as_bytes());
    Ok(key)
}

/// Split a counter cell key into its user and menu type.
///
/// # Errors
///
/// Returns `StoreError::CorruptKey` if the key was not built by [`counter_key`].
pub fn split_counter_key(key: &[u8]) -> Result<(UserId, MenuType)> {
    const TABLE: &str = crate::schema::cf::USER_ORDER_COUNTS;
    let (user, column) = take_str(key, TABLE)?;
    let menu = MenuType::ALL
        .into_iter()
        .find(|m| m.counter_column().as_bytes() == column)
        .ok_or(StoreError::CorruptKey { table: TABLE })?;
    Ok((user_from(user, TABLE)?, menu))
}

/// Daily summary key.
///
/// Format: `order_date (4 bytes) || menu_type`
#[must_use]
pub fn summary_key(date: NaiveDate, menu: MenuType) -> Vec<u8> {
    let mut key = date_key(date).to_vec();
    key.extend_from_slice(menu.as_str().as_bytes());
    key
}

/// Preference key.
///
/// Format: `len(menu_type) || menu_type || user_id`
///
/// # Errors
///
/// Returns an error if the key cannot be built.
pub fn preference_key(menu: MenuType, user_id: &UserId) -> Result<Vec<u8>> {
    let mut key = Vec::with_capacity(4 + 7 + user_id.as_str().len());
    push_str(&mut key, menu.as_str())?;
    key.extend_from_slice(user_id.as_bytes());
    Ok(key)
}

/// Split a preference key into its user and menu type.
///
/// # Errors
///
/// Returns `StoreError::CorruptKey` if the key was not built by [`preference_key`].
pub fn split_preference_key(key: &[u8]) -> Result<(UserId, MenuType)> {
    const TABLE: &str = crate::schema::cf::USER_PREFERENCES;
    let corrupt = || StoreError::CorruptKey { table: TABLE };
    let (menu, user) = take_str(key, TABLE)?;
    let menu: MenuType = menu.parse().map_err(|_| corrupt())?;
    let user = std::str::from_utf8(user).map_err(|_| corrupt())?;
    Ok((user_from(user, TABLE)?, menu))
}
