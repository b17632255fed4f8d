//! Wire record encoding for order events.
//!
//! Records are written as a versioned JSON envelope:
//!
//! ```text
//! {"menu_type":"washoku","timestamp":"2025-05-31T10:00:00Z","user_id":"u1","v":1}
//! ```
//!
//! The decoder also accepts the legacy positional form
//! `user_id,timestamp,menu_type` so records produced before the envelope was
//! introduced still drain from the log.
//!
//! Decoding never validates `menu_type`; that happens in the storage writer.

use chrono::{DateTime, SecondsFormat};
use serde::Deserialize;

use crate::error::{OrderError, Result};
use crate::{OrderEvent, UserId};

/// Current envelope version written by [`encode`].
pub const WIRE_VERSION: u32 = 1;

/// Field delimiter of the legacy positional record.
const LEGACY_DELIMITER: char = ',';

/// Number of fields in a legacy positional record.
const LEGACY_FIELD_COUNT: usize = 3;

#[derive(Debug, Deserialize)]
struct Envelope {
    v: u32,
    user_id: String,
    timestamp: String,
    menu_type: String,
}

/// Encode an order event into a wire record.
///
/// The output is deterministic and the timestamp keeps its UTC offset and
/// sub-second precision.
#[must_use]
pub fn encode(event: &OrderEvent) -> Vec<u8> {
    serde_json::json!({
        "v": WIRE_VERSION,
        "user_id": event.user_id.as_str(),
        "timestamp": event.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        "menu_type": event.menu_type,
    })
    .to_string()
    .into_bytes()
}

/// Decode a wire record into an order event.
///
/// # Errors
///
/// - `OrderError::MalformedRecord` if the payload is not UTF-8, is not a
///   well-formed envelope of a supported version, has the wrong legacy field
///   count, or carries an empty `user_id`.
/// - `OrderError::InvalidTimestamp` if the timestamp is not RFC 3339.
pub fn decode(payload: &[u8]) -> Result<OrderEvent> {
    let text = std::str::from_utf8(payload)
        .map_err(|e| OrderError::MalformedRecord(format!("payload is not UTF-8: {e}")))?;

    let (user_id, timestamp, menu_type) = if text.trim_start().starts_with('{') {
        let envelope: Envelope = serde_json::from_str(text)
            .map_err(|e| OrderError::MalformedRecord(format!("invalid envelope: {e}")))?;
        if envelope.v == 0 || envelope.v > WIRE_VERSION {
            return Err(OrderError::MalformedRecord(format!(
                "unsupported wire version {}",
                envelope.v
            )));
        }
        (envelope.user_id, envelope.timestamp, envelope.menu_type)
    } else {
        let parts: Vec<&str> = text.split(LEGACY_DELIMITER).collect();
        if parts.len() != LEGACY_FIELD_COUNT {
            return Err(OrderError::MalformedRecord(format!(
                "expected {LEGACY_FIELD_COUNT} fields, found {}",
                parts.len()
            )));
        }
        (
            parts[0].to_string(),
            parts[1].to_string(),
            parts[2].to_string(),
        )
    };

    let user_id = UserId::new(user_id)
        .map_err(|e| OrderError::MalformedRecord(format!("user_id: {e}")))?;

    let timestamp =
        DateTime::parse_from_rfc3339(&timestamp).map_err(|e| OrderError::InvalidTimestamp {
            reason: e.to_string(),
            value: timestamp,
        })?;

    Ok(OrderEvent {
        user_id,
        timestamp,
        menu_type,
    })
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
    fn encode_is_deterministic() {
        let e = event("2025-05-31T10:00:00Z", "washoku");
        assert_eq!(encode(&e), encode(&e));
        assert_eq!(
            String::from_utf8(encode(&e)).unwrap(),
            r#"{"menu_type":"washoku","timestamp":"2025-05-31T10:00:00Z","user_id":"u1","v":1}"#
        );
    }

    #[test]
    fn decode_preserves_fields() {
        for (ts, menu) in [
            ("2025-05-31T10:00:00Z", "washoku"),
            ("2025-05-31T23:59:59.123456789+09:00", "yoshoku"),
            ("2024-02-29T00:00:00-05:30", "washoku"),
        ] {
            let e = event(ts, menu);
            let decoded = decode(&encode(&e)).unwrap();
            assert_eq!(decoded, e);
            assert_eq!(decoded.timestamp.offset(), e.timestamp.offset());
        }
    }

    #[test]
    fn user_id_with_delimiter_survives_envelope() {
        let e = OrderEvent::new(
            UserId::new("tanaka,taro").unwrap(),
            DateTime::parse_from_rfc3339("2025-05-31T10:00:00Z").unwrap(),
            "washoku",
        );
        assert_eq!(decode(&encode(&e)).unwrap(), e);
    }

    #[test]
    fn decode_does_not_validate_menu_type() {
        let e = event("2025-05-31T10:00:00Z", "dessert");
        let decoded = decode(&encode(&e)).unwrap();
        assert_eq!(decoded.menu_type, "dessert");
    }

    #[test]
    fn decode_legacy_record() {
        let decoded = decode(b"u1,2025-05-31T10:00:00Z,washoku").unwrap();
        assert_eq!(decoded, event("2025-05-31T10:00:00Z", "washoku"));
    }

    #[test]
    fn legacy_field_count_mismatch() {
        for payload in [
            &b"u1,2025-05-31T10:00:00Z"[..],
            b"u1,2025-05-31T10:00:00Z,washoku,extra",
            b"",
        ] {
            assert!(matches!(decode(payload), Err(OrderError::MalformedRecord(_))));
        }
    }

    #[test]
    fn invalid_timestamp() {
        let err = decode(b"u1,yesterday,washoku").unwrap_err();
        assert!(matches!(err, OrderError::InvalidTimestamp { ref value, .. } if value == "yesterday"));

        let err = decode(br#"{"v":1,"user_id":"u1","timestamp":"2025-13-01T00:00:00Z","menu_type":"washoku"}"#)
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidTimestamp { .. }));
    }

    #[test]
    fn malformed_envelopes() {
        for payload in [
            &br#"{"v":1,"user_id":"u1","menu_type":"washoku"}"#[..],
            br#"{"v":2,"user_id":"u1","timestamp":"2025-05-31T10:00:00Z","menu_type":"washoku"}"#,
            br#"{"user_id":"u1","timestamp":"2025-05-31T10:00:00Z","menu_type":"washoku"}"#,
            br#"{"v":1,"user_id":"","timestamp":"2025-05-31T10:00:00Z","menu_type":"washoku"}"#,
            b"{not json",
            &[0xff, 0xfe, 0x2c],
        ] {
            assert!(
                matches!(decode(payload), Err(OrderError::MalformedRecord(_))),
                "payload {payload:?} should be malformed"
            );
        }
    }

    #[test]
    fn envelope_ignores_unknown_fields() {
        let decoded = decode(
            br#"{"v":1,"user_id":"u1","timestamp":"2025-05-31T10:00:00Z","menu_type":"washoku","channel":"app"}"#,
        )
        .unwrap();
        assert_eq!(decoded.menu_type, "washoku");
    }
}
