//! Internal helpers shared by the record types and the timeline.
//!
//! These utilities are **not** part of the public API.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Truncates an instant to the millisecond precision used by the timeline
/// cursor.
pub(crate) fn to_millis(at: DateTime<Utc>) -> DateTime<Utc> {
    at.trunc_subsecs(3)
}

/// Deserializes an optional record timestamp without failing the record.
///
/// Accepts RFC 3339 strings and epoch milliseconds. Anything else is logged
/// and treated as a missing timestamp, so the timeline falls back to "now"
/// for that event instead of rejecting the whole feed.
pub(crate) fn lenient_instant<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    let parsed = match raw {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => match DateTime::parse_from_rfc3339(s.trim()) {
            Ok(at) => Some(at.with_timezone(&Utc)),
            Err(err) => {
                tracing::warn!("ignoring unparsable record timestamp {s:?}: {err}");
                None
            }
        },
        Some(Value::Number(n)) => {
            let at = n.as_i64().and_then(DateTime::<Utc>::from_timestamp_millis);
            if at.is_none() {
                tracing::warn!("ignoring out of range record timestamp {n}");
            }
            at
        }
        Some(other) => {
            tracing::warn!("ignoring record timestamp of unexpected shape: {other}");
            None
        }
    };
    Ok(parsed)
}

/// Serde default for the `active` flag of records.
pub(crate) fn active_by_default() -> bool {
    true
}
