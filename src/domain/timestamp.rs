//! Normalized timestamps.
//!
//! Devices and stores disagree on how time is written: RFC 3339 strings,
//! epoch seconds, epoch milliseconds, numeric strings, and store-native
//! `{ "seconds", "nanoseconds" }` objects all show up. [`Timestamp`]
//! collapses every representation into epoch milliseconds at the point
//! where data enters the bridge, so nothing downstream handles mixed forms.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Integers with a magnitude below this are epoch seconds; at or above it
/// they are epoch milliseconds. 10^11 seconds is year 5138, 10^11
/// milliseconds is March 1973.
const SECONDS_CUTOFF: i64 = 100_000_000_000;

/// Wall-clock instant in milliseconds since the Unix epoch (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Wraps a raw epoch-millisecond value.
    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the epoch-millisecond value.
    #[must_use]
    pub const fn as_millis(self) -> i64 {
        self.0
    }

    /// Current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// Converts a [`DateTime<Utc>`].
    #[must_use]
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp_millis())
    }

    /// Converts back to a [`DateTime<Utc>`], or `None` if out of range.
    #[must_use]
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.0)
    }

    /// Signed milliseconds elapsed from `earlier` to `self`.
    ///
    /// Negative when `earlier` is actually later (clock skew).
    #[must_use]
    pub const fn millis_since(self, earlier: Self) -> i64 {
        self.0.saturating_sub(earlier.0)
    }

    /// Returns a copy shifted by `millis` (negative moves into the past).
    #[must_use]
    pub const fn offset_millis(self, millis: i64) -> Self {
        Self(self.0.saturating_add(millis))
    }

    /// Interprets an integer as epoch seconds or milliseconds by magnitude.
    #[must_use]
    pub const fn from_epoch_number(n: i64) -> Self {
        if n.unsigned_abs() < SECONDS_CUTOFF.unsigned_abs() {
            Self(n.saturating_mul(1000))
        } else {
            Self(n)
        }
    }

    /// Parses a timestamp string: RFC 3339 first, then a bare number.
    #[must_use]
    pub fn parse_str(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(Self::from_datetime(dt.with_timezone(&Utc)));
        }
        if let Ok(n) = raw.parse::<i64>() {
            return Some(Self::from_epoch_number(n));
        }
        raw.parse::<f64>().ok().and_then(Self::from_epoch_float)
    }

    /// Normalizes any JSON representation the stores are known to emit.
    ///
    /// Returns `None` for `null`, empty strings, booleans, arrays, and
    /// anything else that cannot be read as a point in time.
    #[must_use]
    pub fn from_raw(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::from_epoch_number)
                .or_else(|| n.as_f64().and_then(Self::from_epoch_float)),
            serde_json::Value::String(s) => Self::parse_str(s),
            serde_json::Value::Object(map) => {
                let seconds = map
                    .get("seconds")
                    .or_else(|| map.get("_seconds"))
                    .and_then(serde_json::Value::as_i64)?;
                let nanos = map
                    .get("nanoseconds")
                    .or_else(|| map.get("_nanoseconds"))
                    .and_then(serde_json::Value::as_i64)
                    .unwrap_or(0);
                Some(Self(
                    seconds
                        .saturating_mul(1000)
                        .saturating_add(nanos / 1_000_000),
                ))
            }
            _ => None,
        }
    }

    /// RFC 3339 rendering with millisecond precision.
    #[must_use]
    pub fn to_rfc3339(self) -> Option<String> {
        self.to_datetime()
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    #[allow(clippy::cast_possible_truncation)]
    fn from_epoch_float(f: f64) -> Option<Self> {
        if !f.is_finite() {
            return None;
        }
        let millis = if f.abs() < SECONDS_CUTOFF as f64 {
            f * 1000.0
        } else {
            f
        };
        Some(Self(millis.round() as i64))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_rfc3339() {
            Some(s) => f.write_str(&s),
            None => write!(f, "{}ms", self.0),
        }
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::from_datetime(dt)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    const NOV_14_2023_MS: i64 = 1_700_000_000_000;

    #[test]
    fn epoch_seconds_are_scaled() {
        let ts = Timestamp::from_raw(&json!(1_700_000_000));
        assert_eq!(ts, Some(Timestamp::from_millis(NOV_14_2023_MS)));
    }

    #[test]
    fn epoch_millis_pass_through() {
        let ts = Timestamp::from_raw(&json!(NOV_14_2023_MS));
        assert_eq!(ts, Some(Timestamp::from_millis(NOV_14_2023_MS)));
    }

    #[test]
    fn numeric_string_is_accepted() {
        let ts = Timestamp::from_raw(&json!("1700000000000"));
        assert_eq!(ts, Some(Timestamp::from_millis(NOV_14_2023_MS)));
    }

    #[test]
    fn fractional_seconds_round_to_millis() {
        let ts = Timestamp::from_raw(&json!(1_700_000_000.25));
        assert_eq!(ts, Some(Timestamp::from_millis(NOV_14_2023_MS + 250)));
    }

    #[test]
    fn rfc3339_string_is_accepted() {
        let ts = Timestamp::from_raw(&json!("2023-11-14T22:13:20Z"));
        assert_eq!(ts, Some(Timestamp::from_millis(NOV_14_2023_MS)));

        let offset = Timestamp::from_raw(&json!("2023-11-15T03:43:20+05:30"));
        assert_eq!(offset, Some(Timestamp::from_millis(NOV_14_2023_MS)));
    }

    #[test]
    fn store_native_object_is_accepted() {
        let ts = Timestamp::from_raw(&json!({ "seconds": 1_700_000_000, "nanoseconds": 5_000_000 }));
        assert_eq!(ts, Some(Timestamp::from_millis(NOV_14_2023_MS + 5)));

        let underscored = Timestamp::from_raw(&json!({ "_seconds": 1_700_000_000 }));
        assert_eq!(underscored, Some(Timestamp::from_millis(NOV_14_2023_MS)));
    }

    #[test]
    fn unreadable_values_are_none() {
        assert_eq!(Timestamp::from_raw(&json!(null)), None);
        assert_eq!(Timestamp::from_raw(&json!("")), None);
        assert_eq!(Timestamp::from_raw(&json!("yesterday")), None);
        assert_eq!(Timestamp::from_raw(&json!(true)), None);
        assert_eq!(Timestamp::from_raw(&json!([1, 2])), None);
    }

    #[test]
    fn millis_since_is_signed() {
        let a = Timestamp::from_millis(10_000);
        let b = Timestamp::from_millis(4_000);
        assert_eq!(a.millis_since(b), 6_000);
        assert_eq!(b.millis_since(a), -6_000);
    }

    #[test]
    fn display_is_rfc3339_millis() {
        let ts = Timestamp::from_millis(NOV_14_2023_MS);
        assert_eq!(ts.to_string(), "2023-11-14T22:13:20.000Z");
    }
}
