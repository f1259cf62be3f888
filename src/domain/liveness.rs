//! Online/offline classification from a last-seen time.
//!
//! A device is online iff it was seen at most [`ONLINE_WINDOW_MS`] ago.
//! The window is fixed. A `last_seen` in the future (device or store clock
//! ahead of ours) produces a negative elapsed time and is therefore
//! classified online; nothing here guards against skew.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{DeviceRecord, Timestamp};

/// Staleness window: one minute.
pub const ONLINE_WINDOW_MS: i64 = 60_000;

/// Display value used when a device has never reported.
pub const NEVER_SEEN: &str = "Never";

/// Connectivity classification of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    /// Seen within the staleness window.
    Online,
    /// Not seen within the staleness window, or never seen.
    Offline,
    /// No device record to evaluate.
    Unknown,
}

impl DeviceStatus {
    /// Returns the status as a static string slice.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns `true` if `last_seen` is present and no more than one minute
/// before `now`.
#[must_use]
pub const fn is_online_at(last_seen: Option<Timestamp>, now: Timestamp) -> bool {
    match last_seen {
        Some(seen) => now.millis_since(seen) <= ONLINE_WINDOW_MS,
        None => false,
    }
}

/// [`is_online_at`] against the current wall clock.
#[must_use]
pub fn is_online(last_seen: Option<Timestamp>) -> bool {
    is_online_at(last_seen, Timestamp::now())
}

/// Classifies a possibly missing device record at `now`.
#[must_use]
pub fn device_status_at(record: Option<&DeviceRecord>, now: Timestamp) -> DeviceStatus {
    match record {
        None => DeviceStatus::Unknown,
        Some(r) if is_online_at(r.last_seen, now) => DeviceStatus::Online,
        Some(_) => DeviceStatus::Offline,
    }
}

/// [`device_status_at`] against the current wall clock.
#[must_use]
pub fn device_status(record: Option<&DeviceRecord>) -> DeviceStatus {
    device_status_at(record, Timestamp::now())
}

/// Human-readable last-seen value: RFC 3339, or [`NEVER_SEEN`].
#[must_use]
pub fn format_last_seen(last_seen: Option<Timestamp>) -> String {
    last_seen.map_or_else(|| NEVER_SEEN.to_string(), |ts| ts.to_string())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::DeviceId;

    const NOW: Timestamp = Timestamp::from_millis(1_700_000_000_000);

    #[test]
    fn never_seen_is_offline() {
        assert!(!is_online_at(None, NOW));
        assert!(!is_online(None));
    }

    #[test]
    fn thirty_seconds_ago_is_online() {
        assert!(is_online_at(Some(NOW.offset_millis(-30_000)), NOW));
    }

    #[test]
    fn ninety_seconds_ago_is_offline() {
        assert!(!is_online_at(Some(NOW.offset_millis(-90_000)), NOW));
    }

    #[test]
    fn exactly_one_minute_is_online() {
        assert!(is_online_at(Some(NOW.offset_millis(-ONLINE_WINDOW_MS)), NOW));
        assert!(!is_online_at(Some(NOW.offset_millis(-ONLINE_WINDOW_MS - 1)), NOW));
    }

    #[test]
    fn stale_timestamps_are_offline() {
        for minutes in [2_i64, 5, 60, 24 * 60, 365 * 24 * 60] {
            let seen = NOW.offset_millis(-minutes * 60_000);
            assert!(!is_online_at(Some(seen), NOW), "{minutes} minutes ago");
        }
    }

    #[test]
    fn recent_timestamps_are_online() {
        for secs in [0_i64, 1, 15, 45, 59, 60] {
            let seen = NOW.offset_millis(-secs * 1000);
            assert!(is_online_at(Some(seen), NOW), "{secs} seconds ago");
        }
    }

    // Clock skew is not guarded: a last-seen in the future counts as online.
    #[test]
    fn future_timestamp_is_online() {
        assert!(is_online_at(Some(NOW.offset_millis(10 * 60_000)), NOW));
        assert!(is_online(Some(Timestamp::now().offset_millis(3_600_000))));
    }

    #[test]
    fn wall_clock_variant_agrees() {
        assert!(is_online(Some(Timestamp::now().offset_millis(-30_000))));
        assert!(!is_online(Some(Timestamp::now().offset_millis(-90_000))));
    }

    #[test]
    fn status_of_missing_record_is_unknown() {
        assert_eq!(device_status_at(None, NOW), DeviceStatus::Unknown);
    }

    #[test]
    fn status_follows_last_seen() {
        let Ok(id) = DeviceId::parse("ESP32_001") else {
            panic!("valid id");
        };
        let mut record = DeviceRecord::new(id);
        assert_eq!(device_status_at(Some(&record), NOW), DeviceStatus::Offline);

        record.last_seen = Some(NOW.offset_millis(-5_000));
        assert_eq!(device_status_at(Some(&record), NOW), DeviceStatus::Online);
    }

    #[test]
    fn format_last_seen_handles_never() {
        assert_eq!(format_last_seen(None), "Never");
        assert_eq!(format_last_seen(Some(NOW)), "2023-11-14T22:13:20.000Z");
    }
}
