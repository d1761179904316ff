use chrono::{Datelike, NaiveDateTime};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Archive timestamps are `yyyyMMddhhmmss`, truncated from the right when
    /// the capture is less precise.
    pub(crate) static ref RE_SNAPSHOT_TIMESTAMP: Regex =
        Regex::new(r"^(?P<year>(19|20)\d\d)\d{0,10}$").unwrap();
}

/// Format of a complete snapshot timestamp.
pub const SNAPSHOT_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Padding used to complete truncated timestamps: january 1st, midnight.
const TIMESTAMP_PADDING: &str = "0101000000";

pub struct SnapshotTimestamp;

impl SnapshotTimestamp {
    /// Parse a (possibly truncated) 14 digit snapshot timestamp.
    pub fn parse(timestamp: &str) -> Option<NaiveDateTime> {
        let timestamp = timestamp.trim();
        if !RE_SNAPSHOT_TIMESTAMP.is_match(timestamp) {
            return None;
        }
        // a trailing odd digit is half a field and carries no date
        let whole_fields = timestamp.len() - timestamp.len() % 2;
        let mut full = timestamp[..whole_fields].to_string();
        if full.len() < 14 {
            full.push_str(&TIMESTAMP_PADDING[full.len() - 4..]);
        }
        NaiveDateTime::parse_from_str(&full, SNAPSHOT_TIMESTAMP_FORMAT).ok()
    }

    /// The year of the timestamp, also for timestamps whose remaining digits
    /// are not a valid date.
    pub fn year(timestamp: &str) -> Option<i32> {
        if let Some(date) = SnapshotTimestamp::parse(timestamp) {
            return Some(date.year());
        }
        RE_SNAPSHOT_TIMESTAMP
            .captures(timestamp.trim())
            .and_then(|c| c.name("year"))
            .and_then(|m| m.as_str().parse().ok())
    }
}
