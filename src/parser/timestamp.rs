//! Record timestamps: `HH:MM:SS.fff (nanos)`.
//!
//! The wall-clock part has a variable number of fractional digits; the
//! parenthesized counter is a monotonic nanosecond value.

use chrono::{NaiveTime, Timelike};

/// Parsed record timestamp
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Timestamp {
    /// Wall-clock time of day
    pub time: Option<NaiveTime>,

    /// Monotonic nanosecond counter
    pub nanos: Option<u64>,
}

impl Timestamp {
    pub fn is_complete(&self) -> bool {
        self.time.is_some() && self.nanos.is_some()
    }
}

/// Parse the leading timestamp field of a record
///
/// Either half may be missing or malformed; the other is still returned.
pub fn parse_timestamp(field: &str) -> Timestamp {
    let (wall, counter) = match field.split_once(" (") {
        Some((wall, rest)) => (wall, rest.strip_suffix(')')),
        None => (field, None),
    };

    Timestamp {
        time: NaiveTime::parse_from_str(wall.trim(), "%H:%M:%S%.f").ok(),
        nanos: counter.and_then(|c| c.trim().parse::<u64>().ok()),
    }
}

/// Milliseconds since midnight for a wall-clock time
pub fn wall_clock_ms(time: NaiveTime) -> f64 {
    time.num_seconds_from_midnight() as f64 * 1000.0 + time.nanosecond() as f64 / 1_000_000.0
}

/// Duration in milliseconds between two points
///
/// Prefers the nanosecond counters; falls back to wall clock. Never negative.
pub fn elapsed_ms(start: &Timestamp, end: &Timestamp) -> f64 {
    if let (Some(s), Some(e)) = (start.nanos, end.nanos) {
        return e.saturating_sub(s) as f64 / 1_000_000.0;
    }
    if let (Some(s), Some(e)) = (start.time, end.time) {
        let delta = (e - s).num_microseconds().unwrap_or(0) as f64 / 1000.0;
        return delta.max(0.0);
    }
    0.0
}
