//! Counter keys and the statistics snapshot.

use chrono::{DateTime, SecondsFormat, Utc};

/// Keys the cache maintains in the `stats` namespace, plus the drain
/// gate which lives in the `ring` namespace.
pub mod keys {
    /// Cursor: monotonic insert counter, wrapped to 1 past capacity.
    pub const POS: &str = "pos";
    /// Current ring capacity.
    pub const CURRENT_SIZE: &str = "current_size";
    /// New-identifier insertions in the current monitoring window.
    pub const ITEM_COUNT: &str = "item_count";
    /// Wall-clock start (unix seconds) of the current monitoring window.
    pub const PERIOD_START: &str = "period_start";
    /// Lifetime request count (inserts and updates).
    pub const TOTAL_REQ_COUNT: &str = "total_req_count";
    /// Lifetime new-identifier insertion count.
    pub const TOTAL_ITEM_COUNT: &str = "total_item_count";
    /// Process start wall-clock (unix seconds).
    pub const SERVER_START: &str = "server_start";
    /// Presence-flag mutex for the sizing decision path.
    pub const LOCKED: &str = "locked";
    /// Most recent computed mean residency, in minutes.
    pub const LAST_PERIOD_AVG_MINS: &str = "last_period_avg_mins";
    /// Drain gate, kept in the `ring` namespace: while present, every
    /// `set` is dropped.
    pub const DRAINING: &str = "draining";
}

/// Current wall-clock time as unix seconds.
pub fn unix_now() -> i64 {
    Utc::now().timestamp()
}

/// Render unix seconds as ISO-8601 UTC (`2026-08-02T09:30:00Z`).
pub fn iso8601_utc(secs: i64) -> String {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Point-in-time view of the cache counters.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Current ring capacity.
    pub current_size: u64,
    /// Lifetime request count (inserts and updates).
    pub total_req_count: u64,
    /// Lifetime new-identifier insertion count.
    pub total_item_count: u64,
    /// Lifetime requests per second.
    pub req_per_sec: f64,
    /// Lifetime new-identifier insertions per second.
    pub items_per_sec: f64,
    /// Mean residency computed at the close of the last monitoring
    /// window, if any window has closed yet.
    pub last_period_avg_mins: Option<f64>,
    /// Whether a full drain is in flight.
    pub draining: bool,
    /// Process start, ISO-8601 UTC.
    pub server_start: String,
}
