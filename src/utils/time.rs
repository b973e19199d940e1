use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use tokio::time::Instant;

use super::clock::Clock;

/// This is the standard way of converting a date to a ledger key in bprod.
pub fn day_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Returns start of the next day in the timezone of `date`. When local midnight doesn't exist
/// (DST gap) the first existing local time after it is used.
pub fn next_day_start<Tz: TimeZone>(date: &DateTime<Tz>) -> DateTime<Tz> {
    let tz = date.timezone();
    let mut next = date
        .date_naive()
        .succ_opt()
        .expect("End of time should never happen")
        .and_time(NaiveTime::MIN);
    loop {
        if let Some(start) = tz.from_local_datetime(&next).earliest() {
            return start;
        }
        next += Duration::minutes(30);
    }
}

/// Milliseconds to seconds, rounding halves up.
pub fn round_ms_to_seconds(ms: i64) -> i64 {
    (ms + 500).div_euclid(1000)
}

/// Whole seconds between two instants, rounded. Time running backwards counts as zero.
pub fn elapsed_seconds(from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    round_ms_to_seconds((to - from).num_milliseconds()).max(0) as u64
}

/// Seconds to whole minutes, rounding halves up: 29s is 0, 30s is 1, 90s is 2.
pub fn seconds_to_minutes(seconds: u64) -> u64 {
    seconds.saturating_add(30) / 60
}

/// Largest number of seconds a [Duration] can hold, the excess is clamped.
const MAX_DURATION_SECONDS: u64 = (i64::MAX / 1000) as u64;

pub fn seconds(value: u64) -> Duration {
    Duration::seconds(value.min(MAX_DURATION_SECONDS) as i64)
}

/// `at + value` seconds, saturating at the end of representable time.
pub fn add_seconds(at: DateTime<Utc>, value: u64) -> DateTime<Utc> {
    at.checked_add_signed(seconds(value))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// `at - value` seconds, saturating at the start of representable time.
pub fn sub_seconds(at: DateTime<Utc>, value: u64) -> DateTime<Utc> {
    at.checked_sub_signed(seconds(value))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Converts a wall-clock deadline into a tokio instant. Deadlines in the past map to "now", ones
/// too far out for the runtime are pushed to about thirty years from now.
pub fn deadline_instant(clock: &dyn Clock, at: DateTime<Utc>) -> Instant {
    let remaining = (at - clock.time()).to_std().unwrap_or_default();
    let now = clock.instant();
    now.checked_add(remaining)
        .unwrap_or_else(|| now + std::time::Duration::from_secs(86_400 * 365 * 30))
}
