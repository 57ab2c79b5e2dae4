//! UTC timestamp helpers over plain Unix seconds (no chrono dependency).
//!
//! Every timestamp in the workspace is an `i64` count of seconds since the
//! Unix epoch. Upstream timeline entries, score history rows and forward-fill
//! grid points all share that representation.

use std::time::{SystemTime, UNIX_EPOCH};

pub const SECS_PER_MINUTE: i64 = 60;
pub const SECS_PER_DAY: i64 = 86_400;

/// Current UTC time as Unix seconds.
pub fn now_unix_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// Round a timestamp down to a multiple of `step` seconds.
/// A non-positive step leaves the timestamp untouched.
pub fn floor_to_step(ts: i64, step: i64) -> i64 {
    if step <= 0 {
        return ts;
    }
    ts - ts.rem_euclid(step)
}

/// Convert Unix seconds to an ISO-8601 UTC string.
pub fn unix_to_iso8601(secs: i64) -> String {
    let days = secs.div_euclid(SECS_PER_DAY);
    let time_of_day = secs.rem_euclid(SECS_PER_DAY);
    let hours = time_of_day / 3600;
    let minutes = (time_of_day % 3600) / 60;
    let seconds = time_of_day % 60;

    let (y, m, d) = civil_from_days(days);
    format!("{y:04}-{m:02}-{d:02}T{hours:02}:{minutes:02}:{seconds:02}Z")
}

/// Howard Hinnant's civil_from_days: epoch days -> (year, month, day).
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}
