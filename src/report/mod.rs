//! Views derived from lists fetched from the server. Nothing here does IO.

pub mod customers;
pub mod weekly;

use chrono::{DateTime, TimeZone};

use crate::api::entities::CheckinRecord;

/// Formats a number of seconds as `1h 2m 3s`. Negative input counts as zero.
pub fn format_hms(seconds: i64) -> String {
    let seconds = seconds.max(0);
    format!(
        "{}h {}m {}s",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

/// Zero-padded `HH:MM` between two instants, `00:00` when `end` is not after `start`. This is the
/// format of shift hours and break totals.
pub fn format_hh_mm<Tz: TimeZone>(start: &DateTime<Tz>, end: &DateTime<Tz>) -> String {
    let minutes = (end.clone() - start.clone()).num_minutes();
    if minutes <= 0 {
        return "00:00".into();
    }
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Length of a check-in in whole seconds. A check-in that is still open counts up to `now`.
pub fn session_seconds<Tz: TimeZone>(record: &CheckinRecord, now: &DateTime<Tz>) -> i64 {
    let tz = now.timezone();
    let Some(start) = record.check_in_at(&tz) else {
        return 0;
    };
    let end = record.check_out_at(&tz).unwrap_or_else(|| now.clone());
    (end - start).num_seconds().max(0)
}

/// The server lists check-ins oldest first, history is shown newest first.
pub fn newest_first(mut checkins: Vec<CheckinRecord>) -> Vec<CheckinRecord> {
    checkins.reverse();
    checkins
}
