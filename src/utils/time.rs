use chrono::{DateTime, Datelike, Duration, Local, TimeZone, Utc};
use now::DateTimeNow;

/// First day of a week. The admin weekly totals count Monday to Sunday, the activity chart counts
/// from Sunday.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeekStart {
    Monday,
    Sunday,
}

/// Returns midnight of the first day of the week containing `now`.
pub fn start_of_week<Tz: TimeZone>(now: &DateTime<Tz>, week_start: WeekStart) -> DateTime<Tz> {
    let weekday = now.weekday();
    let days_back = match week_start {
        WeekStart::Monday => weekday.num_days_from_monday(),
        WeekStart::Sunday => weekday.num_days_from_sunday(),
    };
    now.beginning_of_day() - Duration::days(days_back as i64)
}

/// Last millisecond of the week containing `now`.
pub fn end_of_week<Tz: TimeZone>(now: &DateTime<Tz>, week_start: WeekStart) -> DateTime<Tz> {
    start_of_week(now, week_start) + Duration::days(7) - Duration::milliseconds(1)
}

pub fn epoch_millis(time: DateTime<Utc>) -> i64 {
    time.timestamp_millis()
}

pub fn from_epoch_millis(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}

/// This is the standard way of sending a local wall time to the server (`YYYY-MM-DD HH:MM:SS`).
pub fn format_local_for_db(time: &DateTime<Local>) -> String {
    time.format("%Y-%m-%d %H:%M:%S").to_string()
}
