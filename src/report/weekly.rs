use std::collections::HashMap;

use chrono::{DateTime, TimeZone};

use crate::{
    api::entities::{CheckinRecord, WeeklyActivity},
    utils::time::{end_of_week, start_of_week, WeekStart},
};

use super::session_seconds;

/// One entry per employee in order of first appearance, each holding that employee's latest
/// check-in.
pub fn unique_employees(checkins: &[CheckinRecord]) -> Vec<&CheckinRecord> {
    let mut positions = HashMap::<u64, usize>::new();
    let mut employees: Vec<&CheckinRecord> = vec![];
    for record in checkins {
        match positions.get(&record.user_id) {
            Some(&i) => employees[i] = record,
            None => {
                positions.insert(record.user_id, employees.len());
                employees.push(record);
            }
        }
    }
    employees
}

/// Seconds worked by `user_id` in the Monday to Sunday week containing `now`.
pub fn weekly_total<Tz: TimeZone>(
    checkins: &[CheckinRecord],
    user_id: u64,
    now: &DateTime<Tz>,
) -> i64 {
    let start = start_of_week(now, WeekStart::Monday);
    let end = end_of_week(now, WeekStart::Monday);
    let tz = now.timezone();
    checkins
        .iter()
        .filter(|r| r.user_id == user_id)
        .filter(|r| {
            r.check_in_at(&tz)
                .is_some_and(|at| at >= start && at <= end)
        })
        .map(|r| session_seconds(r, now))
        .sum()
}

/// Check-ins per person since Sunday midnight. Labels keep the order in which people first show
/// up in `checkins`.
pub fn weekly_checkin_counts<Tz: TimeZone>(
    checkins: &[CheckinRecord],
    now: &DateTime<Tz>,
) -> WeeklyActivity {
    let start = start_of_week(now, WeekStart::Sunday);
    let tz = now.timezone();
    let mut positions = HashMap::<&str, usize>::new();
    let mut activity = WeeklyActivity::default();

    for record in checkins {
        if !record.check_in_at(&tz).is_some_and(|at| at >= start) {
            continue;
        }
        let name = record.username_key();
        match positions.get(name) {
            Some(&i) => activity.data[i] += 1,
            None => {
                positions.insert(name, activity.labels.len());
                activity.labels.push(name.to_string());
                activity.data.push(1);
            }
        }
    }
    activity
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use crate::report::test_records::record;

    use super::{unique_employees, weekly_checkin_counts, weekly_total};

    #[test]
    fn unique_employees_keep_first_position_and_last_record() {
        let list = vec![
            record(1, 7, "jordan", "2025-03-17 08:00:00", None),
            record(2, 9, "sam", "2025-03-17 09:00:00", None),
            record(3, 7, "jordan", "2025-03-18 08:00:00", None),
        ];
        let employees: Vec<_> = unique_employees(&list)
            .iter()
            .map(|r| (r.user_id, r.id))
            .collect();
        assert_eq!(employees, vec![(7, 3), (9, 2)]);
    }

    #[test]
    fn weekly_total_counts_monday_to_sunday() {
        // Wednesday
        let now = Utc.with_ymd_and_hms(2025, 3, 19, 12, 0, 0).unwrap();
        let list = vec![
            // previous Sunday, outside the week
            record(1, 7, "jordan", "2025-03-16 08:00:00", Some("2025-03-16 10:00:00")),
            record(2, 7, "jordan", "2025-03-17 00:00:00", Some("2025-03-17 01:00:00")),
            record(3, 9, "sam", "2025-03-18 08:00:00", Some("2025-03-18 12:00:00")),
            // still open, counts until now
            record(4, 7, "jordan", "2025-03-19 11:30:00", None),
        ];
        assert_eq!(weekly_total(&list, 7, &now), 3600 + 1800);
        assert_eq!(weekly_total(&list, 9, &now), 4 * 3600);
        assert_eq!(weekly_total(&list, 1, &now), 0);
    }

    #[test]
    fn counts_start_on_sunday() {
        // Wednesday
        let now = Utc.with_ymd_and_hms(2025, 3, 19, 12, 0, 0).unwrap();
        let list = vec![
            record(1, 9, "sam", "2025-03-15 23:59:59", None),
            record(2, 7, "jordan", "2025-03-16 00:00:00", None),
            record(3, 9, "sam", "2025-03-17 08:00:00", None),
            record(4, 7, "jordan", "2025-03-18 08:00:00", None),
        ];
        let activity = weekly_checkin_counts(&list, &now);
        assert_eq!(activity.labels, vec!["jordan", "sam"]);
        assert_eq!(activity.data, vec![2, 1]);
    }
}
