use std::fmt::Display;

use anyhow::Result;
use chrono::{DateTime, Local};
use chrono_english::parse_date_string;
use clap::{CommandFactory, ValueEnum};

use super::Args;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

pub const DATE_EXAMPLES: &str =
    "Examples are \"09:00\", \"yesterday 9am\", \"2 hours ago\", \"12:00 16/03/2025\"";

fn validation_error(message: String) -> anyhow::Error {
    Args::command()
        .error(clap::error::ErrorKind::ValueValidation, message)
        .into()
}

fn is_clock_time(token: &str) -> bool {
    let lower = token.to_lowercase();
    token.starts_with(|c: char| c.is_ascii_digit())
        && (token.contains(':') || lower.ends_with("am") || lower.ends_with("pm"))
}

fn is_calendar_date(token: &str) -> bool {
    token.starts_with(|c: char| c.is_ascii_digit())
        && (token.contains('/') || token.matches('-').count() == 2)
        && token.chars().all(|c| c.is_ascii_digit() || c == '/' || c == '-')
}

/// chrono-english only reads a calendar date when it comes before the time of day.
fn date_first(value: &str) -> String {
    let tokens: Vec<&str> = value.split_whitespace().collect();
    match tokens.split_first() {
        Some((time, rest))
            if is_clock_time(time) && rest.iter().any(|t| is_calendar_date(t)) =>
        {
            format!("{} {time}", rest.join(" "))
        }
        _ => tokens.join(" "),
    }
}

/// Parses a free-form date relative to `now`. Failures are reported as clap validation errors
/// naming `field`.
pub fn parse_when(
    field: &str,
    value: &str,
    now: DateTime<Local>,
    style: DateStyle,
) -> Result<DateTime<Local>> {
    let parsed = match parse_date_string(&date_first(value), now, style.into()) {
        Ok(v) => v.with_timezone(&Local),
        Err(e) => {
            return Err(validation_error(format!(
                "Failed to validate {field} {value:?}: {e}"
            )))
        }
    };

    // every explicit calendar date has to be the parsed day
    for token in value.split_whitespace().filter(|t| is_calendar_date(t)) {
        let Ok(day) = parse_date_string(token, now, style.into()) else {
            return Err(validation_error(format!(
                "Failed to validate {field} {value:?}: {token:?} is not a date"
            )));
        };
        if day.date_naive() != parsed.date_naive() {
            return Err(validation_error(format!(
                "Failed to validate {field} {value:?}: couldn't use the date {token:?}"
            )));
        }
    }
    Ok(parsed)
}

/// Start and end of a shift or a break. The end defaults to `now`.
pub fn parse_range(
    start: &str,
    end: Option<&str>,
    now: DateTime<Local>,
    style: DateStyle,
) -> Result<(DateTime<Local>, DateTime<Local>)> {
    let start = parse_when("start", start, now, style)?;
    let end = match end {
        Some(end) => parse_when("end", end, now, style)?,
        None => now,
    };
    if end <= start {
        return Err(validation_error(format!(
            "End {end} must be after start {start}"
        )));
    }
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use chrono::{Local, TimeZone, Timelike};

    use super::{parse_range, parse_when, DateStyle};

    #[test]
    fn relative_and_absolute_dates() {
        let now = Local.with_ymd_and_hms(2025, 3, 19, 18, 0, 0).unwrap();

        let start = parse_when("start", "2 hours ago", now, DateStyle::Uk).unwrap();
        assert_eq!(start.hour(), 16);

        let start = parse_when("start", "09:30 16/03/2025", now, DateStyle::Uk).unwrap();
        assert_eq!(start, Local.with_ymd_and_hms(2025, 3, 16, 9, 30, 0).unwrap());

        assert!(parse_when("start", "not a date at all", now, DateStyle::Uk).is_err());
    }

    #[test]
    fn time_may_come_before_or_after_the_date() {
        let now = Local.with_ymd_and_hms(2025, 3, 19, 18, 0, 0).unwrap();
        let expected = Local.with_ymd_and_hms(2025, 3, 16, 9, 0, 0).unwrap();

        for value in ["09:00 16/03/2025", "16/03/2025 09:00", "  09:00   16/03/2025 "] {
            assert_eq!(parse_when("start", value, now, DateStyle::Uk).unwrap(), expected);
        }
        for value in ["09:00 03/16/2025", "03/16/2025 09:00"] {
            assert_eq!(parse_when("start", value, now, DateStyle::Us).unwrap(), expected);
        }
    }

    #[test]
    fn date_tokens_are_recognised() {
        assert_eq!(super::date_first("09:00 16/03/2025"), "16/03/2025 09:00");
        assert_eq!(super::date_first("9am 16/03/2025"), "16/03/2025 9am");
        assert_eq!(super::date_first("yesterday 9am"), "yesterday 9am");
        assert_eq!(super::date_first("09:00"), "09:00");
        assert!(super::is_calendar_date("2025-03-16"));
        assert!(!super::is_calendar_date("yesterday"));
        assert!(!super::is_clock_time("16/03/2025"));
    }

    #[test]
    fn range_ends_now_and_must_be_ordered() {
        let now = Local.with_ymd_and_hms(2025, 3, 19, 18, 0, 0).unwrap();
        let (start, end) = parse_range("3 hours ago", None, now, DateStyle::Uk).unwrap();
        assert_eq!(end, now);
        assert_eq!((end - start).num_hours(), 3);

        assert!(parse_range("1 hour ago", Some("2 hours ago"), now, DateStyle::Uk).is_err());
    }
}
