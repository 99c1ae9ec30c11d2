use ansi_term::{Colour, Style};
use chrono::{DateTime, Local, NaiveDateTime};

use crate::{
    api::entities::{CheckinRecord, RequestStatus, ShiftRequest},
    report::{format_hms, session_seconds},
    storage::{
        outbox::{DeliveryState, PendingSubmission},
        session::Theme,
    },
    sync::submit::Delivery,
};

/// Terminal styles for the chosen theme.
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub heading: Style,
    pub muted: Style,
    pub good: Style,
    pub bad: Style,
    pub warn: Style,
}

impl Palette {
    pub fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Dark => Self {
                heading: Colour::Cyan.bold(),
                muted: Colour::Fixed(245).normal(),
                good: Colour::Green.normal(),
                bad: Colour::Red.normal(),
                warn: Colour::Yellow.normal(),
            },
            Theme::Light => Self {
                heading: Colour::Blue.bold(),
                muted: Colour::Fixed(240).normal(),
                good: Colour::Fixed(28).normal(),
                bad: Colour::Fixed(124).normal(),
                warn: Colour::Fixed(130).normal(),
            },
        }
    }

    pub fn status(&self, status: RequestStatus) -> String {
        let style = match status {
            RequestStatus::Approved => self.good,
            RequestStatus::Rejected => self.bad,
            RequestStatus::Pending | RequestStatus::Unknown => self.warn,
        };
        style.paint(status.to_string()).to_string()
    }

    pub fn delivery(&self, what: &str, delivery: &Delivery) -> String {
        match delivery {
            Delivery::Sent => self.good.paint(format!("{what} sent")).to_string(),
            Delivery::Queued(entry) => self
                .warn
                .paint(format!(
                    "{what} queued as {}, it will be sent when the server is reachable",
                    entry.id
                ))
                .to_string(),
        }
    }
}

pub fn format_time(time: Option<NaiveDateTime>) -> String {
    time.map(|v| v.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".into())
}

pub fn print_checkins(palette: &Palette, checkins: &[CheckinRecord], now: &DateTime<Local>) {
    if checkins.is_empty() {
        println!("{}", palette.muted.paint("No check-ins"));
        return;
    }
    for record in checkins {
        let duration = format_hms(session_seconds(record, now));
        let duration = if record.is_open() {
            palette.good.paint(format!("{duration} (open)")).to_string()
        } else {
            duration
        };
        println!(
            "{}\t{}\t{}\t{}\t{}/{}\t{}",
            format_time(Some(record.check_in_time)),
            format_time(record.check_out_time),
            record.display_name(),
            record.client,
            record.service_type,
            record.support_mode,
            duration,
        );
        if let Some(location) = record.location_text.as_deref().filter(|v| !v.is_empty()) {
            println!("\t{}", palette.muted.paint(location));
        }
    }
}

pub fn print_requests(palette: &Palette, requests: &[ShiftRequest]) {
    if requests.is_empty() {
        println!("{}", palette.muted.paint("No requests"));
        return;
    }
    for request in requests {
        println!(
            "#{}\t{}\t{}\t{} -> {}\t{}\t{}",
            request.id,
            request.employee_label(),
            request.customer_label(),
            format_time(request.start_time),
            format_time(request.end_time),
            request.total_hours.as_deref().unwrap_or("-"),
            palette.status(request.status),
        );
        let kind = [&request.request_type, &request.service_type, &request.support_mode]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ");
        if !kind.is_empty() {
            println!("\t{}", palette.muted.paint(kind));
        }
        if let Some(note) = request.note.as_deref().filter(|v| !v.is_empty()) {
            println!("\t{}", palette.muted.paint(note));
        }
    }
}

pub fn print_outbox(palette: &Palette, entries: &[PendingSubmission]) {
    if entries.is_empty() {
        println!("{}", palette.muted.paint("Nothing queued"));
        return;
    }
    for entry in entries {
        let state = match (entry.state, &entry.last_error) {
            (DeliveryState::Rejected, _) => palette.bad.paint("rejected").to_string(),
            (DeliveryState::Pending, Some(_)) => palette
                .warn
                .paint(format!(
                    "retry at {}",
                    entry.next_attempt_at.with_timezone(&Local).format("%H:%M:%S")
                ))
                .to_string(),
            (DeliveryState::Pending, None) => palette.muted.paint("pending").to_string(),
        };
        println!(
            "{}\t{}\t{}\t{} attempts\t{}",
            entry.id,
            entry.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
            entry.submission,
            entry.attempts,
            state
        );
        if let Some(error) = &entry.last_error {
            println!("\t{}", palette.muted.paint(error));
        }
    }
}
