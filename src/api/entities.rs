//! Wire types of the tracker API.
//!
//! The server is loose about its JSON: ids come as numbers or numeric strings, coordinates as
//! decimals or strings, times as `YYYY-MM-DD HH:MM:SS` or ISO-8601, and any field may be `null`.
//! Fields go through [lenient]. A row that still doesn't decode is skipped by
//! [super::envelope::Envelope::into_list] rather than failing the whole list.

use chrono::{DateTime, NaiveDateTime, TimeZone};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Superadmin,
    Admin,
    Engineer,
    #[serde(other)]
    Other,
}

/// The logged-in user. Persisted locally as the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(deserialize_with = "lenient::id")]
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub role: Role,
    /// Bearer token, only present when the server issues one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        matches!(self.role, Role::Superadmin | Role::Admin)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    #[serde(deserialize_with = "lenient::id")]
    pub id: u64,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckinKind {
    In,
    Out,
    #[serde(other)]
    Unknown,
}

/// One row of `checkins-list.php`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckinRecord {
    #[serde(deserialize_with = "lenient::id")]
    pub id: u64,
    #[serde(deserialize_with = "lenient::id")]
    pub user_id: u64,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub client: String,
    #[serde(default, rename = "type")]
    pub kind: Option<CheckinKind>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub service_type: String,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub support_mode: String,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub location_text: Option<String>,
    #[serde(deserialize_with = "lenient::time")]
    pub check_in_time: NaiveDateTime,
    #[serde(default, deserialize_with = "lenient::opt_time")]
    pub check_out_time: Option<NaiveDateTime>,
}

impl CheckinRecord {
    pub fn display_name(&self) -> &str {
        [&self.user_name, &self.username, &self.name]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .find(|v| !v.trim().is_empty())
            .unwrap_or(self.client.as_str())
    }

    /// Name used to group check-ins per person in the activity chart.
    pub fn username_key(&self) -> &str {
        self.username
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| self.display_name())
    }

    pub fn is_open(&self) -> bool {
        self.check_out_time.is_none()
    }

    /// Server times are wall times of the server's zone, interpreted in `tz`.
    pub fn check_in_at<Tz: TimeZone>(&self, tz: &Tz) -> Option<DateTime<Tz>> {
        tz.from_local_datetime(&self.check_in_time).earliest()
    }

    pub fn check_out_at<Tz: TimeZone>(&self, tz: &Tz) -> Option<DateTime<Tz>> {
        self.check_out_time
            .and_then(|v| tz.from_local_datetime(&v).earliest())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestStatus::Pending => write!(f, "PENDING"),
            RequestStatus::Approved => write!(f, "APPROVED"),
            RequestStatus::Rejected => write!(f, "REJECTED"),
            RequestStatus::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// A shift (or break) request as listed by `approvals-list.php` and `my-requests.php`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftRequest {
    #[serde(deserialize_with = "lenient::id")]
    pub id: u64,
    #[serde(default, deserialize_with = "lenient::opt_id")]
    pub engineer_id: Option<u64>,
    #[serde(default)]
    pub employee_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_id")]
    pub customer_id: Option<u64>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub customer: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_time")]
    pub start_time: Option<NaiveDateTime>,
    #[serde(default, deserialize_with = "lenient::opt_time")]
    pub end_time: Option<NaiveDateTime>,
    #[serde(default, deserialize_with = "lenient::opt_text")]
    pub total_hours: Option<String>,
    #[serde(default)]
    pub service_type: Option<String>,
    #[serde(default)]
    pub support_mode: Option<String>,
    #[serde(default, rename = "type")]
    pub request_type: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub status: RequestStatus,
}

impl ShiftRequest {
    pub fn employee_label(&self) -> String {
        match (&self.employee_name, self.engineer_id) {
            (Some(name), _) if !name.trim().is_empty() => name.clone(),
            (_, Some(id)) => id.to_string(),
            _ => "-".into(),
        }
    }

    pub fn customer_label(&self) -> String {
        match (&self.customer, self.customer_id) {
            (Some(name), _) if !name.trim().is_empty() => name.clone(),
            (_, Some(id)) => id.to_string(),
            _ => "-".into(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalAction {
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum ServiceType {
    Ticket,
    Project,
    Documentation,
    #[serde(rename = "PM")]
    Pm,
    Presales,
    Maintenance,
    Support,
    Installation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum SupportMode {
    Remote,
    Onsite,
    Hybrid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BreakType {
    Rest,
    Lunch,
    Unpaid,
    Prayer,
    Other,
}

pub const UNKNOWN_LOCATION: &str = "Unknown Location";

/// Where the engineer was when checking in or out. Coordinates are optional on a terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location_text: String,
}

impl Default for Location {
    fn default() -> Self {
        Self {
            latitude: None,
            longitude: None,
            location_text: UNKNOWN_LOCATION.into(),
        }
    }
}

/// Body of `checkin.php` and `checkout.php`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckinPayload {
    pub user_id: u64,
    pub name: String,
    pub client: String,
    pub service_type: ServiceType,
    pub support_mode: SupportMode,
    pub note: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location_text: String,
    /// Local wall time of the event, so a delayed delivery still carries when it happened.
    pub client_time: String,
    pub client_ref: Uuid,
}

/// Body of `add-shift.php`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftPayload {
    pub user_id: u64,
    pub customer: u64,
    /// ISO-8601 UTC
    pub start: String,
    pub end: String,
    /// `HH:MM`
    pub hours: String,
    pub service_type: ServiceType,
    pub support_mode: SupportMode,
    pub note: String,
    pub status: RequestStatus,
    pub client_ref: Uuid,
}

/// Body of `break-request.php`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakPayload {
    pub user_id: u64,
    /// Local `YYYY-MM-DD HH:MM:SS`
    pub start: String,
    pub end: String,
    pub total_hm: String,
    #[serde(rename = "type")]
    pub kind: BreakType,
    pub note: String,
    pub status: RequestStatus,
    pub client_ref: Uuid,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeeklyActivity {
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default, deserialize_with = "lenient::counts")]
    pub data: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityFeedItem {
    #[serde(default)]
    pub title: String,
    #[serde(default, deserialize_with = "lenient::opt_time")]
    pub time: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DashboardSummary {
    pub total_employees: u64,
    pub total_customers: usize,
    pub shifts_today: usize,
}

pub mod lenient {
    use chrono::{DateTime, Local, NaiveDateTime};
    use serde::{de, Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrText {
        Number(serde_json::Number),
        Text(String),
    }

    const TIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"];

    /// Parses the time formats the server has been seen to produce. Offsets are converted into
    /// local wall time.
    pub fn parse_time(value: &str) -> Option<NaiveDateTime> {
        let value = value.trim();
        TIME_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
            .or_else(|| {
                DateTime::parse_from_rfc3339(value)
                    .ok()
                    .map(|v| v.with_timezone(&Local).naive_local())
            })
    }

    fn number_to_u64<E: de::Error>(value: NumberOrText) -> Result<u64, E> {
        match value {
            NumberOrText::Number(n) => n
                .as_u64()
                .ok_or_else(|| E::custom(format!("{n} is not a valid id"))),
            NumberOrText::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| E::custom(format!("{s:?} is not a valid id"))),
        }
    }

    pub fn id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        number_to_u64(NumberOrText::deserialize(deserializer)?)
    }

    pub fn opt_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
        match Option::<NumberOrText>::deserialize(deserializer)? {
            Some(NumberOrText::Text(s)) if s.trim().is_empty() => Ok(None),
            Some(v) => number_to_u64(v).map(Some),
            None => Ok(None),
        }
    }

    pub fn opt_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        Ok(match Option::<NumberOrText>::deserialize(deserializer)? {
            Some(NumberOrText::Number(n)) => n.as_f64(),
            Some(NumberOrText::Text(s)) => s.trim().parse().ok(),
            None => None,
        })
    }

    pub fn opt_text<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<String>, D::Error> {
        Ok(match Option::<NumberOrText>::deserialize(deserializer)? {
            Some(NumberOrText::Number(n)) => Some(n.to_string()),
            Some(NumberOrText::Text(s)) => Some(s),
            None => None,
        })
    }

    pub fn time<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let value = String::deserialize(deserializer)?;
        parse_time(&value).ok_or_else(|| de::Error::custom(format!("unrecognized time {value:?}")))
    }

    pub fn opt_time<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDateTime>, D::Error> {
        // "0000-00-00 00:00:00" and "" both mean "not set"
        Ok(Option::<String>::deserialize(deserializer)?
            .as_deref()
            .and_then(parse_time))
    }

    /// `null` reads as the default value.
    pub fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de> + Default,
    {
        Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
    }

    pub fn counts<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u64>, D::Error> {
        Vec::<NumberOrText>::deserialize(deserializer)?
            .into_iter()
            .map(number_to_u64)
            .collect()
    }
}
