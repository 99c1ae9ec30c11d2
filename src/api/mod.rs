//! Access to the remote tracker API. [TrackerApi] is the contract the rest of the crate talks to,
//! [client::HttpTrackerApi] is the real implementation over HTTP/JSON.

pub mod client;
pub mod entities;
pub mod envelope;
pub mod error;
pub mod submission;

use async_trait::async_trait;
use entities::{
    ActivityFeedItem, ApprovalAction, BreakPayload, CheckinPayload, CheckinRecord, Customer,
    DashboardSummary, ShiftPayload, ShiftRequest, User, WeeklyActivity,
};
use error::ApiError;
use tracing::instrument;

pub const DEFAULT_API_BASE: &str = "https://activ-io.com/Crm/engineer-tracker/";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrackerApi: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> Result<User, ApiError>;

    async fn list_customers(&self) -> Result<Vec<Customer>, ApiError>;

    async fn create_customer(&self, name: &str) -> Result<(), ApiError>;

    async fn update_customer(&self, id: u64, name: &str) -> Result<(), ApiError>;

    async fn delete_customer(&self, id: u64) -> Result<(), ApiError>;

    /// Check-ins of one engineer, or of everybody when `user_id` is `None`. Oldest first.
    async fn list_checkins(&self, user_id: Option<u64>) -> Result<Vec<CheckinRecord>, ApiError>;

    async fn check_in(&self, payload: &CheckinPayload) -> Result<(), ApiError>;

    async fn check_out(&self, payload: &CheckinPayload) -> Result<(), ApiError>;

    async fn submit_shift(&self, payload: &ShiftPayload) -> Result<(), ApiError>;

    async fn submit_break(&self, payload: &BreakPayload) -> Result<(), ApiError>;

    async fn my_requests(&self, user_id: u64) -> Result<Vec<ShiftRequest>, ApiError>;

    async fn list_approvals(&self) -> Result<Vec<ShiftRequest>, ApiError>;

    async fn decide_approval(&self, id: u64, action: ApprovalAction) -> Result<(), ApiError>;

    async fn engineer_count(&self) -> Result<u64, ApiError>;

    async fn todays_shifts(&self) -> Result<Vec<serde_json::Value>, ApiError>;

    async fn weekly_activity(&self) -> Result<WeeklyActivity, ApiError>;

    async fn activity_feed(&self) -> Result<Vec<ActivityFeedItem>, ApiError>;
}

/// Headline numbers of the admin dashboard. The three reads are independent so they run
/// concurrently.
#[instrument(skip(api))]
pub async fn dashboard_summary(api: &dyn TrackerApi) -> Result<DashboardSummary, ApiError> {
    let (total_employees, customers, shifts) = futures::try_join!(
        api.engineer_count(),
        api.list_customers(),
        api.todays_shifts()
    )?;
    Ok(DashboardSummary {
        total_employees,
        total_customers: customers.len(),
        shifts_today: shifts.len(),
    })
}
