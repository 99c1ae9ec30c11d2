use std::fmt::Display;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    entities::{BreakPayload, CheckinPayload, ShiftPayload},
    error::ApiError,
    TrackerApi,
};

/// A write that is safe to send more than once. Each one carries its own `client_ref`, which
/// stays the same across retries so the server can drop duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum Submission {
    CheckIn(CheckinPayload),
    CheckOut(CheckinPayload),
    Shift(ShiftPayload),
    Break(BreakPayload),
}

impl Submission {
    pub fn client_ref(&self) -> Uuid {
        match self {
            Submission::CheckIn(p) | Submission::CheckOut(p) => p.client_ref,
            Submission::Shift(p) => p.client_ref,
            Submission::Break(p) => p.client_ref,
        }
    }

    pub async fn send(&self, api: &dyn TrackerApi) -> Result<(), ApiError> {
        match self {
            Submission::CheckIn(p) => api.check_in(p).await,
            Submission::CheckOut(p) => api.check_out(p).await,
            Submission::Shift(p) => api.submit_shift(p).await,
            Submission::Break(p) => api.submit_break(p).await,
        }
    }
}

impl Display for Submission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Submission::CheckIn(p) => write!(f, "check-in at {}", p.client),
            Submission::CheckOut(p) => write!(f, "check-out from {}", p.client),
            Submission::Shift(p) => write!(f, "shift {} -> {} ({})", p.start, p.end, p.hours),
            Submission::Break(p) => {
                write!(f, "{:?} break {} -> {} ({})", p.kind, p.start, p.end, p.total_hm)
            }
        }
    }
}
