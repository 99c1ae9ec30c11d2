//! The check-in timer. A check-in is opened against a customer, keeps counting while the client
//! is closed (the start time lives in the session store) and is closed by a check-out that
//! resends what was picked at check-in.

mod tracker;

use thiserror::Error;

pub use tracker::CheckinTracker;

use crate::{
    api::entities::{Location, ServiceType, SupportMode},
    storage::session::ActiveCheckin,
    sync::submit::{Delivery, SubmitError},
};

#[derive(Debug, Error)]
pub enum CheckinError {
    #[error("already checked in at {client}")]
    AlreadyCheckedIn { client: String },
    #[error("not checked in")]
    NotCheckedIn,
    #[error("the check-in at {client} was refused by the server: {reason}")]
    CheckinRejected { client: String, reason: String },
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error(transparent)]
    Submit(#[from] SubmitError),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// What the engineer fills in before checking in.
#[derive(Debug, Clone, Default)]
pub struct CheckinForm {
    pub customer: String,
    pub service_type: Option<ServiceType>,
    pub support_mode: Option<SupportMode>,
    pub note: String,
    pub location: Location,
}

/// Check-out details. Service type and support mode default to the ones picked at check-in.
#[derive(Debug, Clone, Default)]
pub struct CheckoutForm {
    pub service_type: Option<ServiceType>,
    pub support_mode: Option<SupportMode>,
    pub note: String,
    pub location: Location,
}

/// Whether the server has the running check-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckinSync {
    Delivered,
    /// Still in the outbox, waiting for the network.
    Waiting,
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckedOut {
    pub checkin: ActiveCheckin,
    pub worked_seconds: i64,
    pub delivery: Delivery,
}
