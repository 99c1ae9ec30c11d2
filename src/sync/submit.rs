use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    api::{error::ApiError, submission::Submission, TrackerApi},
    storage::outbox::{Outbox, PendingSubmission},
};

/// How a submission left the client.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Sent,
    /// The server could not be reached. The sync daemon will deliver it later.
    Queued(PendingSubmission),
}

impl Delivery {
    pub fn is_queued(&self) -> bool {
        matches!(self, Delivery::Queued(_))
    }
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("failed to queue submission: {0:#}")]
    Storage(#[from] anyhow::Error),
}

/// Tries to send `submission` right away. A failure that may go away on its own puts it in the
/// outbox, anything else is returned to the caller and nothing is stored.
pub async fn send_or_queue(
    api: &dyn TrackerApi,
    outbox: &Outbox,
    submission: Submission,
    now: DateTime<Utc>,
) -> Result<Delivery, SubmitError> {
    match submission.send(api).await {
        Ok(()) => {
            info!("Sent {submission}");
            Ok(Delivery::Sent)
        }
        Err(e) if e.is_retryable() => {
            warn!("Could not send {submission}, queueing it: {e}");
            let entry = outbox.enqueue(submission, now).await?;
            Ok(Delivery::Queued(entry))
        }
        Err(e) => Err(e.into()),
    }
}

/// Puts `submission` straight in the outbox. Used when an earlier submission it depends on is
/// still queued, so the two reach the server in order.
pub async fn queue_behind(
    outbox: &Outbox,
    submission: Submission,
    now: DateTime<Utc>,
) -> Result<Delivery, SubmitError> {
    let entry = outbox.enqueue(submission, now).await?;
    Ok(Delivery::Queued(entry))
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::{TimeZone, Utc};
    use reqwest::StatusCode;
    use tempfile::tempdir;
    use uuid::Uuid;

    use crate::{
        api::{
            entities::{RequestStatus, ServiceType, ShiftPayload, SupportMode},
            error::ApiError,
            submission::Submission,
            MockTrackerApi,
        },
        storage::outbox::Outbox,
    };

    use super::{send_or_queue, Delivery, SubmitError};

    fn shift() -> Submission {
        Submission::Shift(ShiftPayload {
            user_id: 7,
            customer: 3,
            start: "2025-03-19T08:00:00.000Z".into(),
            end: "2025-03-19T16:30:00.000Z".into(),
            hours: "08:30".into(),
            service_type: ServiceType::Project,
            support_mode: SupportMode::Onsite,
            note: String::new(),
            status: RequestStatus::Pending,
            client_ref: Uuid::new_v4(),
        })
    }

    #[tokio::test]
    async fn sent_submissions_are_not_stored() -> Result<()> {
        let dir = tempdir()?;
        let outbox = Outbox::new(dir.path());
        let mut api = MockTrackerApi::new();
        api.expect_submit_shift().times(1).returning(|_| Ok(()));

        let now = Utc.with_ymd_and_hms(2025, 3, 19, 17, 0, 0).unwrap();
        let delivery = send_or_queue(&api, &outbox, shift(), now).await?;

        assert_eq!(delivery, Delivery::Sent);
        assert!(outbox.list().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn unreachable_server_queues() -> Result<()> {
        let dir = tempdir()?;
        let outbox = Outbox::new(dir.path());
        let mut api = MockTrackerApi::new();
        api.expect_submit_shift().returning(|_| {
            Err(ApiError::Server {
                status: StatusCode::SERVICE_UNAVAILABLE,
            })
        });

        let submission = shift();
        let now = Utc.with_ymd_and_hms(2025, 3, 19, 17, 0, 0).unwrap();
        let delivery = send_or_queue(&api, &outbox, submission.clone(), now).await?;

        assert!(delivery.is_queued());
        let entries = outbox.list().await?;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, submission.client_ref());
        Ok(())
    }

    #[tokio::test]
    async fn rejection_is_returned_and_not_queued() -> Result<()> {
        let dir = tempdir()?;
        let outbox = Outbox::new(dir.path());
        let mut api = MockTrackerApi::new();
        api.expect_submit_shift().returning(|_| {
            Err(ApiError::Rejected {
                message: "Overlapping shift".into(),
            })
        });

        let now = Utc.with_ymd_and_hms(2025, 3, 19, 17, 0, 0).unwrap();
        let result = send_or_queue(&api, &outbox, shift(), now).await;

        assert!(matches!(result, Err(SubmitError::Api(ApiError::Rejected { .. }))));
        assert!(outbox.list().await?.is_empty());
        Ok(())
    }
}
