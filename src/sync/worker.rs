use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::{api::TrackerApi, storage::outbox::Outbox, utils::clock::Clock};

use super::backoff::retry_delay;

/// Outcome of one pass over the outbox.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DrainReport {
    pub sent: usize,
    pub rejected: usize,
    /// Set when a retryable failure stopped the pass.
    pub deferred: Option<String>,
}

/// Sends due submissions oldest first. Delivered entries are removed and rejected ones are kept
/// as rejected. The first retryable failure is rescheduled with backoff and ends the pass.
pub async fn drain_once(
    api: &dyn TrackerApi,
    outbox: &Outbox,
    now: DateTime<Utc>,
) -> Result<DrainReport> {
    let mut report = DrainReport::default();
    for entry in outbox.due(now).await? {
        debug!("Delivering {} ({})", entry.submission, entry.id);
        match entry.submission.send(api).await {
            Ok(()) => {
                outbox.remove(entry.id).await?;
                report.sent += 1;
                info!("Delivered {}", entry.submission);
            }
            Err(e) if e.is_retryable() => {
                let delay = retry_delay(entry.attempts + 1);
                let next_attempt_at = now + chrono::Duration::from_std(delay)?;
                outbox
                    .mark_failed(entry.id, &e.to_string(), next_attempt_at)
                    .await?;
                warn!("Server unreachable, retrying {} in {delay:?}: {e}", entry.id);
                report.deferred = Some(e.to_string());
                break;
            }
            Err(e) => {
                outbox.mark_rejected(entry.id, &e.to_string()).await?;
                report.rejected += 1;
            }
        }
    }
    Ok(report)
}

/// The daemon loop: drains the outbox every `interval` until `shutdown` is cancelled.
pub struct SyncModule {
    api: Box<dyn TrackerApi>,
    outbox: Outbox,
    shutdown: CancellationToken,
    interval: Duration,
    time_provider: Box<dyn Clock>,
}

impl SyncModule {
    pub fn new(
        api: Box<dyn TrackerApi>,
        outbox: Outbox,
        shutdown: CancellationToken,
        interval: Duration,
        time_provider: Box<dyn Clock>,
    ) -> Self {
        Self {
            api,
            outbox,
            shutdown,
            interval,
            time_provider,
        }
    }

    pub async fn run(self) -> Result<()> {
        let mut drain_point = self.time_provider.instant();
        loop {
            drain_point += self.interval;

            let span = info_span!("Draining outbox");
            match drain_once(self.api.as_ref(), &self.outbox, self.time_provider.time())
                .instrument(span)
                .await
            {
                Ok(report) if report == DrainReport::default() => (),
                Ok(report) => info!("Drained outbox {report:?}"),
                Err(e) => error!("Encountered an error while draining the outbox {e:?}"),
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    return Ok(())
                }
                _ = self.time_provider.sleep_until(drain_point) => ()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use anyhow::Result;
    use chrono::{TimeZone, Utc};
    use mockall::{predicate::function, Sequence};
    use reqwest::StatusCode;
    use tempfile::tempdir;
    use tokio_util::sync::CancellationToken;
    use uuid::Uuid;

    use crate::{
        api::{
            entities::{BreakPayload, BreakType, RequestStatus},
            error::ApiError,
            submission::Submission,
            MockTrackerApi,
        },
        storage::outbox::{DeliveryState, Outbox},
        utils::{clock::test_clock::ManualClock, logging::TEST_LOGGING},
    };

    use super::{drain_once, SyncModule};

    fn break_request(note: &str) -> Submission {
        Submission::Break(BreakPayload {
            user_id: 7,
            start: "2025-03-19 12:00:00".into(),
            end: "2025-03-19 12:15:00".into(),
            total_hm: "00:15".into(),
            kind: BreakType::Rest,
            note: note.into(),
            status: RequestStatus::Pending,
            client_ref: Uuid::new_v4(),
        })
    }

    fn with_note(note: &'static str) -> impl Fn(&BreakPayload) -> bool {
        move |p: &BreakPayload| p.note == note
    }

    #[tokio::test]
    async fn delivers_in_order_and_keeps_rejections() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let outbox = Outbox::new(dir.path());
        let now = Utc.with_ymd_and_hms(2025, 3, 19, 13, 0, 0).unwrap();
        for note in ["a", "b", "c"] {
            outbox.enqueue(break_request(note), now).await?;
        }

        let mut api = MockTrackerApi::new();
        let mut seq = Sequence::new();
        api.expect_submit_break()
            .with(function(with_note("a")))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        api.expect_submit_break()
            .with(function(with_note("b")))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Err(ApiError::Rejected {
                    message: "Overlapping break".into(),
                })
            });
        api.expect_submit_break()
            .with(function(with_note("c")))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let report = drain_once(&api, &outbox, now).await?;

        assert_eq!(report.sent, 2);
        assert_eq!(report.rejected, 1);
        assert_eq!(report.deferred, None);
        let left = outbox.list().await?;
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].state, DeliveryState::Rejected);
        assert_eq!(left[0].last_error.as_deref(), Some("Overlapping break"));
        Ok(())
    }

    #[tokio::test]
    async fn retryable_failure_stops_the_pass() -> Result<()> {
        let dir = tempdir()?;
        let outbox = Outbox::new(dir.path());
        let now = Utc.with_ymd_and_hms(2025, 3, 19, 13, 0, 0).unwrap();
        let first = outbox.enqueue(break_request("a"), now).await?;
        outbox.enqueue(break_request("b"), now).await?;

        let mut api = MockTrackerApi::new();
        api.expect_submit_break().times(1).returning(|_| {
            Err(ApiError::Server {
                status: StatusCode::GATEWAY_TIMEOUT,
            })
        });

        let report = drain_once(&api, &outbox, now).await?;
        assert_eq!(report.sent, 0);
        assert!(report.deferred.is_some());

        let entries = outbox.list().await?;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, first.id);
        assert_eq!(entries[0].attempts, 1);
        assert_eq!(entries[0].next_attempt_at, now + chrono::Duration::seconds(5));
        assert_eq!(entries[1].attempts, 0);
        Ok(())
    }

    #[tokio::test]
    async fn same_client_ref_on_every_attempt() -> Result<()> {
        let dir = tempdir()?;
        let outbox = Outbox::new(dir.path());
        let now = Utc.with_ymd_and_hms(2025, 3, 19, 13, 0, 0).unwrap();
        let submission = break_request("a");
        let client_ref = submission.client_ref();
        outbox.enqueue(submission, now).await?;

        let mut api = MockTrackerApi::new();
        let mut seq = Sequence::new();
        api.expect_submit_break()
            .with(function(move |p: &BreakPayload| p.client_ref == client_ref))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(ApiError::Transport("connection reset".into())));
        api.expect_submit_break()
            .with(function(move |p: &BreakPayload| p.client_ref == client_ref))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        drain_once(&api, &outbox, now).await?;
        // not due yet
        drain_once(&api, &outbox, now + chrono::Duration::seconds(4)).await?;
        let report = drain_once(&api, &outbox, now + chrono::Duration::seconds(5)).await?;

        assert_eq!(report.sent, 1);
        assert!(outbox.list().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn loop_drains_until_cancelled() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let now = Utc.with_ymd_and_hms(2025, 3, 19, 13, 0, 0).unwrap();
        Outbox::new(dir.path())
            .enqueue(break_request("a"), now)
            .await?;

        let mut api = MockTrackerApi::new();
        api.expect_submit_break().times(1).returning(|_| Ok(()));

        let shutdown = CancellationToken::new();
        let module = SyncModule::new(
            Box::new(api),
            Outbox::new(dir.path()),
            shutdown.clone(),
            Duration::from_millis(50),
            Box::new(ManualClock::new(now)),
        );

        let (_, result) = tokio::join!(
            async {
                tokio::time::sleep(Duration::from_millis(400)).await;
                shutdown.cancel()
            },
            module.run(),
        );

        result?;
        assert!(Outbox::new(dir.path()).list().await?.is_empty());
        Ok(())
    }
}
