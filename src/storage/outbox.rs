use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::submission::Submission;

use super::locked::{read_shared, rewrite_exclusive};

pub const OUTBOX_FILE_NAME: &str = "outbox.jsonl";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryState {
    #[default]
    Pending,
    /// The server refused it. Kept for inspection and never retried.
    Rejected,
}

/// One line of the outbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingSubmission {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub submission: Submission,
    #[serde(default)]
    pub attempts: u32,
    pub next_attempt_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default)]
    pub state: DeliveryState,
}

impl PendingSubmission {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.state == DeliveryState::Pending && self.next_attempt_at <= now
    }
}

/// Queue of writes waiting to reach the server, stored as JSON lines in insertion order.
pub struct Outbox {
    path: PathBuf,
}

fn parse_entries(path: &Path, content: &str) -> Vec<PendingSubmission> {
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str(line) {
            Ok(entry) => Some(entry),
            Err(e) => {
                // ignore illegal values. Might happen after a crash mid-write
                warn!("Skipping illegal outbox line in {path:?} {line}: {e}");
                None
            }
        })
        .collect()
}

fn serialize_entries(entries: &[PendingSubmission]) -> Result<String> {
    let mut content = String::new();
    for entry in entries {
        content.push_str(&serde_json::to_string(entry)?);
        content.push('\n');
    }
    Ok(content)
}

impl Outbox {
    pub fn new(app_dir: &Path) -> Self {
        Self {
            path: app_dir.join(OUTBOX_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn modify<R>(&self, change: impl FnOnce(&mut Vec<PendingSubmission>) -> R) -> Result<R> {
        let path = self.path.clone();
        rewrite_exclusive(&self.path, move |content| {
            let mut entries = parse_entries(&path, &content);
            let result = change(&mut entries);
            Ok((serialize_entries(&entries)?, result))
        })
        .await
    }

    /// Queues a submission for delivery as soon as possible. The entry id is the submission's
    /// `client_ref`, so queueing the same submission twice keeps a single entry.
    pub async fn enqueue(
        &self,
        submission: Submission,
        now: DateTime<Utc>,
    ) -> Result<PendingSubmission> {
        let id = submission.client_ref();
        let entry = self
            .modify(move |entries| {
                if let Some(existing) = entries.iter().find(|e| e.id == id) {
                    return existing.clone();
                }
                let entry = PendingSubmission {
                    id,
                    created_at: now,
                    submission,
                    attempts: 0,
                    next_attempt_at: now,
                    last_error: None,
                    state: DeliveryState::Pending,
                };
                entries.push(entry.clone());
                entry
            })
            .await?;
        info!("Queued {} as {}", entry.submission, entry.id);
        Ok(entry)
    }

    pub async fn list(&self) -> Result<Vec<PendingSubmission>> {
        Ok(read_shared(&self.path)
            .await?
            .map(|content| parse_entries(&self.path, &content))
            .unwrap_or_default())
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<PendingSubmission>> {
        Ok(self.list().await?.into_iter().find(|e| e.id == id))
    }

    /// Entries that can be sent at `now`, oldest first. Stops at the first pending entry that is
    /// still waiting for its retry, so nothing overtakes it.
    pub async fn due(&self, now: DateTime<Utc>) -> Result<Vec<PendingSubmission>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|e| e.state == DeliveryState::Pending)
            .take_while(|e| e.is_due(now))
            .collect())
    }

    /// Records a failed delivery. Returns `false` when the entry is gone.
    pub async fn mark_failed(
        &self,
        id: Uuid,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<bool> {
        let found = self
            .modify(|entries| match entries.iter_mut().find(|e| e.id == id) {
                Some(entry) => {
                    entry.attempts += 1;
                    entry.next_attempt_at = next_attempt_at;
                    entry.last_error = Some(error.to_string());
                    true
                }
                None => false,
            })
            .await?;
        debug!("Marked {id} failed, retrying at {next_attempt_at}");
        Ok(found)
    }

    pub async fn mark_rejected(&self, id: Uuid, error: &str) -> Result<bool> {
        let found = self
            .modify(|entries| match entries.iter_mut().find(|e| e.id == id) {
                Some(entry) => {
                    entry.attempts += 1;
                    entry.state = DeliveryState::Rejected;
                    entry.last_error = Some(error.to_string());
                    true
                }
                None => false,
            })
            .await?;
        if found {
            warn!("Submission {id} was rejected: {error}");
        }
        Ok(found)
    }

    pub async fn remove(&self, id: Uuid) -> Result<bool> {
        self.modify(|entries| {
            let before = entries.len();
            entries.retain(|e| e.id != id);
            before != entries.len()
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::{Duration, TimeZone, Utc};
    use tempfile::tempdir;
    use uuid::Uuid;

    use crate::api::{
        entities::{BreakPayload, BreakType, RequestStatus},
        submission::Submission,
    };

    use super::{DeliveryState, Outbox};

    fn submission(note: &str) -> Submission {
        Submission::Break(BreakPayload {
            user_id: 7,
            start: "2025-03-19 12:00:00".into(),
            end: "2025-03-19 12:30:00".into(),
            total_hm: "00:30".into(),
            kind: BreakType::Rest,
            note: note.into(),
            status: RequestStatus::Pending,
            client_ref: Uuid::new_v4(),
        })
    }

    #[tokio::test]
    async fn enqueue_keeps_fifo_order_and_deduplicates() -> Result<()> {
        let dir = tempdir()?;
        let outbox = Outbox::new(dir.path());
        let now = Utc.with_ymd_and_hms(2025, 3, 19, 12, 0, 0).unwrap();

        let first = submission("first");
        outbox.enqueue(first.clone(), now).await?;
        outbox.enqueue(submission("second"), now).await?;
        outbox.enqueue(first.clone(), now + Duration::minutes(1)).await?;

        let entries = outbox.list().await?;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].submission, first);
        assert_eq!(entries[0].id, first.client_ref());
        assert_eq!(entries[0].created_at, now);
        Ok(())
    }

    #[tokio::test]
    async fn failed_entry_holds_back_the_queue_until_its_retry() -> Result<()> {
        let dir = tempdir()?;
        let outbox = Outbox::new(dir.path());
        let now = Utc.with_ymd_and_hms(2025, 3, 19, 12, 0, 0).unwrap();
        let entry = outbox.enqueue(submission("a"), now).await?;

        assert!(outbox
            .mark_failed(entry.id, "connection refused", now + Duration::seconds(5))
            .await?);
        assert!(outbox.due(now).await?.is_empty());

        outbox.enqueue(submission("b"), now).await?;
        assert!(outbox.due(now).await?.is_empty());

        let due = outbox.due(now + Duration::seconds(5)).await?;
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].attempts, 1);
        assert_eq!(due[0].last_error.as_deref(), Some("connection refused"));
        Ok(())
    }

    #[tokio::test]
    async fn rejected_entries_are_kept_but_never_due() -> Result<()> {
        let dir = tempdir()?;
        let outbox = Outbox::new(dir.path());
        let now = Utc.with_ymd_and_hms(2025, 3, 19, 12, 0, 0).unwrap();
        let entry = outbox.enqueue(submission("a"), now).await?;

        outbox.mark_rejected(entry.id, "Invalid date range").await?;

        assert!(outbox.due(now + Duration::days(1)).await?.is_empty());
        let entries = outbox.list().await?;
        assert_eq!(entries[0].state, DeliveryState::Rejected);

        assert_eq!(
            outbox.get(entry.id).await?.map(|e| e.state),
            Some(DeliveryState::Rejected)
        );
        assert!(outbox.remove(entry.id).await?);
        assert!(!outbox.remove(entry.id).await?);
        assert_eq!(outbox.get(entry.id).await?, None);
        assert!(outbox.list().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn torn_lines_are_skipped() -> Result<()> {
        let dir = tempdir()?;
        let outbox = Outbox::new(dir.path());
        let now = Utc.with_ymd_and_hms(2025, 3, 19, 12, 0, 0).unwrap();
        outbox.enqueue(submission("a"), now).await?;

        let mut content = std::fs::read_to_string(outbox.path())?;
        content.push_str("{\"id\":\"0000");
        std::fs::write(outbox.path(), content)?;

        assert_eq!(outbox.list().await?.len(), 1);
        outbox.enqueue(submission("b"), now).await?;
        assert_eq!(outbox.list().await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn missing_entries_report_false() -> Result<()> {
        let dir = tempdir()?;
        let outbox = Outbox::new(dir.path());
        let now = Utc.with_ymd_and_hms(2025, 3, 19, 12, 0, 0).unwrap();
        assert!(!outbox.mark_failed(Uuid::nil(), "x", now).await?);
        assert!(!outbox.mark_rejected(Uuid::nil(), "x").await?);
        Ok(())
    }
}
