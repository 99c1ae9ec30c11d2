use std::{fmt::Display, path::Path};

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    api::entities::{ServiceType, SupportMode, User},
    utils::time::{epoch_millis, from_epoch_millis},
};

use super::state_file::StateFile;

pub const STATE_FILE_NAME: &str = "state.json";

pub const USER_KEY: &str = "user";
pub const THEME_KEY: &str = "app_theme";
pub const CHECKIN_START_KEY: &str = "checkin_start_time";
pub const CHECKED_IN_CLIENT_KEY: &str = "checked_in_client";
pub const CHECKIN_CONTEXT_KEY: &str = "checkin_context";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }
}

impl Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Theme::Dark => write!(f, "dark"),
            Theme::Light => write!(f, "light"),
        }
    }
}

/// What was picked when checking in. Check-out sends the same values back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckinContext {
    pub service_type: ServiceType,
    pub support_mode: SupportMode,
    /// Outbox id of the check-in when it could not be sent right away.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queued_ref: Option<Uuid>,
}

/// A check-in that has been started and not yet closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveCheckin {
    pub client: String,
    pub started_at: DateTime<Utc>,
    pub context: Option<CheckinContext>,
}

impl ActiveCheckin {
    /// Whole seconds since the check-in, never negative.
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> i64 {
        (now - self.started_at).num_seconds().max(0)
    }
}

/// The handful of flags the client keeps between runs.
pub struct SessionStore {
    state: StateFile,
}

impl SessionStore {
    pub fn new(app_dir: &Path) -> Self {
        Self {
            state: StateFile::new(app_dir.join(STATE_FILE_NAME)),
        }
    }

    pub async fn user(&self) -> Result<Option<User>> {
        self.state.get(USER_KEY).await
    }

    pub async fn save_user(&self, user: &User) -> Result<()> {
        self.state.set(USER_KEY, user).await?;
        info!("Saved session of user {}", user.id);
        Ok(())
    }

    /// Forgets the logged in user. The theme and a running check-in survive a logout.
    pub async fn clear_user(&self) -> Result<()> {
        self.state.remove(&[USER_KEY]).await
    }

    pub async fn theme(&self) -> Result<Theme> {
        Ok(self.state.get(THEME_KEY).await?.unwrap_or_default())
    }

    pub async fn set_theme(&self, theme: Theme) -> Result<()> {
        self.state.set(THEME_KEY, &theme).await
    }

    pub async fn toggle_theme(&self) -> Result<Theme> {
        let next = self.theme().await?.toggled();
        self.set_theme(next).await?;
        Ok(next)
    }

    /// Restores the running check-in. Both the client and the start time have to be present,
    /// one without the other is treated as no check-in.
    pub async fn active_checkin(&self) -> Result<Option<ActiveCheckin>> {
        let mut values = self
            .state
            .get_many(&[CHECKED_IN_CLIENT_KEY, CHECKIN_START_KEY, CHECKIN_CONTEXT_KEY])
            .await?
            .into_iter();
        let (client, start, context) = (
            values.next().flatten(),
            values.next().flatten(),
            values.next().flatten(),
        );

        let (Some(Value::String(client)), Some(start)) = (client, start) else {
            return Ok(None);
        };
        let Some(started_at) = parse_start(&start) else {
            warn!("Stored check-in start {start} is unreadable");
            return Ok(None);
        };
        let context = context.and_then(|v| serde_json::from_value(v).ok());

        Ok(Some(ActiveCheckin {
            client,
            started_at,
            context,
        }))
    }

    pub async fn save_active_checkin(&self, checkin: &ActiveCheckin) -> Result<()> {
        let context = serde_json::to_value(&checkin.context)?;
        let start = epoch_millis(checkin.started_at);
        let client = checkin.client.clone();
        self.state
            .update(move |map| {
                map.insert(CHECKIN_START_KEY.into(), json!(start));
                map.insert(CHECKED_IN_CLIENT_KEY.into(), json!(client));
                map.insert(CHECKIN_CONTEXT_KEY.into(), context);
            })
            .await
    }

    pub async fn clear_active_checkin(&self) -> Result<()> {
        self.state
            .remove(&[CHECKIN_START_KEY, CHECKED_IN_CLIENT_KEY, CHECKIN_CONTEXT_KEY])
            .await
    }
}

/// Start times are epoch milliseconds, as a number or as a string of digits.
fn parse_start(value: &Value) -> Option<DateTime<Utc>> {
    let millis = match value {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    from_epoch_millis(millis)
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::{Duration, TimeZone, Utc};
    use tempfile::tempdir;

    use crate::{
        api::entities::{Role, ServiceType, SupportMode, User},
        storage::state_file::StateFile,
    };

    use super::*;

    fn engineer() -> User {
        User {
            id: 7,
            name: "Jordan".into(),
            email: "jordan@example.com".into(),
            role: Role::Engineer,
            token: None,
        }
    }

    #[tokio::test]
    async fn login_and_logout() -> Result<()> {
        let dir = tempdir()?;
        let session = SessionStore::new(dir.path());
        assert_eq!(session.user().await?, None);

        session.save_user(&engineer()).await?;
        assert_eq!(session.user().await?, Some(engineer()));

        session.set_theme(Theme::Light).await?;
        session.clear_user().await?;
        assert_eq!(session.user().await?, None);
        assert_eq!(session.theme().await?, Theme::Light);
        Ok(())
    }

    #[tokio::test]
    async fn theme_defaults_to_dark_and_toggles() -> Result<()> {
        let dir = tempdir()?;
        let session = SessionStore::new(dir.path());
        assert_eq!(session.theme().await?, Theme::Dark);
        assert_eq!(session.toggle_theme().await?, Theme::Light);
        assert_eq!(session.toggle_theme().await?, Theme::Dark);
        Ok(())
    }

    #[tokio::test]
    async fn active_checkin_round_trips_through_disk() -> Result<()> {
        let dir = tempdir()?;
        let session = SessionStore::new(dir.path());
        let started_at = Utc.with_ymd_and_hms(2025, 3, 19, 9, 0, 0).unwrap();
        let checkin = ActiveCheckin {
            client: "Acme".into(),
            started_at,
            context: Some(CheckinContext {
                service_type: ServiceType::Ticket,
                support_mode: SupportMode::Remote,
                queued_ref: Some(Uuid::nil()),
            }),
        };

        session.save_active_checkin(&checkin).await?;
        let restored = SessionStore::new(dir.path()).active_checkin().await?;
        assert_eq!(restored, Some(checkin.clone()));
        assert_eq!(
            checkin.elapsed_seconds(started_at + Duration::milliseconds(90_900)),
            90
        );

        session.clear_active_checkin().await?;
        assert_eq!(session.active_checkin().await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn client_without_start_is_not_a_checkin() -> Result<()> {
        let dir = tempdir()?;
        let state = StateFile::new(dir.path().join(STATE_FILE_NAME));
        state.set(CHECKED_IN_CLIENT_KEY, &"Acme").await?;
        let session = SessionStore::new(dir.path());
        assert_eq!(session.active_checkin().await?, None);

        // the format written by older clients: a string of digits and no context
        state.set(CHECKIN_START_KEY, &"1742374800000").await?;
        let restored = session.active_checkin().await?.unwrap();
        assert_eq!(restored.client, "Acme");
        assert_eq!(restored.context, None);
        assert_eq!(restored.started_at.timestamp_millis(), 1_742_374_800_000);
        Ok(())
    }

    #[test]
    fn elapsed_never_negative() {
        let started_at = Utc.with_ymd_and_hms(2025, 3, 19, 9, 0, 0).unwrap();
        let checkin = ActiveCheckin {
            client: "Acme".into(),
            started_at,
            context: None,
        };
        assert_eq!(checkin.elapsed_seconds(started_at - Duration::seconds(5)), 0);
    }
}
