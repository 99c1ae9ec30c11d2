use std::path::PathBuf;

use anyhow::{bail, Result};

use crate::{
    api::{client::HttpTrackerApi, entities::User},
    config::AppConfig,
    storage::{outbox::Outbox, session::SessionStore},
    utils::clock::{Clock, DefaultClock},
};

use super::output::Palette;

/// Everything a command needs besides the API.
pub struct AppContext {
    pub dir: PathBuf,
    pub config: AppConfig,
    pub session: SessionStore,
    pub outbox: Outbox,
    pub clock: Box<dyn Clock>,
    pub palette: Palette,
}

impl AppContext {
    pub async fn load(dir: PathBuf, api_base: Option<String>) -> Result<Self> {
        let config = AppConfig::load(&dir, api_base)?;
        Self::with_config(dir, config, Box::new(DefaultClock)).await
    }

    pub async fn with_config(
        dir: PathBuf,
        config: AppConfig,
        clock: Box<dyn Clock>,
    ) -> Result<Self> {
        let session = SessionStore::new(&dir);
        let palette = Palette::for_theme(session.theme().await?);
        Ok(Self {
            outbox: Outbox::new(&dir),
            session,
            dir,
            config,
            clock,
            palette,
        })
    }

    /// Client for the configured server, authorized as `user` when the server issued a token.
    pub fn api(&self, user: Option<&User>) -> Result<HttpTrackerApi> {
        let token = user.and_then(|u| u.token.clone());
        Ok(HttpTrackerApi::new(&self.config.api_base, self.config.request_timeout())?
            .with_token(token))
    }

    pub async fn require_user(&self) -> Result<User> {
        match self.session.user().await? {
            Some(user) => Ok(user),
            None => bail!("Not logged in. Run `fieldtrack login` first"),
        }
    }

    pub async fn require_admin(&self) -> Result<User> {
        let user = self.require_user().await?;
        if !user.is_admin() {
            bail!("{} is not an administrator", user.name);
        }
        Ok(user)
    }
}

#[cfg(test)]
pub(crate) mod test_context {
    use std::path::Path;

    use anyhow::Result;
    use chrono::{TimeZone, Utc};

    use crate::{
        api::entities::{Role, User},
        config::AppConfig,
        utils::clock::test_clock::ManualClock,
    };

    use super::AppContext;

    pub fn user(role: Role) -> User {
        User {
            id: 7,
            name: "Jordan".into(),
            email: "jordan@example.com".into(),
            role,
            token: None,
        }
    }

    pub async fn context(dir: &Path) -> Result<AppContext> {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 3, 19, 9, 0, 0).unwrap());
        AppContext::with_config(dir.to_path_buf(), AppConfig::default(), Box::new(clock)).await
    }

    pub async fn logged_in(dir: &Path, role: Role) -> Result<AppContext> {
        let context = context(dir).await?;
        context.session.save_user(&user(role)).await?;
        Ok(context)
    }
}
