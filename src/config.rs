use std::{io::ErrorKind, path::Path, time::Duration};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::DEFAULT_API_BASE;

pub const CONFIG_FILE_NAME: &str = "config.json";
pub const API_BASE_ENV: &str = "FIELDTRACK_API_BASE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api_base: String,
    pub request_timeout_secs: u64,
    /// How often the sync daemon looks at the outbox.
    pub sync_interval_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.into(),
            request_timeout_secs: 20,
            sync_interval_secs: 30,
        }
    }
}

impl AppConfig {
    /// Reads `config.json` from the application directory, then applies the environment and the
    /// command line, in that order.
    pub fn load(app_dir: &Path, api_base_arg: Option<String>) -> Result<Self> {
        let config = Self::read_file(&app_dir.join(CONFIG_FILE_NAME))?;
        Ok(config.with_overrides(std::env::var(API_BASE_ENV).ok(), api_base_arg))
    }

    fn read_file(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content)
                .with_context(|| format!("Invalid configuration in {path:?}")),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No configuration at {path:?}, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn with_overrides(
        mut self,
        env_api_base: Option<String>,
        arg_api_base: Option<String>,
    ) -> Self {
        let non_blank = |v: &String| !v.trim().is_empty();
        if let Some(base) = arg_api_base.filter(non_blank).or(env_api_base.filter(non_blank)) {
            self.api_base = base;
        }
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs.max(1))
    }
}
