use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::locked::{read_shared, rewrite_exclusive};

/// Key-value store backed by one JSON object file.
pub struct StateFile {
    path: PathBuf,
}

fn parse_map(path: &Path, content: &str) -> Map<String, Value> {
    if content.trim().is_empty() {
        return Map::new();
    }
    match serde_json::from_str::<Map<String, Value>>(content) {
        Ok(map) => map,
        Err(e) => {
            // torn write
            warn!("State file {path:?} is corrupted, starting empty: {e}");
            Map::new()
        }
    }
}

impl StateFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_map(&self) -> Result<Map<String, Value>> {
        Ok(read_shared(&self.path)
            .await?
            .map(|content| parse_map(&self.path, &content))
            .unwrap_or_default())
    }

    /// Value stored under `key`. A value that no longer matches `T` reads as absent.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(value) = self.read_map().await?.remove(key) else {
            return Ok(None);
        };
        match serde_json::from_value(value) {
            Ok(v) => Ok(Some(v)),
            Err(e) => {
                warn!("Ignoring unreadable value under {key}: {e}");
                Ok(None)
            }
        }
    }

    /// Reads several keys from one snapshot of the file.
    pub async fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<Value>>> {
        let mut map = self.read_map().await?;
        Ok(keys.iter().map(|key| map.remove(*key)).collect())
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.update(|map| {
            map.insert(key.to_string(), value);
        })
        .await
    }

    pub async fn remove(&self, keys: &[&str]) -> Result<()> {
        self.update(|map| {
            for key in keys {
                map.remove(*key);
            }
        })
        .await
    }

    /// Applies `change` atomically with respect to other users of the file.
    pub async fn update(&self, change: impl FnOnce(&mut Map<String, Value>)) -> Result<()> {
        let path = self.path.clone();
        rewrite_exclusive(&self.path, move |content| {
            let mut map = parse_map(&path, &content);
            change(&mut map);
            let serialized = serde_json::to_string_pretty(&map)?;
            Ok((serialized, ()))
        })
        .await?;
        debug!("Updated {:?}", self.path);
        Ok(())
    }
}
