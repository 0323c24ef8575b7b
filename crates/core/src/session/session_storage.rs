//! Session storage backends.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::session_traits::SessionStorageTrait;
use crate::errors::{Error, Result};

const CURRENT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize, Default)]
struct StoredEntries {
    version: u32,
    entries: HashMap<String, String>,
}

/// JSON file backed storage, the desktop/CLI counterpart of browser local
/// storage. All reads and writes go through one lock so concurrent writers
/// never interleave partial files.
#[derive(Debug)]
pub struct FileSessionStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileSessionStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    async fn read_entries(&self) -> Result<HashMap<String, String>> {
        if !tokio::fs::try_exists(&self.path).await? {
            return Ok(HashMap::new());
        }

        let raw = tokio::fs::read(&self.path).await?;
        if raw.is_empty() {
            return Ok(HashMap::new());
        }

        let stored: StoredEntries = serde_json::from_slice(&raw)?;
        Ok(stored.entries)
    }

    async fn write_entries(&self, entries: HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let stored = StoredEntries {
            version: CURRENT_VERSION,
            entries,
        };
        let json = serde_json::to_string_pretty(&stored)?;
        tokio::fs::write(&self.path, json).await?;
        debug!("Session storage written to {}", self.path.display());
        Ok(())
    }
}

#[async_trait]
impl SessionStorageTrait for FileSessionStorage {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().await;
        let entries = self.read_entries().await?;
        Ok(entries.get(key).cloned())
    }

    async fn save(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        // A corrupt file is replaced rather than blocking every later save.
        let mut entries = self.read_entries().await.unwrap_or_default();
        entries.insert(key.to_string(), value.to_string());
        self.write_entries(entries).await
    }

    async fn clear(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        match self.read_entries().await {
            Ok(mut entries) => {
                if entries.remove(key).is_none() {
                    return Ok(());
                }
                self.write_entries(entries).await
            }
            Err(_) => self.write_entries(HashMap::new()).await,
        }
    }
}

/// Process-local storage for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct InMemorySessionStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populates a key, e.g. to simulate a session left by a previous run.
    pub fn with_entry(key: &str, value: &str) -> Self {
        let storage = Self::default();
        storage
            .entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value.to_string());
        storage
    }

    /// Raw stored value, for assertions.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }
}

#[async_trait]
impl SessionStorageTrait for InMemorySessionStorage {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| Error::Storage("Session storage lock poisoned".into()))?;
        Ok(entries.get(key).cloned())
    }

    async fn save(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| Error::Storage("Session storage lock poisoned".into()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| Error::Storage("Session storage lock poisoned".into()))?;
        entries.remove(key);
        Ok(())
    }
}
