//! Config entry persistence
//!
//! Each configured Tessie account is a [`ConfigEntry`]. The store keeps the
//! list in memory and writes it back to a JSON file on every change.

use crate::error::{BridgeError, Result};
use crate::logging::{StructuredLogger, get_logger};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One configured account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub entry_id: String,
    pub title: String,
    pub access_token: String,
}

impl ConfigEntry {
    /// New entry with a fresh random id
    pub fn new(title: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            entry_id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            access_token: access_token.into(),
        }
    }
}

/// Entry as reported to clients, without the token
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EntrySummary {
    pub entry_id: String,
    pub title: String,
}

impl From<&ConfigEntry> for EntrySummary {
    fn from(entry: &ConfigEntry) -> Self {
        Self {
            entry_id: entry.entry_id.clone(),
            title: entry.title.clone(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct EntryFile {
    #[serde(default)]
    entries: Vec<ConfigEntry>,
}

/// JSON-file backed list of config entries
pub struct EntryStore {
    file_path: PathBuf,
    entries: Vec<ConfigEntry>,
    logger: StructuredLogger,
}

impl EntryStore {
    pub fn new<P: AsRef<Path>>(file_path: P) -> Self {
        Self {
            file_path: file_path.as_ref().to_path_buf(),
            entries: Vec::new(),
            logger: get_logger("entries"),
        }
    }

    /// Open the store and load it; a missing file yields an empty store
    pub fn open<P: AsRef<Path>>(file_path: P) -> Result<Self> {
        let mut store = Self::new(file_path);
        store.load()?;
        Ok(store)
    }

    pub fn load(&mut self) -> Result<()> {
        if !self.file_path.exists() {
            self.logger.info("No entries file found, starting empty");
            self.entries.clear();
            return Ok(());
        }

        let contents = std::fs::read_to_string(&self.file_path)?;
        let file: EntryFile = serde_json::from_str(&contents)?;
        self.entries = file.entries;
        self.logger
            .info(&format!("Loaded {} config entries", self.entries.len()));
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.file_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let file = EntryFile {
            entries: self.entries.clone(),
        };
        std::fs::write(&self.file_path, serde_json::to_string_pretty(&file)?)?;
        self.logger.debug("Saved config entries");
        Ok(())
    }

    pub fn list(&self) -> &[ConfigEntry] {
        &self.entries
    }

    pub fn get(&self, entry_id: &str) -> Option<&ConfigEntry> {
        self.entries.iter().find(|e| e.entry_id == entry_id)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append an entry and persist
    pub fn add(&mut self, entry: ConfigEntry) -> Result<()> {
        if self.get(&entry.entry_id).is_some() {
            return Err(BridgeError::validation(
                "entry_id".to_string(),
                format!("entry {} already exists", entry.entry_id),
            ));
        }
        self.entries.push(entry);
        self.save()
    }

    /// Remove an entry and persist; returns the removed entry
    pub fn remove(&mut self, entry_id: &str) -> Result<Option<ConfigEntry>> {
        let Some(pos) = self.entries.iter().position(|e| e.entry_id == entry_id) else {
            return Ok(None);
        };
        let removed = self.entries.remove(pos);
        self.save()?;
        Ok(Some(removed))
    }
}
