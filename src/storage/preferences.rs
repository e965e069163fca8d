//! Preference storage
//!
//! A small string-keyed store of typed records, persisted as JSON. Each record
//! carries the time it was written and an optional expiry; expired records
//! read back as absent. Writes go straight to disk.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::storage::{get_data_dir, StorageError};

/// File name used inside the data directory
pub const PREFERENCES_FILE: &str = "preferences.json";

/// A single stored preference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceRecord {
    pub value: Value,
    pub written_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl PreferenceRecord {
    /// A record is live strictly before `expires_at`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(expires_at) if now >= expires_at)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PreferenceFile {
    #[serde(default)]
    records: BTreeMap<String, PreferenceRecord>,
}

/// Key-value preference store backed by a JSON file
#[derive(Debug, Default)]
pub struct PreferenceStore {
    path: Option<PathBuf>,
    records: BTreeMap<String, PreferenceRecord>,
}

impl PreferenceStore {
    /// Store that never touches disk
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open the store in the user's data directory
    pub fn open_default() -> Result<Self, StorageError> {
        Ok(Self::open(get_data_dir()?.join(PREFERENCES_FILE)))
    }

    /// Open a store at `path`.
    ///
    /// A missing or unreadable file yields an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let records = match load_records(&path) {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(
                    "Failed to load preferences from {}, starting empty: {}",
                    path.display(),
                    e
                );
                BTreeMap::new()
            }
        };

        Self {
            path: Some(path),
            records,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Live record for `key`, or `None` when absent or expired
    pub fn get(&self, key: &str, now: DateTime<Utc>) -> Option<&PreferenceRecord> {
        self.records
            .get(key)
            .filter(|record| !record.is_expired(now))
    }

    /// Decode the live value for `key`
    pub fn get_value<T: DeserializeOwned>(&self, key: &str, now: DateTime<Utc>) -> Option<T> {
        let record = self.get(key, now)?;
        match serde_json::from_value(record.value.clone()) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Preference '{}' has an unexpected shape: {}", key, e);
                None
            }
        }
    }

    pub fn contains(&self, key: &str, now: DateTime<Utc>) -> bool {
        self.get(key, now).is_some()
    }

    /// Write a value with no expiry
    pub fn set<T: Serialize>(
        &mut self,
        key: &str,
        value: &T,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.write(key, serde_json::to_value(value)?, now, None)
    }

    /// Write a value that expires `ttl` after `now`
    pub fn set_with_ttl<T: Serialize>(
        &mut self,
        key: &str,
        value: &T,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.write(key, serde_json::to_value(value)?, now, Some(now + ttl))
    }

    /// Remove a key. Returns whether anything was stored under it.
    pub fn remove(&mut self, key: &str) -> Result<bool, StorageError> {
        let removed = self.records.remove(key).is_some();
        if removed {
            self.save()?;
        }
        Ok(removed)
    }

    /// Drop every expired record
    pub fn purge_expired(&mut self, now: DateTime<Utc>) -> Result<usize, StorageError> {
        let before = self.records.len();
        self.records.retain(|_, record| !record.is_expired(now));
        let purged = before - self.records.len();
        if purged > 0 {
            self.save()?;
        }
        Ok(purged)
    }

    /// Persist to disk (no-op for in-memory stores)
    pub fn save(&self) -> Result<(), StorageError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = PreferenceFile {
            records: self.records.clone(),
        };
        fs::write(path, serde_json::to_string_pretty(&file)?)?;

        tracing::debug!("Saved {} preferences to disk", self.records.len());
        Ok(())
    }

    fn write(
        &mut self,
        key: &str,
        value: Value,
        now: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), StorageError> {
        self.records.insert(
            key.to_string(),
            PreferenceRecord {
                value,
                written_at: now,
                expires_at,
            },
        );
        self.save()
    }
}

fn load_records(path: &Path) -> Result<BTreeMap<String, PreferenceRecord>, StorageError> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }

    let json = fs::read_to_string(path)?;
    let file: PreferenceFile = serde_json::from_str(&json)?;
    Ok(file.records)
}
