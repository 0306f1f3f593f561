//! Persistent log of completed downloads.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::JobDescriptor;

/// Maximum number of records kept; older ones are evicted first.
pub const HISTORY_CAPACITY: usize = 100;

/// Snapshot of one successful download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: Option<String>,
    pub title: String,
    pub thumbnail: Option<String>,
    pub url: String,
    /// Human-readable format label, e.g. "MP3 audio".
    pub format: String,
    pub date: DateTime<Utc>,
}

impl HistoryRecord {
    /// Takes a record of `descriptor` completing at `date`.
    #[must_use]
    pub fn new(descriptor: &JobDescriptor, date: DateTime<Utc>) -> Self {
        Self {
            id: descriptor.video_id().map(str::to_string),
            title: descriptor.title().to_string(),
            thumbnail: descriptor.thumbnail().map(str::to_string),
            url: descriptor.url().to_string(),
            format: descriptor.format().label().to_string(),
            date,
        }
    }
}

/// Prepends `record` and keeps only the newest [`HISTORY_CAPACITY`] entries.
///
/// The log is ordered newest first. Repeated downloads of the same video are
/// kept as separate entries.
pub fn push_record(log: &mut Vec<HistoryRecord>, record: HistoryRecord) {
    log.insert(0, record);
    log.truncate(HISTORY_CAPACITY);
}

/// History log backed by a JSON file.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
    records: Vec<HistoryRecord>,
}

impl HistoryStore {
    /// Creates an empty store that will save to `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: Vec::new(),
        }
    }

    /// Loads the log from `path`.
    ///
    /// A missing or unreadable file yields an empty log rather than an error;
    /// the history is a convenience and must never block downloading. Read
    /// errors other than a missing file are logged as warnings.
    #[must_use]
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let records = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str::<Vec<HistoryRecord>>(&contents)
                .unwrap_or_else(|e| {
                    log::warn!("Ignoring corrupt history file {}: {e}", path.display());
                    Vec::new()
                }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                log::warn!("Cannot read history file {}: {e}", path.display());
                Vec::new()
            }
        };
        let mut store = Self { path, records };
        store.records.truncate(HISTORY_CAPACITY);
        store
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records, newest first.
    #[must_use]
    pub fn records(&self) -> &[HistoryRecord] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Adds a record in memory and saves the log.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written; the in-memory log is
    /// updated regardless.
    pub fn append(&mut self, record: HistoryRecord) -> Result<()> {
        push_record(&mut self.records, record);
        self.save()
    }

    /// Removes every record and saves the empty log.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn clear(&mut self) -> Result<()> {
        self.records.clear();
        self.save()
    }

    /// Saves the log atomically (write tmp + rename).
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the file cannot
    /// be written.
    pub fn save(&self) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }

        let tmp_path = self.path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(&self.records)?;
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}
