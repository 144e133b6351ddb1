//! On-disk snapshot of the quote store.
//!
//! The whole cache is one JSON document:
//!
//! ```json
//! {
//!   "quotes": { "SPY": { ... } },
//!   "historical": { "SPY": { ... } },
//!   "company": { "SPY": { ... } },
//!   "metadata": { "lastUpdate": "...", "requestsToday": 3, "lastRequestDate": "2024-06-03" }
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::errors::MarketDataError;
use crate::limiter::RequestMeter;
use crate::models::{CompanyOverview, HistoricalSeries, Quote};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    #[serde(default)]
    pub last_update: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub meter: RequestMeter,
}

/// Serialized form of the quote store plus request accounting.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub quotes: BTreeMap<String, Quote>,
    #[serde(default)]
    pub historical: BTreeMap<String, HistoricalSeries>,
    #[serde(default)]
    pub company: BTreeMap<String, CompanyOverview>,
    #[serde(default)]
    pub metadata: SnapshotMetadata,
}

/// Snapshot file at a fixed path.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the snapshot.
    ///
    /// A missing, empty, unreadable or corrupt file yields an empty snapshot;
    /// anything other than a missing file is logged as a warning.
    pub fn load(&self) -> Snapshot {
        if !self.path.exists() {
            debug!("No snapshot at {}, starting empty", self.path.display());
            return Snapshot::default();
        }

        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(
                    "Failed to read snapshot {}: {}; starting empty",
                    self.path.display(),
                    e
                );
                return Snapshot::default();
            }
        };

        if raw.iter().all(u8::is_ascii_whitespace) {
            return Snapshot::default();
        }

        match serde_json::from_slice::<Snapshot>(&raw) {
            Ok(snapshot) => {
                debug!(
                    "Loaded snapshot {} ({} quotes, {} series, {} overviews)",
                    self.path.display(),
                    snapshot.quotes.len(),
                    snapshot.historical.len(),
                    snapshot.company.len()
                );
                snapshot
            }
            Err(e) => {
                warn!(
                    "Corrupt snapshot {}: {}; starting empty",
                    self.path.display(),
                    e
                );
                Snapshot::default()
            }
        }
    }

    /// Write the full snapshot.
    ///
    /// Writes to a sibling temp file first and renames it over the target, so
    /// readers never see a half-written document.
    pub fn flush(&self, snapshot: &Snapshot) -> Result<(), MarketDataError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    MarketDataError::Persistence(format!(
                        "create {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let json = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| MarketDataError::Persistence(format!("serialize snapshot: {}", e)))?;

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json)
            .map_err(|e| MarketDataError::Persistence(format!("write {}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, &self.path).map_err(|e| {
            MarketDataError::Persistence(format!("rename to {}: {}", self.path.display(), e))
        })?;

        debug!("Snapshot flushed to {}", self.path.display());
        Ok(())
    }
}
