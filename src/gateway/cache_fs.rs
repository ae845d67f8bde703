use crate::constants::CACHE_FILE_EXTENSION;
use crate::error::{IngestError, Result};
use crate::observability::metrics;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::debug;

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Flat-file cache of normalized datasets, one delimited file per source URL.
///
/// Entries are never swept. An expired entry stays on disk until the next
/// successful fetch of the same URL overwrites it.
#[derive(Clone, Debug)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Cache path for `url`: `<root>/<sha256(url) hex>.csv`.
    pub fn locate(&self, url: &str) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        let hex = hex::encode(hasher.finalize());
        self.root.join(format!("{}.{}", hex, CACHE_FILE_EXTENSION))
    }

    pub fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    /// Time since the entry was last written, `None` when there is no entry.
    pub fn age(&self, path: &Path) -> Option<Duration> {
        let modified = fs::metadata(path).and_then(|m| m.modified()).ok()?;
        Some(
            SystemTime::now()
                .duration_since(modified)
                .unwrap_or(Duration::ZERO),
        )
    }

    pub fn modified_at(&self, path: &Path) -> Option<DateTime<Utc>> {
        let modified = fs::metadata(path).and_then(|m| m.modified()).ok()?;
        Some(DateTime::<Utc>::from(modified))
    }

    /// An entry is expired once it is older than `max_age_days`. A missing
    /// entry counts as expired.
    pub fn is_expired(&self, path: &Path, max_age_days: u64) -> bool {
        match self.age(path) {
            Some(age) => age > Duration::from_secs(max_age_days.saturating_mul(SECS_PER_DAY)),
            None => true,
        }
    }

    /// Write `rows` as the entry for `url`, replacing any previous entry.
    pub fn save<R: Serialize>(&self, url: &str, rows: &[R], delimiter: u8) -> Result<PathBuf> {
        let path = self.locate(url);
        let write_err = |source: csv::Error| IngestError::CacheWrite {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(&self.root).map_err(|e| write_err(e.into()))?;
        let mut writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_path(&path)
            .map_err(write_err)?;
        for row in rows {
            writer.serialize(row).map_err(write_err)?;
        }
        writer.flush().map_err(|e| write_err(e.into()))?;

        metrics::cache::write_success();
        debug!(url, path = %path.display(), rows = rows.len(), "Saved cache entry");
        Ok(path)
    }

    /// Read a previously saved entry back into rows.
    pub fn load<R: DeserializeOwned>(&self, path: &Path, delimiter: u8) -> Result<Vec<R>> {
        let read_err = |source: csv::Error| IngestError::CacheRead {
            path: path.to_path_buf(),
            source,
        };
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .from_path(path)
            .map_err(read_err)?;
        let rows = reader
            .deserialize()
            .collect::<std::result::Result<Vec<R>, csv::Error>>()
            .map_err(read_err)?;
        debug!(path = %path.display(), rows = rows.len(), "Loaded cache entry");
        Ok(rows)
    }
}
