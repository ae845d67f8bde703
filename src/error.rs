use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Why the upstream site was considered unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unavailable {
    Status(u16),
    CircuitOpen,
}

impl fmt::Display for Unavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unavailable::Status(status) => write!(f, "HTTP status {}", status),
            Unavailable::CircuitOpen => write!(f, "circuit open"),
        }
    }
}

#[derive(Error, Debug)]
pub enum IngestError {
    /// Non-200 answer from the upstream site, or the failure circuit is open.
    #[error("Upstream unavailable for {url}: {reason}")]
    UpstreamUnavailable { url: String, reason: Unavailable },

    #[error("Transport error while fetching {url}: {message}")]
    Transport { url: String, message: String },

    #[error("Download link not found on landing page {url}")]
    DownloadLinkNotFound { url: String },

    #[error("Invalid category code '{code}'")]
    InvalidCategoryCode { code: String },

    #[error("Failed to write cache entry {path}: {source}")]
    CacheWrite {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to read cache entry {path}: {source}")]
    CacheRead {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Row {row} could not be constructed: {reason}")]
    RowConstruction { row: usize, reason: String },

    #[error("Source table could not be parsed: {source}")]
    TableParse {
        #[source]
        source: csv::Error,
    },

    #[error("Invalid page request: page {page}, page size {page_size}")]
    InvalidPage { page: usize, page_size: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IngestError {
    pub fn upstream_status(url: impl Into<String>, status: u16) -> Self {
        Self::UpstreamUnavailable {
            url: url.into(),
            reason: Unavailable::Status(status),
        }
    }

    pub fn circuit_open(url: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            url: url.into(),
            reason: Unavailable::CircuitOpen,
        }
    }

    pub fn row(row: usize, reason: impl Into<String>) -> Self {
        Self::RowConstruction {
            row,
            reason: reason.into(),
        }
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(
            self,
            IngestError::UpstreamUnavailable {
                reason: Unavailable::CircuitOpen,
                ..
            }
        )
    }

    /// Failures worth another attempt against the upstream site.
    pub fn is_retryable(&self) -> bool {
        match self {
            IngestError::Transport { .. } => true,
            IngestError::UpstreamUnavailable { reason, .. } => *reason != Unavailable::CircuitOpen,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
