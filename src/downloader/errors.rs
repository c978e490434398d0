// Error types for the download pipeline

use std::fmt;

use thiserror::Error;

use super::models::{OutputKind, QualityPreference};

/// Why a reference could not be resolved into a catalog or playlist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionFailure {
    /// Platform did not answer (timeout, DNS, refused connection, client missing)
    Unreachable,
    /// Video exists but cannot be fetched (private, removed, geo or age restricted)
    Unavailable,
    /// Platform answered but offered nothing we can download
    NoStreams,
    /// Platform answered with something we could not parse
    Malformed,
}

impl fmt::Display for ResolutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreachable => write!(f, "platform unreachable"),
            Self::Unavailable => write!(f, "video unavailable"),
            Self::NoStreams => write!(f, "no usable streams"),
            Self::Malformed => write!(f, "unexpected platform response"),
        }
    }
}

#[derive(Debug, Error)]
pub enum DownloadError {
    /// Platform unreachable, video unavailable, or no streams
    #[error("Could not resolve {url}: {cause} ({detail})")]
    Resolution {
        url: String,
        cause: ResolutionFailure,
        detail: String,
    },

    /// The requested quality is not offered (audio has no fallback)
    #[error("No {kind} stream matching {preference}")]
    NotFound {
        kind: OutputKind,
        preference: QualityPreference,
    },

    /// Network or disk failure while downloading
    #[error("Download failed: {0}")]
    Fetch(String),

    /// Transcoder missing, failed, or produced no output
    #[error("Transcode failed: {0}")]
    Transcode(String),

    /// Rejected at job construction
    #[error("{0}")]
    InvalidJob(String),

    /// Another job is still running
    #[error("A download is already in progress")]
    Busy,
}

impl DownloadError {
    pub fn resolution(
        url: impl Into<String>,
        cause: ResolutionFailure,
        detail: impl Into<String>,
    ) -> Self {
        Self::Resolution {
            url: url.into(),
            cause,
            detail: detail.into(),
        }
    }

    /// Short stable name, used in error events
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Resolution { .. } => "resolution",
            Self::NotFound { .. } => "not_found",
            Self::Fetch(_) => "fetch",
            Self::Transcode(_) => "transcode",
            Self::InvalidJob(_) => "invalid_job",
            Self::Busy => "busy",
        }
    }
}

impl From<reqwest::Error> for DownloadError {
    fn from(e: reqwest::Error) -> Self {
        Self::Fetch(e.to_string())
    }
}

impl From<std::io::Error> for DownloadError {
    fn from(e: std::io::Error) -> Self {
        Self::Fetch(e.to_string())
    }
}
