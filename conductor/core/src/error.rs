//! Error Taxonomy
//!
//! Every failure the chat core can surface. All of them are recoverable:
//! the pipeline and the store turn them into visible, non-fatal messages
//! and the surface always returns to an interactive state.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the backend, the streaming pipeline and the store
#[derive(Debug, Error)]
pub enum ChatError {
    /// Server unreachable, or it answered with a non-success status
    #[error("Inference server unavailable: {0}")]
    NetworkUnavailable(String),

    /// A line of the response stream could not be parsed
    #[error("Malformed stream chunk ({reason}): {line}")]
    MalformedChunk {
        /// The offending line (lossy UTF-8)
        line: String,
        /// Why parsing failed
        reason: String,
    },

    /// The persisted conversation file is not a valid history document
    #[error("Corrupt history file at {path}: {reason}")]
    CorruptHistory {
        /// The history file that failed to parse
        path: PathBuf,
        /// Parser diagnostic
        reason: String,
    },

    /// The server reported an error inside an otherwise healthy stream
    #[error("Inference server error: {0}")]
    ServerError(String),

    /// A request is already streaming for this session
    #[error("A response is already in progress")]
    RequestInFlight,

    /// Filesystem failure (attachments, history writes)
    #[error("I/O error at {path}: {source}")]
    Io {
        /// The path being accessed
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },
}

impl ChatError {
    /// Wrap an IO error with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Short category label, used in logs and status lines
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NetworkUnavailable(_) => "network",
            Self::MalformedChunk { .. } => "malformed-chunk",
            Self::CorruptHistory { .. } => "corrupt-history",
            Self::ServerError(_) => "server",
            Self::RequestInFlight => "busy",
            Self::Io { .. } => "io",
        }
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(e: reqwest::Error) -> Self {
        Self::NetworkUnavailable(e.to_string())
    }
}
