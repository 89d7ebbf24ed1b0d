//! Error types shared across the SDK.

use std::sync::Arc;

/// A captured error that can be re-raised on every observation.
///
/// Transfers and operations record failures instead of throwing them
/// out of their background threads; the captured value stays attached
/// to the resource and is handed out as a cheap clone.
pub type SharedError = Arc<DiskError>;

/// Errors produced by the Yandex Disk SDK.
#[derive(Debug, thiserror::Error)]
pub enum DiskError {
    /// Network or stream failure while talking to the backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The request went through, but the backend reported a structured
    /// error payload.
    #[error("{description} ({code})")]
    Api {
        /// Machine-readable error code from the payload.
        code: String,
        /// Human-readable description from the payload.
        description: String,
    },

    /// The server encountered an unexpected error (HTTP 5xx). The API
    /// recommends re-issuing the request.
    #[error("unexpected server error (HTTP {0})")]
    Gateway(u16),

    /// Ran into a limit during the operation (file too large, out of
    /// space).
    #[error("{0}")]
    Limit(String),

    /// The remote filesystem prohibits the requested operation, or an
    /// endpoint returned data that cannot be interpreted.
    #[error("{0}")]
    Operation(String),

    /// A disk path could not be parsed or joined.
    #[error("invalid disk path: {0}")]
    InvalidPath(String),

    /// Progress was requested from a resource with no notion of total
    /// work.
    #[error("no progress information available")]
    NoProgress,
}

impl DiskError {
    /// Wraps an arbitrary transport-layer failure.
    pub fn transport<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        DiskError::Io(std::io::Error::other(err))
    }

    /// Builds an [`DiskError::Api`] from an error code and optional
    /// description.
    pub fn api(code: impl Into<String>, description: Option<String>) -> Self {
        DiskError::Api {
            code: code.into(),
            description: description.unwrap_or_else(|| "unknown API error".into()),
        }
    }
}
