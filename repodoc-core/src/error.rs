//! Error taxonomy shared by every stage of a generation run.
//!
//! Traversal errors abort the run wherever they occur. Generation errors are
//! isolated per file, except [`DocgenError::Auth`] which invalidates every
//! remaining request and is escalated by the pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while fetching, generating or publishing documentation.
#[derive(Debug, Error)]
pub enum DocgenError {
    /// The repository locator did not name an owner and a repository.
    #[error("invalid repository locator '{input}': {reason}")]
    InvalidLocator { input: String, reason: String },

    /// Network or connectivity failure, timeouts included.
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote path or repository does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Credentials were rejected by a remote service.
    #[error("authentication rejected (status {status}): {message}")]
    Auth { status: u16, message: String },

    /// The remote service throttled the request.
    #[error("rate limited (status {status}): {message}")]
    RateLimited { status: u16, message: String },

    /// The backend answered with a malformed or unexpected payload.
    #[error("bad response: {0}")]
    BadResponse(String),

    /// File content could not be decoded as UTF-8 text.
    #[error("could not decode '{path}' as UTF-8: {message}")]
    Decode { path: String, message: String },

    /// Local filesystem failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An export encoder failed.
    #[error("export failed: {0}")]
    Export(String),

    /// A git command failed while publishing.
    #[error("git {command} failed: {message}")]
    Git { command: String, message: String },

    /// The run was cancelled by its caller.
    #[error("run cancelled")]
    Cancelled,
}

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, DocgenError>;

/// Classification of a per-file failure, as recorded in a generation result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidLocator,
    Transport,
    NotFound,
    Auth,
    RateLimited,
    BadResponse,
    Decode,
    Io,
    Export,
    Git,
    Cancelled,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::InvalidLocator => "invalid locator",
            ErrorKind::Transport => "transport error",
            ErrorKind::NotFound => "not found",
            ErrorKind::Auth => "authentication error",
            ErrorKind::RateLimited => "rate limited",
            ErrorKind::BadResponse => "bad response",
            ErrorKind::Decode => "decode error",
            ErrorKind::Io => "io error",
            ErrorKind::Export => "export error",
            ErrorKind::Git => "git error",
            ErrorKind::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

impl DocgenError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DocgenError::InvalidLocator { .. } => ErrorKind::InvalidLocator,
            DocgenError::Transport(_) => ErrorKind::Transport,
            DocgenError::NotFound(_) => ErrorKind::NotFound,
            DocgenError::Auth { .. } => ErrorKind::Auth,
            DocgenError::RateLimited { .. } => ErrorKind::RateLimited,
            DocgenError::BadResponse(_) => ErrorKind::BadResponse,
            DocgenError::Decode { .. } => ErrorKind::Decode,
            DocgenError::Io(_) => ErrorKind::Io,
            DocgenError::Export(_) => ErrorKind::Export,
            DocgenError::Git { .. } => ErrorKind::Git,
            DocgenError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Whether this error, raised by a single documentation request, must abort the run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DocgenError::Auth { .. })
    }
}

impl From<reqwest::Error> for DocgenError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            DocgenError::BadResponse(err.to_string())
        } else {
            DocgenError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for DocgenError {
    fn from(err: serde_json::Error) -> Self {
        DocgenError::BadResponse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_auth_errors_are_fatal() {
        let auth = DocgenError::Auth {
            status: 401,
            message: "bad key".into(),
        };
        let limited = DocgenError::RateLimited {
            status: 429,
            message: "slow down".into(),
        };
        assert!(auth.is_fatal());
        assert!(!limited.is_fatal());
        assert!(!DocgenError::BadResponse("x".into()).is_fatal());
        assert!(!DocgenError::Transport("timeout".into()).is_fatal());
    }

    #[test]
    fn kind_matches_variant() {
        let err = DocgenError::Decode {
            path: "a.py".into(),
            message: "invalid utf-8".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Decode);
        assert!(err.to_string().contains("a.py"));
        assert_eq!(ErrorKind::RateLimited.to_string(), "rate limited");
    }
}
