//! Registry error taxonomy.

use serde::{Deserialize, Serialize};

/// Errors surfaced by a registry collaborator.
///
/// Only `Unreachable` on the initial repository listing is fatal to a run;
/// every other occurrence is repository- or artifact-scoped and is recorded
/// in the run report instead of aborting the sweep.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
    /// The registry endpoint could not be reached at all.
    #[error("registry unreachable: {0}")]
    Unreachable(String),

    /// The named repository does not exist.
    #[error("repository not found: {0}")]
    RepoNotFound(String),

    /// A transient failure (timeout, rate limit, 5xx) on a single call.
    #[error("transient registry error: {0}")]
    Transient(String),

    /// The scan service failed or returned malformed results.
    #[error("scan results unavailable for '{repo}': {message}")]
    Scan { repo: String, message: String },
}

impl RegistryError {
    /// Stable machine-readable code, used in run report error records.
    pub fn code(&self) -> ErrorCode {
        match self {
            RegistryError::Unreachable(_) => ErrorCode::Unreachable,
            RegistryError::RepoNotFound(_) => ErrorCode::RepoNotFound,
            RegistryError::Transient(_) => ErrorCode::Transient,
            RegistryError::Scan { .. } => ErrorCode::ScanUnavailable,
        }
    }
}

/// Stable error codes for automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Registry endpoint unreachable
    Unreachable,
    /// Repository does not exist
    RepoNotFound,
    /// Transient per-call failure
    Transient,
    /// Scan service failure
    ScanUnavailable,
}

impl ErrorCode {
    /// The serialized SCREAMING_SNAKE_CASE form.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Unreachable => "UNREACHABLE",
            ErrorCode::RepoNotFound => "REPO_NOT_FOUND",
            ErrorCode::Transient => "TRANSIENT",
            ErrorCode::ScanUnavailable => "SCAN_UNAVAILABLE",
        }
    }
}
