//! Error taxonomy shared by the job queue and the monitoring scheduler.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::job::JobStatus;

/// Why fetching a URL failed.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },
    #[error("request blocked: {0}")]
    Blocked(String),
    #[error("unexpected HTTP status {0}")]
    Status(u16),
}

impl FetchError {
    /// Message suitable for showing to an end user.
    pub fn user_message(&self) -> &'static str {
        match self {
            FetchError::Network(_) => "The site could not be reached. Check the URL and try again.",
            FetchError::Timeout { .. } => "The site took too long to respond.",
            FetchError::Blocked(_) => "The site refused the request.",
            FetchError::Status(_) => "The site returned an error response.",
        }
    }
}

/// Errors surfaced by engine operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WatchError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("upstream fetch failed: {0}")]
    UpstreamFetch(#[from] FetchError),

    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("invalid job transition {from} -> {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("internal error: {0}")]
    Internal(String),
}

impl WatchError {
    pub fn job_not_found(id: impl std::fmt::Display) -> Self {
        WatchError::NotFound {
            kind: "job",
            id: id.to_string(),
        }
    }

    pub fn target_not_found(id: impl std::fmt::Display) -> Self {
        WatchError::NotFound {
            kind: "target",
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, WatchError::NotFound { .. })
    }
}
