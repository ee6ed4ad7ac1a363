//! Job domain types for one-shot scrape-and-analyze work.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::change::Snapshot;
use crate::error::WatchError;

/// Unique identifier for a job, using ULID for chronological sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Ulid);

impl JobId {
    /// Create a new unique job ID.
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parse a job ID from a string.
    pub fn parse(s: &str) -> Result<Self, ulid::DecodeError> {
        Ok(Self(Ulid::from_string(s)?))
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Current status of a job in its lifecycle.
///
/// Transitions only ever go `Pending -> Running -> Completed | Failed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job is waiting for a free worker slot.
    #[default]
    Pending,
    /// Job is being executed by a worker.
    Running,
    /// Job finished and holds a result.
    Completed,
    /// Job finished with an error message.
    Failed,
}

impl JobStatus {
    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether moving from `self` to `next` is a legal lifecycle step.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }

    /// Get a simple status string for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options passed through to the fetch/extract/analyze pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeOptions {
    /// Crawl depth requested by the caller.
    pub depth: u32,
    /// Upper bound on pages the analyzer may consider.
    pub max_pages: u32,
    /// Selectors to extract. Empty means the pipeline defaults.
    pub selectors: Vec<String>,
    pub include_links: bool,
    pub include_images: bool,
    /// Extra request headers for the fetch.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self {
            depth: 1,
            max_pages: 1,
            selectors: Vec::new(),
            include_links: false,
            include_images: false,
            headers: BTreeMap::new(),
        }
    }
}

impl ScrapeOptions {
    /// Selectors extracted when the caller did not ask for any.
    pub const DEFAULT_SELECTORS: [&'static str; 3] = ["title", "h1", "meta[name=description]"];

    /// Selectors to hand to the extractor.
    pub fn effective_selectors(&self) -> Vec<String> {
        if self.selectors.is_empty() {
            Self::DEFAULT_SELECTORS.iter().map(|s| s.to_string()).collect()
        } else {
            self.selectors.clone()
        }
    }

    pub fn with_selectors(mut self, selectors: Vec<String>) -> Self {
        self.selectors = selectors;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Result of a completed job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    /// Selector texts extracted from the page.
    pub extracted: Snapshot,
    /// Opaque payload produced by the analyzer.
    pub analysis: serde_json::Value,
    /// Size of the fetched document in bytes.
    pub content_length: usize,
}

/// A one-shot unit of scrape-and-analyze work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique identifier for this job.
    pub id: JobId,
    /// URL to fetch.
    pub url: String,
    pub options: ScrapeOptions,
    pub status: JobStatus,
    /// Advisory progress, 0-100.
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Job {
    /// Create a new pending job.
    pub fn new(url: impl Into<String>, options: ScrapeOptions) -> Self {
        Self {
            id: JobId::new(),
            url: url.into(),
            options,
            status: JobStatus::Pending,
            progress: 0,
            owner_id: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
        }
    }

    /// Set the owner for this job.
    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    fn transition(&mut self, next: JobStatus) -> Result<(), WatchError> {
        if !self.status.can_transition_to(next) {
            return Err(WatchError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Move a pending job to running.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), WatchError> {
        self.transition(JobStatus::Running)?;
        self.started_at = Some(now);
        self.progress = 0;
        Ok(())
    }

    /// Record a progress checkpoint. Ignored unless running; never decreases.
    pub fn advance_progress(&mut self, progress: u8) {
        if self.status == JobStatus::Running {
            self.progress = self.progress.max(progress.min(100));
        }
    }

    /// Move a running job to completed.
    pub fn complete(&mut self, result: JobResult, now: DateTime<Utc>) -> Result<(), WatchError> {
        self.transition(JobStatus::Completed)?;
        self.progress = 100;
        self.result = Some(result);
        self.completed_at = Some(now);
        Ok(())
    }

    /// Move a running job to failed.
    pub fn fail(&mut self, error: impl Into<String>, now: DateTime<Utc>) -> Result<(), WatchError> {
        self.transition(JobStatus::Failed)?;
        self.error = Some(error.into());
        self.completed_at = Some(now);
        Ok(())
    }

    /// Whether a sweep at `cutoff` may drop this job.
    pub fn is_expired(&self, cutoff: DateTime<Utc>) -> bool {
        self.status.is_terminal() && self.completed_at.is_some_and(|at| at < cutoff)
    }

    /// Wall-clock execution time, once finished.
    pub fn duration_ms(&self) -> Option<u64> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds().max(0) as u64),
            _ => None,
        }
    }
}

/// Counts of jobs by status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobStats {
    pub pending: u64,
    pub running: u64,
    pub completed: u64,
    pub failed: u64,
}

impl JobStats {
    /// Jobs not yet finished.
    pub fn active(&self) -> u64 {
        self.pending + self.running
    }

    /// Total processed jobs.
    pub fn processed(&self) -> u64 {
        self.completed + self.failed
    }
}
