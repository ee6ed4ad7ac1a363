//! Event types for observing the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Job, JobId, TargetId};

/// Events emitted by the job queue and the monitoring scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WatchEvent {
    // Job events
    /// A new job was submitted.
    JobSubmitted { job: Job, timestamp: DateTime<Utc> },
    /// A job was handed to a worker.
    JobStarted {
        job_id: JobId,
        worker_id: String,
        timestamp: DateTime<Utc>,
    },
    /// A worker reported a progress checkpoint.
    JobProgress {
        job_id: JobId,
        progress: u8,
        timestamp: DateTime<Utc>,
    },
    /// A job completed successfully.
    JobCompleted {
        job_id: JobId,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    /// A job failed.
    JobFailed {
        job_id: JobId,
        error: String,
        timestamp: DateTime<Utc>,
    },
    /// A terminal job was deleted by a caller.
    JobDeleted {
        job_id: JobId,
        timestamp: DateTime<Utc>,
    },
    /// The retention sweep dropped expired jobs.
    JobsSwept {
        removed: usize,
        timestamp: DateTime<Utc>,
    },

    // Target events
    /// A monitoring target was registered.
    TargetCreated {
        target_id: TargetId,
        timestamp: DateTime<Utc>,
    },
    /// A monitoring target was patched.
    TargetUpdated {
        target_id: TargetId,
        is_active: bool,
        timestamp: DateTime<Utc>,
    },
    /// A monitoring target was removed.
    TargetDeleted {
        target_id: TargetId,
        timestamp: DateTime<Utc>,
    },
    /// A check finished.
    TargetChecked {
        target_id: TargetId,
        changes: usize,
        timestamp: DateTime<Utc>,
    },
    /// A check failed; the target keeps its previous state.
    TargetCheckFailed {
        target_id: TargetId,
        error: String,
        timestamp: DateTime<Utc>,
    },
    /// A crashed target actor was brought back from stored state.
    TargetRestarted {
        target_id: TargetId,
        timestamp: DateTime<Utc>,
    },
}

impl WatchEvent {
    /// Get the timestamp of the event.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            WatchEvent::JobSubmitted { timestamp, .. } => *timestamp,
            WatchEvent::JobStarted { timestamp, .. } => *timestamp,
            WatchEvent::JobProgress { timestamp, .. } => *timestamp,
            WatchEvent::JobCompleted { timestamp, .. } => *timestamp,
            WatchEvent::JobFailed { timestamp, .. } => *timestamp,
            WatchEvent::JobDeleted { timestamp, .. } => *timestamp,
            WatchEvent::JobsSwept { timestamp, .. } => *timestamp,
            WatchEvent::TargetCreated { timestamp, .. } => *timestamp,
            WatchEvent::TargetUpdated { timestamp, .. } => *timestamp,
            WatchEvent::TargetDeleted { timestamp, .. } => *timestamp,
            WatchEvent::TargetChecked { timestamp, .. } => *timestamp,
            WatchEvent::TargetCheckFailed { timestamp, .. } => *timestamp,
            WatchEvent::TargetRestarted { timestamp, .. } => *timestamp,
        }
    }

    /// Get the job ID associated with this event, if any.
    pub fn job_id(&self) -> Option<JobId> {
        match self {
            WatchEvent::JobSubmitted { job, .. } => Some(job.id),
            WatchEvent::JobStarted { job_id, .. } => Some(*job_id),
            WatchEvent::JobProgress { job_id, .. } => Some(*job_id),
            WatchEvent::JobCompleted { job_id, .. } => Some(*job_id),
            WatchEvent::JobFailed { job_id, .. } => Some(*job_id),
            WatchEvent::JobDeleted { job_id, .. } => Some(*job_id),
            _ => None,
        }
    }

    /// Get the target ID associated with this event, if any.
    pub fn target_id(&self) -> Option<TargetId> {
        match self {
            WatchEvent::TargetCreated { target_id, .. } => Some(*target_id),
            WatchEvent::TargetUpdated { target_id, .. } => Some(*target_id),
            WatchEvent::TargetDeleted { target_id, .. } => Some(*target_id),
            WatchEvent::TargetChecked { target_id, .. } => Some(*target_id),
            WatchEvent::TargetCheckFailed { target_id, .. } => Some(*target_id),
            WatchEvent::TargetRestarted { target_id, .. } => Some(*target_id),
            _ => None,
        }
    }

    /// Get a short description of this event for logging.
    pub fn description(&self) -> String {
        match self {
            WatchEvent::JobSubmitted { job, .. } => format!("Job {} submitted for {}", job.id, job.url),
            WatchEvent::JobStarted {
                job_id, worker_id, ..
            } => format!("Job {} started by {}", job_id, worker_id),
            WatchEvent::JobProgress {
                job_id, progress, ..
            } => format!("Job {} at {}%", job_id, progress),
            WatchEvent::JobCompleted {
                job_id,
                duration_ms,
                ..
            } => format!("Job {} completed in {}ms", job_id, duration_ms),
            WatchEvent::JobFailed { job_id, error, .. } => {
                format!("Job {} failed: {}", job_id, error)
            }
            WatchEvent::JobDeleted { job_id, .. } => format!("Job {} deleted", job_id),
            WatchEvent::JobsSwept { removed, .. } => format!("Swept {} expired jobs", removed),
            WatchEvent::TargetCreated { target_id, .. } => format!("Target {} created", target_id),
            WatchEvent::TargetUpdated {
                target_id,
                is_active,
                ..
            } => {
                let state = if *is_active { "active" } else { "inactive" };
                format!("Target {} updated ({})", target_id, state)
            }
            WatchEvent::TargetDeleted { target_id, .. } => format!("Target {} deleted", target_id),
            WatchEvent::TargetChecked {
                target_id, changes, ..
            } => format!("Target {} checked: {} changes", target_id, changes),
            WatchEvent::TargetCheckFailed {
                target_id, error, ..
            } => format!("Target {} check failed: {}", target_id, error),
            WatchEvent::TargetRestarted { target_id, .. } => {
                format!("Target {} restarted", target_id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ScrapeOptions;

    #[test]
    fn events_expose_their_subject() {
        let now = Utc::now();
        let job = Job::new("https://example.com", ScrapeOptions::default());
        let job_id = job.id;
        let target_id = TargetId::new();

        let submitted = WatchEvent::JobSubmitted {
            job,
            timestamp: now,
        };
        assert_eq!(submitted.job_id(), Some(job_id));
        assert_eq!(submitted.target_id(), None);
        assert_eq!(submitted.timestamp(), now);

        let failed = WatchEvent::TargetCheckFailed {
            target_id,
            error: "upstream timed out".into(),
            timestamp: now,
        };
        assert_eq!(failed.target_id(), Some(target_id));
        assert_eq!(failed.job_id(), None);
        assert!(failed.description().contains(&target_id.to_string()));

        let swept = WatchEvent::JobsSwept {
            removed: 2,
            timestamp: now,
        };
        assert_eq!(swept.job_id(), None);
        assert_eq!(swept.target_id(), None);
    }
}
