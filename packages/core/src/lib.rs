//! Core domain types for the site watch engine.
//!
//! This crate contains shared types used across all packages:
//! - Job and JobStatus for one-shot scrape work
//! - MonitoringTarget and friends for recurring watches
//! - The snapshot diff used for change detection
//! - Events and the error taxonomy

mod change;
mod error;
mod events;
mod job;
mod target;
pub mod validation;

pub use change::{Change, ChangeType, MonitoringResult, Snapshot, content_similarity, diff};
pub use error::{FetchError, WatchError};
pub use events::WatchEvent;
pub use job::{Job, JobId, JobResult, JobStats, JobStatus, ScrapeOptions};
pub use target::{
    ChangeRecord, MAX_CHANGE_HISTORY, MAX_CHECK_INTERVAL_MINUTES, MIN_CHECK_INTERVAL_MINUTES,
    MonitoringTarget, NewTarget, NotificationSettings, TargetId, TargetPatch,
};
