//! In-process storage for jobs and monitoring targets.
//!
//! State lives in memory only and is lost on restart. Repositories are cheap
//! to clone handles over shared maps, so a [`Store`] built once at startup can
//! be passed to every actor that needs it. Swapping to a durable backend means
//! reimplementing the repository methods; callers only see the async API.

mod error;
pub mod repositories;

pub use error::StoreError;
pub use repositories::{JobFilter, JobRepository, TargetRepository};

/// Handle to every repository.
#[derive(Debug, Clone, Default)]
pub struct Store {
    pub jobs: JobRepository,
    pub targets: TargetRepository,
}

impl Store {
    /// Create an empty in-memory store.
    pub fn in_memory() -> Self {
        tracing::info!("Using in-memory store; state is not persisted across restarts");
        Self::default()
    }
}
