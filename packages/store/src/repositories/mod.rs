//! Repository implementations for in-memory state.

mod job_repo;
mod target_repo;

pub use job_repo::{JobFilter, JobRepository};
pub use target_repo::TargetRepository;
