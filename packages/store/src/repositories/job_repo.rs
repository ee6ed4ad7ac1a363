//! Job repository for CRUD operations.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use watch_core::{Job, JobId, JobStats, JobStatus};

use crate::StoreError;

/// Repository for job records, ordered by ULID.
#[derive(Debug, Clone, Default)]
pub struct JobRepository {
    jobs: Arc<RwLock<BTreeMap<JobId, Job>>>,
}

/// Filter options for listing jobs.
#[derive(Debug, Default, Clone)]
pub struct JobFilter {
    pub owner_id: Option<String>,
    pub status: Option<JobStatus>,
    pub limit: Option<usize>,
}

impl JobFilter {
    pub fn owner(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: Some(owner_id.into()),
            ..Default::default()
        }
    }

    fn matches(&self, job: &Job) -> bool {
        self.owner_id
            .as_deref()
            .is_none_or(|owner| job.owner_id.as_deref() == Some(owner))
            && self.status.is_none_or(|status| job.status == status)
    }
}

impl JobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new job.
    pub async fn create(&self, job: &Job) -> Result<Job, StoreError> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(StoreError::Duplicate(job.id.to_string()));
        }
        jobs.insert(job.id, job.clone());
        Ok(job.clone())
    }

    /// Get a job by ID.
    pub async fn get(&self, id: JobId) -> Result<Job, StoreError> {
        self.jobs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("Job not found: {}", id)))
    }

    /// List jobs with optional filtering.
    pub async fn list(&self, filter: JobFilter) -> Vec<Job> {
        let jobs = self.jobs.read().await;
        jobs.values()
            .filter(|job| filter.matches(job))
            .take(filter.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    /// Replace a stored job.
    pub async fn update(&self, job: &Job) -> Result<Job, StoreError> {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(&job.id) {
            Some(slot) => {
                *slot = job.clone();
                Ok(job.clone())
            }
            None => Err(StoreError::NotFound(format!("Job not found: {}", job.id))),
        }
    }

    /// Delete a job.
    pub async fn delete(&self, id: JobId) -> Result<Job, StoreError> {
        self.jobs
            .write()
            .await
            .remove(&id)
            .ok_or_else(|| StoreError::NotFound(format!("Job not found: {}", id)))
    }

    /// Remove terminal jobs that finished before `cutoff`.
    pub async fn remove_expired(&self, cutoff: DateTime<Utc>) -> Vec<JobId> {
        let mut jobs = self.jobs.write().await;
        let expired: Vec<JobId> = jobs
            .values()
            .filter(|job| job.is_expired(cutoff))
            .map(|job| job.id)
            .collect();
        for id in &expired {
            jobs.remove(id);
        }
        expired
    }

    /// Count jobs by status.
    pub async fn count_by_status(&self) -> JobStats {
        let jobs = self.jobs.read().await;
        let mut stats = JobStats::default();
        for job in jobs.values() {
            match job.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Running => stats.running += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
            }
        }
        stats
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}
