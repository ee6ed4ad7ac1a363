//! Engine facade over the job queue and the monitoring scheduler.

use chrono::{DateTime, Utc};
use ractor::{Actor, ActorRef, Message, RpcReplyPort};
use store::{JobFilter, Store};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use watch_core::{
    Job, JobId, JobStats, MonitoringResult, MonitoringTarget, NewTarget, ScrapeOptions, TargetId,
    TargetPatch, WatchError, WatchEvent,
};

use crate::config::EngineConfig;
use crate::handler::Capabilities;
use crate::messages::{JobQueueMessage, MonitorMessage};
use crate::monitor_actor::{MonitorActor, MonitorArgs};
use crate::queue_actor::{JobQueueActor, JobQueueArgs};

/// Running engine. Cheap to share behind an `Arc`; every method takes `&self`.
pub struct Engine {
    jobs: ActorRef<JobQueueMessage>,
    monitor: ActorRef<MonitorMessage>,
    event_tx: broadcast::Sender<WatchEvent>,
    handles: Vec<JoinHandle<()>>,
}

impl Engine {
    /// Start an engine over a fresh in-memory store.
    pub async fn start(config: EngineConfig, capabilities: Capabilities) -> Result<Self, WatchError> {
        Self::start_with_store(config, capabilities, Store::in_memory()).await
    }

    /// Start an engine over an existing store. Targets already stored are
    /// scheduled again.
    pub async fn start_with_store(
        config: EngineConfig,
        capabilities: Capabilities,
        store: Store,
    ) -> Result<Self, WatchError> {
        let (event_tx, _) = broadcast::channel(config.event_capacity.max(1));

        let (jobs, jobs_handle) = Actor::spawn(
            None,
            JobQueueActor,
            JobQueueArgs {
                repo: store.jobs.clone(),
                config: config.clone(),
                capabilities: capabilities.clone(),
                event_tx: event_tx.clone(),
            },
        )
        .await
        .map_err(|e| WatchError::Internal(format!("failed to start job queue: {}", e)))?;

        let spawned = Actor::spawn(
            None,
            MonitorActor,
            MonitorArgs {
                repo: store.targets.clone(),
                config,
                capabilities,
                event_tx: event_tx.clone(),
            },
        )
        .await;
        let (monitor, monitor_handle) = match spawned {
            Ok(spawned) => spawned,
            Err(e) => {
                jobs.stop(None);
                return Err(WatchError::Internal(format!(
                    "failed to start monitoring scheduler: {}",
                    e
                )));
            }
        };

        tracing::info!("Engine started");
        Ok(Self {
            jobs,
            monitor,
            event_tx,
            handles: vec![jobs_handle, monitor_handle],
        })
    }

    /// Subscribe to engine events.
    pub fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        self.event_tx.subscribe()
    }

    // ---- jobs ----

    /// Submit a scrape job. Returns immediately with the job's ID.
    pub async fn submit_job(
        &self,
        url: impl Into<String>,
        options: ScrapeOptions,
        owner_id: Option<String>,
    ) -> Result<JobId, WatchError> {
        let mut job = Job::new(url, options);
        job.owner_id = owner_id;
        call(&self.jobs, |reply| JobQueueMessage::Submit {
            job: Box::new(job),
            reply,
        })
        .await?
    }

    pub async fn get_job(&self, job_id: JobId) -> Result<Job, WatchError> {
        call(&self.jobs, |reply| JobQueueMessage::GetJob { job_id, reply }).await?
    }

    /// List jobs, optionally for one owner, in ID order.
    pub async fn list_jobs(&self, owner_id: Option<&str>) -> Result<Vec<Job>, WatchError> {
        let filter = match owner_id {
            Some(owner) => JobFilter::owner(owner),
            None => JobFilter::default(),
        };
        self.query_jobs(filter).await
    }

    pub async fn query_jobs(&self, filter: JobFilter) -> Result<Vec<Job>, WatchError> {
        call(&self.jobs, |reply| JobQueueMessage::ListJobs { filter, reply }).await
    }

    /// Delete a finished job. Pending and running jobs are refused.
    pub async fn delete_job(&self, job_id: JobId) -> Result<(), WatchError> {
        call(&self.jobs, |reply| JobQueueMessage::DeleteJob { job_id, reply }).await?
    }

    pub async fn job_stats(&self) -> Result<JobStats, WatchError> {
        call(&self.jobs, |reply| JobQueueMessage::GetStats { reply }).await
    }

    /// Run the retention sweep as of `now`. Returns how many jobs were dropped.
    pub async fn sweep_jobs(&self, now: DateTime<Utc>) -> Result<usize, WatchError> {
        call(&self.jobs, |reply| JobQueueMessage::Sweep {
            now,
            reply: Some(reply),
        })
        .await
    }

    // ---- monitoring ----

    /// Register a target. Active targets get one check before this returns;
    /// a failure there is logged and does not fail creation.
    pub async fn create_target(&self, target: NewTarget) -> Result<TargetId, WatchError> {
        call(&self.monitor, |reply| MonitorMessage::CreateTarget {
            target: Box::new(target),
            reply,
        })
        .await?
    }

    pub async fn update_target(
        &self,
        target_id: TargetId,
        patch: TargetPatch,
    ) -> Result<MonitoringTarget, WatchError> {
        call(&self.monitor, |reply| MonitorMessage::UpdateTarget {
            target_id,
            patch,
            reply,
        })
        .await?
    }

    pub async fn delete_target(&self, target_id: TargetId) -> Result<(), WatchError> {
        call(&self.monitor, |reply| MonitorMessage::DeleteTarget { target_id, reply }).await?
    }

    pub async fn get_target(&self, target_id: TargetId) -> Result<MonitoringTarget, WatchError> {
        call(&self.monitor, |reply| MonitorMessage::GetTarget { target_id, reply }).await?
    }

    pub async fn list_targets(
        &self,
        owner_id: Option<&str>,
    ) -> Result<Vec<MonitoringTarget>, WatchError> {
        let owner_id = owner_id.map(str::to_string);
        call(&self.monitor, |reply| MonitorMessage::ListTargets { owner_id, reply }).await
    }

    /// Check a target right away, outside its schedule.
    pub async fn check_now(&self, target_id: TargetId) -> Result<MonitoringResult, WatchError> {
        call(&self.monitor, |reply| MonitorMessage::CheckNow { target_id, reply }).await?
    }

    /// Stop every timer and actor and wait for them to exit.
    pub async fn shutdown(self) {
        let _ = self.monitor.send_message(MonitorMessage::Shutdown);
        let _ = self.jobs.send_message(JobQueueMessage::Shutdown);
        for handle in self.handles {
            let _ = handle.await;
        }
        tracing::info!("Engine stopped");
    }
}

/// Send a request and wait for the reply.
async fn call<M, T>(
    actor: &ActorRef<M>,
    build: impl FnOnce(RpcReplyPort<T>) -> M,
) -> Result<T, WatchError>
where
    M: Message,
    T: Send + 'static,
{
    let (tx, rx) = ractor::concurrency::oneshot();
    actor
        .send_message(build(tx.into()))
        .map_err(|_| WatchError::Internal("engine is not running".into()))?;
    rx.await
        .map_err(|_| WatchError::Internal("request dropped before a reply was sent".into()))
}
