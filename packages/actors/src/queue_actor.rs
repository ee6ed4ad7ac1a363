//! Job queue actor: FIFO admission with a fixed concurrency cap.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use chrono::Utc;
use ractor::{Actor, ActorId, ActorProcessingErr, ActorRef, SupervisionEvent};
use store::JobRepository;
use tokio::sync::broadcast;
use watch_core::{JobId, JobResult, WatchError, WatchEvent};

use crate::config::EngineConfig;
use crate::handler::Capabilities;
use crate::messages::{JobQueueMessage, WorkerMessage};
use crate::timer::TimerHandle;
use crate::worker_actor::{WorkerActor, WorkerArgs};

/// Job queue actor arguments.
pub struct JobQueueArgs {
    pub repo: JobRepository,
    pub config: EngineConfig,
    pub capabilities: Capabilities,
    pub event_tx: broadcast::Sender<WatchEvent>,
}

/// State for the job queue actor.
pub struct JobQueueState {
    repo: JobRepository,
    /// Pending jobs in submission order.
    pending: VecDeque<JobId>,
    /// Jobs currently held by a worker.
    running: HashSet<JobId>,
    /// Live workers and the job each one holds.
    workers: HashMap<ActorId, JobId>,
    max_concurrent: usize,
    retention: chrono::Duration,
    fetch_timeout: Duration,
    capabilities: Capabilities,
    event_tx: broadcast::Sender<WatchEvent>,
    sweep_timer: Option<TimerHandle>,
    worker_counter: u64,
}

impl JobQueueState {
    fn new(args: JobQueueArgs) -> Self {
        Self {
            repo: args.repo,
            pending: VecDeque::new(),
            running: HashSet::new(),
            workers: HashMap::new(),
            max_concurrent: args.config.max_concurrent_jobs.max(1),
            retention: args.config.retention_window(),
            fetch_timeout: args.config.fetch_timeout,
            capabilities: args.capabilities,
            event_tx: args.event_tx,
            sweep_timer: None,
            worker_counter: 0,
        }
    }

    /// Generate a unique worker ID.
    fn next_worker_id(&mut self) -> String {
        self.worker_counter += 1;
        format!("worker-{}", self.worker_counter)
    }

    fn broadcast(&self, event: WatchEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Start pending jobs until the cap is reached or nothing is pending.
    async fn schedule(&mut self, myself: &ActorRef<JobQueueMessage>) {
        while self.running.len() < self.max_concurrent {
            let Some(job_id) = self.pending.pop_front() else {
                break;
            };

            let mut job = match self.repo.get(job_id).await {
                Ok(job) => job,
                Err(e) => {
                    tracing::warn!("Pending job {} vanished from the store: {}", job_id, e);
                    continue;
                }
            };

            if let Err(e) = job.start(Utc::now()) {
                tracing::warn!("Skipping job {}: {}", job_id, e);
                continue;
            }
            if let Err(e) = self.repo.update(&job).await {
                tracing::error!("Failed to mark job {} running: {}", job_id, e);
                continue;
            }
            self.running.insert(job_id);

            let worker_id = self.next_worker_id();
            let args = WorkerArgs {
                worker_id: worker_id.clone(),
                queue: myself.clone(),
                capabilities: self.capabilities.clone(),
                fetch_timeout: self.fetch_timeout,
            };

            let worker = match Actor::spawn_linked(None, WorkerActor, args, myself.get_cell()).await
            {
                Ok((worker, _handle)) => worker,
                Err(e) => {
                    self.fail_job(job_id, format!("failed to start worker: {}", e))
                        .await;
                    continue;
                }
            };

            self.workers.insert(worker.get_id(), job_id);
            self.broadcast(WatchEvent::JobStarted {
                job_id,
                worker_id: worker_id.clone(),
                timestamp: Utc::now(),
            });
            tracing::info!("Job {} assigned to {}", job_id, worker_id);

            if worker
                .send_message(WorkerMessage::ProcessJob { job: Box::new(job) })
                .is_err()
            {
                self.workers.remove(&worker.get_id());
                self.fail_job(job_id, "worker stopped before accepting the job".to_string())
                    .await;
            }
        }
    }

    async fn complete_job(&mut self, job_id: JobId, result: JobResult) {
        if !self.running.remove(&job_id) {
            tracing::warn!("Ignoring completion for job {} which is not running", job_id);
            return;
        }

        let mut job = match self.repo.get(job_id).await {
            Ok(job) => job,
            Err(e) => {
                tracing::error!("Completed job {} missing from the store: {}", job_id, e);
                return;
            }
        };

        if let Err(e) = job.complete(result, Utc::now()) {
            tracing::error!("Cannot complete job {}: {}", job_id, e);
            return;
        }
        if let Err(e) = self.repo.update(&job).await {
            tracing::error!("Failed to store completed job {}: {}", job_id, e);
        }

        let duration_ms = job.duration_ms().unwrap_or(0);
        tracing::info!("Job {} completed in {}ms", job_id, duration_ms);
        self.broadcast(WatchEvent::JobCompleted {
            job_id,
            duration_ms,
            timestamp: Utc::now(),
        });
    }

    async fn fail_job(&mut self, job_id: JobId, error: String) {
        if !self.running.remove(&job_id) {
            tracing::warn!("Ignoring failure for job {} which is not running", job_id);
            return;
        }

        let mut job = match self.repo.get(job_id).await {
            Ok(job) => job,
            Err(e) => {
                tracing::error!("Failed job {} missing from the store: {}", job_id, e);
                return;
            }
        };

        if let Err(e) = job.fail(error.clone(), Utc::now()) {
            tracing::error!("Cannot fail job {}: {}", job_id, e);
            return;
        }
        if let Err(e) = self.repo.update(&job).await {
            tracing::error!("Failed to store failed job {}: {}", job_id, e);
        }

        tracing::warn!("Job {} failed: {}", job_id, error);
        self.broadcast(WatchEvent::JobFailed {
            job_id,
            error,
            timestamp: Utc::now(),
        });
    }

    async fn delete_job(&mut self, job_id: JobId) -> Result<(), WatchError> {
        let job = self
            .repo
            .get(job_id)
            .await
            .map_err(|_| WatchError::job_not_found(job_id))?;

        if !job.status.is_terminal() {
            return Err(WatchError::Conflict(format!(
                "job {} is {}; only finished jobs can be deleted",
                job_id, job.status
            )));
        }

        self.repo.delete(job_id).await?;
        self.broadcast(WatchEvent::JobDeleted {
            job_id,
            timestamp: Utc::now(),
        });
        Ok(())
    }
}

/// Job queue actor.
///
/// Admission is re-evaluated on submission and on every completion or
/// failure, so a freed slot is refilled without polling.
pub struct JobQueueActor;

impl Actor for JobQueueActor {
    type Msg = JobQueueMessage;
    type State = JobQueueState;
    type Arguments = JobQueueArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!(
            "Starting job queue (max {} concurrent jobs)",
            args.config.max_concurrent_jobs
        );

        let sweep_interval = args.config.sweep_interval;
        let mut state = JobQueueState::new(args);
        state.sweep_timer = Some(TimerHandle::start(myself, sweep_interval, || {
            JobQueueMessage::Sweep {
                now: Utc::now(),
                reply: None,
            }
        }));

        Ok(state)
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        if let Some(timer) = state.sweep_timer.take() {
            timer.stop();
        }
        tracing::info!(
            "Job queue stopped with {} pending and {} running jobs",
            state.pending.len(),
            state.running.len()
        );
        Ok(())
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            JobQueueMessage::Submit { job, reply } => {
                let job = *job;
                let job_id = job.id;

                if let Err(e) = state.repo.create(&job).await {
                    tracing::error!("Failed to store job {}: {}", job_id, e);
                    let _ = reply.send(Err(e.into()));
                    return Ok(());
                }
                state.pending.push_back(job_id);
                tracing::info!("Job {} submitted for {}", job_id, job.url);
                state.broadcast(WatchEvent::JobSubmitted {
                    job,
                    timestamp: Utc::now(),
                });

                let _ = reply.send(Ok(job_id));
                state.schedule(&myself).await;
            }

            JobQueueMessage::GetJob { job_id, reply } => {
                let result = state
                    .repo
                    .get(job_id)
                    .await
                    .map_err(|_| WatchError::job_not_found(job_id));
                let _ = reply.send(result);
            }

            JobQueueMessage::ListJobs { filter, reply } => {
                let _ = reply.send(state.repo.list(filter).await);
            }

            JobQueueMessage::DeleteJob { job_id, reply } => {
                let _ = reply.send(state.delete_job(job_id).await);
            }

            JobQueueMessage::GetStats { reply } => {
                let _ = reply.send(state.repo.count_by_status().await);
            }

            JobQueueMessage::Progress { job_id, progress } => {
                if !state.running.contains(&job_id) {
                    return Ok(());
                }
                if let Ok(mut job) = state.repo.get(job_id).await {
                    job.advance_progress(progress);
                    if let Err(e) = state.repo.update(&job).await {
                        tracing::warn!("Failed to store progress for job {}: {}", job_id, e);
                    }
                    state.broadcast(WatchEvent::JobProgress {
                        job_id,
                        progress: job.progress,
                        timestamp: Utc::now(),
                    });
                }
            }

            JobQueueMessage::JobCompleted {
                job_id,
                worker_id,
                result,
            } => {
                tracing::debug!("Worker {} finished job {}", worker_id, job_id);
                state.complete_job(job_id, *result).await;
                state.schedule(&myself).await;
            }

            JobQueueMessage::JobFailed {
                job_id,
                worker_id,
                error,
            } => {
                tracing::debug!("Worker {} gave up on job {}", worker_id, job_id);
                state.fail_job(job_id, error).await;
                state.schedule(&myself).await;
            }

            JobQueueMessage::Sweep { now, reply } => {
                let cutoff = now - state.retention;
                let removed = state.repo.remove_expired(cutoff).await;
                if !removed.is_empty() {
                    tracing::info!("Swept {} expired jobs", removed.len());
                    state.broadcast(WatchEvent::JobsSwept {
                        removed: removed.len(),
                        timestamp: Utc::now(),
                    });
                }
                if let Some(reply) = reply {
                    let _ = reply.send(removed.len());
                }
            }

            JobQueueMessage::Shutdown => {
                tracing::info!("Shutting down job queue");
                if let Some(timer) = state.sweep_timer.take() {
                    timer.stop();
                }
                myself.stop(None);
            }
        }

        Ok(())
    }

    async fn handle_supervisor_evt(
        &self,
        myself: ActorRef<Self::Msg>,
        event: SupervisionEvent,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match event {
            SupervisionEvent::ActorTerminated(cell, _, _) => {
                state.workers.remove(&cell.get_id());
            }
            SupervisionEvent::ActorFailed(cell, err) => {
                if let Some(job_id) = state.workers.remove(&cell.get_id()) {
                    tracing::error!("Worker for job {} crashed: {}", job_id, err);
                    state
                        .fail_job(job_id, format!("internal error: worker crashed: {}", err))
                        .await;
                    state.schedule(&myself).await;
                }
            }
            _ => {}
        }
        Ok(())
    }
}
