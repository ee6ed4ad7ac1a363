//! Worker actor for executing a single job.

use std::time::Duration;

use ractor::{Actor, ActorProcessingErr, ActorRef};
use watch_core::{Job, JobId, JobResult, WatchError};

use crate::handler::Capabilities;
use crate::messages::{JobQueueMessage, WorkerMessage};

/// Progress checkpoints reported while a job runs.
pub const PROGRESS_STARTED: u8 = 10;
pub const PROGRESS_FETCHING: u8 = 30;
pub const PROGRESS_EXTRACTED: u8 = 60;
pub const PROGRESS_ANALYZED: u8 = 90;

/// Worker actor arguments.
pub struct WorkerArgs {
    pub worker_id: String,
    pub queue: ActorRef<JobQueueMessage>,
    pub capabilities: Capabilities,
    pub fetch_timeout: Duration,
}

/// State for the worker actor.
pub struct WorkerActorState {
    worker_id: String,
    queue: ActorRef<JobQueueMessage>,
    capabilities: Capabilities,
    fetch_timeout: Duration,
}

impl WorkerActorState {
    fn report_progress(&self, job_id: JobId, progress: u8) {
        let _ = self
            .queue
            .send_message(JobQueueMessage::Progress { job_id, progress });
    }

    /// Fetch, extract, analyze.
    async fn run(&self, job: &Job) -> Result<JobResult, WatchError> {
        self.report_progress(job.id, PROGRESS_STARTED);

        self.report_progress(job.id, PROGRESS_FETCHING);
        let html = self
            .capabilities
            .fetch(&job.url, &job.options.headers, self.fetch_timeout)
            .await?;

        let extracted = self
            .capabilities
            .extractor
            .extract(&html, &job.options.effective_selectors())?;
        self.report_progress(job.id, PROGRESS_EXTRACTED);

        let analysis = self
            .capabilities
            .analyzer
            .analyze(&html, &job.url)
            .await
            .map_err(|e| WatchError::Internal(format!("analysis failed: {}", e)))?;
        self.report_progress(job.id, PROGRESS_ANALYZED);

        Ok(JobResult {
            extracted,
            analysis,
            content_length: html.len(),
        })
    }
}

/// Worker actor that executes one job and then stops.
///
/// Spawned linked to the queue actor, so a panic inside a capability shows
/// up as a supervision event there.
pub struct WorkerActor;

impl Actor for WorkerActor {
    type Msg = WorkerMessage;
    type State = WorkerActorState;
    type Arguments = WorkerArgs;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::debug!("Starting worker: {}", args.worker_id);
        Ok(WorkerActorState {
            worker_id: args.worker_id,
            queue: args.queue,
            capabilities: args.capabilities,
            fetch_timeout: args.fetch_timeout,
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            WorkerMessage::ProcessJob { job } => {
                let job_id = job.id;
                tracing::info!("Worker {} processing job {} ({})", state.worker_id, job_id, job.url);

                match state.run(&job).await {
                    Ok(result) => {
                        state.queue.send_message(JobQueueMessage::JobCompleted {
                            job_id,
                            worker_id: state.worker_id.clone(),
                            result: Box::new(result),
                        })?;
                    }
                    Err(error) => {
                        state.queue.send_message(JobQueueMessage::JobFailed {
                            job_id,
                            worker_id: state.worker_id.clone(),
                            error: error.to_string(),
                        })?;
                    }
                }

                myself.stop(None);
            }
        }

        Ok(())
    }
}
