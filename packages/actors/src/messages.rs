//! Message types for actor communication.

use chrono::{DateTime, Utc};
use ractor::RpcReplyPort;
use store::JobFilter;
use watch_core::{
    Job, JobId, JobResult, JobStats, MonitoringResult, MonitoringTarget, NewTarget, TargetId,
    TargetPatch, WatchError,
};

/// Messages for the JobQueueActor.
#[derive(Debug)]
pub enum JobQueueMessage {
    /// Accept a new job.
    Submit {
        job: Box<Job>,
        reply: RpcReplyPort<Result<JobId, WatchError>>,
    },

    /// Get a job by ID.
    GetJob {
        job_id: JobId,
        reply: RpcReplyPort<Result<Job, WatchError>>,
    },

    /// List jobs.
    ListJobs {
        filter: JobFilter,
        reply: RpcReplyPort<Vec<Job>>,
    },

    /// Delete a finished job.
    DeleteJob {
        job_id: JobId,
        reply: RpcReplyPort<Result<(), WatchError>>,
    },

    /// Get job counts by status.
    GetStats { reply: RpcReplyPort<JobStats> },

    /// Progress checkpoint from a worker.
    Progress { job_id: JobId, progress: u8 },

    /// Report job completion.
    JobCompleted {
        job_id: JobId,
        worker_id: String,
        result: Box<JobResult>,
    },

    /// Report job failure.
    JobFailed {
        job_id: JobId,
        worker_id: String,
        error: String,
    },

    /// Drop finished jobs older than the retention window, measured from `now`.
    Sweep {
        now: DateTime<Utc>,
        reply: Option<RpcReplyPort<usize>>,
    },

    /// Shutdown the queue.
    Shutdown,
}

/// Messages for the WorkerActor.
#[derive(Debug)]
pub enum WorkerMessage {
    /// Run the scrape pipeline for one job, report, then stop.
    ProcessJob { job: Box<Job> },
}

/// Messages for the MonitorActor.
#[derive(Debug)]
pub enum MonitorMessage {
    /// Register a target. Active targets are checked once before the reply.
    CreateTarget {
        target: Box<NewTarget>,
        reply: RpcReplyPort<Result<TargetId, WatchError>>,
    },

    /// Patch a target.
    UpdateTarget {
        target_id: TargetId,
        patch: TargetPatch,
        reply: RpcReplyPort<Result<MonitoringTarget, WatchError>>,
    },

    /// Remove a target and cancel its timer.
    DeleteTarget {
        target_id: TargetId,
        reply: RpcReplyPort<Result<(), WatchError>>,
    },

    /// Get a target by ID.
    GetTarget {
        target_id: TargetId,
        reply: RpcReplyPort<Result<MonitoringTarget, WatchError>>,
    },

    /// List targets, optionally for one owner.
    ListTargets {
        owner_id: Option<String>,
        reply: RpcReplyPort<Vec<MonitoringTarget>>,
    },

    /// Run a check right away.
    CheckNow {
        target_id: TargetId,
        reply: RpcReplyPort<Result<MonitoringResult, WatchError>>,
    },

    /// Stop every target actor, then the monitor.
    Shutdown,
}

/// Messages for a TargetActor.
#[derive(Debug)]
pub enum TargetMessage {
    /// Timer tick. Ignored unless `generation` matches the live timer.
    Tick { generation: u64 },

    /// First check after creation. Replies once the check has run, whatever
    /// its outcome.
    InitialCheck { reply: RpcReplyPort<()> },

    /// On-demand check.
    CheckNow {
        reply: RpcReplyPort<Result<MonitoringResult, WatchError>>,
    },

    /// Apply a patch, rescheduling when needed.
    Update {
        patch: TargetPatch,
        reply: RpcReplyPort<Result<MonitoringTarget, WatchError>>,
    },
}
