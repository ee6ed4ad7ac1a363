use chrono::{DateTime, Utc};
use watch_core::{Job, JobResult, MonitoringTarget, NewTarget, ScrapeOptions, Snapshot, WatchError};

pub fn pending_job(url: &str) -> Job {
    Job::new(url, ScrapeOptions::default())
}

pub fn finished_job(url: &str, completed_at: DateTime<Utc>, ok: bool) -> Result<Job, WatchError> {
    let mut job = pending_job(url);
    job.start(completed_at)?;
    if ok {
        let result = JobResult {
            extracted: Snapshot::new(),
            analysis: serde_json::Value::Null,
            content_length: 0,
        };
        job.complete(result, completed_at)?;
    } else {
        job.fail("boom", completed_at)?;
    }
    Ok(job)
}

pub fn target(owner: &str) -> MonitoringTarget {
    MonitoringTarget::new(NewTarget::new(
        "https://example.com",
        "example",
        owner,
        vec!["h1".to_string()],
    ))
}
