//! Engine configuration.

use std::time::Duration;

use thiserror::Error;

/// Tunables for the job queue and the monitoring scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Jobs allowed in `running` at once.
    pub max_concurrent_jobs: usize,
    /// How long finished jobs are kept before the sweep drops them.
    pub job_retention: Duration,
    /// Period of the retention sweep.
    pub sweep_interval: Duration,
    /// Deadline for a single fetch.
    pub fetch_timeout: Duration,
    /// Deadline for a single webhook delivery.
    pub webhook_timeout: Duration,
    pub user_agent: String,
    /// Buffered events per subscriber before lagging.
    pub event_capacity: usize,
    /// Cap on monitoring checks in flight. `None` leaves them unbounded.
    pub max_concurrent_checks: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 3,
            job_retention: Duration::from_secs(24 * 60 * 60),
            sweep_interval: Duration::from_secs(60 * 60),
            fetch_timeout: Duration::from_secs(30),
            webhook_timeout: Duration::from_secs(10),
            user_agent: format!("sitewatch/{}", env!("CARGO_PKG_VERSION")),
            event_capacity: 1024,
            max_concurrent_checks: None,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

const MAX_CONCURRENT_JOBS: &str = "SITEWATCH_MAX_CONCURRENT_JOBS";
const JOB_RETENTION_HOURS: &str = "SITEWATCH_JOB_RETENTION_HOURS";
const SWEEP_INTERVAL_MINUTES: &str = "SITEWATCH_SWEEP_INTERVAL_MINUTES";
const FETCH_TIMEOUT_SECS: &str = "SITEWATCH_FETCH_TIMEOUT_SECS";
const WEBHOOK_TIMEOUT_SECS: &str = "SITEWATCH_WEBHOOK_TIMEOUT_SECS";
const USER_AGENT: &str = "SITEWATCH_USER_AGENT";
const MAX_CONCURRENT_CHECKS: &str = "SITEWATCH_MAX_CONCURRENT_CHECKS";

/// Longest duration accepted from the environment (about ten years).
const MAX_DURATION_SECS: u64 = 10 * 365 * 24 * 60 * 60;

impl EngineConfig {
    /// Build a config from `SITEWATCH_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(v) = parse_positive(&lookup, MAX_CONCURRENT_JOBS)? {
            config.max_concurrent_jobs = v as usize;
        }
        if let Some(v) = parse_duration(&lookup, JOB_RETENTION_HOURS, 60 * 60)? {
            config.job_retention = v;
        }
        if let Some(v) = parse_duration(&lookup, SWEEP_INTERVAL_MINUTES, 60)? {
            config.sweep_interval = v;
        }
        if let Some(v) = parse_duration(&lookup, FETCH_TIMEOUT_SECS, 1)? {
            config.fetch_timeout = v;
        }
        if let Some(v) = parse_duration(&lookup, WEBHOOK_TIMEOUT_SECS, 1)? {
            config.webhook_timeout = v;
        }
        if let Some(v) = lookup(USER_AGENT).filter(|v| !v.trim().is_empty()) {
            config.user_agent = v;
        }
        if let Some(v) = parse_positive(&lookup, MAX_CONCURRENT_CHECKS)? {
            config.max_concurrent_checks = Some(v as usize);
        }

        Ok(config)
    }

    pub fn with_max_concurrent_jobs(mut self, max: usize) -> Self {
        self.max_concurrent_jobs = max.max(1);
        self
    }

    pub fn with_job_retention(mut self, retention: Duration) -> Self {
        self.job_retention = retention;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_max_concurrent_checks(mut self, max: Option<usize>) -> Self {
        self.max_concurrent_checks = max.map(|m| m.max(1));
        self
    }

    /// Retention window as a calendar duration.
    pub fn retention_window(&self) -> chrono::Duration {
        let secs = self.job_retention.as_secs().min(u64::from(u32::MAX));
        chrono::Duration::seconds(secs as i64)
    }
}

fn parse_positive(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<u64>, ConfigError> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let value = raw.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
        key,
        value: raw.clone(),
        reason: e.to_string(),
    })?;
    if value == 0 {
        return Err(ConfigError::Invalid {
            key,
            value: raw,
            reason: "must be greater than zero".into(),
        });
    }
    Ok(Some(value))
}

/// A positive count of `unit_secs`-second units, bounded so timers can
/// always be armed.
fn parse_duration(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    unit_secs: u64,
) -> Result<Option<Duration>, ConfigError> {
    let Some(units) = parse_positive(lookup, key)? else {
        return Ok(None);
    };
    match units.checked_mul(unit_secs) {
        Some(secs) if secs <= MAX_DURATION_SECS => Ok(Some(Duration::from_secs(secs))),
        _ => Err(ConfigError::Invalid {
            key,
            value: units.to_string(),
            reason: "duration is too large".into(),
        }),
    }
}
