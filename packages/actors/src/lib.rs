//! Actor system for the site watch engine.
//!
//! This crate provides the Ractor-based actors behind the one-shot job
//! queue and the recurring monitoring scheduler, plus the [`Engine`]
//! facade that fronts both.
//!
//! # Architecture
//!
//! - `JobQueueActor` - FIFO admission of scrape jobs under a concurrency cap
//! - `WorkerActor` - Runs one job's fetch/extract/analyze pipeline
//! - `MonitorActor` - Supervises one `TargetActor` per monitoring target
//! - `TargetActor` - Owns a target's timer and runs its checks
//!
//! # Usage
//!
//! ```ignore
//! use actors::{Capabilities, Engine, EngineConfig, HttpFetcher, SelectorExtractor};
//!
//! let engine = Engine::start(EngineConfig::default(), capabilities).await?;
//! let job_id = engine.submit_job("https://example.com", Default::default(), None).await?;
//! ```

mod config;
mod engine;
mod handler;
mod http;
mod messages;
mod monitor_actor;
mod notify;
mod queue_actor;
mod target_actor;
mod timer;
mod worker_actor;

pub use config::{ConfigError, EngineConfig};
pub use engine::Engine;
pub use handler::{
    AnalysisResult, Analyzer, Capabilities, Extractor, Fetcher, FnAnalyzer, NoopNotifier, Notifier,
};
pub use http::{HttpFetcher, SelectorExtractor};
pub use messages::{JobQueueMessage, MonitorMessage, TargetMessage, WorkerMessage};
pub use monitor_actor::MonitorActor;
pub use notify::{WebhookChange, WebhookNotifier, WebhookPayload};
pub use queue_actor::{JobQueueActor, JobQueueArgs};
pub use target_actor::TargetActor;
pub use timer::TimerHandle;
pub use worker_actor::{
    PROGRESS_ANALYZED, PROGRESS_EXTRACTED, PROGRESS_FETCHING, PROGRESS_STARTED, WorkerActor,
};

/// Re-export ractor types for convenience.
pub use ractor::{Actor, ActorRef, RpcReplyPort, concurrency};
