//! Per-target actor: owns one target's timer and runs its checks.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use ractor::{Actor, ActorProcessingErr, ActorRef};
use store::TargetRepository;
use tokio::sync::{Semaphore, broadcast};
use watch_core::{
    ChangeType, MonitoringResult, MonitoringTarget, TargetPatch, WatchError, WatchEvent,
    content_similarity,
};

use crate::handler::Capabilities;
use crate::messages::TargetMessage;
use crate::timer::TimerHandle;

/// Target actor arguments.
pub struct TargetActorArgs {
    pub target: MonitoringTarget,
    pub repo: TargetRepository,
    pub capabilities: Capabilities,
    pub fetch_timeout: Duration,
    /// Shared cap on checks in flight across all targets.
    pub check_permits: Option<Arc<Semaphore>>,
    pub event_tx: broadcast::Sender<WatchEvent>,
}

/// State for a target actor.
pub struct TargetActorState {
    target: MonitoringTarget,
    repo: TargetRepository,
    capabilities: Capabilities,
    fetch_timeout: Duration,
    check_permits: Option<Arc<Semaphore>>,
    event_tx: broadcast::Sender<WatchEvent>,
    timer: Option<TimerHandle>,
    /// Bumped on every timer stop; ticks carrying an older value are stale.
    generation: u64,
}

impl TargetActorState {
    fn new(args: TargetActorArgs) -> Self {
        Self {
            target: args.target,
            repo: args.repo,
            capabilities: args.capabilities,
            fetch_timeout: args.fetch_timeout,
            check_permits: args.check_permits,
            event_tx: args.event_tx,
            timer: None,
            generation: 0,
        }
    }

    fn broadcast(&self, event: WatchEvent) {
        let _ = self.event_tx.send(event);
    }

    fn stop_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.stop();
        }
        self.generation += 1;
    }

    /// (Re)arm the timer if the target is active.
    fn schedule(&mut self, myself: &ActorRef<TargetMessage>) {
        self.stop_timer();
        if !self.target.is_active {
            return;
        }

        let generation = self.generation;
        let timer = TimerHandle::start(myself.clone(), self.target.check_interval(), move || {
            TargetMessage::Tick { generation }
        });
        tracing::debug!(
            "Target {} scheduled every {:?}",
            self.target.id,
            timer.period()
        );
        self.timer = Some(timer);
    }

    /// Fetch, extract, diff, store and notify.
    ///
    /// On error the stored target is untouched.
    async fn check(&mut self) -> Result<MonitoringResult, WatchError> {
        let fresh = {
            let _permit = match &self.check_permits {
                Some(permits) => Some(
                    permits
                        .clone()
                        .acquire_owned()
                        .await
                        .map_err(|_| WatchError::Internal("check limiter closed".into()))?,
                ),
                None => None,
            };
            self.capabilities
                .snapshot(&self.target.url, &self.target.selectors, self.fetch_timeout)
                .await?
        };

        let now = Utc::now();
        let mut updated = self.target.clone();
        let changes = updated.record_check(fresh, now);
        self.repo.update(&updated).await?;
        self.target = updated;

        for change in changes.iter().filter(|c| c.change_type == ChangeType::Modified) {
            if let (Some(old), Some(new)) = (&change.old_content, &change.new_content) {
                tracing::debug!(
                    "Target {} selector '{}' changed (similarity {:.2})",
                    self.target.id,
                    change.selector,
                    content_similarity(old, new)
                );
            }
        }

        if !changes.is_empty() {
            tracing::info!(
                "Detected {} changes on target {} ({})",
                changes.len(),
                self.target.id,
                self.target.url
            );
            if self.target.notifications.enabled {
                let notifier = self.capabilities.notifier.clone();
                let target = self.target.clone();
                let changes = changes.clone();
                tokio::spawn(async move {
                    notifier.notify(&target, &changes).await;
                });
            }
        }

        self.broadcast(WatchEvent::TargetChecked {
            target_id: self.target.id,
            changes: changes.len(),
            timestamp: now,
        });

        Ok(MonitoringResult {
            has_changes: !changes.is_empty(),
            changes,
            checked_at: now,
        })
    }

    async fn update(
        &mut self,
        myself: &ActorRef<TargetMessage>,
        patch: TargetPatch,
    ) -> Result<MonitoringTarget, WatchError> {
        let reschedules = patch.reschedules();
        let mut updated = self.target.clone();
        updated.apply_patch(patch);
        self.repo.update(&updated).await?;
        self.target = updated;

        if reschedules {
            self.schedule(myself);
        }

        self.broadcast(WatchEvent::TargetUpdated {
            target_id: self.target.id,
            is_active: self.target.is_active,
            timestamp: Utc::now(),
        });
        Ok(self.target.clone())
    }

    fn report_failure(&self, error: &WatchError) {
        match error {
            WatchError::UpstreamFetch(cause) => tracing::warn!(
                "Check failed for target {}: {} ({})",
                self.target.id,
                error,
                cause.user_message()
            ),
            _ => tracing::warn!("Check failed for target {}: {}", self.target.id, error),
        }
        self.broadcast(WatchEvent::TargetCheckFailed {
            target_id: self.target.id,
            error: error.to_string(),
            timestamp: Utc::now(),
        });
    }
}

/// Actor owning a single monitoring target.
///
/// Checks for one target run one at a time because the mailbox serializes
/// them; checks for different targets run in parallel.
pub struct TargetActor;

impl Actor for TargetActor {
    type Msg = TargetMessage;
    type State = TargetActorState;
    type Arguments = TargetActorArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::debug!("Starting target actor: {}", args.target.id);
        let mut state = TargetActorState::new(args);
        state.schedule(&myself);
        Ok(state)
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        state.stop_timer();
        Ok(())
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            TargetMessage::Tick { generation } => {
                if generation != state.generation || state.timer.is_none() {
                    tracing::debug!("Dropping stale tick for target {}", state.target.id);
                    return Ok(());
                }
                if let Err(e) = state.check().await {
                    state.report_failure(&e);
                }
            }

            TargetMessage::InitialCheck { reply } => {
                if let Err(e) = state.check().await {
                    state.report_failure(&e);
                }
                let _ = reply.send(());
            }

            TargetMessage::CheckNow { reply } => {
                let result = state.check().await;
                if let Err(e) = &result {
                    state.report_failure(e);
                }
                let _ = reply.send(result);
            }

            TargetMessage::Update { patch, reply } => {
                let result = state.update(&myself, patch).await;
                let _ = reply.send(result);
            }

        }

        Ok(())
    }
}
