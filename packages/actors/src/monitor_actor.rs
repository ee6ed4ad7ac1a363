//! Monitor actor: supervises one target actor per monitoring target.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use ractor::{Actor, ActorId, ActorProcessingErr, ActorRef, SupervisionEvent};
use store::TargetRepository;
use tokio::sync::{Semaphore, broadcast};
use watch_core::{MonitoringTarget, TargetId, WatchError, WatchEvent};

use crate::config::EngineConfig;
use crate::handler::Capabilities;
use crate::messages::{MonitorMessage, TargetMessage};
use crate::target_actor::{TargetActor, TargetActorArgs};

/// Monitor actor arguments.
pub struct MonitorArgs {
    pub repo: TargetRepository,
    pub config: EngineConfig,
    pub capabilities: Capabilities,
    pub event_tx: broadcast::Sender<WatchEvent>,
}

/// State for the monitor actor.
pub struct MonitorState {
    /// Target actors by target ID.
    targets: HashMap<TargetId, ActorRef<TargetMessage>>,
    /// Reverse lookup for supervision events.
    actors: HashMap<ActorId, TargetId>,
    repo: TargetRepository,
    capabilities: Capabilities,
    fetch_timeout: Duration,
    check_permits: Option<Arc<Semaphore>>,
    event_tx: broadcast::Sender<WatchEvent>,
}

impl MonitorState {
    fn new(args: MonitorArgs) -> Self {
        Self {
            targets: HashMap::new(),
            actors: HashMap::new(),
            repo: args.repo,
            capabilities: args.capabilities,
            fetch_timeout: args.config.fetch_timeout,
            check_permits: args
                .config
                .max_concurrent_checks
                .map(|n| Arc::new(Semaphore::new(n))),
            event_tx: args.event_tx,
        }
    }

    fn broadcast(&self, event: WatchEvent) {
        let _ = self.event_tx.send(event);
    }

    fn forget(&mut self, target_id: TargetId) -> Option<ActorRef<TargetMessage>> {
        let actor = self.targets.remove(&target_id)?;
        self.actors.remove(&actor.get_id());
        Some(actor)
    }
}

async fn spawn_target_actor(
    myself: &ActorRef<MonitorMessage>,
    state: &mut MonitorState,
    target: MonitoringTarget,
) -> Result<ActorRef<TargetMessage>, WatchError> {
    let target_id = target.id;
    let args = TargetActorArgs {
        target,
        repo: state.repo.clone(),
        capabilities: state.capabilities.clone(),
        fetch_timeout: state.fetch_timeout,
        check_permits: state.check_permits.clone(),
        event_tx: state.event_tx.clone(),
    };

    let (actor, _handle) = Actor::spawn_linked(None, TargetActor, args, myself.get_cell())
        .await
        .map_err(|e| WatchError::Internal(format!("failed to spawn target actor: {}", e)))?;

    state.targets.insert(target_id, actor.clone());
    state.actors.insert(actor.get_id(), target_id);

    Ok(actor)
}

/// Monitor actor that owns every target actor.
///
/// Reads go straight to the repository. Requests that touch a target's
/// timer or run a check are forwarded with their reply port, so one slow
/// check never blocks other targets.
pub struct MonitorActor;

impl Actor for MonitorActor {
    type Msg = MonitorMessage;
    type State = MonitorState;
    type Arguments = MonitorArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting monitoring scheduler");
        let mut state = MonitorState::new(args);

        // Resume targets already in the store.
        let existing = state.repo.list(None).await;
        for target in existing {
            let target_id = target.id;
            if let Err(e) = spawn_target_actor(&myself, &mut state, target).await {
                tracing::error!("Failed to resume target {}: {}", target_id, e);
            }
        }
        if !state.targets.is_empty() {
            tracing::info!("Resumed {} monitoring targets", state.targets.len());
        }

        Ok(state)
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            MonitorMessage::CreateTarget { target, reply } => {
                let target = MonitoringTarget::new(*target);
                let target_id = target.id;

                if let Err(e) = state.repo.create(&target).await {
                    let _ = reply.send(Err(e.into()));
                    return Ok(());
                }

                let is_active = target.is_active;
                let actor = match spawn_target_actor(&myself, state, target).await {
                    Ok(actor) => actor,
                    Err(e) => {
                        let _ = state.repo.delete(target_id).await;
                        let _ = reply.send(Err(e));
                        return Ok(());
                    }
                };

                tracing::info!("Target {} created", target_id);
                state.broadcast(WatchEvent::TargetCreated {
                    target_id,
                    timestamp: Utc::now(),
                });

                if !is_active {
                    let _ = reply.send(Ok(target_id));
                    return Ok(());
                }

                // The target exists once stored and spawned. The caller's
                // reply waits for the first check but never depends on it.
                let (tx, rx) = ractor::concurrency::oneshot();
                if actor
                    .send_message(TargetMessage::InitialCheck { reply: tx.into() })
                    .is_err()
                {
                    tracing::warn!("Target {} stopped before its first check", target_id);
                }
                let event_tx = state.event_tx.clone();
                tokio::spawn(async move {
                    if rx.await.is_err() {
                        tracing::warn!("Initial check for target {} was aborted", target_id);
                        let _ = event_tx.send(WatchEvent::TargetCheckFailed {
                            target_id,
                            error: "initial check aborted".to_string(),
                            timestamp: Utc::now(),
                        });
                    }
                    let _ = reply.send(Ok(target_id));
                });
            }

            MonitorMessage::UpdateTarget {
                target_id,
                patch,
                reply,
            } => match state.targets.get(&target_id) {
                Some(actor) => {
                    if actor
                        .send_message(TargetMessage::Update { patch, reply })
                        .is_err()
                    {
                        tracing::warn!("Target actor {} unavailable for update", target_id);
                    }
                }
                None => {
                    let _ = reply.send(Err(WatchError::target_not_found(target_id)));
                }
            },

            MonitorMessage::DeleteTarget { target_id, reply } => {
                // Drop the stored row here so every caller sees the target
                // gone at once; a check still in flight fails its write.
                let actor = state.forget(target_id);
                let removed = state.repo.delete(target_id).await;
                if let Some(actor) = actor {
                    actor.stop(None);
                }

                let result = match removed {
                    Ok(_) => {
                        tracing::info!("Target {} deleted", target_id);
                        state.broadcast(WatchEvent::TargetDeleted {
                            target_id,
                            timestamp: Utc::now(),
                        });
                        Ok(())
                    }
                    Err(_) => Err(WatchError::target_not_found(target_id)),
                };
                let _ = reply.send(result);
            }

            MonitorMessage::GetTarget { target_id, reply } => {
                let result = state
                    .repo
                    .get(target_id)
                    .await
                    .map_err(|_| WatchError::target_not_found(target_id));
                let _ = reply.send(result);
            }

            MonitorMessage::ListTargets { owner_id, reply } => {
                let _ = reply.send(state.repo.list(owner_id.as_deref()).await);
            }

            MonitorMessage::CheckNow { target_id, reply } => match state.targets.get(&target_id) {
                Some(actor) => {
                    if actor
                        .send_message(TargetMessage::CheckNow { reply })
                        .is_err()
                    {
                        tracing::warn!("Target actor {} unavailable for check", target_id);
                    }
                }
                None => {
                    let _ = reply.send(Err(WatchError::target_not_found(target_id)));
                }
            },

            MonitorMessage::Shutdown => {
                tracing::info!("Shutting down monitoring scheduler");
                for (_, actor) in state.targets.drain() {
                    actor.stop(None);
                }
                state.actors.clear();
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
                state.actors.remove(&cell.get_id());
            }
            SupervisionEvent::ActorFailed(cell, err) => {
                let Some(target_id) = state.actors.remove(&cell.get_id()) else {
                    return Ok(());
                };
                tracing::error!("Target actor {} crashed: {}", target_id, err);
                state.targets.remove(&target_id);

                // Bring it back from the last stored state.
                match state.repo.get(target_id).await {
                    Ok(target) => match spawn_target_actor(&myself, state, target).await {
                        Ok(_) => {
                            tracing::info!("Target actor {} restarted", target_id);
                            state.broadcast(WatchEvent::TargetRestarted {
                                target_id,
                                timestamp: Utc::now(),
                            });
                        }
                        Err(e) => tracing::error!("Failed to restart target {}: {}", target_id, e),
                    },
                    Err(_) => tracing::warn!("Crashed target {} no longer stored", target_id),
                }
            }
            _ => {}
        }
        Ok(())
    }
}
