//! Monitoring target repository.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use watch_core::{MonitoringTarget, TargetId};

use crate::StoreError;

/// Repository for monitoring targets.
///
/// Each target has one writer (its target actor); readers get clones.
#[derive(Debug, Clone, Default)]
pub struct TargetRepository {
    targets: Arc<RwLock<BTreeMap<TargetId, MonitoringTarget>>>,
}

impl TargetRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new target.
    pub async fn create(&self, target: &MonitoringTarget) -> Result<MonitoringTarget, StoreError> {
        let mut targets = self.targets.write().await;
        if targets.contains_key(&target.id) {
            return Err(StoreError::Duplicate(target.id.to_string()));
        }
        targets.insert(target.id, target.clone());
        Ok(target.clone())
    }

    /// Get a target by ID.
    pub async fn get(&self, id: TargetId) -> Result<MonitoringTarget, StoreError> {
        self.targets
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("Target not found: {}", id)))
    }

    /// All targets, optionally restricted to one owner.
    pub async fn list(&self, owner_id: Option<&str>) -> Vec<MonitoringTarget> {
        self.targets
            .read()
            .await
            .values()
            .filter(|t| owner_id.is_none_or(|owner| t.owner_id == owner))
            .cloned()
            .collect()
    }

    /// Replace a stored target.
    pub async fn update(&self, target: &MonitoringTarget) -> Result<MonitoringTarget, StoreError> {
        let mut targets = self.targets.write().await;
        match targets.get_mut(&target.id) {
            Some(slot) => {
                *slot = target.clone();
                Ok(target.clone())
            }
            None => Err(StoreError::NotFound(format!("Target not found: {}", target.id))),
        }
    }

    /// Delete a target.
    pub async fn delete(&self, id: TargetId) -> Result<MonitoringTarget, StoreError> {
        self.targets
            .write()
            .await
            .remove(&id)
            .ok_or_else(|| StoreError::NotFound(format!("Target not found: {}", id)))
    }

    pub async fn exists(&self, id: TargetId) -> bool {
        self.targets.read().await.contains_key(&id)
    }
}
