//! Monitoring target domain types for recurring change watches.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::change::{Change, ChangeType, Snapshot, diff};

/// Most recent history entries kept per target.
pub const MAX_CHANGE_HISTORY: usize = 50;

/// Smallest check interval accepted at the boundary.
pub const MIN_CHECK_INTERVAL_MINUTES: u32 = 5;

/// Largest check interval accepted at the boundary (one day).
pub const MAX_CHECK_INTERVAL_MINUTES: u32 = 1440;

/// Unique identifier for a monitoring target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(pub Ulid);

impl TargetId {
    /// Create a new unique target ID.
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parse a target ID from a string.
    pub fn parse(s: &str) -> Result<Self, ulid::DecodeError> {
        Ok(Self(Ulid::from_string(s)?))
    }
}

impl Default for TargetId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TargetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where to announce detected changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub enabled: bool,
}

impl NotificationSettings {
    /// Notifications delivered to a webhook.
    pub fn webhook(url: impl Into<String>) -> Self {
        Self {
            webhook: Some(url.into()),
            email: None,
            enabled: true,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// One entry of a target's change history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub timestamp: DateTime<Utc>,
    pub selector: String,
    pub change_type: ChangeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_content: Option<String>,
}

impl ChangeRecord {
    pub fn from_change(change: &Change, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            selector: change.selector.clone(),
            change_type: change.change_type,
            old_content: change.old_content.clone(),
            new_content: change.new_content.clone(),
        }
    }
}

/// Arguments for registering a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTarget {
    pub url: String,
    pub name: String,
    pub owner_id: String,
    pub check_interval_minutes: u32,
    pub selectors: Vec<String>,
    #[serde(default)]
    pub notifications: NotificationSettings,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl NewTarget {
    /// An active target checked hourly with notifications off.
    pub fn new(
        url: impl Into<String>,
        name: impl Into<String>,
        owner_id: impl Into<String>,
        selectors: Vec<String>,
    ) -> Self {
        Self {
            url: url.into(),
            name: name.into(),
            owner_id: owner_id.into(),
            check_interval_minutes: 60,
            selectors,
            notifications: NotificationSettings::default(),
            is_active: true,
        }
    }

    pub fn with_interval(mut self, minutes: u32) -> Self {
        self.check_interval_minutes = minutes;
        self
    }

    pub fn with_notifications(mut self, notifications: NotificationSettings) -> Self {
        self.notifications = notifications;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// Partial update for a target. Absent fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetPatch {
    pub url: Option<String>,
    pub name: Option<String>,
    pub selectors: Option<Vec<String>>,
    pub check_interval_minutes: Option<u32>,
    pub is_active: Option<bool>,
    pub notifications: Option<NotificationSettings>,
}

impl TargetPatch {
    pub fn active(is_active: bool) -> Self {
        Self {
            is_active: Some(is_active),
            ..Default::default()
        }
    }

    pub fn interval(minutes: u32) -> Self {
        Self {
            check_interval_minutes: Some(minutes),
            ..Default::default()
        }
    }

    pub fn selectors(selectors: Vec<String>) -> Self {
        Self {
            selectors: Some(selectors),
            ..Default::default()
        }
    }

    /// Whether applying this patch requires the timer to be restarted.
    pub fn reschedules(&self) -> bool {
        self.check_interval_minutes.is_some() || self.is_active.is_some()
    }
}

/// A long-lived watch on selected content of a URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoringTarget {
    pub id: TargetId,
    pub url: String,
    pub name: String,
    pub owner_id: String,
    pub is_active: bool,
    pub check_interval_minutes: u32,
    pub selectors: Vec<String>,
    #[serde(default)]
    pub snapshot: Snapshot,
    #[serde(default)]
    pub notifications: NotificationSettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_checked_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_change_at: Option<DateTime<Utc>>,
    /// Oldest first, at most [`MAX_CHANGE_HISTORY`] entries.
    #[serde(default)]
    pub change_history: Vec<ChangeRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MonitoringTarget {
    /// Build a target with an empty snapshot and history.
    pub fn new(params: NewTarget) -> Self {
        let now = Utc::now();
        Self {
            id: TargetId::new(),
            url: params.url,
            name: params.name,
            owner_id: params.owner_id,
            is_active: params.is_active,
            check_interval_minutes: params.check_interval_minutes,
            selectors: params.selectors,
            snapshot: Snapshot::new(),
            notifications: params.notifications,
            last_checked_at: None,
            last_change_at: None,
            change_history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Timer period for this target.
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.check_interval_minutes.max(1)) * 60)
    }

    /// Merge a patch into this target.
    pub fn apply_patch(&mut self, patch: TargetPatch) {
        if let Some(url) = patch.url {
            self.url = url;
        }
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(selectors) = patch.selectors {
            self.selectors = selectors;
        }
        if let Some(minutes) = patch.check_interval_minutes {
            self.check_interval_minutes = minutes;
        }
        if let Some(active) = patch.is_active {
            self.is_active = active;
        }
        if let Some(notifications) = patch.notifications {
            self.notifications = notifications;
        }
        self.updated_at = Utc::now();
    }

    /// Fold a freshly extracted snapshot into this target.
    ///
    /// Replaces the snapshot, stamps `last_checked_at`, and on any difference
    /// stamps `last_change_at` and appends to the bounded history.
    pub fn record_check(&mut self, fresh: Snapshot, now: DateTime<Utc>) -> Vec<Change> {
        let changes = diff(&self.snapshot, &fresh);

        self.snapshot = fresh;
        self.last_checked_at = Some(now);

        if !changes.is_empty() {
            self.last_change_at = Some(now);
            self.change_history
                .extend(changes.iter().map(|c| ChangeRecord::from_change(c, now)));
            if self.change_history.len() > MAX_CHANGE_HISTORY {
                let overflow = self.change_history.len() - MAX_CHANGE_HISTORY;
                self.change_history.drain(..overflow);
            }
        }

        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn target() -> MonitoringTarget {
        MonitoringTarget::new(NewTarget::new(
            "https://example.com",
            "example",
            "owner-1",
            vec!["h1".into()],
        ))
    }

    fn snapshot(value: &str) -> Snapshot {
        let mut snap = Snapshot::new();
        snap.insert("h1".to_string(), value.to_string());
        snap
    }

    #[test]
    fn target_ids_parse_back_from_display() {
        let id = target().id;
        assert_eq!(TargetId::parse(&id.to_string()).ok(), Some(id));
        assert!(TargetId::parse("").is_err());
    }

    #[test]
    fn history_keeps_last_fifty_in_order() {
        let mut target = target();
        let start = Utc::now();

        for i in 0..60 {
            let at = start + ChronoDuration::minutes(i);
            let changes = target.record_check(snapshot(&format!("v{i}")), at);
            assert_eq!(changes.len(), 1);
        }

        assert_eq!(target.change_history.len(), MAX_CHANGE_HISTORY);
        assert_eq!(target.change_history[0].new_content.as_deref(), Some("v10"));
        assert_eq!(target.change_history[49].new_content.as_deref(), Some("v59"));
        assert!(
            target
                .change_history
                .windows(2)
                .all(|w| w[0].timestamp < w[1].timestamp)
        );
    }

    #[test]
    fn unchanged_check_only_stamps_checked_at() {
        let mut target = target();
        let first = Utc::now();
        target.record_check(snapshot("same"), first);
        let later = first + ChronoDuration::minutes(5);
        let changes = target.record_check(snapshot("same"), later);

        assert!(changes.is_empty());
        assert_eq!(target.last_checked_at, Some(later));
        assert_eq!(target.last_change_at, Some(first));
        assert_eq!(target.change_history.len(), 1);
    }

    #[test]
    fn dropped_selector_reports_removed() {
        let mut target = target();
        let mut both = snapshot("title");
        both.insert(".price".to_string(), "$10".to_string());
        target.record_check(both, Utc::now());

        let changes = target.record_check(snapshot("title"), Utc::now());
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].selector, ".price");
        assert_eq!(changes[0].change_type, ChangeType::Removed);
        assert!(!target.snapshot.contains_key(".price"));
    }

    #[test]
    fn patch_reschedule_detection() {
        assert!(TargetPatch::active(false).reschedules());
        assert!(TargetPatch::interval(10).reschedules());
        assert!(!TargetPatch::selectors(vec!["h2".into()]).reschedules());

        let mut target = target();
        target.apply_patch(TargetPatch::interval(15));
        assert_eq!(target.check_interval(), Duration::from_secs(15 * 60));
    }
}
