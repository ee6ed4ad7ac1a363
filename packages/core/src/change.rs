//! Change detection between two selector snapshots.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Selector -> observed text, in selector configuration order.
pub type Snapshot = IndexMap<String, String>;

/// Kind of difference found for a selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Added,
    Removed,
    Modified,
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeType::Added => write!(f, "added"),
            ChangeType::Removed => write!(f, "removed"),
            ChangeType::Modified => write!(f, "modified"),
        }
    }
}

/// A single difference between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub selector: String,
    pub change_type: ChangeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_content: Option<String>,
}

impl Change {
    pub fn added(selector: impl Into<String>, new_content: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            change_type: ChangeType::Added,
            old_content: None,
            new_content: Some(new_content.into()),
        }
    }

    pub fn removed(selector: impl Into<String>, old_content: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            change_type: ChangeType::Removed,
            old_content: Some(old_content.into()),
            new_content: None,
        }
    }

    pub fn modified(
        selector: impl Into<String>,
        old_content: impl Into<String>,
        new_content: impl Into<String>,
    ) -> Self {
        Self {
            selector: selector.into(),
            change_type: ChangeType::Modified,
            old_content: Some(old_content.into()),
            new_content: Some(new_content.into()),
        }
    }
}

/// Outcome of one monitoring check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoringResult {
    pub has_changes: bool,
    pub changes: Vec<Change>,
    pub checked_at: DateTime<Utc>,
}

/// Compare two snapshots.
///
/// Entries of `current` are visited first in their order (added, modified),
/// then entries of `previous` missing from `current` (removed). Content is
/// compared with exact string equality.
pub fn diff(previous: &Snapshot, current: &Snapshot) -> Vec<Change> {
    let mut changes = Vec::new();

    for (selector, content) in current {
        match previous.get(selector) {
            None => changes.push(Change::added(selector, content)),
            Some(old) if old != content => changes.push(Change::modified(selector, old, content)),
            Some(_) => {}
        }
    }

    for (selector, content) in previous {
        if !current.contains_key(selector) {
            changes.push(Change::removed(selector, content));
        }
    }

    changes
}

/// Word-level Jaccard similarity in `[0, 1]`.
///
/// Diagnostic only; it never decides whether a change is reported.
pub fn content_similarity(a: &str, b: &str) -> f64 {
    let left: HashSet<&str> = a.split_whitespace().collect();
    let right: HashSet<&str> = b.split_whitespace().collect();
    if left.is_empty() && right.is_empty() {
        return 1.0;
    }
    let shared = left.intersection(&right).count() as f64;
    let total = left.union(&right).count() as f64;
    shared / total
}
