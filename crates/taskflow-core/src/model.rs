// ── Domain model ──
//
// The entity types the store holds and the actions carry. Wire-facing
// shapes live in taskflow-api; convert.rs translates between the two.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Server-assigned task identifier. Unique and immutable after creation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TaskId(pub i64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<i64> for TaskId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

/// A task as the store knows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskEntity {
    pub id: TaskId,
    pub title: String,
    pub completed: bool,
    pub due_date: NaiveDate,
}

/// The fields a client may propose for a task. Never carries an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDraft {
    pub title: String,
    pub completed: bool,
    pub due_date: NaiveDate,
}

impl TaskDraft {
    /// A fresh, incomplete draft.
    pub fn new(title: impl Into<String>, due_date: NaiveDate) -> Self {
        Self {
            title: title.into(),
            completed: false,
            due_date,
        }
    }
}

/// Delete notifications carry only the removed id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteRef {
    pub id: TaskId,
}

/// A server-pushed notification: the payload plus the human-readable
/// description the server attached to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEnvelope<T> {
    pub data: T,
    pub notification: String,
}
