// Task endpoints and wire types
//
// The request/response surface is three mutating routes; reads arrive
// over the channel (the server pushes a full snapshot on connect).
// Dates cross the wire as `%Y-%m-%d`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::gateway::Gateway;

// ── Wire types ───────────────────────────────────────────────────────

/// A task as the server sends it: snapshot entries and add/update
/// notification payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: i64,
    pub title: String,
    pub completed: bool,
    pub due_date: NaiveDate,
}

/// Request body for creating or updating a task. Never carries an id;
/// the server assigns those.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPayload {
    pub title: String,
    pub completed: bool,
    pub due_date: NaiveDate,
}

/// Delete notification payload: the removed id, nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteRecord {
    pub id: i64,
}

/// Wrapper around every server-pushed notification: the payload plus a
/// human-readable description of what happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
    pub notification: String,
}

/// One-line acknowledgement body the server returns for mutations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub message: String,
}

// ── Endpoints ────────────────────────────────────────────────────────

impl Gateway {
    /// Create a task.
    ///
    /// `POST /api/tasks`
    pub async fn create_task(&self, task: &TaskPayload) -> Result<Ack, Error> {
        self.post("api/tasks", task).await
    }

    /// Update a task by id.
    ///
    /// `PUT /api/tasks/{id}`
    pub async fn update_task(&self, id: i64, task: &TaskPayload) -> Result<Ack, Error> {
        self.put(&format!("api/tasks/{id}"), task).await
    }

    /// Delete a task by id.
    ///
    /// `DELETE /api/tasks/{id}`
    pub async fn delete_task(&self, id: i64) -> Result<Ack, Error> {
        self.delete(&format!("api/tasks/{id}")).await
    }
}

// ── Tests ────────────────────────────────────────────────────────────
