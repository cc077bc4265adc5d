// ── Action catalog ──
//
// The closed vocabulary the engine operates on. Commands are local
// intent, not yet confirmed; events are facts asserted by the server.
// Every consumer matches exhaustively -- an unhandled kind is a compile
// error, never a silent drop.

use crate::model::{DeleteRef, NotificationEnvelope, TaskDraft, TaskEntity, TaskId};

/// Everything that can be dispatched through the engine.
///
/// Dispatch is fire-and-forget; the only observers of completion are
/// the reaction chains and the store.
#[derive(Debug, Clone, PartialEq, Eq, strum::Display)]
pub enum Action {
    // ── Commands ─────────────────────────────────────────────────────
    /// Request the authoritative snapshot stream.
    Load,
    /// Attach to the add/update/delete notification streams.
    SubscribeNotifications,
    /// Create a task on the server.
    AddTask { draft: TaskDraft },
    /// Update a task on the server.
    UpdateTask { id: TaskId, draft: TaskDraft },
    /// Delete a task on the server.
    DeleteTask { id: TaskId },

    // ── Events / results ─────────────────────────────────────────────
    /// A full snapshot arrived; replaces the collection wholesale.
    LoadSucceeded { tasks: Vec<TaskEntity> },
    /// The create call was acknowledged.
    AddSucceeded,
    /// The update call was acknowledged.
    UpdateSucceeded,
    /// The delete call was acknowledged.
    DeleteSucceeded,
    /// The server asserted a new task exists.
    NotificationAdded {
        envelope: NotificationEnvelope<TaskEntity>,
    },
    /// The server asserted a task changed.
    NotificationUpdated {
        envelope: NotificationEnvelope<TaskEntity>,
    },
    /// The server asserted a task was removed.
    NotificationDeleted {
        envelope: NotificationEnvelope<DeleteRef>,
    },
}
