// ── Wire ↔ domain conversion ──
//
// taskflow-api speaks the server's shapes; the store speaks domain
// types. Everything that crosses that boundary goes through here.

use taskflow_api::{DeleteRecord, Envelope, TaskPayload, TaskRecord};

use crate::error::EngineError;
use crate::model::{DeleteRef, NotificationEnvelope, TaskDraft, TaskEntity, TaskId};

impl From<TaskRecord> for TaskEntity {
    fn from(record: TaskRecord) -> Self {
        Self {
            id: TaskId(record.id),
            title: record.title,
            completed: record.completed,
            due_date: record.due_date,
        }
    }
}

impl From<DeleteRecord> for DeleteRef {
    fn from(record: DeleteRecord) -> Self {
        Self {
            id: TaskId(record.id),
        }
    }
}

impl From<&TaskDraft> for TaskPayload {
    fn from(draft: &TaskDraft) -> Self {
        Self {
            title: draft.title.clone(),
            completed: draft.completed,
            due_date: draft.due_date,
        }
    }
}

// ── Channel payload decoding ─────────────────────────────────────────

/// Decode a `tasks` frame: the full snapshot.
pub(crate) fn decode_tasks(payload: &serde_json::Value) -> Result<Vec<TaskEntity>, EngineError> {
    let records: Vec<TaskRecord> = serde_json::from_value(payload.clone()).map_err(malformed)?;
    Ok(records.into_iter().map(TaskEntity::from).collect())
}

/// Decode an `add`/`update` frame: an envelope around a full task.
pub(crate) fn decode_task_envelope(
    payload: &serde_json::Value,
) -> Result<NotificationEnvelope<TaskEntity>, EngineError> {
    let envelope: Envelope<TaskRecord> =
        serde_json::from_value(payload.clone()).map_err(malformed)?;
    Ok(NotificationEnvelope {
        data: envelope.data.into(),
        notification: envelope.notification,
    })
}

/// Decode a `delete` frame: an envelope around the removed id.
pub(crate) fn decode_delete_envelope(
    payload: &serde_json::Value,
) -> Result<NotificationEnvelope<DeleteRef>, EngineError> {
    let envelope: Envelope<DeleteRecord> =
        serde_json::from_value(payload.clone()).map_err(malformed)?;
    Ok(NotificationEnvelope {
        data: envelope.data.into(),
        notification: envelope.notification,
    })
}

fn malformed(e: serde_json::Error) -> EngineError {
    EngineError::MalformedPayload {
        message: e.to_string(),
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::json;

    use super::*;

    #[test]
    fn decodes_snapshot_payloads() {
        let payload = json!([
            { "id": 1, "title": "A", "completed": false, "due_date": "2024-01-01" },
            { "id": 2, "title": "B", "completed": true, "due_date": "2024-01-02" },
        ]);

        let tasks = decode_tasks(&payload).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].id, TaskId(1));
        assert_eq!(tasks[1].due_date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
    }

    #[test]
    fn decodes_task_envelopes() {
        let payload = json!({
            "data": { "id": 5, "title": "Water plants", "completed": false, "due_date": "2026-03-01" },
            "notification": "New Task with title Water plants created"
        });

        let envelope = decode_task_envelope(&payload).unwrap();
        assert_eq!(envelope.data.id, TaskId(5));
        assert_eq!(envelope.notification, "New Task with title Water plants created");
    }

    #[test]
    fn decodes_delete_envelopes() {
        let payload = json!({ "data": { "id": 5 }, "notification": "Task 5 deleted" });

        let envelope = decode_delete_envelope(&payload).unwrap();
        assert_eq!(envelope.data.id, TaskId(5));
    }

    #[test]
    fn malformed_payloads_are_reported_not_panicked() {
        let err = decode_tasks(&json!({ "nope": true })).unwrap_err();
        assert!(matches!(err, EngineError::MalformedPayload { .. }));
    }

    #[test]
    fn draft_converts_to_wire_payload() {
        let draft = TaskDraft::new("Call the vet", NaiveDate::from_ymd_opt(2026, 4, 2).unwrap());
        let payload = TaskPayload::from(&draft);

        assert_eq!(payload.title, "Call the vet");
        assert!(!payload.completed);
    }
}
