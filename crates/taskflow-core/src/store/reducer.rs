// ── The reducer ──
//
// The only code that computes a new collection state. Pure: no IO, no
// clocks, no dispatch. State changes only from confirmed server facts;
// commands and call acknowledgements reduce to the unchanged state.

use crate::action::Action;
use crate::model::TaskEntity;

/// The authoritative client-side view of the task collection.
///
/// Ordering is arrival order -- nothing more is promised to readers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TasksState {
    pub tasks: Vec<TaskEntity>,
}

/// Compute the next state for one action.
pub fn reduce(state: &TasksState, action: &Action) -> TasksState {
    match action {
        // Authoritative snapshot: full replace, never a merge.
        Action::LoadSucceeded { tasks } => TasksState {
            tasks: tasks.clone(),
        },

        // Append without a dedup check. A server re-send of the same id
        // produces a visible duplicate; see the reducer tests.
        Action::NotificationAdded { envelope } => {
            let mut tasks = state.tasks.clone();
            tasks.push(envelope.data.clone());
            TasksState { tasks }
        }

        // Replace by id; an unknown id is a silent no-op, not an error.
        Action::NotificationUpdated { envelope } => TasksState {
            tasks: state
                .tasks
                .iter()
                .map(|existing| {
                    if existing.id == envelope.data.id {
                        envelope.data.clone()
                    } else {
                        existing.clone()
                    }
                })
                .collect(),
        },

        // Remove by id; absent ids are a no-op.
        Action::NotificationDeleted { envelope } => TasksState {
            tasks: state
                .tasks
                .iter()
                .filter(|existing| existing.id != envelope.data.id)
                .cloned()
                .collect(),
        },

        // Commands and acknowledgements never touch state.
        Action::Load
        | Action::SubscribeNotifications
        | Action::AddTask { .. }
        | Action::UpdateTask { .. }
        | Action::DeleteTask { .. }
        | Action::AddSucceeded
        | Action::UpdateSucceeded
        | Action::DeleteSucceeded => state.clone(),
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{DeleteRef, NotificationEnvelope, TaskDraft, TaskId};

    fn task(id: i64, title: &str, completed: bool, date: (i32, u32, u32)) -> TaskEntity {
        TaskEntity {
            id: TaskId(id),
            title: title.into(),
            completed,
            due_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
        }
    }

    fn envelope(data: TaskEntity, notification: &str) -> NotificationEnvelope<TaskEntity> {
        NotificationEnvelope {
            data,
            notification: notification.into(),
        }
    }

    fn state(tasks: Vec<TaskEntity>) -> TasksState {
        TasksState { tasks }
    }

    #[test]
    fn load_replaces_wholesale() {
        let first = reduce(
            &TasksState::default(),
            &Action::LoadSucceeded {
                tasks: vec![
                    task(1, "A", false, (2024, 1, 1)),
                    task(2, "B", true, (2024, 1, 2)),
                ],
            },
        );
        assert_eq!(first.tasks.len(), 2);

        // A second snapshot replaces, never merges.
        let second = reduce(
            &first,
            &Action::LoadSucceeded {
                tasks: vec![task(3, "C", false, (2024, 2, 1))],
            },
        );
        assert_eq!(second.tasks, vec![task(3, "C", false, (2024, 2, 1))]);
    }

    #[test]
    fn add_notification_appends() {
        let initial = state(vec![task(1, "A", false, (2024, 1, 1))]);

        let next = reduce(
            &initial,
            &Action::NotificationAdded {
                envelope: envelope(task(2, "B", false, (2024, 1, 2)), "New Task with title B created"),
            },
        );

        assert_eq!(next.tasks.len(), 2);
        assert_eq!(next.tasks[1].id, TaskId(2));
    }

    #[test]
    fn duplicate_add_appends_without_dedup() {
        // Deliberate non-invariant: a re-sent add for a known id produces
        // a visible duplicate rather than being collapsed.
        let initial = state(vec![task(1, "A", false, (2024, 1, 1))]);

        let next = reduce(
            &initial,
            &Action::NotificationAdded {
                envelope: envelope(task(1, "A", false, (2024, 1, 1)), "re-send"),
            },
        );

        assert_eq!(next.tasks.len(), 2);
        assert_eq!(next.tasks[0].id, next.tasks[1].id);
    }

    #[test]
    fn update_notification_replaces_matching_id() {
        let initial = state(vec![task(1, "A", false, (2024, 1, 1))]);

        let next = reduce(
            &initial,
            &Action::NotificationUpdated {
                envelope: envelope(task(1, "A2", true, (2024, 1, 2)), "updated"),
            },
        );

        assert_eq!(next, state(vec![task(1, "A2", true, (2024, 1, 2))]));
    }

    #[test]
    fn update_for_unknown_id_is_a_no_op() {
        let initial = state(vec![task(1, "A", false, (2024, 1, 1))]);

        let next = reduce(
            &initial,
            &Action::NotificationUpdated {
                envelope: envelope(task(42, "Ghost", true, (2024, 1, 2)), "updated"),
            },
        );

        assert_eq!(next, initial);
    }

    #[test]
    fn delete_notification_removes_matching_id() {
        let initial = state(vec![task(1, "A", false, (2024, 1, 1))]);

        let next = reduce(
            &initial,
            &Action::NotificationDeleted {
                envelope: NotificationEnvelope {
                    data: DeleteRef { id: TaskId(1) },
                    notification: "deleted".into(),
                },
            },
        );

        assert_eq!(next.tasks, Vec::new());
    }

    #[test]
    fn delete_for_unknown_id_is_a_no_op() {
        let initial = state(vec![task(1, "A", false, (2024, 1, 1))]);

        let next = reduce(
            &initial,
            &Action::NotificationDeleted {
                envelope: NotificationEnvelope {
                    data: DeleteRef { id: TaskId(9) },
                    notification: "deleted".into(),
                },
            },
        );

        assert_eq!(next, initial);
    }

    #[test]
    fn ids_stay_unique_across_event_sequences() {
        let mut current = TasksState::default();
        let actions = [
            Action::LoadSucceeded {
                tasks: vec![
                    task(1, "A", false, (2024, 1, 1)),
                    task(2, "B", false, (2024, 1, 2)),
                ],
            },
            Action::NotificationUpdated {
                envelope: envelope(task(1, "A2", true, (2024, 1, 3)), "updated"),
            },
            Action::NotificationDeleted {
                envelope: NotificationEnvelope {
                    data: DeleteRef { id: TaskId(2) },
                    notification: "deleted".into(),
                },
            },
            Action::NotificationAdded {
                envelope: envelope(task(3, "C", false, (2024, 1, 4)), "added"),
            },
        ];

        for action in &actions {
            current = reduce(&current, action);
            let mut ids: Vec<_> = current.tasks.iter().map(|t| t.id).collect();
            ids.sort_unstable();
            ids.dedup();
            assert_eq!(ids.len(), current.tasks.len(), "duplicate id after {action}");
        }
    }

    #[test]
    fn commands_and_acks_never_touch_state() {
        let initial = state(vec![task(1, "A", false, (2024, 1, 1))]);
        let draft = TaskDraft::new("B", NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());

        let commands = [
            Action::Load,
            Action::SubscribeNotifications,
            Action::AddTask { draft: draft.clone() },
            Action::UpdateTask { id: TaskId(1), draft },
            Action::DeleteTask { id: TaskId(1) },
            Action::AddSucceeded,
            Action::UpdateSucceeded,
            Action::DeleteSucceeded,
        ];

        for action in &commands {
            assert_eq!(reduce(&initial, action), initial, "{action} mutated state");
        }
    }
}
