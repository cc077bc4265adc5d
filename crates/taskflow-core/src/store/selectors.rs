// ── Selectors ──
//
// Read-only projections over TasksState. UI-facing decoration (row
// menus and the like) is computed downstream of these, never stored.

use crate::model::{TaskEntity, TaskId};
use crate::store::TasksState;

/// The task collection in arrival order.
pub fn select_tasks(state: &TasksState) -> &[TaskEntity] {
    &state.tasks
}

/// A single task by id.
pub fn select_task(state: &TasksState, id: TaskId) -> Option<&TaskEntity> {
    state.tasks.iter().find(|task| task.id == id)
}

/// How many tasks are known.
pub fn select_task_count(state: &TasksState) -> usize {
    state.tasks.len()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn sample() -> TasksState {
        TasksState {
            tasks: vec![
                TaskEntity {
                    id: TaskId(1),
                    title: "A".into(),
                    completed: false,
                    due_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                },
                TaskEntity {
                    id: TaskId(2),
                    title: "B".into(),
                    completed: true,
                    due_date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
                },
            ],
        }
    }

    #[test]
    fn selects_tasks_in_arrival_order() {
        let state = sample();
        let tasks = select_tasks(&state);
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].id, TaskId(1));
    }

    #[test]
    fn selects_task_by_id() {
        let state = sample();
        assert_eq!(select_task(&state, TaskId(2)).unwrap().title, "B");
        assert!(select_task(&state, TaskId(9)).is_none());
    }

    #[test]
    fn counts_tasks() {
        assert_eq!(select_task_count(&sample()), 2);
        assert_eq!(select_task_count(&TasksState::default()), 0);
    }
}
