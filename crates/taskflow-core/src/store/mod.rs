// ── State store ──
//
// One explicitly-owned store per engine; no ambient globals. Mutated
// only through `apply`, which runs the reducer; read only through
// snapshots, subscriptions, and selectors.

mod reducer;
pub mod selectors;

pub use reducer::{TasksState, reduce};

use std::sync::Arc;

use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::action::Action;
use crate::model::TaskEntity;

/// Reactive container for [`TasksState`].
///
/// Publishes through a `watch` channel: subscribers always see the
/// latest state, and a reduction that changes nothing leaves the
/// published `Arc` untouched (no spurious wakeups).
pub struct TaskStore {
    state: watch::Sender<Arc<TasksState>>,
}

impl TaskStore {
    pub fn new() -> Self {
        let (state, _) = watch::channel(Arc::new(TasksState::default()));
        Self { state }
    }

    /// Run the reducer for one action and publish the result.
    ///
    /// Called only by the engine's dispatcher, one action at a time, so
    /// each reduction is atomic with respect to every other.
    pub fn apply(&self, action: &Action) {
        self.state.send_if_modified(|current| {
            let next = reduce(current, action);
            if **current == next {
                false
            } else {
                *current = Arc::new(next);
                true
            }
        });
    }

    /// The current state (cheap `Arc` clone).
    pub fn snapshot(&self) -> Arc<TasksState> {
        self.state.borrow().clone()
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<Arc<TasksState>> {
        self.state.subscribe()
    }

    /// Subscribe as a `Stream` for use with `StreamExt` combinators.
    pub fn stream(&self) -> WatchStream<Arc<TasksState>> {
        WatchStream::new(self.state.subscribe())
    }

    /// Convenience projection over the current snapshot.
    pub fn tasks(&self) -> Vec<TaskEntity> {
        self.state.borrow().tasks.clone()
    }
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::model::{NotificationEnvelope, TaskId};

    fn task(id: i64, title: &str) -> TaskEntity {
        TaskEntity {
            id: TaskId(id),
            title: title.into(),
            completed: false,
            due_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        }
    }

    #[test]
    fn apply_publishes_new_snapshots() {
        let store = TaskStore::new();
        assert!(store.tasks().is_empty());

        store.apply(&Action::LoadSucceeded {
            tasks: vec![task(1, "A")],
        });

        assert_eq!(store.tasks(), vec![task(1, "A")]);
    }

    #[test]
    fn no_op_reduction_keeps_the_published_arc() {
        let store = TaskStore::new();
        store.apply(&Action::LoadSucceeded {
            tasks: vec![task(1, "A")],
        });

        let before = store.snapshot();

        // Update for an id nobody has: defined as a no-op.
        store.apply(&Action::NotificationUpdated {
            envelope: NotificationEnvelope {
                data: task(99, "Ghost"),
                notification: "updated".into(),
            },
        });

        let after = store.snapshot();
        assert!(Arc::ptr_eq(&before, &after), "no-op must not republish");
    }

    #[tokio::test]
    async fn subscribers_observe_changes() {
        let store = TaskStore::new();
        let mut rx = store.subscribe();

        store.apply(&Action::LoadSucceeded {
            tasks: vec![task(1, "A")],
        });

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().tasks.len(), 1);
    }
}
