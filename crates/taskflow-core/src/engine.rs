// ── Synchronization engine ──
//
// Full lifecycle management for the client-side view of the task
// collection. Bridges command actions to gateway calls and channel
// events to store mutations through five independently-running
// reaction chains. Chains never die from one failed item: every error
// is caught at the chain edge, logged, and swallowed.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use taskflow_api::{Ack, ChannelHandle, ChannelState, EventStream, Gateway, TaskPayload};

use crate::action::Action;
use crate::config::EngineConfig;
use crate::convert;
use crate::error::EngineError;
use crate::model::{TaskDraft, TaskId};
use crate::notify::{NotificationKind, NotificationSink, Severity, Toast};
use crate::store::TaskStore;

const ACTION_TAP_CAPACITY: usize = 256;

// ── SyncEngine ───────────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Owns the store, the gateway, the channel, and the reaction chains.
/// UI code dispatches actions and reads store projections; it never
/// mutates state directly.
pub struct SyncEngine {
    inner: Arc<EngineInner>,
    handles: Vec<JoinHandle<()>>,
}

struct EngineInner {
    config: EngineConfig,
    store: Arc<TaskStore>,
    gateway: Gateway,
    channel: ChannelHandle,
    notifier: Arc<dyn NotificationSink>,
    action_tx: mpsc::UnboundedSender<Action>,
    action_tap: broadcast::Sender<Action>,
    cancel: CancellationToken,
}

impl EngineInner {
    /// Fire-and-forget dispatch. After shutdown the dispatcher is gone;
    /// late completions are dropped here, not queued.
    fn dispatch(&self, action: Action) {
        let _ = self.action_tx.send(action);
    }
}

/// Routing table from command actions to their reaction chains.
struct CommandRoutes {
    add: mpsc::UnboundedSender<TaskDraft>,
    update: mpsc::UnboundedSender<(TaskId, TaskDraft)>,
    delete: mpsc::UnboundedSender<TaskId>,
    load: mpsc::UnboundedSender<()>,
    notify: mpsc::UnboundedSender<()>,
}

impl SyncEngine {
    /// Build the engine and spawn its background chains. Must be called
    /// from within a Tokio runtime.
    ///
    /// The channel connects asynchronously; the connect chain issues the
    /// initial `Load` + `SubscribeNotifications` as soon as it is up.
    pub fn start(
        config: EngineConfig,
        notifier: Arc<dyn NotificationSink>,
    ) -> Result<Self, EngineError> {
        let cancel = CancellationToken::new();
        let gateway = Gateway::new(config.gateway_config())?;
        let channel = ChannelHandle::connect(config.channel_config()?, cancel.clone())?;
        let store = Arc::new(TaskStore::new());

        let (action_tx, action_rx) = mpsc::unbounded_channel();
        let (action_tap, _) = broadcast::channel(ACTION_TAP_CAPACITY);

        let (add_tx, add_rx) = mpsc::unbounded_channel();
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let (delete_tx, delete_rx) = mpsc::unbounded_channel();
        let (load_tx, load_rx) = mpsc::unbounded_channel();
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();

        let inner = Arc::new(EngineInner {
            config,
            store,
            gateway,
            channel,
            notifier,
            action_tx,
            action_tap,
            cancel,
        });

        let routes = CommandRoutes {
            add: add_tx,
            update: update_tx,
            delete: delete_tx,
            load: load_tx,
            notify: notify_tx,
        };

        let handles = vec![
            tokio::spawn(dispatcher_task(Arc::clone(&inner), action_rx, routes)),
            tokio::spawn(command_chain(
                Arc::clone(&inner),
                add_rx,
                "add",
                Action::AddSucceeded,
                |gateway, draft: TaskDraft| async move {
                    gateway.create_task(&TaskPayload::from(&draft)).await
                },
            )),
            tokio::spawn(command_chain(
                Arc::clone(&inner),
                update_rx,
                "update",
                Action::UpdateSucceeded,
                |gateway, (id, draft): (TaskId, TaskDraft)| async move {
                    gateway.update_task(id.0, &TaskPayload::from(&draft)).await
                },
            )),
            tokio::spawn(command_chain(
                Arc::clone(&inner),
                delete_rx,
                "delete",
                Action::DeleteSucceeded,
                |gateway, id: TaskId| async move { gateway.delete_task(id.0).await },
            )),
            tokio::spawn(load_chain(Arc::clone(&inner), load_rx)),
            tokio::spawn(notification_chain(Arc::clone(&inner), notify_rx)),
            tokio::spawn(connect_chain(Arc::clone(&inner))),
        ];

        info!("sync engine started");
        Ok(Self { inner, handles })
    }

    /// Access the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Access the underlying store.
    pub fn store(&self) -> &Arc<TaskStore> {
        &self.inner.store
    }

    // ── Dispatch ─────────────────────────────────────────────────────

    /// Dispatch any action. Fire-and-forget.
    pub fn dispatch(&self, action: Action) {
        self.inner.dispatch(action);
    }

    /// Request the snapshot stream.
    pub fn load(&self) {
        self.dispatch(Action::Load);
    }

    /// Attach to the notification streams.
    pub fn subscribe_notifications(&self) {
        self.dispatch(Action::SubscribeNotifications);
    }

    /// Create a task. New tasks always start incomplete; the server
    /// contract fixes `completed` to false on create.
    pub fn add_task(&self, draft: TaskDraft) {
        self.dispatch(Action::AddTask {
            draft: TaskDraft {
                completed: false,
                ..draft
            },
        });
    }

    /// Update a task.
    pub fn update_task(&self, id: TaskId, draft: TaskDraft) {
        self.dispatch(Action::UpdateTask { id, draft });
    }

    /// Delete a task.
    pub fn delete_task(&self, id: TaskId) {
        self.dispatch(Action::DeleteTask { id });
    }

    // ── Observation ──────────────────────────────────────────────────

    /// Observe every dispatched action, post-reduction.
    pub fn actions(&self) -> broadcast::Receiver<Action> {
        self.inner.action_tap.subscribe()
    }

    /// Observe channel connectivity.
    pub fn channel_state(&self) -> watch::Receiver<ChannelState> {
        self.inner.channel.state()
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Tear the engine down: cancel every chain, close the channel, and
    /// join all background tasks. An in-flight request that resolves
    /// after this point has its completion dropped silently.
    pub async fn shutdown(self) {
        self.inner.cancel.cancel();
        self.inner.channel.shutdown();

        for handle in self.handles {
            let _ = handle.await;
        }

        info!("sync engine shut down");
    }
}

// ── Dispatcher ───────────────────────────────────────────────────────

/// The single point where actions meet the store.
///
/// One action at a time: apply to the store, publish on the tap, route
/// commands to their chains. Reductions cannot interleave.
async fn dispatcher_task(
    inner: Arc<EngineInner>,
    mut rx: mpsc::UnboundedReceiver<Action>,
    routes: CommandRoutes,
) {
    loop {
        tokio::select! {
            biased;
            _ = inner.cancel.cancelled() => break,
            action = rx.recv() => {
                let Some(action) = action else { break };
                trace!(action = %action, "dispatch");
                inner.store.apply(&action);
                let _ = inner.action_tap.send(action.clone());
                route_command(&routes, action);
            }
        }
    }
    debug!("dispatcher exiting");
}

fn route_command(routes: &CommandRoutes, action: Action) {
    match action {
        Action::Load => {
            let _ = routes.load.send(());
        }
        Action::SubscribeNotifications => {
            let _ = routes.notify.send(());
        }
        Action::AddTask { draft } => {
            let _ = routes.add.send(draft);
        }
        Action::UpdateTask { id, draft } => {
            let _ = routes.update.send((id, draft));
        }
        Action::DeleteTask { id } => {
            let _ = routes.delete.send(id);
        }
        // Events reach the store in the dispatcher; nothing downstream.
        Action::LoadSucceeded { .. }
        | Action::AddSucceeded
        | Action::UpdateSucceeded
        | Action::DeleteSucceeded
        | Action::NotificationAdded { .. }
        | Action::NotificationUpdated { .. }
        | Action::NotificationDeleted { .. } => {}
    }
}

// ── Command chains (add / update / delete) ───────────────────────────

/// One command family's reaction chain, with switch semantics: a new
/// command cancels and replaces the in-flight gateway call; the
/// superseded call's continuation is dropped. Failures are swallowed --
/// no state change, no user-visible error, a warn log only.
async fn command_chain<C, F, Fut>(
    inner: Arc<EngineInner>,
    mut rx: mpsc::UnboundedReceiver<C>,
    label: &'static str,
    success: Action,
    call: F,
) where
    C: Send + 'static,
    F: Fn(Gateway, C) -> Fut + Send + 'static,
    Fut: Future<Output = Result<Ack, taskflow_api::Error>> + Send + 'static,
{
    'outer: loop {
        // Idle: wait for the next command.
        let mut current = tokio::select! {
            biased;
            _ = inner.cancel.cancelled() => break 'outer,
            command = rx.recv() => match command {
                Some(command) => command,
                None => break 'outer,
            },
        };

        // Active: run the call; a newer command restarts this loop with
        // the replacement.
        loop {
            let call_fut = call(inner.gateway.clone(), current);
            tokio::pin!(call_fut);

            tokio::select! {
                biased;
                _ = inner.cancel.cancelled() => break 'outer,
                command = rx.recv() => {
                    match command {
                        Some(next) => {
                            debug!(chain = label, "superseding in-flight request");
                            current = next;
                        }
                        None => break 'outer,
                    }
                }
                result = &mut call_fut => {
                    match result {
                        Ok(ack) => {
                            debug!(chain = label, message = %ack.message, "command acknowledged");
                            inner.dispatch(success.clone());
                        }
                        Err(e) => warn!(chain = label, error = %e, "command failed"),
                    }
                    continue 'outer;
                }
            }
        }
    }
    debug!(chain = label, "command chain exiting");
}

// ── Load chain ───────────────────────────────────────────────────────

/// Exhaust semantics: the first `Load` attaches to the snapshot stream;
/// further `Load`s are ignored while that subscription is live. Every
/// `tasks` frame becomes a `LoadSucceeded`.
async fn load_chain(inner: Arc<EngineInner>, mut rx: mpsc::UnboundedReceiver<()>) {
    'outer: loop {
        // Idle: wait for a load command.
        tokio::select! {
            biased;
            _ = inner.cancel.cancelled() => break 'outer,
            signal = rx.recv() => {
                if signal.is_none() {
                    break 'outer;
                }
            }
        }

        let mut snapshots = inner.channel.subscribe("tasks");
        debug!("snapshot stream attached");

        loop {
            tokio::select! {
                biased;
                _ = inner.cancel.cancelled() => break 'outer,
                signal = rx.recv() => {
                    match signal {
                        Some(()) => trace!("load already active, ignoring"),
                        None => break 'outer,
                    }
                }
                payload = snapshots.recv() => {
                    let Some(payload) = payload else {
                        // Stream end means the channel is gone; back to idle.
                        debug!("snapshot stream ended");
                        break;
                    };
                    match convert::decode_tasks(&payload) {
                        Ok(tasks) => inner.dispatch(Action::LoadSucceeded { tasks }),
                        Err(e) => warn!(error = %e, "malformed snapshot, skipping"),
                    }
                }
            }
        }
    }
    debug!("load chain exiting");
}

// ── Notification chain ───────────────────────────────────────────────

struct NotificationItem {
    kind: NotificationKind,
    payload: Arc<serde_json::Value>,
}

/// Switch + merge: each `SubscribeNotifications` (re)attaches the three
/// notification streams, dropping the previous subscriptions. Events
/// fan into one sequence by arrival order; a synchronously-available
/// burst collapses to its newest item (zero-delay debounce -- one
/// scheduling tick, no real delay).
async fn notification_chain(inner: Arc<EngineInner>, mut rx: mpsc::UnboundedReceiver<()>) {
    // Idle: wait for the first subscribe command.
    tokio::select! {
        biased;
        _ = inner.cancel.cancelled() => return,
        signal = rx.recv() => {
            if signal.is_none() {
                return;
            }
        }
    }

    'subscribe: loop {
        let mut add = inner.channel.subscribe("add");
        let mut update = inner.channel.subscribe("update");
        let mut delete = inner.channel.subscribe("delete");
        debug!("notification streams attached");

        loop {
            tokio::select! {
                biased;
                _ = inner.cancel.cancelled() => break 'subscribe,
                signal = rx.recv() => {
                    match signal {
                        Some(()) => {
                            debug!("resubscribing notification streams");
                            continue 'subscribe;
                        }
                        None => break 'subscribe,
                    }
                }
                item = merged_recv(&mut add, &mut update, &mut delete) => {
                    let Some(mut item) = item else {
                        debug!("notification streams ended");
                        break 'subscribe;
                    };
                    while let Some(newer) = try_merged_recv(&mut add, &mut update, &mut delete) {
                        trace!("collapsing notification burst");
                        item = newer;
                    }
                    handle_notification(&inner, &item);
                }
            }
        }
    }
    debug!("notification chain exiting");
}

/// Fan the three streams into one sequence by arrival order.
async fn merged_recv(
    add: &mut EventStream,
    update: &mut EventStream,
    delete: &mut EventStream,
) -> Option<NotificationItem> {
    tokio::select! {
        payload = add.recv() => payload.map(|payload| NotificationItem {
            kind: NotificationKind::Added,
            payload,
        }),
        payload = update.recv() => payload.map(|payload| NotificationItem {
            kind: NotificationKind::Updated,
            payload,
        }),
        payload = delete.recv() => payload.map(|payload| NotificationItem {
            kind: NotificationKind::Deleted,
            payload,
        }),
    }
}

/// Whatever is already queued right now, scanning add, update, delete.
fn try_merged_recv(
    add: &mut EventStream,
    update: &mut EventStream,
    delete: &mut EventStream,
) -> Option<NotificationItem> {
    if let Some(payload) = add.try_recv() {
        return Some(NotificationItem {
            kind: NotificationKind::Added,
            payload,
        });
    }
    if let Some(payload) = update.try_recv() {
        return Some(NotificationItem {
            kind: NotificationKind::Updated,
            payload,
        });
    }
    delete.try_recv().map(|payload| NotificationItem {
        kind: NotificationKind::Deleted,
        payload,
    })
}

/// Decode one notification, surface the toast, dispatch the action.
/// Malformed payloads are logged and skipped; the chain lives on.
fn handle_notification(inner: &EngineInner, item: &NotificationItem) {
    let action = match item.kind {
        NotificationKind::Added => match convert::decode_task_envelope(&item.payload) {
            Ok(envelope) => {
                show_toast(inner, item.kind, &envelope.notification);
                Action::NotificationAdded { envelope }
            }
            Err(e) => {
                warn!(error = %e, "malformed add notification, skipping");
                return;
            }
        },
        NotificationKind::Updated => match convert::decode_task_envelope(&item.payload) {
            Ok(envelope) => {
                show_toast(inner, item.kind, &envelope.notification);
                Action::NotificationUpdated { envelope }
            }
            Err(e) => {
                warn!(error = %e, "malformed update notification, skipping");
                return;
            }
        },
        NotificationKind::Deleted => match convert::decode_delete_envelope(&item.payload) {
            Ok(envelope) => {
                show_toast(inner, item.kind, &envelope.notification);
                Action::NotificationDeleted { envelope }
            }
            Err(e) => {
                warn!(error = %e, "malformed delete notification, skipping");
                return;
            }
        },
    };
    inner.dispatch(action);
}

fn show_toast(inner: &EngineInner, kind: NotificationKind, detail: &str) {
    inner.notifier.notify(Toast {
        summary: kind.to_string(),
        detail: detail.to_owned(),
        severity: Severity::Info,
        closable: true,
    });
}

// ── Connect chain ────────────────────────────────────────────────────

/// On every transition into `Connected` -- the initial connect and each
/// reconnect -- resynchronize from scratch: a fresh snapshot request
/// plus notification resubscription. Nothing buffered across the gap is
/// ever trusted.
async fn connect_chain(inner: Arc<EngineInner>) {
    let mut state_rx = inner.channel.state();

    // The channel may already be up by the time this chain starts.
    if matches!(*state_rx.borrow_and_update(), ChannelState::Connected) {
        resync(&inner);
    }

    loop {
        tokio::select! {
            biased;
            _ = inner.cancel.cancelled() => break,
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                if matches!(*state_rx.borrow_and_update(), ChannelState::Connected) {
                    resync(&inner);
                }
            }
        }
    }
    debug!("connect chain exiting");
}

fn resync(inner: &EngineInner) {
    info!("channel connected, resynchronizing");
    inner.dispatch(Action::Load);
    inner.dispatch(Action::SubscribeNotifications);
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn routes() -> (
        CommandRoutes,
        mpsc::UnboundedReceiver<TaskDraft>,
        mpsc::UnboundedReceiver<()>,
    ) {
        let (add, add_rx) = mpsc::unbounded_channel();
        let (update, _) = mpsc::unbounded_channel();
        let (delete, _) = mpsc::unbounded_channel();
        let (load, load_rx) = mpsc::unbounded_channel();
        let (notify, _) = mpsc::unbounded_channel();
        (
            CommandRoutes {
                add,
                update,
                delete,
                load,
                notify,
            },
            add_rx,
            load_rx,
        )
    }

    #[test]
    fn commands_route_to_their_chains() {
        let (routes, mut add_rx, mut load_rx) = routes();
        let draft = TaskDraft::new("A", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());

        route_command(&routes, Action::AddTask {
            draft: draft.clone(),
        });
        route_command(&routes, Action::Load);

        assert_eq!(add_rx.try_recv().unwrap(), draft);
        assert!(load_rx.try_recv().is_ok());
    }

    #[test]
    fn events_route_nowhere() {
        let (routes, mut add_rx, mut load_rx) = routes();

        route_command(&routes, Action::AddSucceeded);
        route_command(&routes, Action::LoadSucceeded { tasks: Vec::new() });

        assert!(add_rx.try_recv().is_err());
        assert!(load_rx.try_recv().is_err());
    }
}
