// taskflow-core: Reactive synchronization layer between taskflow-api and UI consumers.

pub mod action;
pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod model;
pub mod notify;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use action::Action;
pub use config::EngineConfig;
pub use engine::SyncEngine;
pub use error::EngineError;
pub use model::{DeleteRef, NotificationEnvelope, TaskDraft, TaskEntity, TaskId};
pub use notify::{NotificationKind, NotificationSink, Severity, Toast, TracingNotifier};
pub use store::{TaskStore, TasksState, reduce};

// Transport-layer types consumers configure or observe directly.
pub use taskflow_api::{ChannelState, CredentialPolicy, Transport};
