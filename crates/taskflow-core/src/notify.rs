// ── Notification display collaborator ──
//
// The engine decides *that* a notification occurred; rendering it is a
// collaborator concern behind this trait.

use std::fmt;

/// The three notification families and their user-facing labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum NotificationKind {
    #[strum(serialize = "Task Added")]
    Added,
    #[strum(serialize = "Task Updated")]
    Updated,
    #[strum(serialize = "Task Deleted")]
    Deleted,
}

/// Notifications are informational, never error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Severity {
    #[default]
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => f.write_str("info"),
        }
    }
}

/// One displayable notification: the fixed label plus the server's
/// human-readable description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub summary: String,
    pub detail: String,
    pub severity: Severity,
    pub closable: bool,
}

/// Receives toasts from the engine's notification chain.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, toast: Toast);
}

/// Default sink: structured log lines instead of rendered toasts.
/// Keeps the engine usable headless.
pub struct TracingNotifier;

impl NotificationSink for TracingNotifier {
    fn notify(&self, toast: Toast) {
        tracing::info!(
            summary = %toast.summary,
            detail = %toast.detail,
            severity = %toast.severity,
            "notification"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_match_the_display_contract() {
        assert_eq!(NotificationKind::Added.to_string(), "Task Added");
        assert_eq!(NotificationKind::Updated.to_string(), "Task Updated");
        assert_eq!(NotificationKind::Deleted.to_string(), "Task Deleted");
    }
}
