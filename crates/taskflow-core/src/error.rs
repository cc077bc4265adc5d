// ── Engine error types ──
//
// Consumer-facing errors from taskflow-core. Transport details stay in
// taskflow-api; the `From` impl translates them into domain-appropriate
// variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Cannot connect to service at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    #[error("Malformed channel payload: {message}")]
    MalformedPayload { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<taskflow_api::Error> for EngineError {
    fn from(err: taskflow_api::Error) -> Self {
        match err {
            taskflow_api::Error::Transport(ref e) => {
                if e.is_timeout() || e.is_connect() {
                    EngineError::ConnectionFailed {
                        url: e
                            .url()
                            .map(|u| u.to_string())
                            .unwrap_or_else(|| "<unknown>".into()),
                        reason: e.to_string(),
                    }
                } else {
                    EngineError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            taskflow_api::Error::Status { status, message } => EngineError::Api {
                message,
                status: Some(status),
            },
            taskflow_api::Error::EmptyBody => EngineError::Api {
                message: "Response body is empty!".into(),
                status: None,
            },
            taskflow_api::Error::InvalidUrl(e) => EngineError::Config {
                message: format!("Invalid URL: {e}"),
            },
            taskflow_api::Error::ChannelConnect(reason) => EngineError::ConnectionFailed {
                url: String::new(),
                reason,
            },
            taskflow_api::Error::Deserialization { message, body: _ } => {
                EngineError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}
