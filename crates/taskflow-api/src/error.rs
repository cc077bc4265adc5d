use thiserror::Error;

/// Top-level error type for the `taskflow-api` crate.
///
/// Covers every failure mode across both transport surfaces: the HTTP
/// gateway and the realtime channel. `taskflow-core` maps these into
/// consumer-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── HTTP gateway ────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success HTTP status from the server.
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// A successful response carried a structurally empty body.
    /// Empty-success is not valid for this API.
    #[error("Response body is empty!")]
    EmptyBody,

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── Channel ─────────────────────────────────────────────────────
    /// Channel connection failed (handshake, transport drop, poll error).
    #[error("Channel connection failed: {0}")]
    ChannelConnect(String),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}
