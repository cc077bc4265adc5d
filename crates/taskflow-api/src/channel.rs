//! Realtime channel client with auto-reconnect.
//!
//! Owns one persistent duplex connection to the task service and routes
//! `{ "event": ..., "data": ... }` frames into independent per-event
//! streams. Reconnection is automatic (exponential backoff + jitter over
//! a 300 ms base); the connection state is observable through a
//! [`tokio::sync::watch`] channel so callers can resynchronize after a
//! gap. Transports are tried in preference order: WebSocket first, HTTP
//! long-polling as the fallback.
//!
//! # Example
//!
//! ```rust,ignore
//! use taskflow_api::channel::{ChannelConfig, ChannelHandle};
//! use tokio_util::sync::CancellationToken;
//!
//! let cancel = CancellationToken::new();
//! let config = ChannelConfig::new("http://localhost:7777/ws".parse()?);
//!
//! let handle = ChannelHandle::connect(config, cancel.clone())?;
//! let mut adds = handle.subscribe("add");
//!
//! while let Some(payload) = adds.recv().await {
//!     println!("add: {payload}");
//! }
//!
//! handle.shutdown();
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;

// ── Broadcast channel capacity ───────────────────────────────────────

const EVENT_CHANNEL_CAPACITY: usize = 256;

// ── ChannelFrame ─────────────────────────────────────────────────────

/// One frame on the wire: a named event plus its JSON payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelFrame {
    pub event: String,
    pub data: serde_json::Value,
}

// ── Transport ────────────────────────────────────────────────────────

/// How frames reach the client. Tried in configured preference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    WebSocket,
    Polling,
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Backoff configuration for reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Base delay before the first reconnection attempt. Default: 300 ms.
    pub base_delay: Duration,

    /// Upper bound on backoff delay. Default: 5 s.
    pub max_delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(300),
            max_delay: Duration::from_secs(5),
        }
    }
}

// ── ChannelConfig ────────────────────────────────────────────────────

/// Configuration for [`ChannelHandle::connect`].
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Channel endpoint as an http(s) URL; the websocket transport
    /// rewrites the scheme to ws(s) itself.
    pub url: Url,
    pub reconnect: ReconnectConfig,
    /// Transport preference order.
    pub transports: Vec<Transport>,
}

impl ChannelConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            reconnect: ReconnectConfig::default(),
            transports: vec![Transport::WebSocket, Transport::Polling],
        }
    }
}

// ── ChannelState ─────────────────────────────────────────────────────

/// Connection state observable by consumers.
///
/// Every transition into [`Connected`](Self::Connected) — the initial
/// connect and every reconnect — is the signal to re-request a fresh
/// snapshot; the adapter itself never touches consumer state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
}

// ── ChannelHandle ────────────────────────────────────────────────────

/// Handle to a running channel connection.
pub struct ChannelHandle {
    shared: Arc<ChannelShared>,
    cancel: CancellationToken,
}

impl ChannelHandle {
    /// Spawn the connection loop and return immediately.
    ///
    /// The first connection attempt happens asynchronously -- watch
    /// [`state`](Self::state) for [`ChannelState::Connected`].
    pub fn connect(config: ChannelConfig, cancel: CancellationToken) -> Result<Self, Error> {
        // Long-poll requests must outlive any client-side timeout, so the
        // polling transport gets its own untimed client.
        let http = reqwest::Client::builder()
            .user_agent("taskflow/0.1.0")
            .build()
            .map_err(Error::Transport)?;

        let shared = Arc::new(ChannelShared::new());

        let task_shared = Arc::clone(&shared);
        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            channel_loop(config, task_shared, task_cancel, http).await;
        });

        Ok(Self { shared, cancel })
    }

    /// Subscribe to a named server event.
    ///
    /// Each live subscription holds a slot in the listener table; the
    /// routing listener attaches on the 0→1 subscriber transition and
    /// detaches on 1→0. Frames for events with no live subscribers are
    /// dropped, not buffered.
    pub fn subscribe(&self, event: &str) -> EventStream {
        self.shared.subscribe(event)
    }

    /// Observe connection state changes.
    pub fn state(&self) -> watch::Receiver<ChannelState> {
        self.shared.state.subscribe()
    }

    /// Signal the connection loop to shut down gracefully.
    ///
    /// Open event streams end (their senders drop when the listener
    /// table clears) rather than blocking forever.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ── Listener table ───────────────────────────────────────────────────

struct EventSlot {
    tx: broadcast::Sender<Arc<serde_json::Value>>,
    subscribers: AtomicUsize,
}

struct ChannelShared {
    listeners: DashMap<String, EventSlot>,
    state: watch::Sender<ChannelState>,
}

impl ChannelShared {
    fn new() -> Self {
        let (state, _) = watch::channel(ChannelState::Disconnected);
        Self {
            listeners: DashMap::new(),
            state,
        }
    }

    fn subscribe(self: &Arc<Self>, event: &str) -> EventStream {
        let rx = {
            let slot = self
                .listeners
                .entry(event.to_owned())
                .or_insert_with(|| {
                    tracing::debug!(event, "attaching channel listener");
                    let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
                    EventSlot {
                        tx,
                        subscribers: AtomicUsize::new(0),
                    }
                });
            slot.subscribers.fetch_add(1, Ordering::SeqCst);
            slot.tx.subscribe()
        };

        EventStream {
            rx,
            _guard: ListenerGuard {
                shared: Arc::clone(self),
                event: event.to_owned(),
            },
        }
    }
}

/// Decrements the subscriber count on drop; removes the listener at the
/// 1→0 transition.
struct ListenerGuard {
    shared: Arc<ChannelShared>,
    event: String,
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        if let Some(slot) = self.shared.listeners.get(&self.event) {
            slot.subscribers.fetch_sub(1, Ordering::SeqCst);
        }

        let removed = self
            .shared
            .listeners
            .remove_if(&self.event, |_, slot| {
                slot.subscribers.load(Ordering::SeqCst) == 0
            });

        if removed.is_some() {
            tracing::debug!(event = %self.event, "detaching channel listener");
        }
    }
}

// ── EventStream ──────────────────────────────────────────────────────

/// A subscription to one named server event.
pub struct EventStream {
    rx: broadcast::Receiver<Arc<serde_json::Value>>,
    _guard: ListenerGuard,
}

impl EventStream {
    /// Receive the next payload. `None` once the channel shuts down.
    ///
    /// A lagging subscriber skips past the missed frames and keeps
    /// receiving; one slow consumer never kills the stream.
    pub async fn recv(&mut self) -> Option<Arc<serde_json::Value>> {
        loop {
            match self.rx.recv().await {
                Ok(payload) => return Some(payload),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event stream lagged, skipping");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv): the next payload
    /// already queued, or `None` when nothing is immediately available.
    pub fn try_recv(&mut self) -> Option<Arc<serde_json::Value>> {
        loop {
            match self.rx.try_recv() {
                Ok(payload) => return Some(payload),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event stream lagged, skipping");
                }
                Err(
                    broadcast::error::TryRecvError::Empty
                    | broadcast::error::TryRecvError::Closed,
                ) => return None,
            }
        }
    }
}

// ── Background connection loop ───────────────────────────────────────

/// Main loop: connect → read → on error, backoff → reconnect.
async fn channel_loop(
    config: ChannelConfig,
    shared: Arc<ChannelShared>,
    cancel: CancellationToken,
    http: reqwest::Client,
) {
    let _ = shared.state.send(ChannelState::Connecting);
    let mut attempt: u32 = 0;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = connect_once(&config, &shared, &cancel, &http) => {
                match result {
                    // Clean disconnect (server close frame or stream ended).
                    // Reset attempt counter and reconnect immediately.
                    Ok(()) => {
                        tracing::info!("channel disconnected cleanly, reconnecting");
                        attempt = 0;
                        let _ = shared.state.send(ChannelState::Reconnecting { attempt: 0 });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, attempt, "channel error");
                        let _ = shared.state.send(ChannelState::Reconnecting { attempt });

                        let delay = reconnect_backoff(attempt, &config.reconnect);
                        tracing::debug!(
                            delay_ms = delay.as_millis() as u64,
                            attempt,
                            "waiting before reconnect"
                        );

                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => break,
                            _ = tokio::time::sleep(delay) => {}
                        }

                        attempt = attempt.saturating_add(1);
                    }
                }
            }
        }
    }

    let _ = shared.state.send(ChannelState::Disconnected);
    // Dropping the senders ends every open EventStream.
    shared.listeners.clear();
    tracing::debug!("channel loop exiting");
}

/// One connection cycle: try each transport in preference order.
///
/// A transport that fails before reaching `Connected` falls through to
/// the next one; a drop of a live connection propagates immediately so
/// the next cycle starts from the preferred transport again.
async fn connect_once(
    config: &ChannelConfig,
    shared: &Arc<ChannelShared>,
    cancel: &CancellationToken,
    http: &reqwest::Client,
) -> Result<(), Error> {
    let mut last_err = None;

    for transport in &config.transports {
        let result = match transport {
            Transport::WebSocket => run_websocket(&config.url, shared, cancel).await,
            Transport::Polling => run_polling(&config.url, shared, cancel, http).await,
        };

        match result {
            Ok(()) => return Ok(()),
            Err(e) => {
                if *shared.state.borrow() == ChannelState::Connected {
                    return Err(e);
                }
                tracing::debug!(?transport, error = %e, "transport unavailable, trying next");
                last_err = Some(e);
            }
        }
    }

    Err(last_err.unwrap_or_else(|| Error::ChannelConnect("no transports configured".into())))
}

// ── WebSocket transport ──────────────────────────────────────────────

/// Establish a websocket connection and read frames until it drops.
async fn run_websocket(
    url: &Url,
    shared: &Arc<ChannelShared>,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    let ws_url = websocket_url(url)?;
    tracing::debug!(url = %ws_url, "connecting websocket transport");

    let uri: tungstenite::http::Uri = ws_url
        .as_str()
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| Error::ChannelConnect(e.to_string()))?;

    let request = ClientRequestBuilder::new(uri);
    let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| Error::ChannelConnect(e.to_string()))?;

    tracing::info!("channel connected (websocket)");
    let _ = shared.state.send(ChannelState::Connected);

    let (_write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        route_frame(shared, &text);
                    }
                    Some(Ok(tungstenite::Message::Ping(_))) => {
                        // tungstenite handles pong replies automatically
                        tracing::trace!("channel ping");
                    }
                    Some(Ok(tungstenite::Message::Close(_))) => {
                        tracing::info!("channel close frame received");
                        return Ok(());
                    }
                    Some(Err(e)) => {
                        return Err(Error::ChannelConnect(e.to_string()));
                    }
                    None => {
                        // Stream ended without a close frame
                        tracing::info!("channel stream ended");
                        return Ok(());
                    }
                    _ => {
                        // Binary, Pong, Frame -- ignore
                    }
                }
            }
        }
    }
}

/// Rewrite an http(s) endpoint to its ws(s) form.
fn websocket_url(url: &Url) -> Result<Url, Error> {
    let mut ws_url = url.clone();
    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        _ => "ws",
    };
    ws_url
        .set_scheme(scheme)
        .map_err(|()| Error::ChannelConnect(format!("cannot derive websocket URL from {url}")))?;
    Ok(ws_url)
}

// ── Polling transport ────────────────────────────────────────────────

/// Response shape of the long-poll endpoint.
#[derive(Debug, Deserialize)]
struct PollBatch {
    cursor: u64,
    #[serde(default)]
    frames: Vec<ChannelFrame>,
}

/// Long-poll the channel endpoint, routing each returned frame.
///
/// `GET {url}?transport=polling&cursor={n}` blocks server-side until
/// frames are available; the returned cursor feeds the next poll.
async fn run_polling(
    url: &Url,
    shared: &Arc<ChannelShared>,
    cancel: &CancellationToken,
    http: &reqwest::Client,
) -> Result<(), Error> {
    tracing::debug!(url = %url, "connecting polling transport");

    let mut cursor: u64 = 0;
    let mut connected = false;

    loop {
        let mut poll_url = url.clone();
        poll_url
            .query_pairs_mut()
            .append_pair("transport", "polling")
            .append_pair("cursor", &cursor.to_string());

        let batch = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            result = poll_once(http, poll_url) => result?,
        };

        if !connected {
            tracing::info!("channel connected (polling)");
            let _ = shared.state.send(ChannelState::Connected);
            connected = true;
        }

        cursor = batch.cursor;
        for frame in batch.frames {
            dispatch_frame(shared, frame);
        }
    }
}

async fn poll_once(http: &reqwest::Client, url: Url) -> Result<PollBatch, Error> {
    let response = http.get(url).send().await.map_err(Error::Transport)?;
    let status = response.status();

    if !status.is_success() {
        return Err(Error::ChannelConnect(format!(
            "polling request failed: HTTP {status}"
        )));
    }

    response.json().await.map_err(Error::Transport)
}

// ── Frame routing ────────────────────────────────────────────────────

/// Parse a text frame and route it. Malformed frames are logged and
/// skipped; one bad frame never drops the connection.
fn route_frame(shared: &ChannelShared, text: &str) {
    match serde_json::from_str::<ChannelFrame>(text) {
        Ok(frame) => dispatch_frame(shared, frame),
        Err(e) => tracing::debug!(error = %e, "failed to parse channel frame"),
    }
}

/// Hand a frame to its event's subscribers, if any are listening.
fn dispatch_frame(shared: &ChannelShared, frame: ChannelFrame) {
    match shared.listeners.get(&frame.event) {
        // Ignore send errors -- just means the last receiver raced away
        Some(slot) => {
            let _ = slot.tx.send(Arc::new(frame.data));
        }
        None => tracing::trace!(event = %frame.event, "no subscribers, dropping frame"),
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter over the 300 ms base.
///
/// `delay = min(base * 2^attempt, max) + jitter`
///
/// Jitter is +-25% to spread out reconnection storms from multiple clients.
fn reconnect_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let base = config.base_delay.as_secs_f64() * 2.0_f64.powi(attempt.min(16) as i32);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic "jitter" seeded from the attempt number.
    // Not cryptographically random, but good enough for backoff spread.
    let jitter_factor = 1.0 + 0.25 * ((f64::from(attempt) * 7.3).sin());
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────
