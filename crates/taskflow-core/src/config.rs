// ── Runtime engine configuration ──
//
// Describes *how* to reach the task service. Built by the consumer (or
// by taskflow-config from files/env) and handed in; core never reads
// disk.

use std::time::Duration;

use url::Url;

use taskflow_api::channel::{ChannelConfig, ReconnectConfig};
use taskflow_api::gateway::GatewayConfig;
use taskflow_api::{CredentialPolicy, Transport};

use crate::error::EngineError;

/// Configuration for [`SyncEngine::start`](crate::SyncEngine::start).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Service root, e.g. `http://localhost:7777`.
    pub base_url: Url,

    /// Channel endpoint. Defaults to `{base_url}/ws` when unset.
    pub channel_url: Option<Url>,

    /// Cookie handling; production profiles omit credentials.
    pub credentials: CredentialPolicy,

    /// Request timeout for gateway calls.
    pub timeout: Duration,

    /// Base reconnect delay for the channel.
    pub reconnect_base_delay: Duration,

    /// Backoff cap for the channel.
    pub reconnect_max_delay: Duration,

    /// Channel transport preference order.
    pub transports: Vec<Transport>,
}

impl EngineConfig {
    pub fn new(base_url: Url) -> Self {
        let reconnect = ReconnectConfig::default();
        Self {
            base_url,
            channel_url: None,
            credentials: CredentialPolicy::Include,
            timeout: Duration::from_secs(30),
            reconnect_base_delay: reconnect.base_delay,
            reconnect_max_delay: reconnect.max_delay,
            transports: vec![Transport::WebSocket, Transport::Polling],
        }
    }

    pub(crate) fn gateway_config(&self) -> GatewayConfig {
        let mut config = GatewayConfig::new(self.base_url.clone());
        config.credentials = self.credentials;
        config.timeout = self.timeout;
        config
    }

    pub(crate) fn channel_config(&self) -> Result<ChannelConfig, EngineError> {
        let url = match &self.channel_url {
            Some(url) => url.clone(),
            None => self.base_url.join("/ws").map_err(|e| EngineError::Config {
                message: format!("cannot derive channel URL from {}: {e}", self.base_url),
            })?,
        };

        let mut config = ChannelConfig::new(url);
        config.reconnect.base_delay = self.reconnect_base_delay;
        config.reconnect.max_delay = self.reconnect_max_delay;
        config.transports = self.transports.clone();
        Ok(config)
    }
}
