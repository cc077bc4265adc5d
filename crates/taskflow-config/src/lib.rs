//! Configuration for taskflow consumers.
//!
//! TOML profiles with environment overrides, resolved into a
//! `taskflow_core::EngineConfig`. The core crate never reads disk;
//! binaries and UI shells load a profile here and hand the result in.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use taskflow_core::{CredentialPolicy, EngineConfig, Transport};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no profile named '{profile}'")]
    UnknownProfile { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Named service profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            profiles: HashMap::new(),
        }
    }
}

/// A named service profile.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Profile {
    /// Service root URL (e.g., "http://localhost:7777").
    pub url: String,

    /// Channel endpoint override; derived from `url` when unset.
    pub channel_url: Option<String>,

    /// Cookie policy: "include" or "omit". Production profiles omit.
    #[serde(default = "default_credentials")]
    pub credentials: String,

    /// Request timeout in seconds.
    pub timeout: Option<u64>,

    /// Channel reconnect base delay in milliseconds.
    pub reconnect_delay_ms: Option<u64>,

    /// Channel reconnect backoff cap in milliseconds.
    pub reconnect_max_delay_ms: Option<u64>,

    /// Transport preference order ("websocket", "polling").
    pub transports: Option<Vec<Transport>>,
}

fn default_credentials() -> String {
    "include".into()
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("rs", "taskflow", "taskflow").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("taskflow");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical path + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the full Config from an explicit file + environment.
///
/// Environment keys use `TASKFLOW_` with `__` as the nesting separator,
/// e.g. `TASKFLOW_PROFILES__LOCAL__URL=http://localhost:7777`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("TASKFLOW_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    let path = config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(&path, toml_str)?;
    Ok(())
}

// ── Profile resolution ──────────────────────────────────────────────

/// Pick a profile by explicit name, falling back to the config default.
pub fn select_profile<'a>(
    config: &'a Config,
    name: Option<&str>,
) -> Result<(&'a str, &'a Profile), ConfigError> {
    let name = name
        .or(config.default_profile.as_deref())
        .unwrap_or("default");

    config
        .profiles
        .get_key_value(name)
        .map(|(key, profile)| (key.as_str(), profile))
        .ok_or_else(|| ConfigError::UnknownProfile {
            profile: name.into(),
        })
}

/// Build an `EngineConfig` from a profile.
pub fn profile_to_engine_config(profile: &Profile) -> Result<EngineConfig, ConfigError> {
    let base_url: url::Url = profile.url.parse().map_err(|_| ConfigError::Validation {
        field: "url".into(),
        reason: format!("invalid URL: {}", profile.url),
    })?;

    let mut config = EngineConfig::new(base_url);

    if let Some(ref channel) = profile.channel_url {
        config.channel_url = Some(channel.parse().map_err(|_| ConfigError::Validation {
            field: "channel_url".into(),
            reason: format!("invalid URL: {channel}"),
        })?);
    }

    config.credentials = match profile.credentials.as_str() {
        "include" => CredentialPolicy::Include,
        "omit" => CredentialPolicy::Omit,
        other => {
            return Err(ConfigError::Validation {
                field: "credentials".into(),
                reason: format!("expected 'include' or 'omit', got '{other}'"),
            });
        }
    };

    if let Some(secs) = profile.timeout {
        config.timeout = Duration::from_secs(secs);
    }
    if let Some(ms) = profile.reconnect_delay_ms {
        config.reconnect_base_delay = Duration::from_millis(ms);
    }
    if let Some(ms) = profile.reconnect_max_delay_ms {
        config.reconnect_max_delay = Duration::from_millis(ms);
    }

    if let Some(ref transports) = profile.transports {
        if transports.is_empty() {
            return Err(ConfigError::Validation {
                field: "transports".into(),
                reason: "at least one transport is required".into(),
            });
        }
        config.transports = transports.clone();
    }

    Ok(config)
}

/// Load, select, and resolve in one step.
pub fn engine_config(profile_name: Option<&str>) -> Result<EngineConfig, ConfigError> {
    let config = load_config()?;
    let (_, profile) = select_profile(&config, profile_name)?;
    profile_to_engine_config(profile)
}

// ── Tests ───────────────────────────────────────────────────────────
