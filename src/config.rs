//! # Configuration Management
//!
//! Loads relay configuration from several sources:
//! - Built-in defaults (the `Default` impls below)
//! - An optional `config.toml`
//! - Environment variables with the `APP_` prefix (nested keys joined by `__`)
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Platform variables `HOST`, `PORT` and `OPENAI_API_KEY`
//! 2. `APP_` variables (`APP_SERVER__PORT`, `APP_RELAY__MONITOR_TOKEN`, ...)
//! 3. Configuration file (config.toml)
//! 4. Default values
//!
//! The agent instructions, voice and tool list are not part of this file. They
//! are runtime state owned by the relay and replaced through the monitor socket
//! or the REST API.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub relay: RelayConfig,
}

/// Where the HTTP/WebSocket server listens.
///
/// - `host = "127.0.0.1"`: local development
/// - `host = "0.0.0.0"`: reachable by the carrier's media-stream webhook
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// The realtime AI endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// `wss://` URL including the model query parameter
    pub url: String,

    /// Bearer credential. Required; the relay refuses to start without it.
    #[serde(default)]
    pub api_key: String,
}

/// Session limits and timers of the relay core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    pub max_concurrent_sessions: usize,

    /// Delay between `terminate` and removal, so close frames can flush
    pub termination_grace_ms: u64,

    pub health_check_interval_secs: u64,

    /// An active call with no carrier media for this long is reported by the health sweep
    pub silent_media_timeout_secs: u64,

    pub heartbeat_interval_secs: u64,
    pub client_timeout_secs: u64,

    /// Shared secret for monitor sockets and config updates. Empty disables the check.
    #[serde(default)]
    pub monitor_token: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            url: "wss://api.openai.com/v1/realtime?model=gpt-4o-realtime-preview".to_string(),
            api_key: String::new(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_concurrent_sessions: 50,
            termination_grace_ms: 1000,
            health_check_interval_secs: 30,
            silent_media_timeout_secs: 300,
            heartbeat_interval_secs: 5,
            client_timeout_secs: 30,
            monitor_token: String::new(),
        }
    }
}

impl RelayConfig {
    pub fn termination_grace(&self) -> Duration {
        Duration::from_millis(self.termination_grace_ms)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn client_timeout(&self) -> Duration {
        Duration::from_secs(self.client_timeout_secs)
    }

    /// The configured token, if monitor authentication is enabled.
    pub fn monitor_token(&self) -> Option<&str> {
        Some(self.monitor_token.as_str()).filter(|token| !token.is_empty())
    }
}

impl AppConfig {
    /// Load configuration from defaults, `config.toml` and the environment.
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER__PORT=3000`
    /// - `APP_RELAY__MAX_CONCURRENT_SESSIONS=200`
    /// - `APP_MODEL__URL=wss://...`
    /// - `HOST=0.0.0.0`, `PORT=3000`: deployment platforms
    /// - `OPENAI_API_KEY=sk-...`: the AI credential
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );

        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        if let Ok(api_key) = env::var("OPENAI_API_KEY") {
            settings = settings.set_override("model.api_key", api_key)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Reject settings the relay cannot run with.
    ///
    /// A missing AI credential is the only fatal-to-process condition.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.relay.max_concurrent_sessions == 0 {
            return Err(anyhow::anyhow!("Max concurrent sessions must be greater than 0"));
        }

        if self.relay.health_check_interval_secs == 0
            || self.relay.heartbeat_interval_secs == 0
            || self.relay.client_timeout_secs == 0
        {
            return Err(anyhow::anyhow!("Relay intervals must be greater than 0"));
        }

        if !(self.model.url.starts_with("wss://") || self.model.url.starts_with("ws://")) {
            return Err(anyhow::anyhow!(
                "Model URL must be a ws:// or wss:// URL, got '{}'",
                self.model.url
            ));
        }

        if self.model.api_key.trim().is_empty() {
            return Err(anyhow::anyhow!(
                "Missing AI credential: set OPENAI_API_KEY or APP_MODEL__API_KEY"
            ));
        }

        Ok(())
    }
}
