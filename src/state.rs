//! # Application State
//!
//! Shared by every HTTP handler and socket upgrade.
//!
//! ## Pattern:
//! There is no lock in here. Everything that changes at runtime (sessions,
//! monitors, the agent config, counters) lives inside the [`Relay`] actor and
//! is reached by sending it a message through `relay`. What is left is
//! read-only after startup and shared through `Arc`.

use std::sync::Arc;
use std::time::Instant;

use actix::Addr;

use crate::config::AppConfig;
use crate::relay::Relay;
use crate::tools::ToolRegistry;
use crate::websocket::Liveness;

#[derive(Clone)]
pub struct AppState {
    /// Startup configuration; runtime changes go through the relay instead
    pub config: Arc<AppConfig>,

    /// Mailbox of the relay actor
    pub relay: Addr<Relay>,

    /// The same registry the relay dispatches against
    pub tools: Arc<ToolRegistry>,

    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, relay: Addr<Relay>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            config,
            relay,
            tools,
            start_time: Instant::now(),
        }
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Heartbeat settings for a newly accepted socket.
    pub fn liveness(&self) -> Liveness {
        Liveness::new(
            self.config.relay.heartbeat_interval(),
            self.config.relay.client_timeout(),
        )
    }
}
