//! Messages accepted by the [`Relay`](super::Relay) actor.
//!
//! Socket actors send frames and lifecycle events; REST handlers and tool
//! handlers send the control requests.

use actix::Message;
use uuid::Uuid;

use super::agent::AgentConfig;
use super::health::HealthReport;
use super::metrics::MetricsSnapshot;
use super::peer::PeerSink;
use super::registry::SessionInfo;
use crate::error::RelayError;

/// A carrier socket was accepted. Replies with the new session id.
#[derive(Message)]
#[rtype(result = "Result<String, RelayError>")]
pub struct CarrierConnected {
    pub sink: PeerSink,
}

/// Text frame from a carrier socket.
#[derive(Message)]
#[rtype(result = "()")]
pub struct CarrierFrame {
    pub session_id: String,
    pub text: String,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct CarrierClosed {
    pub session_id: String,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct MonitorConnected {
    pub sink: PeerSink,
}

/// Text frame from a monitor socket; `sink` identifies the sender.
#[derive(Message)]
#[rtype(result = "()")]
pub struct MonitorFrame {
    pub sink: PeerSink,
    pub text: String,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct MonitorDisconnected {
    pub sink: PeerSink,
}

/// Traffic from an AI socket task, delivered as a stream on the relay.
///
/// `peer` is the id of the AI sink the frame came from, so frames of a
/// replaced or detached connection can be told apart.
#[derive(Debug)]
pub enum ModelInbound {
    Frame {
        session_id: String,
        peer: Uuid,
        text: String,
    },
    Closed {
        session_id: String,
        peer: Uuid,
        reason: String,
    },
}

/// Begin terminating a call; removal follows after the grace delay.
#[derive(Message)]
#[rtype(result = "Result<(), RelayError>")]
pub struct TerminateCall {
    pub session_id: String,
    pub reason: String,
}

/// Send a DTMF digit to the carrier on behalf of the agent or an API client.
#[derive(Message)]
#[rtype(result = "Result<(), RelayError>")]
pub struct SendDtmf {
    pub session_id: String,
    pub digit: String,
}

#[derive(Message)]
#[rtype(result = "Vec<SessionInfo>")]
pub struct ListSessions;

#[derive(Message)]
#[rtype(result = "AgentConfig")]
pub struct GetAgentConfig;

/// Replace the agent config wholesale.
#[derive(Message)]
#[rtype(result = "()")]
pub struct UpdateAgentConfig {
    pub config: AgentConfig,
}

#[derive(Message)]
#[rtype(result = "HealthReport")]
pub struct GetHealth;

#[derive(Message)]
#[rtype(result = "MetricsSnapshot")]
pub struct GetMetrics;
