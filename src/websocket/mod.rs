//! # WebSocket Endpoints
//!
//! - `GET /call`: the carrier's media stream, one [`carrier::CarrierSocket`] per call
//! - `GET /logs`: operator consoles, one [`monitor::MonitorSocket`] each
//! - the AI realtime client, opened by [`model::RealtimeConnector`]
//!
//! Socket actors hold no call state. They forward text frames to the relay and
//! write whatever the relay queues on their [`PeerSink`](crate::relay::peer::PeerSink).

pub mod carrier;
pub mod model;
pub mod monitor;

use std::time::{Duration, Instant};

use actix::prelude::*;
use actix_web_actors::ws;

use crate::relay::peer::OutboundFrame;

pub use carrier::carrier_socket;
pub use model::RealtimeConnector;
pub use monitor::monitor_socket;

/// Pong bookkeeping for a server-side socket.
#[derive(Debug, Clone, Copy)]
pub struct Liveness {
    last_seen: Instant,
    pub interval: Duration,
    pub timeout: Duration,
}

impl Liveness {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            last_seen: Instant::now(),
            interval,
            timeout,
        }
    }

    /// Record traffic from the client.
    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    pub fn expired_at(&self, now: Instant) -> bool {
        now.duration_since(self.last_seen) > self.timeout
    }
}

/// Write a relay-queued frame to the socket. A close request also stops the actor.
pub fn write_frame<A>(frame: OutboundFrame, ctx: &mut ws::WebsocketContext<A>)
where
    A: Actor<Context = ws::WebsocketContext<A>>,
{
    match frame {
        OutboundFrame::Text(text) => ctx.text(text),
        OutboundFrame::Close => {
            ctx.close(Some(ws::CloseCode::Normal.into()));
            ctx.stop();
        }
    }
}
