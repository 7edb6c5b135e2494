//! Operator console socket.
//!
//! Monitors see every session's events, can join a session as a listener and
//! speak into the call. When `relay.monitor_token` is configured, the upgrade
//! requires a matching `?token=` query parameter.

use std::collections::HashMap;

use actix::prelude::*;
use actix_web::{web, HttpRequest, HttpResponse, Result as ActixResult};
use actix_web_actors::ws;
use serde_json::json;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, error, info, warn};

use super::{write_frame, Liveness};
use crate::relay::messages::{MonitorConnected, MonitorDisconnected, MonitorFrame};
use crate::relay::peer::{OutboundFrame, PeerSink};
use crate::relay::Relay;
use crate::state::AppState;

pub struct MonitorSocket {
    relay: Addr<Relay>,
    sink: PeerSink,
    outbound: Option<UnboundedReceiver<OutboundFrame>>,
    liveness: Liveness,
}

impl MonitorSocket {
    pub fn new(relay: Addr<Relay>, liveness: Liveness) -> Self {
        let (sink, outbound) = PeerSink::channel();
        Self {
            relay,
            sink,
            outbound: Some(outbound),
            liveness,
        }
    }
}

impl Actor for MonitorSocket {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        ctx.run_interval(self.liveness.interval, |act, ctx| {
            if act.liveness.expired_at(std::time::Instant::now()) {
                warn!(monitor = %act.sink.id(), "Monitor heartbeat timeout, closing connection");
                ctx.stop();
            } else {
                ctx.ping(b"");
            }
        });

        if let Some(rx) = self.outbound.take() {
            ctx.add_stream(UnboundedReceiverStream::new(rx));
        }
        self.relay.do_send(MonitorConnected {
            sink: self.sink.clone(),
        });
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        info!(monitor = %self.sink.id(), "Monitor connection stopped");
        self.sink.close();
        self.relay.do_send(MonitorDisconnected {
            sink: self.sink.clone(),
        });
    }
}

impl StreamHandler<OutboundFrame> for MonitorSocket {
    fn handle(&mut self, frame: OutboundFrame, ctx: &mut Self::Context) {
        write_frame(frame, ctx);
    }

    fn finished(&mut self, _ctx: &mut Self::Context) {}
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for MonitorSocket {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Text(text)) => {
                self.liveness.touch();
                self.relay.do_send(MonitorFrame {
                    sink: self.sink.clone(),
                    text: text.to_string(),
                });
            }
            Ok(ws::Message::Binary(data)) => {
                self.liveness.touch();
                debug!(len = data.len(), "Ignoring binary monitor frame");
            }
            Ok(ws::Message::Ping(data)) => {
                ctx.pong(&data);
                self.liveness.touch();
            }
            Ok(ws::Message::Pong(_)) => {
                self.liveness.touch();
            }
            Ok(ws::Message::Close(reason)) => {
                info!(monitor = %self.sink.id(), "Monitor closed the socket: {:?}", reason);
                ctx.close(reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) => {
                warn!("Received unexpected continuation frame from monitor");
            }
            Ok(ws::Message::Nop) => {}
            Err(err) => {
                error!(monitor = %self.sink.id(), "Monitor protocol error: {}", err);
                ctx.stop();
            }
        }
    }
}

/// True when no token is configured or the query carries the configured one.
pub fn token_accepted(expected: Option<&str>, query: &HashMap<String, String>) -> bool {
    match expected {
        None => true,
        Some(token) => query.get("token").map(String::as_str) == Some(token),
    }
}

/// Upgrade `GET /logs` to a monitor socket.
pub async fn monitor_socket(
    req: HttpRequest,
    stream: web::Payload,
    app_state: web::Data<AppState>,
) -> ActixResult<HttpResponse> {
    let query = web::Query::<HashMap<String, String>>::from_query(req.query_string())
        .unwrap_or_else(|_| web::Query(HashMap::new()));

    if !token_accepted(app_state.config.relay.monitor_token(), &query) {
        warn!("Rejected monitor connection from {:?}: bad token", req.connection_info().peer_addr());
        return Ok(HttpResponse::Unauthorized().json(json!({
            "error": {
                "type": "unauthorized",
                "message": "Missing or invalid monitor token",
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        })));
    }

    info!("New monitor connection from: {:?}", req.connection_info().peer_addr());
    let socket = MonitorSocket::new(app_state.relay.clone(), app_state.liveness());
    ws::start(socket, &req, stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_check() {
        let mut query = HashMap::new();
        assert!(token_accepted(None, &query));
        assert!(!token_accepted(Some("secret"), &query));

        query.insert("token".to_string(), "wrong".to_string());
        assert!(!token_accepted(Some("secret"), &query));

        query.insert("token".to_string(), "secret".to_string());
        assert!(token_accepted(Some("secret"), &query));
    }
}
