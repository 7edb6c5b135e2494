//! Carrier media-stream socket.
//!
//! The carrier dials `/call` once per phone call. The socket registers with
//! the relay before reading any frame, so every frame it forwards carries the
//! session id the relay assigned.

use actix::prelude::*;
use actix_web::{web, HttpRequest, HttpResponse, Result as ActixResult};
use actix_web_actors::ws;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, error, info, warn};

use super::{write_frame, Liveness};
use crate::relay::messages::{CarrierClosed, CarrierConnected, CarrierFrame};
use crate::relay::peer::{OutboundFrame, PeerSink};
use crate::relay::Relay;
use crate::state::AppState;

pub struct CarrierSocket {
    relay: Addr<Relay>,
    session_id: Option<String>,
    sink: PeerSink,
    outbound: Option<UnboundedReceiver<OutboundFrame>>,
    liveness: Liveness,
}

impl CarrierSocket {
    pub fn new(relay: Addr<Relay>, liveness: Liveness) -> Self {
        let (sink, outbound) = PeerSink::channel();
        Self {
            relay,
            session_id: None,
            sink,
            outbound: Some(outbound),
            liveness,
        }
    }

    fn heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(self.liveness.interval, |act, ctx| {
            if act.liveness.expired_at(std::time::Instant::now()) {
                warn!(session_id = ?act.session_id, "Carrier heartbeat timeout, closing connection");
                ctx.stop();
            } else {
                ctx.ping(b"");
            }
        });
    }
}

impl Actor for CarrierSocket {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.heartbeat(ctx);
        if let Some(rx) = self.outbound.take() {
            ctx.add_stream(UnboundedReceiverStream::new(rx));
        }

        // Hold back inbound frames until the relay has assigned a session
        self.relay
            .send(CarrierConnected {
                sink: self.sink.clone(),
            })
            .into_actor(self)
            .map(|result, act, ctx| match result {
                Ok(Ok(session_id)) => {
                    info!(session_id = %session_id, "Carrier connected");
                    act.session_id = Some(session_id);
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "Rejecting carrier connection");
                    ctx.close(Some(ws::CloseReason {
                        code: ws::CloseCode::Again,
                        description: Some(e.to_string()),
                    }));
                    ctx.stop();
                }
                Err(e) => {
                    error!(error = %e, "Relay unavailable for carrier connection");
                    ctx.close(Some(ws::CloseCode::Error.into()));
                    ctx.stop();
                }
            })
            .wait(ctx);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        self.sink.close();
        if let Some(session_id) = self.session_id.take() {
            info!(session_id = %session_id, "Carrier connection stopped");
            self.relay.do_send(CarrierClosed { session_id });
        }
    }
}

impl StreamHandler<OutboundFrame> for CarrierSocket {
    fn handle(&mut self, frame: OutboundFrame, ctx: &mut Self::Context) {
        write_frame(frame, ctx);
    }

    fn finished(&mut self, _ctx: &mut Self::Context) {}
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for CarrierSocket {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Text(text)) => {
                self.liveness.touch();
                if let Some(session_id) = &self.session_id {
                    self.relay.do_send(CarrierFrame {
                        session_id: session_id.clone(),
                        text: text.to_string(),
                    });
                }
            }
            Ok(ws::Message::Binary(data)) => {
                self.liveness.touch();
                debug!(len = data.len(), "Ignoring binary carrier frame");
            }
            Ok(ws::Message::Ping(data)) => {
                ctx.pong(&data);
                self.liveness.touch();
            }
            Ok(ws::Message::Pong(_)) => {
                self.liveness.touch();
            }
            Ok(ws::Message::Close(reason)) => {
                info!(session_id = ?self.session_id, "Carrier closed the socket: {:?}", reason);
                ctx.close(reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) => {
                warn!("Received unexpected continuation frame from carrier");
            }
            Ok(ws::Message::Nop) => {}
            Err(err) => {
                error!(session_id = ?self.session_id, "Carrier protocol error: {}", err);
                ctx.stop();
            }
        }
    }
}

/// Upgrade `GET /call` to a carrier media stream.
pub async fn carrier_socket(
    req: HttpRequest,
    stream: web::Payload,
    app_state: web::Data<AppState>,
) -> ActixResult<HttpResponse> {
    info!("New carrier connection from: {:?}", req.connection_info().peer_addr());

    let socket = CarrierSocket::new(app_state.relay.clone(), app_state.liveness());
    ws::start(socket, &req, stream)
}
