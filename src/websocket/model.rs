//! Realtime AI client.
//!
//! One tokio task per call owns the AI socket. It writes whatever the relay
//! queues on the connection's [`PeerSink`] and posts every text frame it reads,
//! and finally the reason the socket ended, back to the relay as
//! [`ModelInbound`] items.

use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::ModelConfig;
use crate::relay::messages::ModelInbound;
use crate::relay::peer::{OutboundFrame, PeerSink};
use crate::relay::ModelConnector;

/// Opens connections to the configured realtime endpoint.
#[derive(Debug, Clone)]
pub struct RealtimeConnector {
    url: String,
    api_key: String,
}

impl RealtimeConnector {
    pub fn new(config: &ModelConfig) -> Self {
        Self {
            url: config.url.clone(),
            api_key: config.api_key.clone(),
        }
    }

    /// Upgrade request with the bearer credential and the realtime beta header.
    pub fn request(&self) -> Result<Request> {
        let mut request = self.url.as_str().into_client_request()?;
        let headers = request.headers_mut();
        headers.insert(
            "Authorization",
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))?,
        );
        headers.insert("OpenAI-Beta", HeaderValue::from_static("realtime=v1"));
        Ok(request)
    }
}

impl ModelConnector for RealtimeConnector {
    fn connect(&self, session_id: &str, inbound: UnboundedSender<ModelInbound>) -> PeerSink {
        let (sink, outbound) = PeerSink::channel();
        let peer = sink.id();
        let session_id = session_id.to_string();

        match self.request() {
            Ok(request) => {
                tokio::spawn(async move {
                    let reason = run_connection(request, outbound, &session_id, peer, &inbound).await;
                    info!(session_id = %session_id, reason = %reason, "AI connection ended");
                    let _ = inbound.send(ModelInbound::Closed {
                        session_id,
                        peer,
                        reason,
                    });
                });
            }
            Err(e) => {
                error!(session_id = %session_id, error = %e, "Invalid AI connection request");
                let _ = inbound.send(ModelInbound::Closed {
                    session_id,
                    peer,
                    reason: format!("invalid request: {}", e),
                });
            }
        }

        sink
    }
}

/// Drive one AI socket until either side ends it. Returns the reason.
async fn run_connection(
    request: Request,
    mut outbound: UnboundedReceiver<OutboundFrame>,
    session_id: &str,
    peer: Uuid,
    inbound: &UnboundedSender<ModelInbound>,
) -> String {
    let (ws_stream, _) = match connect_async(request).await {
        Ok(result) => result,
        Err(e) => {
            error!(session_id = %session_id, "Failed to connect to AI endpoint: {}", e);
            return format!("connection failed: {}", e);
        }
    };
    info!(session_id = %session_id, "Connected to AI realtime endpoint");

    let (mut ws_sink, mut ws_stream) = ws_stream.split();

    loop {
        tokio::select! {
            frame = outbound.recv() => {
                match frame {
                    Some(OutboundFrame::Text(text)) => {
                        if let Err(e) = ws_sink.send(Message::Text(text.into())).await {
                            error!(session_id = %session_id, "Failed to send AI frame: {}", e);
                            return format!("send failed: {}", e);
                        }
                    }
                    Some(OutboundFrame::Close) | None => {
                        let _ = ws_sink.send(Message::Close(None)).await;
                        return "closed by relay".to_string();
                    }
                }
            }

            message = ws_stream.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        let frame = ModelInbound::Frame {
                            session_id: session_id.to_string(),
                            peer,
                            text: text.to_string(),
                        };
                        if inbound.send(frame).is_err() {
                            warn!(session_id = %session_id, "Relay stopped, dropping AI connection");
                            return "relay stopped".to_string();
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        return match frame {
                            Some(frame) => format!("closed by AI endpoint: {} {}", u16::from(frame.code), frame.reason),
                            None => "closed by AI endpoint".to_string(),
                        };
                    }
                    Some(Ok(other)) => {
                        debug!(session_id = %session_id, "Ignoring non-text AI frame ({} bytes)", other.len());
                    }
                    Some(Err(e)) => {
                        error!(session_id = %session_id, "AI socket error: {}", e);
                        return format!("socket error: {}", e);
                    }
                    None => return "stream ended".to_string(),
                }
            }
        }
    }
}
