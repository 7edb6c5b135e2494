//! # Relay Core
//!
//! The [`Relay`] actor bridges the three peers of every live call: the carrier
//! media socket, the AI realtime socket and any number of monitor sockets.
//!
//! ## Ownership:
//! The actor owns the session registry, the monitor hub, the agent config and
//! the process metrics. Socket frames, socket closes, tool completions, REST
//! requests, the grace-delay removal and the health sweep all run as handlers
//! or context callbacks on this one actor, so session state is only ever
//! mutated by one writer.
//!
//! ## Message Flow:
//! - carrier `start` → session active → AI socket attached with `session.update`
//! - carrier `media` → AI `input_audio_buffer.append` + listeners `call_audio`
//! - AI `response.audio.delta` → carrier `media` + `mark` + listeners `call_audio`
//! - AI `speech_started` → AI `conversation.item.truncate` + carrier `clear`
//! - AI function call → tool dispatcher → `function_call_output` + `response.create`
//! - monitor frames → join/leave, user audio and DTMF, config, or forwarded to the AI

pub mod agent;
pub mod fanout;
pub mod health;
pub mod messages;
pub mod metrics;
pub mod peer;
pub mod registry;

use std::sync::Arc;

use actix::prelude::*;
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::audio::codec::{decoded_len, encode_user_audio};
use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::protocol::carrier::{CarrierCommand, CarrierEvent, InboundMedia};
use crate::protocol::model::{forward_envelope, FunctionCall, ModelCommand, ModelEvent, SessionSettings};
use crate::protocol::monitor::{function_output_call_id, AudioOrigin, MonitorNotice, MonitorRequest};
use crate::protocol::now_millis;
use crate::tools::builtin::is_keypad_digit;
use crate::tools::dispatcher::{self, DispatchOutcome, Route};
use crate::tools::{CallControl, ToolContext, ToolRegistry};

use self::agent::AgentConfig;
use self::fanout::MonitorHub;
use self::health::HealthReport;
use self::messages::*;
use self::metrics::{MetricsSnapshot, RelayMetrics};
use self::peer::PeerSink;
use self::registry::{CallSession, SessionRegistry, SessionStatus};

/// Mark label used when an audio delta carries no item id.
const AI_AUDIO_MARK: &str = "ai-audio";

/// Log one high-rate frame in this many.
const FRAME_LOG_EVERY: u64 = 250;

/// Opens AI realtime connections.
///
/// `connect` returns at once with the sink for the new connection. Frames
/// queued before the socket is up are delivered in order once it opens.
/// Everything the connection receives, and its closing, is posted to `inbound`
/// tagged with the sink's id.
pub trait ModelConnector: Send + Sync {
    fn connect(&self, session_id: &str, inbound: UnboundedSender<ModelInbound>) -> PeerSink;
}

pub struct Relay {
    registry: SessionRegistry,
    monitors: MonitorHub,
    agent: AgentConfig,
    tools: Arc<ToolRegistry>,
    connector: Arc<dyn ModelConnector>,
    settings: RelayConfig,
    metrics: RelayMetrics,
    last_health: HealthReport,
    model_tx: UnboundedSender<ModelInbound>,
    model_rx: Option<UnboundedReceiver<ModelInbound>>,
}

impl Relay {
    pub fn new(settings: RelayConfig, tools: Arc<ToolRegistry>, connector: Arc<dyn ModelConnector>) -> Self {
        let (model_tx, model_rx) = mpsc::unbounded_channel();
        Self {
            registry: SessionRegistry::new(settings.max_concurrent_sessions),
            monitors: MonitorHub::default(),
            agent: AgentConfig::default(),
            tools,
            connector,
            settings,
            metrics: RelayMetrics::default(),
            last_health: HealthReport::default(),
            model_tx,
            model_rx: Some(model_rx),
        }
    }

    fn create_session(&mut self, carrier: PeerSink) -> Result<String, RelayError> {
        let session_id = match self.registry.create(carrier) {
            Ok(id) => id,
            Err(e) => {
                self.metrics.calls_rejected += 1;
                warn!(active = self.registry.len(), "Rejected carrier connection: {}", e);
                return Err(e);
            }
        };
        self.metrics.calls_accepted += 1;
        info!(session_id = %session_id, active = self.registry.len(), "Call session created");

        if let Some(session) = self.registry.get(&session_id).map(CallSession::info) {
            self.notify_monitors(&MonitorNotice::SessionCreated {
                session_id: session_id.clone(),
                session,
            });
        }
        Ok(session_id)
    }

    fn on_stream_start(&mut self, session_id: &str, stream_sid: String) {
        let Some(session) = self.registry.get_mut(session_id) else {
            return;
        };
        info!(session_id = %session_id, stream_sid = %stream_sid, "Carrier stream started");
        session.start_stream(stream_sid);
        self.session_updated(session_id);
        self.attach_model(session_id);
    }

    /// Open the AI socket if the session is ready for one. No-op otherwise.
    fn attach_model(&mut self, session_id: &str) {
        let Some(session) = self.registry.get_mut(session_id) else {
            return;
        };
        if !session.ready_for_model() {
            debug!(session_id = %session_id, "AI connection not attached: preconditions unmet");
            return;
        }

        let model = self.connector.connect(session_id, self.model_tx.clone());
        let handshake = ModelCommand::SessionUpdate {
            session: SessionSettings::for_call(&self.agent, self.tools.schemas_for(&self.agent.tools)),
        };
        send_frame(&model, &handshake);
        session.model = Some(model);

        info!(session_id = %session_id, voice = %self.agent.voice, "AI connection attached");
        self.session_updated(session_id);
    }

    /// Mark the call ending, close both peers and schedule removal.
    fn terminate(&mut self, session_id: &str, reason: &str, ctx: &mut Context<Self>) -> Result<(), RelayError> {
        let session = self.registry.require_mut(session_id)?;
        if session.status == SessionStatus::Ending {
            return Ok(());
        }

        session.status = SessionStatus::Ending;
        if let Some(model) = &session.model {
            model.close();
        }
        if let Some(carrier) = &session.carrier {
            carrier.close();
        }
        info!(session_id = %session_id, reason = %reason, "Terminating call");
        self.session_updated(session_id);

        let session_id = session_id.to_string();
        ctx.run_later(self.settings.termination_grace(), move |act, _| {
            act.destroy(&session_id, "terminated");
        });
        Ok(())
    }

    /// Remove a session, closing whatever sockets are still open.
    fn destroy(&mut self, session_id: &str, reason: &str) {
        let Some(session) = self.registry.remove(session_id) else {
            return;
        };
        if let Some(model) = &session.model {
            model.close();
        }
        if let Some(carrier) = &session.carrier {
            carrier.close();
        }
        self.metrics.calls_closed += 1;

        info!(
            session_id = %session_id,
            reason = %reason,
            duration_secs = session.age_secs(Utc::now()),
            carrier_frames = session.counters.carrier_frames,
            ai_audio_deltas = session.counters.ai_audio_deltas,
            tool_calls = session.counters.tool_calls,
            "Call session closed"
        );
        self.notify_monitors(&MonitorNotice::SessionClosed {
            session_id: session_id.to_string(),
        });
    }

    fn on_carrier_frame(&mut self, session_id: &str, text: &str) {
        let event = match CarrierEvent::parse(text) {
            Ok(event) => event,
            Err(e) => {
                self.metrics.dropped_frames += 1;
                warn!(session_id = %session_id, error = %e, "Dropping malformed carrier frame");
                return;
            }
        };

        match event {
            CarrierEvent::Start { start } => self.on_stream_start(session_id, start.stream_sid),
            CarrierEvent::Media { media } => self.on_carrier_media(session_id, media),
            CarrierEvent::Close => self.on_carrier_gone(session_id, "carrier stream closed"),
            CarrierEvent::Ignored => debug!(session_id = %session_id, "Ignoring carrier event"),
        }
    }

    /// A session already ending keeps its scheduled removal.
    fn on_carrier_gone(&mut self, session_id: &str, reason: &str) {
        match self.registry.get(session_id).map(|s| s.status) {
            Some(SessionStatus::Ending) => {
                debug!(session_id = %session_id, reason = %reason, "Carrier gone; removal already scheduled");
            }
            Some(_) => self.destroy(session_id, reason),
            None => {}
        }
    }

    fn on_carrier_media(&mut self, session_id: &str, media: InboundMedia) {
        let Some(session) = self.registry.get_mut(session_id) else {
            return;
        };
        session.record_media(media.timestamp);
        self.metrics.carrier_frames += 1;
        if session.counters.carrier_frames % FRAME_LOG_EVERY == 1 {
            debug!(
                session_id = %session_id,
                frames = session.counters.carrier_frames,
                timestamp = media.timestamp,
                "Carrier media"
            );
        }

        if let Some(model) = session.open_model() {
            if !send_frame(model, &ModelCommand::AppendAudio { audio: media.payload.clone() }) {
                self.metrics.dropped_frames += 1;
            }
        }

        if !session.listeners.is_empty() {
            let notice = MonitorNotice::CallAudio {
                session_id: session_id.to_string(),
                audio_size: decoded_len(&media.payload),
                audio: media.payload,
                audio_source: AudioOrigin::Carrier,
                timestamp: now_millis(),
            };
            broadcast_to_listeners(session, &mut self.metrics, &notice);
        }
    }

    fn on_model_inbound(&mut self, inbound: ModelInbound, ctx: &mut Context<Self>) {
        match inbound {
            ModelInbound::Frame { session_id, peer, text } => {
                if self.current_model(&session_id) != Some(peer) {
                    debug!(session_id = %session_id, "Dropping frame from a detached AI connection");
                    return;
                }
                self.on_model_frame(&session_id, &text, ctx);
            }
            ModelInbound::Closed { session_id, peer, reason } => {
                if self.current_model(&session_id) != Some(peer) {
                    return;
                }
                if let Some(session) = self.registry.get_mut(&session_id) {
                    session.model = None;
                }
                warn!(session_id = %session_id, reason = %reason, "AI connection closed");
                self.session_updated(&session_id);
            }
        }
    }

    fn current_model(&self, session_id: &str) -> Option<Uuid> {
        self.registry
            .get(session_id)
            .and_then(|session| session.model.as_ref())
            .map(PeerSink::id)
    }

    fn on_model_frame(&mut self, session_id: &str, text: &str, ctx: &mut Context<Self>) {
        let value: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                self.metrics.dropped_frames += 1;
                warn!(session_id = %session_id, error = %e, "Dropping malformed AI frame");
                return;
            }
        };
        let event = ModelEvent::from_value(&value);

        let envelope = forward_envelope(value, session_id, now_millis());
        self.notify_monitors(&envelope);

        match event {
            Ok(ModelEvent::SpeechStarted { .. }) => self.on_speech_started(session_id),
            Ok(ModelEvent::AudioDelta {
                item_id,
                delta: Some(delta),
            }) => self.on_audio_delta(session_id, item_id, delta),
            Ok(ModelEvent::Error { error }) => {
                error!(session_id = %session_id, error = %error, "AI peer reported an error");
            }
            Ok(event @ ModelEvent::OutputItemDone { .. }) => {
                if let Some(call) = event.function_call() {
                    self.on_function_call(session_id, call, ctx);
                }
            }
            Ok(ModelEvent::SessionCreated) | Ok(ModelEvent::SessionUpdated) => {
                debug!(session_id = %session_id, "AI session acknowledged");
            }
            Ok(_) => {}
            Err(e) => debug!(session_id = %session_id, error = %e, "AI event not understood"),
        }
    }

    fn on_audio_delta(&mut self, session_id: &str, item_id: Option<String>, delta: String) {
        let Some(session) = self.registry.get_mut(session_id) else {
            return;
        };
        let (carrier, stream_sid) = match session.carrier_target() {
            Ok((carrier, stream_sid)) => (carrier.clone(), stream_sid.to_string()),
            Err(e) => {
                debug!(session_id = %session_id, "Skipping AI audio: {}", e);
                return;
            }
        };

        session.record_response_audio(item_id.as_deref());
        self.metrics.ai_audio_deltas += 1;
        if session.counters.ai_audio_deltas % FRAME_LOG_EVERY == 1 {
            debug!(session_id = %session_id, deltas = session.counters.ai_audio_deltas, "AI audio");
        }

        send_frame(&carrier, &CarrierCommand::media(&stream_sid, delta.as_str()));
        send_frame(
            &carrier,
            &CarrierCommand::mark(&stream_sid, item_id.as_deref().unwrap_or(AI_AUDIO_MARK)),
        );

        if !session.listeners.is_empty() {
            let notice = MonitorNotice::CallAudio {
                session_id: session_id.to_string(),
                audio_size: decoded_len(&delta),
                audio: delta,
                audio_source: AudioOrigin::Ai,
                timestamp: now_millis(),
            };
            broadcast_to_listeners(session, &mut self.metrics, &notice);
        }
    }

    /// Barge-in: tell the AI how much of its utterance was heard and flush the carrier.
    fn on_speech_started(&mut self, session_id: &str) {
        let Some(session) = self.registry.get_mut(session_id) else {
            return;
        };
        let Some(truncation) = session.take_truncation() else {
            return;
        };
        self.metrics.truncations += 1;
        info!(
            session_id = %session_id,
            item_id = %truncation.item_id,
            audio_end_ms = truncation.audio_end_ms,
            "Caller interrupted the agent"
        );

        if let Some(model) = session.open_model() {
            send_frame(
                model,
                &ModelCommand::Truncate {
                    item_id: truncation.item_id,
                    content_index: 0,
                    audio_end_ms: truncation.audio_end_ms,
                },
            );
        }
        if let Ok((carrier, stream_sid)) = session.carrier_target() {
            send_frame(carrier, &CarrierCommand::clear(stream_sid));
        }
    }

    fn on_function_call(&mut self, session_id: &str, call: FunctionCall, ctx: &mut Context<Self>) {
        let Some(session) = self.registry.get_mut(session_id) else {
            return;
        };
        session.counters.tool_calls += 1;
        self.metrics.tool_calls += 1;
        info!(session_id = %session_id, call_id = %call.call_id, function = %call.name, "AI requested function");

        match dispatcher::route(&self.tools, &call) {
            Route::Immediate(outcome) => self.finish_function_call(session_id, &call.call_id, outcome),
            Route::Run { handler, args } => {
                let tool_ctx = ToolContext {
                    session_id: session_id.to_string(),
                    control: Arc::new(RelayControl::new(ctx.address())),
                };
                let session_id = session_id.to_string();
                let call_id = call.call_id;
                let run = dispatcher::run(handler, call.name, args, tool_ctx);
                ctx.spawn(run.into_actor(self).map(move |output, act, _| {
                    act.finish_function_call(&session_id, &call_id, DispatchOutcome::Output(output));
                }));
            }
        }
    }

    fn finish_function_call(&mut self, session_id: &str, call_id: &str, outcome: DispatchOutcome) {
        let Some(session) = self.registry.get_mut(session_id) else {
            debug!(session_id = %session_id, call_id = %call_id, "Function finished after the call ended");
            return;
        };

        match outcome {
            DispatchOutcome::Deferred(pending) => {
                info!(session_id = %session_id, call_id = %call_id, "Waiting for operator input");
                session.pending_calls.defer(pending);
            }
            DispatchOutcome::Output(output) => match session.open_model() {
                Some(model) => {
                    send_frame(model, &ModelCommand::function_output(call_id, &output));
                    send_frame(model, &ModelCommand::CreateResponse);
                }
                None => debug!(session_id = %session_id, call_id = %call_id, "No AI connection for function output"),
            },
        }
    }

    fn on_monitor_frame(&mut self, sink: &PeerSink, text: &str) {
        let request = match MonitorRequest::parse(text) {
            Ok(request) => request,
            Err(e) => {
                warn!(monitor = %sink.id(), error = %e, "Dropping malformed monitor frame");
                reply(
                    sink,
                    &MonitorNotice::RelayError {
                        session_id: None,
                        code: "invalid_message".to_string(),
                        message: e.to_string(),
                        timestamp: now_millis(),
                    },
                );
                return;
            }
        };

        debug!(monitor = %sink.id(), session_id = ?request.session_id(), "Monitor request");
        match request {
            MonitorRequest::UpdateConfig { config } => match config.validate() {
                Ok(()) => self.update_agent_config(config),
                Err(message) => {
                    warn!(monitor = %sink.id(), error = %message, "Rejected agent config update");
                    reply(
                        sink,
                        &MonitorNotice::RelayError {
                            session_id: None,
                            code: "invalid_config".to_string(),
                            message,
                            timestamp: now_millis(),
                        },
                    );
                }
            },
            MonitorRequest::Join { session_id } => match self.registry.get_mut(&session_id) {
                Some(session) => {
                    session.listeners.insert(sink.clone());
                    info!(session_id = %session_id, listeners = session.listeners.len(), "Listener joined");
                }
                None => debug!(session_id = %session_id, "Join for unknown session ignored"),
            },
            MonitorRequest::Leave { session_id } => {
                if let Some(session) = self.registry.get_mut(&session_id) {
                    if session.listeners.remove(sink) {
                        info!(session_id = %session_id, "Listener left");
                    }
                }
            }
            MonitorRequest::UserAudio {
                session_id,
                audio,
                format,
                sample_rate,
            } => {
                if let Err(e) = self.route_user_audio(&session_id, &audio, format.as_deref(), sample_rate) {
                    report(sink, &session_id, &e);
                }
            }
            MonitorRequest::UserDtmf { session_id, digit } => match self.send_dtmf(&session_id, &digit) {
                Ok(()) => self.notify_monitors(&MonitorNotice::UserDtmfSent {
                    session_id,
                    digit,
                    timestamp: now_millis(),
                }),
                Err(e) => report(sink, &session_id, &e),
            },
            MonitorRequest::Forward { session_id, payload } => {
                if let Err(e) = self.forward_to_model(&session_id, &payload) {
                    report(sink, &session_id, &e);
                }
            }
        }
    }

    /// Encode monitor audio for the call and send it to the carrier and the AI.
    ///
    /// The two sends are independent; a missing AI socket does not block the carrier send.
    fn route_user_audio(
        &mut self,
        session_id: &str,
        audio: &str,
        format: Option<&str>,
        sample_rate: Option<u32>,
    ) -> Result<(), RelayError> {
        let session = self.registry.require_mut(session_id)?;
        let encoded = encode_user_audio(audio, format, sample_rate)?;
        session.counters.user_audio_frames += 1;
        self.metrics.user_audio_frames += 1;

        if let Some(model) = session.open_model() {
            model.send_json(&ModelCommand::AppendAudio { audio: encoded.clone() })?;
        }
        let (carrier, stream_sid) = session.carrier_target()?;
        deliver(carrier, &CarrierCommand::media(stream_sid, encoded), session_id, "carrier")
    }

    fn send_dtmf(&mut self, session_id: &str, digit: &str) -> Result<(), RelayError> {
        if !is_keypad_digit(digit) {
            return Err(RelayError::InvalidDigit(digit.to_string()));
        }
        let session = self.registry.require_mut(session_id)?;
        let (carrier, stream_sid) = session.carrier_target()?;
        deliver(carrier, &CarrierCommand::dtmf(stream_sid, digit), session_id, "carrier")?;
        info!(session_id = %session_id, digit = %digit, "DTMF sent");
        Ok(())
    }

    /// Relay a monitor message to the AI socket unchanged.
    ///
    /// A `function_call_output` item completes the matching pending call.
    fn forward_to_model(&mut self, session_id: &str, payload: &Value) -> Result<(), RelayError> {
        let session = self.registry.require_mut(session_id)?;
        if let Some(call_id) = function_output_call_id(payload) {
            if session.pending_calls.complete(call_id).is_some() {
                info!(session_id = %session_id, call_id = %call_id, "Operator answered pending function");
            }
        }
        let model = session.open_model().ok_or_else(|| RelayError::PeerUnavailable {
            session_id: session_id.to_string(),
            peer: "ai",
        })?;
        deliver(model, payload, session_id, "ai")
    }

    fn update_agent_config(&mut self, config: AgentConfig) {
        info!(voice = %config.voice, tools = ?config.tools, "Agent config replaced");
        let saved = MonitorNotice::GlobalConfigSaved {
            config: config.clone(),
            timestamp: now_millis(),
        };
        self.agent = config;
        self.notify_monitors(&saved);
    }

    fn detach_monitor(&mut self, sink: &PeerSink) {
        self.monitors.detach(sink);
        for session in self.registry.iter_mut() {
            session.listeners.remove(sink);
        }
        debug!(monitor = %sink.id(), monitors = self.monitors.len(), "Monitor disconnected");
    }

    fn session_updated(&mut self, session_id: &str) {
        if let Some(session) = self.registry.get(session_id).map(CallSession::info) {
            self.notify_monitors(&MonitorNotice::SessionUpdated {
                session_id: session_id.to_string(),
                session,
            });
        }
    }

    fn notify_monitors<T: Serialize>(&mut self, notice: &T) {
        if self.monitors.is_empty() {
            return;
        }
        match serde_json::to_string(notice) {
            Ok(text) => {
                let report = self.monitors.broadcast(&text);
                self.metrics.monitor_evictions += report.evicted as u64;
            }
            Err(e) => error!(error = %e, "Failed to serialize monitor notice"),
        }
    }

    fn sweep_health(&mut self) {
        let report = health::sweep(
            self.registry.iter(),
            Utc::now(),
            self.settings.silent_media_timeout_secs,
        );
        for unhealthy in &report.unhealthy {
            warn!(
                session_id = %unhealthy.session_id,
                issues = ?unhealthy.issues,
                "Unhealthy call session"
            );
        }
        debug!(
            checked = report.sessions_checked,
            unhealthy = report.unhealthy.len(),
            "Health sweep finished"
        );
        self.last_health = report;
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            active_sessions: self.registry.len(),
            max_sessions: self.registry.max_sessions(),
            monitors: self.monitors.len(),
            listeners: self.registry.iter().map(|s| s.listeners.len()).sum(),
            pending_tool_calls: self.registry.iter().map(|s| s.pending_calls.len()).sum(),
            totals: self.metrics.clone(),
        }
    }
}

/// Serialize and queue a frame, logging instead of failing.
fn send_frame<T: Serialize>(sink: &PeerSink, frame: &T) -> bool {
    match sink.send_json(frame) {
        Ok(sent) => sent,
        Err(e) => {
            error!(error = %e, "Failed to serialize outbound frame");
            false
        }
    }
}

/// Queue a frame for a peer that must be there.
fn deliver<T: Serialize>(sink: &PeerSink, frame: &T, session_id: &str, peer: &'static str) -> Result<(), RelayError> {
    if sink.send_json(frame)? {
        Ok(())
    } else {
        Err(RelayError::PeerUnavailable {
            session_id: session_id.to_string(),
            peer,
        })
    }
}

fn broadcast_to_listeners(session: &mut CallSession, metrics: &mut RelayMetrics, notice: &MonitorNotice) {
    let text = match serde_json::to_string(notice) {
        Ok(text) => text,
        Err(e) => {
            error!(error = %e, "Failed to serialize listener notice");
            return;
        }
    };
    let report = fanout::broadcast(&mut session.listeners, &text);
    session.counters.listener_broadcasts += report.delivered as u64;
    session.counters.listener_evictions += report.evicted as u64;
    metrics.listener_evictions += report.evicted as u64;
    if report.evicted > 0 {
        debug!(session_id = %session.session_id, evicted = report.evicted, "Evicted closed listeners");
    }
}

fn reply(sink: &PeerSink, notice: &MonitorNotice) {
    send_frame(sink, notice);
}

/// Tell the requesting monitor why its action was skipped.
fn report(sink: &PeerSink, session_id: &str, err: &RelayError) {
    warn!(session_id = %session_id, code = err.code(), "Monitor request failed: {}", err);
    reply(
        sink,
        &MonitorNotice::RelayError {
            session_id: Some(session_id.to_string()),
            code: err.code().to_string(),
            message: err.to_string(),
            timestamp: now_millis(),
        },
    );
}

impl Actor for Relay {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        if let Some(rx) = self.model_rx.take() {
            ctx.add_stream(UnboundedReceiverStream::new(rx));
        }
        ctx.run_interval(self.settings.health_check_interval(), |act, _| act.sweep_health());
        info!(
            max_sessions = self.registry.max_sessions(),
            tools = ?self.tools.names(),
            "Relay started"
        );
    }
}

impl StreamHandler<ModelInbound> for Relay {
    fn handle(&mut self, item: ModelInbound, ctx: &mut Self::Context) {
        self.on_model_inbound(item, ctx);
    }

    fn finished(&mut self, _ctx: &mut Self::Context) {
        // The relay holds a sender itself, so this only happens at shutdown
        debug!("AI event stream finished");
    }
}

impl Handler<CarrierConnected> for Relay {
    type Result = Result<String, RelayError>;

    fn handle(&mut self, msg: CarrierConnected, _ctx: &mut Self::Context) -> Self::Result {
        self.create_session(msg.sink)
    }
}

impl Handler<CarrierFrame> for Relay {
    type Result = ();

    fn handle(&mut self, msg: CarrierFrame, _ctx: &mut Self::Context) {
        self.on_carrier_frame(&msg.session_id, &msg.text);
    }
}

impl Handler<CarrierClosed> for Relay {
    type Result = ();

    fn handle(&mut self, msg: CarrierClosed, _ctx: &mut Self::Context) {
        self.on_carrier_gone(&msg.session_id, "carrier disconnected");
    }
}

impl Handler<MonitorConnected> for Relay {
    type Result = ();

    fn handle(&mut self, msg: MonitorConnected, _ctx: &mut Self::Context) {
        self.monitors.attach(msg.sink.clone());
        info!(monitor = %msg.sink.id(), monitors = self.monitors.len(), "Monitor connected");
        reply(
            &msg.sink,
            &MonitorNotice::SessionsList {
                sessions: self.registry.infos(),
            },
        );
    }
}

impl Handler<MonitorFrame> for Relay {
    type Result = ();

    fn handle(&mut self, msg: MonitorFrame, _ctx: &mut Self::Context) {
        self.on_monitor_frame(&msg.sink, &msg.text);
    }
}

impl Handler<MonitorDisconnected> for Relay {
    type Result = ();

    fn handle(&mut self, msg: MonitorDisconnected, _ctx: &mut Self::Context) {
        self.detach_monitor(&msg.sink);
    }
}

impl Handler<TerminateCall> for Relay {
    type Result = Result<(), RelayError>;

    fn handle(&mut self, msg: TerminateCall, ctx: &mut Self::Context) -> Self::Result {
        self.terminate(&msg.session_id, &msg.reason, ctx)
    }
}

impl Handler<SendDtmf> for Relay {
    type Result = Result<(), RelayError>;

    fn handle(&mut self, msg: SendDtmf, _ctx: &mut Self::Context) -> Self::Result {
        self.send_dtmf(&msg.session_id, &msg.digit)?;
        self.notify_monitors(&MonitorNotice::DtmfSent {
            session_id: msg.session_id,
            digit: msg.digit,
            timestamp: now_millis(),
        });
        Ok(())
    }
}

impl Handler<ListSessions> for Relay {
    type Result = MessageResult<ListSessions>;

    fn handle(&mut self, _msg: ListSessions, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.registry.infos())
    }
}

impl Handler<GetAgentConfig> for Relay {
    type Result = MessageResult<GetAgentConfig>;

    fn handle(&mut self, _msg: GetAgentConfig, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.agent.clone())
    }
}

impl Handler<UpdateAgentConfig> for Relay {
    type Result = ();

    fn handle(&mut self, msg: UpdateAgentConfig, _ctx: &mut Self::Context) {
        self.update_agent_config(msg.config);
    }
}

impl Handler<GetHealth> for Relay {
    type Result = MessageResult<GetHealth>;

    fn handle(&mut self, _msg: GetHealth, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.last_health.clone())
    }
}

impl Handler<GetMetrics> for Relay {
    type Result = MessageResult<GetMetrics>;

    fn handle(&mut self, _msg: GetMetrics, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.metrics_snapshot())
    }
}

/// [`CallControl`] backed by the relay's mailbox.
#[derive(Clone)]
pub struct RelayControl {
    relay: Addr<Relay>,
}

impl RelayControl {
    pub fn new(relay: Addr<Relay>) -> Self {
        Self { relay }
    }
}

#[async_trait]
impl CallControl for RelayControl {
    async fn terminate(&self, session_id: &str, reason: &str) -> Result<(), RelayError> {
        self.relay
            .send(TerminateCall {
                session_id: session_id.to_string(),
                reason: reason.to_string(),
            })
            .await?
    }

    async fn send_dtmf(&self, session_id: &str, digit: &str) -> Result<(), RelayError> {
        self.relay
            .send(SendDtmf {
                session_id: session_id.to_string(),
                digit: digit.to_string(),
            })
            .await?
    }
}
