//! # Session Registry
//!
//! Authoritative map of live calls, keyed by session id.
//!
//! ## Session Lifecycle:
//! 1. **Connecting**: carrier socket accepted, no stream yet
//! 2. **Active**: carrier sent `start`; the AI socket may now be attached
//! 3. **Ending**: terminate requested; removed after the grace delay
//!
//! The registry is plain owned data. It is held by the [`Relay`](super::Relay)
//! actor, so every mutation is already serialized and no locks are needed.
//! Anything that must happen "around" a mutation (notifying monitors, closing
//! sockets) is the actor's job.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::peer::PeerSink;
use crate::error::RelayError;
use crate::tools::pending::PendingCalls;

/// Lifecycle status of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Connecting,
    Active,
    Ending,
}

/// Per-call traffic counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCounters {
    pub carrier_frames: u64,
    pub ai_audio_deltas: u64,
    pub user_audio_frames: u64,
    pub listener_broadcasts: u64,
    pub listener_evictions: u64,
    pub truncations: u64,
    pub tool_calls: u64,
}

/// Read projection of a [`CallSession`] for monitors and the REST API.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub session_id: String,
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_sid: Option<String>,
    /// Unix milliseconds
    pub created_at: i64,
    pub has_model_connection: bool,
}

/// A barge-in instruction computed from the session clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Truncation {
    pub item_id: String,
    pub audio_end_ms: u64,
}

/// How much of the current AI utterance the caller heard, on the carrier clock.
///
/// Clamped at zero when the latest media timestamp precedes the response start.
pub fn elapsed_since_response(latest_media_ms: u64, response_start_ms: u64) -> u64 {
    latest_media_ms.saturating_sub(response_start_ms)
}

/// State of one phone call.
pub struct CallSession {
    pub session_id: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,

    /// Carrier media socket (exclusively owned)
    pub carrier: Option<PeerSink>,

    /// AI realtime socket (exclusively owned, attached lazily)
    pub model: Option<PeerSink>,

    pub stream_sid: Option<String>,

    /// Latest carrier media timestamp, carrier clock
    pub latest_media_timestamp: u64,

    pub last_assistant_item: Option<String>,

    /// Carrier-clock time the current AI utterance started playing
    pub response_start_timestamp: Option<u64>,

    /// Monitor sockets listening to this call (membership only)
    pub listeners: HashSet<PeerSink>,

    /// frontend_input tool calls waiting for a human
    pub pending_calls: PendingCalls,

    pub counters: SessionCounters,
}

impl CallSession {
    fn new(session_id: String, carrier: PeerSink) -> Self {
        Self {
            session_id,
            status: SessionStatus::Connecting,
            created_at: Utc::now(),
            carrier: Some(carrier),
            model: None,
            stream_sid: None,
            latest_media_timestamp: 0,
            last_assistant_item: None,
            response_start_timestamp: None,
            listeners: HashSet::new(),
            pending_calls: PendingCalls::default(),
            counters: SessionCounters::default(),
        }
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.session_id.clone(),
            status: self.status,
            stream_sid: self.stream_sid.clone(),
            created_at: self.created_at.timestamp_millis(),
            has_model_connection: self.model.is_some(),
        }
    }

    /// The carrier sink, if it is still open.
    pub fn open_carrier(&self) -> Option<&PeerSink> {
        self.carrier.as_ref().filter(|sink| sink.is_open())
    }

    /// The AI sink, if it is still open.
    pub fn open_model(&self) -> Option<&PeerSink> {
        self.model.as_ref().filter(|sink| sink.is_open())
    }

    /// Carrier sink and stream id together, the precondition for any carrier send.
    pub fn carrier_target(&self) -> Result<(&PeerSink, &str), RelayError> {
        let carrier = self.open_carrier().ok_or_else(|| RelayError::PeerUnavailable {
            session_id: self.session_id.clone(),
            peer: "carrier",
        })?;
        let stream_sid = self
            .stream_sid
            .as_deref()
            .ok_or_else(|| RelayError::MissingStreamId(self.session_id.clone()))?;
        Ok((carrier, stream_sid))
    }

    /// Carrier `start`: record the stream and go active with fresh truncation state.
    pub fn start_stream(&mut self, stream_sid: String) {
        self.stream_sid = Some(stream_sid);
        self.latest_media_timestamp = 0;
        self.reset_truncation();
        self.status = SessionStatus::Active;
    }

    /// True when the AI socket may be opened: carrier present, stream known, no live AI socket.
    pub fn ready_for_model(&self) -> bool {
        self.carrier.is_some() && self.stream_sid.is_some() && self.open_model().is_none()
    }

    pub fn record_media(&mut self, timestamp: u64) {
        self.latest_media_timestamp = timestamp;
        self.counters.carrier_frames += 1;
    }

    /// Note an AI audio delta. The first delta of an utterance pins the
    /// response start to the latest carrier timestamp.
    pub fn record_response_audio(&mut self, item_id: Option<&str>) {
        if self.response_start_timestamp.is_none() {
            self.response_start_timestamp = Some(self.latest_media_timestamp);
        }
        if let Some(item_id) = item_id {
            self.last_assistant_item = Some(item_id.to_string());
        }
        self.counters.ai_audio_deltas += 1;
    }

    /// Compute and consume the pending barge-in, if an utterance is in flight.
    ///
    /// Needs both an assistant item and a response start; otherwise nothing changes.
    pub fn take_truncation(&mut self) -> Option<Truncation> {
        let (Some(item_id), Some(start)) =
            (self.last_assistant_item.clone(), self.response_start_timestamp)
        else {
            return None;
        };

        self.reset_truncation();
        self.counters.truncations += 1;
        Some(Truncation {
            item_id,
            audio_end_ms: elapsed_since_response(self.latest_media_timestamp, start),
        })
    }

    pub fn reset_truncation(&mut self) {
        self.last_assistant_item = None;
        self.response_start_timestamp = None;
    }

    pub fn age_secs(&self, now: DateTime<Utc>) -> i64 {
        now.signed_duration_since(self.created_at).num_seconds()
    }
}

/// Generate a session id of the form `session-<unix-ms>-<uuid>`.
pub fn generate_session_id() -> String {
    format!("session-{}-{}", Utc::now().timestamp_millis(), Uuid::new_v4())
}

/// Keyed collection of live calls.
pub struct SessionRegistry {
    sessions: HashMap<String, CallSession>,
    max_sessions: usize,
}

impl SessionRegistry {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: HashMap::new(),
            max_sessions,
        }
    }

    /// Allocate a session for a newly accepted carrier socket.
    ///
    /// ## Returns:
    /// - **Ok(session_id)**: registered with status `connecting`
    /// - **Err(CapacityReached)**: the concurrent call limit is reached
    pub fn create(&mut self, carrier: PeerSink) -> Result<String, RelayError> {
        if self.sessions.len() >= self.max_sessions {
            return Err(RelayError::CapacityReached(self.max_sessions));
        }

        let session_id = generate_session_id();
        self.sessions
            .insert(session_id.clone(), CallSession::new(session_id.clone(), carrier));
        Ok(session_id)
    }

    pub fn get(&self, session_id: &str) -> Option<&CallSession> {
        self.sessions.get(session_id)
    }

    pub fn get_mut(&mut self, session_id: &str) -> Option<&mut CallSession> {
        self.sessions.get_mut(session_id)
    }

    /// Look a session up or fail with `SessionNotFound`.
    pub fn require_mut(&mut self, session_id: &str) -> Result<&mut CallSession, RelayError> {
        self.sessions
            .get_mut(session_id)
            .ok_or_else(|| RelayError::SessionNotFound(session_id.to_string()))
    }

    pub fn remove(&mut self, session_id: &str) -> Option<CallSession> {
        self.sessions.remove(session_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    pub fn iter(&self) -> impl Iterator<Item = &CallSession> {
        self.sessions.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut CallSession> {
        self.sessions.values_mut()
    }

    /// Snapshot of every session, oldest first.
    pub fn infos(&self) -> Vec<SessionInfo> {
        let mut infos: Vec<SessionInfo> = self.sessions.values().map(CallSession::info).collect();
        infos.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });
        infos
    }
}
