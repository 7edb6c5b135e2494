//! Monitor (dashboard / listener) socket frames.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::relay::agent::AgentConfig;
use crate::relay::registry::SessionInfo;

/// A request from a monitor socket.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorRequest {
    UpdateConfig { config: AgentConfig },
    Join { session_id: String },
    Leave { session_id: String },
    UserAudio {
        session_id: String,
        audio: String,
        format: Option<String>,
        sample_rate: Option<u32>,
    },
    UserDtmf { session_id: String, digit: String },
    /// Any other session-scoped message, relayed to the AI socket with `sessionId` removed
    Forward { session_id: String, payload: Value },
}

#[derive(Debug, Error)]
pub enum MonitorParseError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("message has no type")]
    MissingType,

    #[error("'{0}' message has no sessionId")]
    MissingSessionId(String),
}

/// Requests with a fixed shape.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
enum KnownRequest {
    #[serde(rename = "global_config.update")]
    UpdateConfig { config: AgentConfig },
    #[serde(rename = "join_call_listener")]
    Join { session_id: String },
    #[serde(rename = "leave_call_listener")]
    Leave { session_id: String },
    #[serde(rename = "user_audio")]
    UserAudio {
        session_id: String,
        audio: String,
        #[serde(default)]
        format: Option<String>,
        #[serde(default)]
        sample_rate: Option<u32>,
    },
    #[serde(rename = "user_dtmf")]
    UserDtmf { session_id: String, digit: String },
}

const KNOWN_TYPES: [&str; 5] = [
    "global_config.update",
    "join_call_listener",
    "leave_call_listener",
    "user_audio",
    "user_dtmf",
];

impl MonitorRequest {
    pub fn parse(text: &str) -> Result<Self, MonitorParseError> {
        let mut value: Value = serde_json::from_str(text)?;
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(MonitorParseError::MissingType)?
            .to_string();

        if KNOWN_TYPES.contains(&kind.as_str()) {
            let known = KnownRequest::deserialize(&value)?;
            return Ok(known.into_request());
        }

        let session_id = value
            .as_object_mut()
            .and_then(|fields| fields.remove("sessionId"))
            .and_then(|id| id.as_str().map(str::to_string))
            .ok_or(MonitorParseError::MissingSessionId(kind))?;

        Ok(MonitorRequest::Forward {
            session_id,
            payload: value,
        })
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            MonitorRequest::UpdateConfig { .. } => None,
            MonitorRequest::Join { session_id }
            | MonitorRequest::Leave { session_id }
            | MonitorRequest::UserAudio { session_id, .. }
            | MonitorRequest::UserDtmf { session_id, .. }
            | MonitorRequest::Forward { session_id, .. } => Some(session_id),
        }
    }
}

impl KnownRequest {
    fn into_request(self) -> MonitorRequest {
        match self {
            KnownRequest::UpdateConfig { config } => MonitorRequest::UpdateConfig { config },
            KnownRequest::Join { session_id } => MonitorRequest::Join { session_id },
            KnownRequest::Leave { session_id } => MonitorRequest::Leave { session_id },
            KnownRequest::UserAudio {
                session_id,
                audio,
                format,
                sample_rate,
            } => MonitorRequest::UserAudio {
                session_id,
                audio,
                format,
                sample_rate,
            },
            KnownRequest::UserDtmf { session_id, digit } => {
                MonitorRequest::UserDtmf { session_id, digit }
            }
        }
    }
}

/// The `call_id` of a forwarded `conversation.item.create` carrying a function output.
pub fn function_output_call_id(payload: &Value) -> Option<&str> {
    if payload.get("type").and_then(Value::as_str) != Some("conversation.item.create") {
        return None;
    }
    let item = payload.get("item")?;
    if item.get("type").and_then(Value::as_str) != Some("function_call_output") {
        return None;
    }
    item.get("call_id").and_then(Value::as_str)
}

/// Which peer produced a chunk of call audio, sent as `twilio` or `openai`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AudioOrigin {
    #[serde(rename = "twilio")]
    Carrier,
    #[serde(rename = "openai")]
    Ai,
}

/// A notice pushed to monitor sockets.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum MonitorNotice {
    SessionsList {
        sessions: Vec<SessionInfo>,
    },
    SessionCreated {
        session_id: String,
        session: SessionInfo,
    },
    SessionUpdated {
        session_id: String,
        session: SessionInfo,
    },
    SessionClosed {
        session_id: String,
    },
    CallAudio {
        session_id: String,
        audio: String,
        audio_source: AudioOrigin,
        audio_size: usize,
        timestamp: i64,
    },
    DtmfSent {
        session_id: String,
        digit: String,
        timestamp: i64,
    },
    UserDtmfSent {
        session_id: String,
        digit: String,
        timestamp: i64,
    },
    #[serde(rename = "global_config.saved")]
    GlobalConfigSaved {
        config: AgentConfig,
        timestamp: i64,
    },
    #[serde(rename = "relay.error")]
    RelayError {
        #[serde(skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        code: String,
        message: String,
        timestamp: i64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_known_requests() {
        assert_eq!(
            MonitorRequest::parse(r#"{"type":"join_call_listener","sessionId":"s1","timestamp":1}"#).unwrap(),
            MonitorRequest::Join { session_id: "s1".into() }
        );
        assert_eq!(
            MonitorRequest::parse(
                r#"{"type":"user_audio","sessionId":"s1","audio":"AAAA","format":"pcm_f32le","sampleRate":24000,"timestamp":1}"#
            )
            .unwrap(),
            MonitorRequest::UserAudio {
                session_id: "s1".into(),
                audio: "AAAA".into(),
                format: Some("pcm_f32le".into()),
                sample_rate: Some(24000),
            }
        );

        let update = MonitorRequest::parse(
            r#"{"type":"global_config.update","config":{"instructions":"hi","voice":"ash","tools":["end_call"]}}"#,
        )
        .unwrap();
        assert!(matches!(update, MonitorRequest::UpdateConfig { config } if config.voice == "ash"));
    }

    #[test]
    fn test_unknown_session_messages_are_forwarded_without_session_id() {
        let request = MonitorRequest::parse(
            r#"{"type":"conversation.item.create","sessionId":"s1","item":{"type":"function_call_output","call_id":"c1","output":"{}"}}"#,
        )
        .unwrap();
        match request {
            MonitorRequest::Forward { session_id, payload } => {
                assert_eq!(session_id, "s1");
                assert!(payload.get("sessionId").is_none());
                assert_eq!(function_output_call_id(&payload), Some("c1"));
            }
            other => panic!("unexpected request {:?}", other),
        }
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(MonitorRequest::parse("{"), Err(MonitorParseError::Json(_))));
        assert!(matches!(MonitorRequest::parse(r#"{"sessionId":"s1"}"#), Err(MonitorParseError::MissingType)));
        assert!(matches!(
            MonitorRequest::parse(r#"{"type":"response.create"}"#),
            Err(MonitorParseError::MissingSessionId(_))
        ));
        assert!(matches!(
            MonitorRequest::parse(r#"{"type":"user_dtmf","sessionId":"s1"}"#),
            Err(MonitorParseError::Json(_))
        ));
    }

    #[test]
    fn test_function_output_call_id_ignores_other_items() {
        let message = json!({"type": "conversation.item.create", "item": {"type": "message"}});
        assert_eq!(function_output_call_id(&message), None);
        assert_eq!(function_output_call_id(&json!({"type": "response.create"})), None);
    }

    #[test]
    fn test_notice_wire_format() {
        let audio = serde_json::to_value(MonitorNotice::CallAudio {
            session_id: "s1".into(),
            audio: "AAAA".into(),
            audio_source: AudioOrigin::Carrier,
            audio_size: 4,
            timestamp: 7,
        })
        .unwrap();
        assert_eq!(
            audio,
            json!({"type": "call_audio", "sessionId": "s1", "audio": "AAAA", "audioSource": "twilio", "audioSize": 4, "timestamp": 7})
        );

        let error = serde_json::to_value(MonitorNotice::RelayError {
            session_id: None,
            code: "session_not_found".into(),
            message: "gone".into(),
            timestamp: 1,
        })
        .unwrap();
        assert_eq!(error["type"], "relay.error");
        assert!(error.get("sessionId").is_none());

        let closed = serde_json::to_value(MonitorNotice::SessionClosed { session_id: "s1".into() }).unwrap();
        assert_eq!(closed, json!({"type": "session_closed", "sessionId": "s1"}));
    }
}
