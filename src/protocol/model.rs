//! Realtime AI protocol frames.
//!
//! Inbound events are parsed twice over the same JSON value: once into a raw
//! [`serde_json::Value`] that is forwarded to monitors untouched (apart from the
//! session envelope), and once into [`ModelEvent`] for the handful of events the
//! relay acts on.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::relay::agent::AgentConfig;

/// Events from the AI peer the relay reacts to.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ModelEvent {
    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted {
        #[serde(default)]
        item_id: Option<String>,
    },

    #[serde(rename = "response.audio.delta")]
    AudioDelta {
        #[serde(default)]
        item_id: Option<String>,
        #[serde(default)]
        delta: Option<String>,
    },

    #[serde(rename = "response.output_item.done")]
    OutputItemDone {
        #[serde(default)]
        item: Option<OutputItem>,
    },

    #[serde(rename = "session.created")]
    SessionCreated,

    #[serde(rename = "session.updated")]
    SessionUpdated,

    #[serde(rename = "error")]
    Error {
        #[serde(default)]
        error: Value,
    },

    #[serde(other)]
    Other,
}

/// The finished item carried by `response.output_item.done`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputItem {
    FunctionCall {
        call_id: String,
        name: String,
        #[serde(default)]
        arguments: String,
    },
    #[serde(other)]
    Other,
}

/// A function call the AI peer wants executed.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub call_id: String,
    pub name: String,
    pub arguments: String,
}

impl ModelEvent {
    /// Parse the typed view out of an already-decoded frame.
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        ModelEvent::deserialize(value)
    }

    pub fn function_call(&self) -> Option<FunctionCall> {
        match self {
            ModelEvent::OutputItemDone {
                item: Some(OutputItem::FunctionCall { call_id, name, arguments }),
            } => Some(FunctionCall {
                call_id: call_id.clone(),
                name: name.clone(),
                arguments: arguments.clone(),
            }),
            _ => None,
        }
    }
}

/// Wrap a raw AI event for monitors.
///
/// Adds `sessionId` and `timestamp`. Function-call items in
/// `response.output_item.done` get `item.id = call_id` when they carry no id.
pub fn forward_envelope(mut event: Value, session_id: &str, timestamp: i64) -> Value {
    if let Some(fields) = event.as_object_mut() {
        fields.insert("sessionId".into(), Value::String(session_id.to_string()));
        fields.insert("timestamp".into(), json!(timestamp));

        let is_output_done =
            fields.get("type").and_then(Value::as_str) == Some("response.output_item.done");
        if is_output_done {
            if let Some(item) = fields.get_mut("item").and_then(Value::as_object_mut) {
                let is_call = item.get("type").and_then(Value::as_str) == Some("function_call");
                let missing_id = item.get("id").map_or(true, Value::is_null);
                if is_call && missing_id {
                    if let Some(call_id) = item.get("call_id").cloned() {
                        item.insert("id".into(), call_id);
                    }
                }
            }
        }
    }
    event
}

/// Frames the relay sends to the AI peer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ModelCommand {
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionSettings },

    #[serde(rename = "input_audio_buffer.append")]
    AppendAudio { audio: String },

    #[serde(rename = "conversation.item.truncate")]
    Truncate {
        item_id: String,
        content_index: u32,
        audio_end_ms: u64,
    },

    #[serde(rename = "conversation.item.create")]
    CreateItem { item: ConversationItem },

    #[serde(rename = "response.create")]
    CreateResponse,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationItem {
    FunctionCallOutput { call_id: String, output: String },
}

impl ModelCommand {
    pub fn function_output(call_id: &str, output: &Value) -> Self {
        ModelCommand::CreateItem {
            item: ConversationItem::FunctionCallOutput {
                call_id: call_id.to_string(),
                output: output.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnDetection {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputTranscription {
    pub model: String,
}

/// The `session` object of a `session.update` handshake.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSettings {
    pub modalities: Vec<String>,
    pub turn_detection: TurnDetection,
    pub speed: f64,
    pub input_audio_transcription: InputTranscription,
    pub input_audio_format: String,
    pub output_audio_format: String,
    pub instructions: String,
    pub voice: String,
    pub tools: Vec<Value>,
}

impl SessionSettings {
    /// Handshake for a phone call: mu-law both ways, semantic VAD, and the
    /// agent's instructions, voice and tool schemas.
    pub fn for_call(agent: &AgentConfig, tools: Vec<Value>) -> Self {
        Self {
            modalities: vec!["text".into(), "audio".into()],
            turn_detection: TurnDetection {
                kind: "semantic_vad".into(),
            },
            speed: 1.2,
            input_audio_transcription: InputTranscription {
                model: "whisper-1".into(),
            },
            input_audio_format: "g711_ulaw".into(),
            output_audio_format: "g711_ulaw".into(),
            instructions: agent.instructions.clone(),
            voice: agent.voice.clone(),
            tools,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_relevant_events() {
        let delta: Value = serde_json::from_str(
            r#"{"type":"response.audio.delta","event_id":"e1","response_id":"r1","item_id":"item_1","output_index":0,"content_index":0,"delta":"AAAA"}"#,
        )
        .unwrap();
        assert_eq!(
            ModelEvent::from_value(&delta).unwrap(),
            ModelEvent::AudioDelta {
                item_id: Some("item_1".into()),
                delta: Some("AAAA".into())
            }
        );

        let speech: Value =
            serde_json::from_str(r#"{"type":"input_audio_buffer.speech_started","audio_start_ms":900}"#).unwrap();
        assert_eq!(
            ModelEvent::from_value(&speech).unwrap(),
            ModelEvent::SpeechStarted { item_id: None }
        );

        let other: Value = serde_json::from_str(r#"{"type":"response.audio_transcript.delta","delta":"hi"}"#).unwrap();
        assert_eq!(ModelEvent::from_value(&other).unwrap(), ModelEvent::Other);
    }

    #[test]
    fn test_function_call_extraction() {
        let done: Value = serde_json::from_str(
            r#"{"type":"response.output_item.done","item":{"type":"function_call","id":"fc_1","call_id":"call_1","name":"press_keypad","arguments":"{\"digit\":\"1\"}","status":"completed"}}"#,
        )
        .unwrap();
        let call = ModelEvent::from_value(&done).unwrap().function_call().unwrap();
        assert_eq!(call.call_id, "call_1");
        assert_eq!(call.name, "press_keypad");
        assert_eq!(call.arguments, r#"{"digit":"1"}"#);

        let message: Value = serde_json::from_str(
            r#"{"type":"response.output_item.done","item":{"type":"message","id":"m1","role":"assistant"}}"#,
        )
        .unwrap();
        assert!(ModelEvent::from_value(&message).unwrap().function_call().is_none());
    }

    #[test]
    fn test_forward_envelope_defaults_item_id() {
        let event = json!({
            "type": "response.output_item.done",
            "item": {"type": "function_call", "call_id": "call_9", "name": "end_call", "arguments": "{}"}
        });
        let wrapped = forward_envelope(event, "session-1", 42);
        assert_eq!(wrapped["sessionId"], "session-1");
        assert_eq!(wrapped["timestamp"], 42);
        assert_eq!(wrapped["item"]["id"], "call_9");

        let with_id = json!({
            "type": "response.output_item.done",
            "item": {"type": "function_call", "id": "fc_1", "call_id": "call_9", "name": "end_call"}
        });
        assert_eq!(forward_envelope(with_id, "s", 1)["item"]["id"], "fc_1");
    }

    #[test]
    fn test_outbound_commands() {
        assert_eq!(
            serde_json::to_value(ModelCommand::Truncate {
                item_id: "item_1".into(),
                content_index: 0,
                audio_end_ms: 3000
            })
            .unwrap(),
            json!({"type": "conversation.item.truncate", "item_id": "item_1", "content_index": 0, "audio_end_ms": 3000})
        );
        assert_eq!(
            serde_json::to_value(ModelCommand::CreateResponse).unwrap(),
            json!({"type": "response.create"})
        );

        let output = ModelCommand::function_output("call_1", &json!({"status": "ok"}));
        let value = serde_json::to_value(output).unwrap();
        assert_eq!(value["item"]["type"], "function_call_output");
        assert_eq!(value["item"]["output"], r#"{"status":"ok"}"#);
    }

    #[test]
    fn test_session_update_shape() {
        let agent = AgentConfig {
            instructions: "Be brief.".into(),
            voice: "verse".into(),
            tools: vec![],
        };
        let tools = vec![json!({"type": "function", "name": "end_call"})];
        let value = serde_json::to_value(ModelCommand::SessionUpdate {
            session: SessionSettings::for_call(&agent, tools),
        })
        .unwrap();

        assert_eq!(value["type"], "session.update");
        assert_eq!(value["session"]["turn_detection"]["type"], "semantic_vad");
        assert_eq!(value["session"]["input_audio_format"], "g711_ulaw");
        assert_eq!(value["session"]["voice"], "verse");
        assert_eq!(value["session"]["tools"][0]["name"], "end_call");
    }
}
