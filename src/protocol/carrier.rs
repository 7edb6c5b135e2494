//! Carrier media-stream frames.
//!
//! Inbound: `connected`, `start`, `media`, `mark`, `close` (or `stop`).
//! Outbound: `media`, `mark`, `clear`, `dtmf`, each carrying the `streamSid`.

use serde::{Deserialize, Deserializer, Serialize};

/// An inbound carrier frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum CarrierEvent {
    Start { start: StreamStart },
    Media { media: InboundMedia },
    #[serde(alias = "stop")]
    Close,
    /// `connected`, `mark` acknowledgements and anything newer
    #[serde(other)]
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StreamStart {
    #[serde(rename = "streamSid")]
    pub stream_sid: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InboundMedia {
    /// Milliseconds since stream start on the carrier's clock
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: u64,
    pub payload: String,
}

impl CarrierEvent {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Some carriers send the media timestamp as a JSON string.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(u64),
        Float(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Int(value) => Ok(value),
        Raw::Float(value) => Ok(value.max(0.0) as u64),
        Raw::Text(text) => text.trim().parse::<u64>().map_err(serde::de::Error::custom),
    }
}

/// An outbound carrier frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum CarrierCommand {
    Media { stream_sid: String, media: OutboundMedia },
    Mark { stream_sid: String, mark: MarkLabel },
    Clear { stream_sid: String },
    Dtmf { stream_sid: String, dtmf: DtmfDigit },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundMedia {
    pub payload: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkLabel {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DtmfDigit {
    pub digit: String,
}

impl CarrierCommand {
    pub fn media(stream_sid: &str, payload: impl Into<String>) -> Self {
        CarrierCommand::Media {
            stream_sid: stream_sid.to_string(),
            media: OutboundMedia { payload: payload.into() },
        }
    }

    pub fn mark(stream_sid: &str, name: impl Into<String>) -> Self {
        CarrierCommand::Mark {
            stream_sid: stream_sid.to_string(),
            mark: MarkLabel { name: name.into() },
        }
    }

    pub fn clear(stream_sid: &str) -> Self {
        CarrierCommand::Clear {
            stream_sid: stream_sid.to_string(),
        }
    }

    pub fn dtmf(stream_sid: &str, digit: impl Into<String>) -> Self {
        CarrierCommand::Dtmf {
            stream_sid: stream_sid.to_string(),
            dtmf: DtmfDigit { digit: digit.into() },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_start_and_media() {
        let start = CarrierEvent::parse(
            r#"{"event":"start","sequenceNumber":"1","start":{"streamSid":"MZ1","tracks":["inbound"]},"streamSid":"MZ1"}"#,
        )
        .unwrap();
        assert_eq!(
            start,
            CarrierEvent::Start {
                start: StreamStart { stream_sid: "MZ1".into() }
            }
        );

        let media =
            CarrierEvent::parse(r#"{"event":"media","media":{"timestamp":"1280","payload":"//8="}}"#)
                .unwrap();
        assert_eq!(
            media,
            CarrierEvent::Media {
                media: InboundMedia { timestamp: 1280, payload: "//8=".into() }
            }
        );

        let numeric =
            CarrierEvent::parse(r#"{"event":"media","media":{"timestamp":40,"payload":""}}"#).unwrap();
        assert!(matches!(numeric, CarrierEvent::Media { media } if media.timestamp == 40));
    }

    #[test]
    fn test_close_aliases_and_ignored_events() {
        assert_eq!(CarrierEvent::parse(r#"{"event":"close"}"#).unwrap(), CarrierEvent::Close);
        assert_eq!(
            CarrierEvent::parse(r#"{"event":"stop","stop":{"callSid":"CA1"}}"#).unwrap(),
            CarrierEvent::Close
        );
        assert_eq!(
            CarrierEvent::parse(r#"{"event":"connected","protocol":"Call"}"#).unwrap(),
            CarrierEvent::Ignored
        );
        assert_eq!(
            CarrierEvent::parse(r#"{"event":"mark","mark":{"name":"x"}}"#).unwrap(),
            CarrierEvent::Ignored
        );
    }

    #[test]
    fn test_malformed_frames_are_errors() {
        assert!(CarrierEvent::parse("not json").is_err());
        assert!(CarrierEvent::parse(r#"{"event":"media"}"#).is_err());
        assert!(CarrierEvent::parse(r#"{"event":"media","media":{"timestamp":"soon","payload":""}}"#).is_err());
    }

    #[test]
    fn test_outbound_frames() {
        assert_eq!(
            serde_json::to_value(CarrierCommand::media("MZ1", "AAAA")).unwrap(),
            json!({"event": "media", "streamSid": "MZ1", "media": {"payload": "AAAA"}})
        );
        assert_eq!(
            serde_json::to_value(CarrierCommand::mark("MZ1", "item_1")).unwrap(),
            json!({"event": "mark", "streamSid": "MZ1", "mark": {"name": "item_1"}})
        );
        assert_eq!(
            serde_json::to_value(CarrierCommand::clear("MZ1")).unwrap(),
            json!({"event": "clear", "streamSid": "MZ1"})
        );
        assert_eq!(
            serde_json::to_value(CarrierCommand::dtmf("MZ1", "#")).unwrap(),
            json!({"event": "dtmf", "streamSid": "MZ1", "dtmf": {"digit": "#"}})
        );
    }
}
