//! Process-wide agent configuration applied to every new AI handshake.

use serde::{Deserialize, Serialize};

use crate::tools::builtin::{END_CALL, GET_MORE_INFORMATION, PRESS_KEYPAD};

const DEFAULT_INSTRUCTIONS: &str = "You are a voice assistant placing and answering phone calls. \
Speak naturally and keep answers short. Use press_keypad to navigate phone menus, \
ask the operator with get_more_information when you are missing details, \
and call end_call once the conversation is finished.";

/// Instructions, voice and enabled tools for the AI peer.
///
/// Replaced wholesale by `global_config.update`; already-open AI sockets keep
/// the settings they were opened with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub instructions: String,
    pub voice: String,
    #[serde(default)]
    pub tools: Vec<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            voice: "alloy".to_string(),
            tools: vec![
                END_CALL.to_string(),
                PRESS_KEYPAD.to_string(),
                GET_MORE_INFORMATION.to_string(),
            ],
        }
    }
}

impl AgentConfig {
    /// Reject configs the AI peer would refuse at handshake time.
    pub fn validate(&self) -> Result<(), String> {
        if self.voice.trim().is_empty() {
            return Err("voice cannot be empty".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_enables_builtin_tools() {
        let config = AgentConfig::default();
        assert_eq!(config.voice, "alloy");
        assert_eq!(config.tools.len(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_tools_deserialize_as_empty() {
        let config: AgentConfig =
            serde_json::from_str(r#"{"instructions":"Be brief","voice":"ash"}"#).unwrap();
        assert!(config.tools.is_empty());

        let blank = AgentConfig {
            voice: " ".into(),
            ..config
        };
        assert!(blank.validate().is_err());
    }
}
