//! Tools every agent gets out of the box.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use super::{ToolContext, ToolDefinition, ToolHandler, ToolSchema};
use crate::error::ToolError;

pub const END_CALL: &str = "end_call";
pub const PRESS_KEYPAD: &str = "press_keypad";
pub const GET_MORE_INFORMATION: &str = "get_more_information";

const DEFAULT_END_REASON: &str = "Call completed successfully";

/// Keys a phone keypad can send.
pub fn is_keypad_digit(digit: &str) -> bool {
    let mut chars = digit.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some(c), None) if c.is_ascii_digit() || c == '*' || c == '#'
    )
}

pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::backend(
            ToolSchema::function(
                END_CALL,
                "End the current phone call. Use this when the conversation is complete or the caller asks to hang up.",
                json!({
                    "type": "object",
                    "properties": {
                        "reason": {
                            "type": "string",
                            "description": "Short reason for ending the call"
                        }
                    },
                    "required": []
                }),
            ),
            EndCall,
        ),
        ToolDefinition::backend(
            ToolSchema::function(
                PRESS_KEYPAD,
                "Press a key on the phone keypad to navigate an automated phone menu.",
                json!({
                    "type": "object",
                    "properties": {
                        "digit": {
                            "type": "string",
                            "description": "The key to press: 0-9, * or #",
                            "enum": ["0", "1", "2", "3", "4", "5", "6", "7", "8", "9", "*", "#"]
                        }
                    },
                    "required": ["digit"]
                }),
            ),
            PressKeypad,
        ),
        ToolDefinition::frontend_input(ToolSchema::function(
            GET_MORE_INFORMATION,
            "Ask the human operator for information you do not have. The answer arrives later as this call's output.",
            json!({
                "type": "object",
                "properties": {
                    "question": {
                        "type": "string",
                        "description": "What you need to know"
                    },
                    "context": {
                        "type": "string",
                        "description": "Why it is needed in this call"
                    }
                },
                "required": ["question", "context"]
            }),
        )),
    ]
}

/// Hang up the call that invoked the tool.
pub struct EndCall;

#[async_trait]
impl ToolHandler for EndCall {
    async fn invoke(&self, args: Value, ctx: ToolContext) -> Result<Value, ToolError> {
        let reason = args
            .get("reason")
            .and_then(Value::as_str)
            .filter(|reason| !reason.is_empty())
            .unwrap_or(DEFAULT_END_REASON)
            .to_string();

        info!(session_id = %ctx.session_id, reason = %reason, "Agent requested end of call");
        ctx.control.terminate(&ctx.session_id, &reason).await?;

        Ok(json!({ "status": "call_ended", "reason": reason }))
    }
}

/// Send a DTMF tone on the carrier leg.
pub struct PressKeypad;

#[async_trait]
impl ToolHandler for PressKeypad {
    async fn invoke(&self, args: Value, ctx: ToolContext) -> Result<Value, ToolError> {
        let digit = args.get("digit").and_then(Value::as_str).unwrap_or_default();

        if !is_keypad_digit(digit) {
            return Ok(json!({
                "error": format!("Invalid digit '{}'. Must be 0-9, * or #", digit)
            }));
        }

        ctx.control.send_dtmf(&ctx.session_id, digit).await?;

        Ok(json!({
            "status": "success",
            "message": format!("Pressed key {}", digit),
            "digit": digit
        }))
    }
}
