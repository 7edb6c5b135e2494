//! # Tool Registry
//!
//! Static registry of the functions the AI peer may call during a phone call.
//!
//! ## Call Types:
//! - **backend**: the relay runs a [`ToolHandler`] and returns its value at once
//! - **frontend_input**: no handler; the call waits for a human to answer from a monitor
//!
//! Handlers act on the live call only through the [`CallControl`] seam, so they
//! never hold a reference into the session registry.

pub mod builtin;
pub mod dispatcher;
pub mod pending;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::{RelayError, ToolError};

/// Whether a tool runs on the server or waits for a human.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallType {
    Backend,
    FrontendInput,
}

/// A function schema in the shape the realtime API expects.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSchema {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolSchema {
    pub fn function(name: &str, description: &str, parameters: Value) -> Self {
        Self {
            kind: "function",
            name: name.to_string(),
            description: description.to_string(),
            parameters,
        }
    }

    pub fn to_value(&self) -> Value {
        json!({
            "type": self.kind,
            "name": self.name,
            "description": self.description,
            "parameters": self.parameters,
        })
    }
}

/// Actions a tool may take on the call that invoked it.
#[async_trait]
pub trait CallControl: Send + Sync {
    /// Begin terminating the call. Removal happens after the grace delay.
    async fn terminate(&self, session_id: &str, reason: &str) -> Result<(), RelayError>;

    /// Send one DTMF digit to the carrier.
    async fn send_dtmf(&self, session_id: &str, digit: &str) -> Result<(), RelayError>;
}

/// What a handler gets besides its arguments.
#[derive(Clone)]
pub struct ToolContext {
    pub session_id: String,
    pub control: Arc<dyn CallControl>,
}

/// Server-side implementation of a backend tool.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn invoke(&self, args: Value, ctx: ToolContext) -> Result<Value, ToolError>;
}

/// How a registered tool is fulfilled.
#[derive(Clone)]
pub enum ToolKind {
    Backend(Arc<dyn ToolHandler>),
    FrontendInput,
}

#[derive(Clone)]
pub struct ToolDefinition {
    pub schema: ToolSchema,
    pub kind: ToolKind,
}

impl ToolDefinition {
    pub fn backend(schema: ToolSchema, handler: impl ToolHandler + 'static) -> Self {
        Self {
            schema,
            kind: ToolKind::Backend(Arc::new(handler)),
        }
    }

    pub fn frontend_input(schema: ToolSchema) -> Self {
        Self {
            schema,
            kind: ToolKind::FrontendInput,
        }
    }

    pub fn call_type(&self) -> CallType {
        match self.kind {
            ToolKind::Backend(_) => CallType::Backend,
            ToolKind::FrontendInput => CallType::FrontendInput,
        }
    }
}

/// Listing entry for the REST surface.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSummary {
    #[serde(flatten)]
    pub schema: ToolSchema,
    pub call_type: CallType,
}

/// Name-keyed set of tool definitions.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, ToolDefinition>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `end_call`, `press_keypad` and `get_more_information`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for tool in builtin::definitions() {
            registry.register(tool);
        }
        registry
    }

    /// Add a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: ToolDefinition) {
        self.tools.insert(tool.schema.name.clone(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn summaries(&self) -> Vec<ToolSummary> {
        self.tools
            .values()
            .map(|tool| ToolSummary {
                schema: tool.schema.clone(),
                call_type: tool.call_type(),
            })
            .collect()
    }

    /// Full schemas for the enabled tool names, in the order given.
    ///
    /// Names that are not registered are skipped.
    pub fn schemas_for(&self, enabled: &[String]) -> Vec<Value> {
        enabled
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.schema.to_value())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_registered_with_call_types() {
        let registry = ToolRegistry::with_builtins();
        assert_eq!(
            registry.names(),
            vec!["end_call", "get_more_information", "press_keypad"]
        );
        assert_eq!(registry.get("end_call").unwrap().call_type(), CallType::Backend);
        assert_eq!(
            registry.get("get_more_information").unwrap().call_type(),
            CallType::FrontendInput
        );
    }

    #[test]
    fn test_schemas_for_keeps_order_and_skips_unknown() {
        let registry = ToolRegistry::with_builtins();
        let schemas = registry.schemas_for(&[
            "press_keypad".to_string(),
            "transfer_call".to_string(),
            "end_call".to_string(),
        ]);
        assert_eq!(schemas.len(), 2);
        assert_eq!(schemas[0]["name"], "press_keypad");
        assert_eq!(schemas[0]["type"], "function");
        assert_eq!(schemas[0]["parameters"]["required"][0], "digit");
        assert_eq!(schemas[1]["name"], "end_call");
    }

    #[test]
    fn test_summary_serialization() {
        let registry = ToolRegistry::with_builtins();
        let summaries = serde_json::to_value(registry.summaries()).unwrap();
        let info = summaries
            .as_array()
            .unwrap()
            .iter()
            .find(|s| s["name"] == "get_more_information")
            .unwrap();
        assert_eq!(info["callType"], "frontend_input");
        assert_eq!(info["type"], "function");
    }
}
