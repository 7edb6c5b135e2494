//! Routing of AI-issued function calls.
//!
//! Dispatch never fails. Every problem becomes an `{"error": ...}` output so
//! the AI peer always gets an answer and keeps talking.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::pending::PendingCall;
use super::{ToolContext, ToolHandler, ToolKind, ToolRegistry};
use crate::error::ToolError;
use crate::protocol::model::FunctionCall;

/// What the relay should do with a dispatched call.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Send this value back as the call's output, then `response.create`
    Output(Value),
    /// Wait for a human; nothing is sent now
    Deferred(PendingCall),
}

fn error_output(err: &ToolError) -> Value {
    json!({ "error": err.to_string() })
}

/// Parse the argument string of a call. An empty string means no arguments.
pub fn parse_arguments(call: &FunctionCall) -> Result<Value, ToolError> {
    if call.arguments.trim().is_empty() {
        return Ok(json!({}));
    }
    serde_json::from_str(&call.arguments).map_err(|e| ToolError::InvalidArguments {
        name: call.name.clone(),
        reason: e.to_string(),
    })
}

/// How a call will be answered, decided without awaiting anything.
pub enum Route {
    /// Answer known now: an error output or a deferral
    Immediate(DispatchOutcome),
    /// A backend handler must run
    Run {
        handler: Arc<dyn ToolHandler>,
        args: Value,
    },
}

pub fn route(tools: &ToolRegistry, call: &FunctionCall) -> Route {
    let Some(tool) = tools.get(&call.name) else {
        warn!(function = %call.name, "Unknown function requested");
        let err = ToolError::UnknownTool(call.name.clone());
        return Route::Immediate(DispatchOutcome::Output(error_output(&err)));
    };

    let args = match parse_arguments(call) {
        Ok(args) => args,
        Err(e) => {
            warn!(error = %e, "Rejected function arguments");
            return Route::Immediate(DispatchOutcome::Output(error_output(&e)));
        }
    };

    match &tool.kind {
        ToolKind::Backend(handler) => Route::Run {
            handler: handler.clone(),
            args,
        },
        ToolKind::FrontendInput => {
            debug!(call_id = %call.call_id, "Deferring {} to operator", call.name);
            Route::Immediate(DispatchOutcome::Deferred(PendingCall {
                call_id: call.call_id.clone(),
                name: call.name.clone(),
                arguments: args,
                requested_at: Utc::now(),
            }))
        }
    }
}

/// Run a backend handler. A failure becomes an error output.
pub async fn run(handler: Arc<dyn ToolHandler>, name: String, args: Value, ctx: ToolContext) -> Value {
    debug!(session_id = %ctx.session_id, "Running function {}", name);
    match handler.invoke(args, ctx).await {
        Ok(value) => value,
        Err(e) => {
            warn!(function = %name, error = %e, "Function failed");
            error_output(&ToolError::Failed(format!("Error running function {}: {}", name, e)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RelayError;
    use crate::tools::CallControl;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingControl {
        actions: Mutex<Vec<String>>,
        fail_dtmf: bool,
    }

    #[async_trait]
    impl CallControl for RecordingControl {
        async fn terminate(&self, session_id: &str, reason: &str) -> Result<(), RelayError> {
            self.actions
                .lock()
                .unwrap()
                .push(format!("terminate {} {}", session_id, reason));
            Ok(())
        }

        async fn send_dtmf(&self, session_id: &str, digit: &str) -> Result<(), RelayError> {
            if self.fail_dtmf {
                return Err(RelayError::MissingStreamId(session_id.to_string()));
            }
            self.actions
                .lock()
                .unwrap()
                .push(format!("dtmf {} {}", session_id, digit));
            Ok(())
        }
    }

    fn call(name: &str, arguments: &str) -> FunctionCall {
        FunctionCall {
            call_id: "call_1".into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    fn context(control: Arc<RecordingControl>) -> ToolContext {
        ToolContext {
            session_id: "s1".into(),
            control,
        }
    }

    fn registry() -> Arc<ToolRegistry> {
        Arc::new(ToolRegistry::with_builtins())
    }

    /// Route then run, the way the relay answers a call.
    async fn dispatch(tools: Arc<ToolRegistry>, call: FunctionCall, ctx: ToolContext) -> DispatchOutcome {
        match route(&tools, &call) {
            Route::Immediate(outcome) => outcome,
            Route::Run { handler, args } => DispatchOutcome::Output(run(handler, call.name, args, ctx).await),
        }
    }

    #[actix_web::test]
    async fn test_unknown_tool_yields_error_output() {
        let control = Arc::new(RecordingControl::default());
        let outcome = dispatch(registry(), call("transfer_call", "{}"), context(control)).await;
        assert_eq!(
            outcome,
            DispatchOutcome::Output(json!({"error": "No handler found for function: transfer_call"}))
        );
    }

    #[actix_web::test]
    async fn test_bad_json_yields_error_output() {
        let control = Arc::new(RecordingControl::default());
        let outcome = dispatch(registry(), call("press_keypad", "{digit:"), context(control.clone())).await;
        match outcome {
            DispatchOutcome::Output(value) => {
                let message = value["error"].as_str().unwrap();
                assert!(message.starts_with("Invalid JSON arguments for function press_keypad"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(control.actions.lock().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn test_frontend_input_is_deferred() {
        let control = Arc::new(RecordingControl::default());
        let outcome = dispatch(
            registry(),
            call("get_more_information", r#"{"question":"Account number?","context":"billing"}"#),
            context(control),
        )
        .await;
        match outcome {
            DispatchOutcome::Deferred(pending) => {
                assert_eq!(pending.call_id, "call_1");
                assert_eq!(pending.arguments["question"], "Account number?");
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[actix_web::test]
    async fn test_end_call_terminates_with_default_reason() {
        let control = Arc::new(RecordingControl::default());
        let outcome = dispatch(registry(), call("end_call", ""), context(control.clone())).await;
        assert_eq!(
            outcome,
            DispatchOutcome::Output(json!({"status": "call_ended", "reason": "Call completed successfully"}))
        );
        assert_eq!(
            *control.actions.lock().unwrap(),
            vec!["terminate s1 Call completed successfully".to_string()]
        );
    }

    #[actix_web::test]
    async fn test_press_keypad_validates_digit() {
        let control = Arc::new(RecordingControl::default());
        let outcome = dispatch(registry(), call("press_keypad", r#"{"digit":"A"}"#), context(control.clone())).await;
        match outcome {
            DispatchOutcome::Output(value) => assert!(value["error"].is_string()),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(control.actions.lock().unwrap().is_empty());

        let outcome = dispatch(registry(), call("press_keypad", r##"{"digit":"#"}"##), context(control.clone())).await;
        match outcome {
            DispatchOutcome::Output(value) => {
                assert_eq!(value["status"], "success");
                assert_eq!(value["digit"], "#");
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(*control.actions.lock().unwrap(), vec!["dtmf s1 #".to_string()]);
    }

    #[actix_web::test]
    async fn test_handler_failure_becomes_error_output() {
        let control = Arc::new(RecordingControl {
            fail_dtmf: true,
            ..Default::default()
        });
        let outcome = dispatch(registry(), call("press_keypad", r#"{"digit":"1"}"#), context(control)).await;
        match outcome {
            DispatchOutcome::Output(value) => {
                let message = value["error"].as_str().unwrap();
                assert!(message.starts_with("Error running function press_keypad:"));
                assert!(message.contains("no carrier stream id"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }
}
