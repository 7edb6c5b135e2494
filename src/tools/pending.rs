//! Tool calls waiting for a human answer.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// A frontend_input call the AI peer is waiting on.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingCall {
    pub call_id: String,
    pub name: String,
    pub arguments: Value,
    pub requested_at: DateTime<Utc>,
}

/// Open frontend_input calls of one session, keyed by `call_id`.
#[derive(Debug, Default)]
pub struct PendingCalls {
    open: HashMap<String, PendingCall>,
}

impl PendingCalls {
    /// Record a deferred call. A repeated `call_id` replaces the earlier entry.
    pub fn defer(&mut self, call: PendingCall) {
        self.open.insert(call.call_id.clone(), call);
    }

    /// Mark a call answered. Returns the call the first time only.
    pub fn complete(&mut self, call_id: &str) -> Option<PendingCall> {
        self.open.remove(call_id)
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }
}
