//! Call session endpoints.
//!
//! Thin wrappers over relay messages. Every change still happens on the relay
//! actor, so monitors see API-triggered actions exactly like socket-triggered ones.

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::error::AppResult;
use crate::relay::messages::{ListSessions, SendDtmf, TerminateCall};
use crate::state::AppState;

const API_TERMINATE_REASON: &str = "Terminated via API";

#[derive(Debug, Default, Deserialize)]
pub struct TerminateRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DtmfRequest {
    pub digit: String,
}

pub async fn list_sessions(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let sessions = state.relay.send(ListSessions).await?;

    Ok(HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "count": sessions.len(),
        "sessions": sessions
    })))
}

/// Body is optional; without a reason the call ends with a generic one.
pub async fn terminate_session(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: Option<web::Json<TerminateRequest>>,
) -> AppResult<HttpResponse> {
    let session_id = path.into_inner();
    let reason = body
        .and_then(|body| body.into_inner().reason)
        .unwrap_or_else(|| API_TERMINATE_REASON.to_string());

    state
        .relay
        .send(TerminateCall {
            session_id: session_id.clone(),
            reason: reason.clone(),
        })
        .await??;

    Ok(HttpResponse::Accepted().json(json!({
        "status": "terminating",
        "sessionId": session_id,
        "reason": reason,
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

pub async fn send_dtmf(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<DtmfRequest>,
) -> AppResult<HttpResponse> {
    let session_id = path.into_inner();
    let digit = body.into_inner().digit;

    state
        .relay
        .send(SendDtmf {
            session_id: session_id.clone(),
            digit: digit.clone(),
        })
        .await??;

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "sessionId": session_id,
        "digit": digit,
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}
