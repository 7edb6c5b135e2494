//! # Error Handling
//!
//! Error types for the relay core and the HTTP boundary.
//!
//! ## Error Families:
//! - **AudioError**: a monitor or carrier payload could not be decoded or re-encoded
//! - **RelayError**: an action hit a missing session, a closed peer, or a missing stream id
//! - **ToolError**: a tool call could not produce a result (converted into an error output, never thrown)
//! - **AppError**: what a REST handler returns; rendered as a JSON error envelope
//!
//! Socket callbacks never propagate these past the actor boundary. They are logged,
//! reported to the requesting monitor as `relay.error`, or returned to the AI peer
//! as a structured tool output.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Failures while turning a payload into samples or back.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("invalid base64 audio payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("PCM payload of {len} bytes is not a whole number of {width}-byte samples")]
    PartialSample { len: usize, width: usize },

    #[error("unsupported audio format '{0}'")]
    UnsupportedFormat(String),

    #[error("invalid sample rate {0}")]
    InvalidSampleRate(u32),
}

/// Precondition and transport failures inside the relay.
///
/// ## Usage:
/// Returned by session operations (`terminate`, `send_dtmf`, user-audio routing)
/// and by the REST handlers that front them. Each variant has a stable
/// machine-readable [`code`](RelayError::code) used in `relay.error` notices.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("session {0} not found")]
    SessionNotFound(String),

    #[error("session {session_id} has no open {peer} connection")]
    PeerUnavailable {
        session_id: String,
        peer: &'static str,
    },

    #[error("session {0} has no carrier stream id yet")]
    MissingStreamId(String),

    #[error("session capacity of {0} reached")]
    CapacityReached(usize),

    #[error("invalid DTMF digit '{0}'")]
    InvalidDigit(String),

    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error("failed to serialize frame: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("relay actor unavailable: {0}")]
    Mailbox(#[from] actix::MailboxError),
}

impl RelayError {
    pub fn code(&self) -> &'static str {
        match self {
            RelayError::SessionNotFound(_) => "session_not_found",
            RelayError::PeerUnavailable { .. } => "peer_unavailable",
            RelayError::MissingStreamId(_) => "missing_stream_id",
            RelayError::CapacityReached(_) => "capacity_reached",
            RelayError::InvalidDigit(_) => "invalid_digit",
            RelayError::Audio(_) => "invalid_audio",
            RelayError::Serialization(_) => "serialization_error",
            RelayError::Mailbox(_) => "relay_unavailable",
        }
    }
}

/// Why a tool call produced no value.
///
/// The dispatcher turns every one of these into `{"error": "<message>"}`
/// and sends it back to the AI peer as the call's output.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("No handler found for function: {0}")]
    UnknownTool(String),

    #[error("Invalid JSON arguments for function {name}: {reason}")]
    InvalidArguments { name: String, reason: String },

    #[error("{0}")]
    Failed(String),
}

impl From<RelayError> for ToolError {
    fn from(err: RelayError) -> Self {
        ToolError::Failed(err.to_string())
    }
}

/// Errors returned by REST handlers.
///
/// ## HTTP Status Code Mapping:
/// - Internal/ConfigError → 500
/// - BadRequest/ValidationError → 400
/// - Unauthorized → 401
/// - NotFound → 404
/// - Conflict → 409
/// - Unavailable → 503
///
/// ## JSON Response Format:
/// ```json
/// {
///   "error": {
///     "type": "not_found",
///     "message": "session session-1-abc not found",
///     "timestamp": "2025-01-01T12:00:00Z"
///   }
/// }
/// ```
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Internal(_) | AppError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) | AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let (error_type, message) = match self {
            AppError::Internal(msg) => ("internal_error", msg),
            AppError::BadRequest(msg) => ("bad_request", msg),
            AppError::Unauthorized(msg) => ("unauthorized", msg),
            AppError::NotFound(msg) => ("not_found", msg),
            AppError::Conflict(msg) => ("conflict", msg),
            AppError::Unavailable(msg) => ("unavailable", msg),
            AppError::ConfigError(msg) => ("config_error", msg),
            AppError::ValidationError(msg) => ("validation_error", msg),
        };

        HttpResponse::build(self.status_code()).json(json!({
            "error": {
                "type": error_type,
                "message": message,
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        }))
    }
}

/// Map relay failures onto HTTP semantics.
///
/// A missing session is a 404, a precondition the caller could fix (bad digit,
/// bad audio) is a 400, a peer that is not connected yet is a 409.
impl From<RelayError> for AppError {
    fn from(err: RelayError) -> Self {
        let message = err.to_string();
        match err {
            RelayError::SessionNotFound(_) => AppError::NotFound(message),
            RelayError::InvalidDigit(_) | RelayError::Audio(_) => AppError::BadRequest(message),
            RelayError::PeerUnavailable { .. } | RelayError::MissingStreamId(_) => {
                AppError::Conflict(message)
            }
            RelayError::CapacityReached(_) | RelayError::Mailbox(_) => {
                AppError::Unavailable(message)
            }
            RelayError::Serialization(_) => AppError::Internal(message),
        }
    }
}

impl From<actix::MailboxError> for AppError {
    fn from(err: actix::MailboxError) -> Self {
        AppError::Unavailable(format!("relay actor unavailable: {}", err))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// JSON parsing errors are almost always the client's fault, so they map to 400.
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(format!("JSON parsing error: {}", err))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

/// Shorthand for `Result<T, AppError>` used by every REST handler.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[test]
    fn test_relay_error_status_mapping() {
        let not_found: AppError = RelayError::SessionNotFound("s1".into()).into();
        assert_eq!(not_found.status_code(), StatusCode::NOT_FOUND);

        let bad_digit: AppError = RelayError::InvalidDigit("x".into()).into();
        assert_eq!(bad_digit.status_code(), StatusCode::BAD_REQUEST);

        let no_carrier: AppError = RelayError::PeerUnavailable {
            session_id: "s1".into(),
            peer: "carrier",
        }
        .into();
        assert_eq!(no_carrier.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_relay_error_codes_are_stable() {
        assert_eq!(RelayError::MissingStreamId("s".into()).code(), "missing_stream_id");
        assert_eq!(
            RelayError::Audio(AudioError::UnsupportedFormat("opus".into())).code(),
            "invalid_audio"
        );
    }

    #[actix_web::test]
    async fn test_error_envelope_shape() {
        let response = AppError::NotFound("session s1 not found".into()).error_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = to_bytes(response.into_body()).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"]["type"], "not_found");
        assert_eq!(value["error"]["message"], "session s1 not found");
        assert!(value["error"]["timestamp"].is_string());
    }
}
