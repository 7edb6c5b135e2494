//! # Wire Protocols
//!
//! One tagged-union event type per peer protocol, plus the frames the relay sends back.
//!
//! ## Peers:
//! - **Carrier** (`carrier`): telephony media stream, tagged by `event`
//! - **AI** (`model`): realtime model socket, tagged by `type`
//! - **Monitor** (`monitor`): dashboard and listener sockets, tagged by `type`
//!
//! Inbound parsing never panics. A frame that does not parse is reported to the
//! caller as an error so it can be dropped with a diagnostic.

pub mod carrier;
pub mod model;
pub mod monitor;

/// Milliseconds since the Unix epoch, as stamped on monitor notices.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
