//! # Call Relay
//!
//! Bridges phone calls from a carrier's media-stream socket to a realtime AI
//! voice endpoint, and lets human operators watch and join calls live.
//!
//! ## Modules:
//! - **config**: Application configuration (TOML file + environment variables)
//! - **relay**: The relay actor owning every live call session
//! - **protocol**: Wire formats of the carrier, AI and monitor sockets
//! - **audio**: Mu-law codec, resampler and jitter buffer for operator audio
//! - **tools**: Functions the AI may call and their dispatcher
//! - **websocket**: `/call` and `/logs` socket actors plus the AI client
//! - **handlers** / **health**: The REST surface
//! - **error**: Error types and HTTP error responses

pub mod audio;
pub mod config;
pub mod error;
pub mod handlers;
pub mod health;
pub mod protocol;
pub mod relay;
pub mod state;
pub mod tools;
pub mod websocket;
