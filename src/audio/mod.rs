//! # Audio Pipeline Module
//!
//! Sample-level building blocks shared by the relay and by playback clients.
//!
//! ## Key Components:
//! - **Codec**: G.711 mu-law <-> linear PCM conversion (carrier wire format)
//! - **Resampler**: Linear-interpolation sample-rate conversion
//! - **Jitter Buffer**: Fixed-capacity circular playback buffer with a pre-roll gate
//! - **Playback Processor**: Message-driven render loop that owns one jitter buffer
//!
//! ## Audio Formats:
//! - **Carrier**: 8kHz mono, 8-bit mu-law, base64 on the wire
//! - **Playback**: unit-interval `f32` at the device rate (48kHz by default)
//! - **Monitor uploads**: `g711_ulaw`, `pcm_f32le` or `pcm_s16le` (see [`codec::encode_user_audio`])

pub mod buffer;      // Jitter buffer with overflow eviction
pub mod codec;       // mu-law codec and payload helpers
pub mod processor;   // Render-callback port protocol
pub mod resample;    // Linear-interpolation resampler

/// Sample rate of the carrier media stream.
pub const CARRIER_SAMPLE_RATE: u32 = 8000;

/// Default sample rate of a playback device.
pub const DEFAULT_DEVICE_SAMPLE_RATE: u32 = 48000;
