//! # mu-law Codec
//!
//! Table-free G.711 mu-law conversion plus the base64 payload helpers used on
//! the carrier and monitor sockets.
//!
//! ## Sample Domains:
//! - **16-bit linear**: what [`encode_sample`] consumes and [`decode_sample`] produces
//! - **14-bit linear**: the native mu-law dynamic range, clamped to ±8159
//! - **Unit float**: 14-bit value / 8192, the playback pipeline's format

use base64::{engine::general_purpose::STANDARD, Engine as _};
use byteorder::{ByteOrder, LittleEndian};

use super::resample::resample;
use super::CARRIER_SAMPLE_RATE;
use crate::error::AudioError;

const BIAS: i32 = 0x84;
const CLIP: i32 = 32635;

/// Largest magnitude of a 14-bit mu-law sample.
pub const MULAW_14BIT_MAX: i16 = 8159;

/// Sample rate assumed for `pcm_*` monitor uploads that do not declare one.
pub const DEFAULT_USER_AUDIO_RATE: u32 = 24000;

/// Decode one mu-law byte to a 16-bit linear sample.
pub fn decode_sample(byte: u8) -> i16 {
    let inverted = !byte;
    let exponent = ((inverted >> 4) & 0x07) as i32;
    let mantissa = (inverted & 0x0F) as i32;
    let magnitude = (((mantissa << 3) + BIAS) << exponent) - BIAS;

    if inverted & 0x80 != 0 {
        -magnitude as i16
    } else {
        magnitude as i16
    }
}

/// Decode one mu-law byte to the 14-bit range.
pub fn decode_sample_14(byte: u8) -> i16 {
    (decode_sample(byte) >> 2).clamp(-MULAW_14BIT_MAX, MULAW_14BIT_MAX)
}

/// Decode one mu-law byte to a float in `[-1.0, 1.0)`.
pub fn decode_unit(byte: u8) -> f32 {
    decode_sample_14(byte) as f32 / 8192.0
}

/// Encode a 16-bit linear sample as mu-law.
///
/// ## Process:
/// 1. Split off the sign and clip the magnitude
/// 2. Add the bias and find the segment (highest set bit above bit 7)
/// 3. Keep the four bits below the segment as the mantissa
/// 4. Invert the assembled byte
pub fn encode_sample(sample: i16) -> u8 {
    let mut pcm = sample as i32;
    let sign = if pcm < 0 {
        pcm = -pcm;
        0x80
    } else {
        0x00
    };

    let pcm = pcm.min(CLIP) + BIAS;
    // pcm is in [0x84, 0x7FFF], so the highest set bit is 7..=14
    let exponent = (31 - pcm.leading_zeros() as i32 - 7).clamp(0, 7);
    let mantissa = (pcm >> (exponent + 3)) & 0x0F;

    !((sign | (exponent << 4) | mantissa) as u8)
}

/// Decode a buffer of mu-law bytes to unit floats.
pub fn decode_unit_buffer(bytes: &[u8]) -> Vec<f32> {
    bytes.iter().map(|&b| decode_unit(b)).collect()
}

/// Encode unit floats to mu-law, clamping out-of-range input.
pub fn encode_unit_buffer(samples: &[f32]) -> Vec<u8> {
    samples
        .iter()
        .map(|&s| encode_sample((s.clamp(-1.0, 1.0) * 32767.0) as i16))
        .collect()
}

/// Decode a base64 carrier media payload into unit-float samples at 8kHz.
pub fn decode_carrier_payload(payload: &str) -> Result<Vec<f32>, AudioError> {
    let bytes = STANDARD.decode(payload)?;
    Ok(decode_unit_buffer(&bytes))
}

/// Decode a base64 carrier payload and resample it for a playback device.
///
/// This is the client-side path: Codec → Resampler, ready to post to a
/// [`PlaybackPort`](super::processor::PlaybackPort) as an `audio-chunk`.
pub fn carrier_payload_to_device(payload: &str, device_rate: u32) -> Result<Vec<f32>, AudioError> {
    let samples = decode_carrier_payload(payload)?;
    Ok(resample(&samples, CARRIER_SAMPLE_RATE, device_rate))
}

/// Number of raw bytes a base64 payload decodes to, without decoding it.
pub fn decoded_len(payload: &str) -> usize {
    let trimmed = payload.trim_end_matches('=');
    trimmed.len() * 3 / 4
}

/// Audio formats a monitor may upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAudioFormat {
    /// Already carrier-ready, forwarded unchanged
    G711Ulaw,
    PcmF32Le,
    PcmS16Le,
}

impl UserAudioFormat {
    /// Parse the `format` field of a `user_audio` message. A missing format means mu-law.
    pub fn parse(format: Option<&str>) -> Result<Self, AudioError> {
        match format {
            None | Some("g711_ulaw") | Some("ulaw") => Ok(Self::G711Ulaw),
            Some("pcm_f32le") => Ok(Self::PcmF32Le),
            Some("pcm_s16le") | Some("pcm16") => Ok(Self::PcmS16Le),
            Some(other) => Err(AudioError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Turn a monitor `user_audio` payload into a base64 mu-law 8kHz payload.
///
/// Both the carrier socket and the AI socket (configured for `g711_ulaw`
/// input) accept the result unchanged, so one encode serves both sends.
///
/// ## Parameters:
/// - **audio**: base64 payload as sent by the monitor
/// - **format**: the message's `format` field
/// - **sample_rate**: the message's `sampleRate` field (defaults to 24kHz for PCM)
pub fn encode_user_audio(
    audio: &str,
    format: Option<&str>,
    sample_rate: Option<u32>,
) -> Result<String, AudioError> {
    let format = UserAudioFormat::parse(format)?;
    let rate = sample_rate.unwrap_or(DEFAULT_USER_AUDIO_RATE);
    if rate == 0 {
        return Err(AudioError::InvalidSampleRate(rate));
    }

    let bytes = STANDARD.decode(audio)?;
    let samples = match format {
        // Validated, forwarded without re-encoding
        UserAudioFormat::G711Ulaw => return Ok(audio.to_string()),
        UserAudioFormat::PcmF32Le => read_f32le(&bytes)?,
        UserAudioFormat::PcmS16Le => read_s16le(&bytes)?,
    };

    let narrowband = resample(&samples, rate, CARRIER_SAMPLE_RATE);
    Ok(STANDARD.encode(encode_unit_buffer(&narrowband)))
}

fn read_f32le(bytes: &[u8]) -> Result<Vec<f32>, AudioError> {
    if bytes.len() % 4 != 0 {
        return Err(AudioError::PartialSample { len: bytes.len(), width: 4 });
    }
    let mut samples = vec![0.0f32; bytes.len() / 4];
    LittleEndian::read_f32_into(bytes, &mut samples);
    Ok(samples)
}

fn read_s16le(bytes: &[u8]) -> Result<Vec<f32>, AudioError> {
    if bytes.len() % 2 != 0 {
        return Err(AudioError::PartialSample { len: bytes.len(), width: 2 });
    }
    let mut pcm = vec![0i16; bytes.len() / 2];
    LittleEndian::read_i16_into(bytes, &mut pcm);
    Ok(pcm.into_iter().map(|s| s as f32 / 32768.0).collect())
}
