//! Linear-interpolation sample-rate conversion.
//!
//! Cheap and good enough for narrowband voice: each output sample is a
//! weighted mix of the two source samples that bound its fractional position.

use super::CARRIER_SAMPLE_RATE;

/// Resample `input` from `from_rate` to `to_rate`.
///
/// ## Behaviour:
/// - Output length is `ceil(len * to_rate / from_rate)`
/// - Equal rates return a copy of the input
/// - The right-hand neighbour is clamped to the last sample, so the tail
///   holds the final value instead of reading past the end
/// - Empty input (or a zero rate) yields empty output
pub fn resample(input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if input.is_empty() || from_rate == 0 || to_rate == 0 {
        return Vec::new();
    }
    if from_rate == to_rate {
        return input.to_vec();
    }

    let out_len = (input.len() as u64 * to_rate as u64).div_ceil(from_rate as u64) as usize;
    let step = from_rate as f64 / to_rate as f64;
    let last = input.len() - 1;

    (0..out_len)
        .map(|i| {
            let position = i as f64 * step;
            let left = (position.floor() as usize).min(last);
            let right = (left + 1).min(last);
            let fraction = (position - left as f64) as f32;
            input[left] * (1.0 - fraction) + input[right] * fraction
        })
        .collect()
}

/// Resample carrier-rate (8kHz) audio for a playback device.
pub fn resample_from_carrier(input: &[f32], device_rate: u32) -> Vec<f32> {
    resample(input, CARRIER_SAMPLE_RATE, device_rate)
}
