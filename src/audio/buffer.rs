//! # Jitter Buffer
//!
//! Fixed-capacity circular sample buffer that feeds a real-time render callback.
//!
//! ## Key Features:
//! - **Circular storage**: one second of audio at the device rate, allocated once
//! - **Overflow eviction**: a write that would not fit drops the oldest samples first
//! - **Pre-roll gate**: small chunks (incremental AI speech) are held back until
//!   enough audio is queued; large chunks (carrier media) open the gate at once
//! - **Safety floor**: once playing, rendering stops consuming when the buffer runs low
//!
//! The buffer is single-owner and never locks. It lives inside a
//! [`PlaybackProcessor`](super::processor::PlaybackProcessor), which only talks to the
//! outside world through messages.

use serde::Serialize;

/// Chunks shorter than this many samples are treated as incremental AI speech.
pub const SMALL_CHUNK_SAMPLES: usize = 500;

/// Chunks longer than this many samples open the pre-roll gate on arrival.
pub const LARGE_CHUNK_SAMPLES: usize = 1000;

/// Tuning for a [`JitterBuffer`].
#[derive(Debug, Clone)]
pub struct JitterConfig {
    /// Playback device rate; capacity is one second at this rate
    pub sample_rate: u32,

    /// Samples that must be queued before a gated stream may start (100ms at 48kHz)
    pub pre_roll_samples: usize,

    /// Steady-state floor below which rendering emits silence (50ms at 48kHz)
    pub safety_samples: usize,
}

impl Default for JitterConfig {
    fn default() -> Self {
        Self {
            sample_rate: super::DEFAULT_DEVICE_SAMPLE_RATE,
            pre_roll_samples: 4800,
            safety_samples: 2400,
        }
    }
}

impl JitterConfig {
    /// Same thresholds in milliseconds, scaled to another device rate.
    pub fn for_sample_rate(sample_rate: u32) -> Self {
        let per_ms = sample_rate as usize / 1000;
        Self {
            sample_rate,
            pre_roll_samples: per_ms * 100,
            safety_samples: per_ms * 50,
        }
    }
}

/// What a write did to the buffer.
///
/// A single write can evict samples, enter the gate, and leave it again
/// (a large chunk into an empty gated buffer), so each is reported separately.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteReport {
    pub chunk_size: usize,
    pub samples_available: usize,
    pub dropped_samples: usize,
    pub entered_pre_buffering: bool,
    pub completed_pre_buffering: bool,
    pub is_pre_buffering: bool,
}

pub struct JitterBuffer {
    samples: Box<[f32]>,
    write_pos: usize,
    read_pos: usize,
    available: usize,
    playing: bool,
    pre_buffering: bool,
    config: JitterConfig,
}

impl JitterBuffer {
    pub fn new(config: JitterConfig) -> Self {
        let capacity = (config.sample_rate as usize).max(1);
        Self {
            samples: vec![0.0; capacity].into_boxed_slice(),
            write_pos: 0,
            read_pos: 0,
            available: 0,
            playing: false,
            pre_buffering: false,
            config,
        }
    }

    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    pub fn available(&self) -> usize {
        self.available
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_pre_buffering(&self) -> bool {
        self.pre_buffering
    }

    pub fn config(&self) -> &JitterConfig {
        &self.config
    }

    /// Queued audio expressed in milliseconds at the device rate.
    pub fn latency_ms(&self) -> f64 {
        self.available as f64 * 1000.0 / self.config.sample_rate.max(1) as f64
    }

    /// Append a chunk, evicting the oldest samples if it would not fit.
    ///
    /// ## Process:
    /// 1. If `available + n > capacity`, advance the read cursor by the overflow
    /// 2. Copy the chunk in at the write cursor, wrapping at capacity
    /// 3. Update the pre-roll gate from the chunk size and the new fill level
    ///
    /// A chunk longer than the whole buffer keeps only its newest `capacity` samples.
    pub fn write(&mut self, chunk: &[f32]) -> WriteReport {
        let capacity = self.capacity();
        let incoming = chunk.len();
        let mut report = WriteReport {
            chunk_size: incoming,
            ..WriteReport::default()
        };

        if self.available + incoming > capacity {
            let overflow = self.available + incoming - capacity;
            let evicted = overflow.min(self.available);
            self.read_pos = (self.read_pos + evicted) % capacity;
            self.available -= evicted;
            report.dropped_samples = overflow;
        }

        let kept = &chunk[incoming.saturating_sub(capacity)..];
        for &sample in kept {
            self.samples[self.write_pos] = sample;
            self.write_pos = (self.write_pos + 1) % capacity;
        }
        self.available += kept.len();
        if kept.len() == capacity {
            // Buffer holds exactly the chunk's tail
            self.read_pos = self.write_pos;
        }

        let small = incoming < SMALL_CHUNK_SAMPLES;
        let large = incoming > LARGE_CHUNK_SAMPLES;

        if small && !self.playing && self.available < self.config.pre_roll_samples {
            self.pre_buffering = true;
            report.entered_pre_buffering = true;
        }

        if self.pre_buffering && (self.available >= self.config.pre_roll_samples || large) {
            self.pre_buffering = false;
            report.completed_pre_buffering = true;
        }

        report.samples_available = self.available;
        report.is_pre_buffering = self.pre_buffering;
        report
    }

    /// Fill one render quantum.
    ///
    /// Emits silence without consuming when stopped, gated, empty, or below the
    /// safety floor. Otherwise consumes while more than the floor remains and
    /// zero-fills whatever slots are left. Returns the number of samples consumed.
    pub fn render(&mut self, out: &mut [f32]) -> usize {
        if !self.playing
            || self.pre_buffering
            || self.available == 0
            || self.available < self.config.safety_samples
        {
            out.fill(0.0);
            return 0;
        }

        let capacity = self.capacity();
        let mut consumed = 0;
        for slot in out.iter_mut() {
            if self.available > self.config.safety_samples {
                *slot = self.samples[self.read_pos];
                self.read_pos = (self.read_pos + 1) % capacity;
                self.available -= 1;
                consumed += 1;
            } else {
                *slot = 0.0;
            }
        }
        consumed
    }

    pub fn start(&mut self) {
        self.playing = true;
    }

    /// Stop playback and discard everything queued.
    pub fn stop(&mut self) {
        self.playing = false;
        self.clear();
    }

    /// Discard everything queued without changing the playing flag.
    pub fn clear(&mut self) {
        self.write_pos = 0;
        self.read_pos = 0;
        self.available = 0;
        self.pre_buffering = false;
        self.samples.fill(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer() -> JitterBuffer {
        JitterBuffer::new(JitterConfig::default())
    }

    #[test]
    fn test_count_never_exceeds_capacity() {
        let mut buf = buffer();
        let chunk = vec![0.25f32; 7000];
        for _ in 0..20 {
            let report = buf.write(&chunk);
            assert!(buf.available() <= buf.capacity());
            assert_eq!(report.samples_available, buf.available());
        }
        assert_eq!(buf.available(), buf.capacity());
    }

    #[test]
    fn test_overflow_evicts_exact_amount() {
        let mut buf = buffer();
        buf.write(&vec![0.1f32; 47000]);
        let report = buf.write(&vec![0.2f32; 2000]);
        // 47000 + 2000 - 48000
        assert_eq!(report.dropped_samples, 1000);
        assert_eq!(buf.available(), 48000);
    }

    #[test]
    fn test_overflow_drops_oldest_samples() {
        let mut buf = JitterBuffer::new(JitterConfig {
            sample_rate: 8,
            pre_roll_samples: 0,
            safety_samples: 0,
        });
        buf.write(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let report = buf.write(&[7.0, 8.0, 9.0, 10.0]);
        assert_eq!(report.dropped_samples, 2);

        buf.start();
        let mut out = [0.0f32; 8];
        assert_eq!(buf.render(&mut out), 8);
        assert_eq!(out, [3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0]);
    }

    #[test]
    fn test_oversize_chunk_keeps_newest_tail() {
        let mut buf = JitterBuffer::new(JitterConfig {
            sample_rate: 4,
            pre_roll_samples: 0,
            safety_samples: 0,
        });
        buf.write(&[1.0]);
        let report = buf.write(&[2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        assert_eq!(report.dropped_samples, 3);
        assert_eq!(buf.available(), 4);

        buf.start();
        let mut out = [0.0f32; 4];
        buf.render(&mut out);
        assert_eq!(out, [4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn test_pre_roll_gate_completes_exactly_once() {
        let mut buf = buffer();
        let delta = vec![0.1f32; 480];
        let mut completions = 0;

        for i in 0..20 {
            let report = buf.write(&delta);
            if report.completed_pre_buffering {
                completions += 1;
                // 10 chunks of 480 reach the 4800 threshold
                assert_eq!(i, 9);
                assert!(buf.available() >= 4800);
            }
            if buf.available() < 4800 {
                assert!(buf.is_pre_buffering());
            }
        }
        assert_eq!(completions, 1);
        assert!(!buf.is_pre_buffering());
    }

    #[test]
    fn test_large_chunk_opens_gate_below_threshold() {
        let mut buf = buffer();
        assert!(buf.write(&vec![0.1f32; 400]).entered_pre_buffering);
        let report = buf.write(&vec![0.1f32; 1600]);
        assert!(report.completed_pre_buffering);
        assert!(buf.available() < 4800);
        assert!(!buf.is_pre_buffering());
    }

    #[test]
    fn test_medium_chunk_does_not_open_gate() {
        let mut buf = buffer();
        buf.write(&vec![0.1f32; 400]);
        let report = buf.write(&vec![0.1f32; 800]);
        assert!(!report.completed_pre_buffering);
        assert!(buf.is_pre_buffering());
    }

    #[test]
    fn test_small_chunk_while_playing_is_not_gated() {
        let mut buf = buffer();
        buf.start();
        let report = buf.write(&vec![0.1f32; 100]);
        assert!(!report.entered_pre_buffering);
        assert!(!buf.is_pre_buffering());
    }

    #[test]
    fn test_render_silent_until_started() {
        let mut buf = buffer();
        buf.write(&vec![0.5f32; 6000]);
        let mut out = [1.0f32; 128];
        assert_eq!(buf.render(&mut out), 0);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(buf.available(), 6000);
    }

    #[test]
    fn test_render_respects_safety_floor() {
        let mut buf = buffer();
        buf.start();
        buf.write(&vec![0.5f32; 2500]);

        let mut out = [1.0f32; 128];
        // Only 100 samples sit above the 2400 floor
        assert_eq!(buf.render(&mut out), 100);
        assert!(out[..100].iter().all(|&s| s == 0.5));
        assert!(out[100..].iter().all(|&s| s == 0.0));
        assert_eq!(buf.available(), 2400);

        // At the floor nothing more is consumed
        assert_eq!(buf.render(&mut out), 0);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(buf.available(), 2400);
    }

    #[test]
    fn test_render_below_floor_never_underflows() {
        let mut buf = buffer();
        buf.start();
        buf.write(&vec![0.5f32; 1200]);
        let mut out = [1.0f32; 256];
        for _ in 0..10 {
            assert_eq!(buf.render(&mut out), 0);
        }
        assert_eq!(buf.available(), 1200);
    }

    #[test]
    fn test_stop_and_clear_reset() {
        let mut buf = buffer();
        buf.start();
        buf.write(&vec![0.5f32; 3000]);
        buf.clear();
        assert_eq!(buf.available(), 0);
        assert!(buf.is_playing());

        buf.write(&vec![0.5f32; 3000]);
        buf.stop();
        assert_eq!(buf.available(), 0);
        assert!(!buf.is_playing());
    }

    #[test]
    fn test_config_scales_with_rate() {
        let cfg = JitterConfig::for_sample_rate(44100);
        assert_eq!(cfg.pre_roll_samples, 4400);
        assert_eq!(cfg.safety_samples, 2200);
        assert_eq!(JitterBuffer::new(cfg).capacity(), 44100);
    }
}
