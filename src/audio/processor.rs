//! # Playback Processor
//!
//! The real-time side of the client audio pipeline.
//!
//! A [`PlaybackProcessor`] owns a [`JitterBuffer`] and is driven by the audio clock
//! through [`PlaybackProcessor::process`]. Everything else talks to it through a
//! [`PlaybackPort`]: commands go in over one channel, status notices come back over
//! another. Nothing is shared and nothing blocks. The render tick only drains
//! commands with `try_recv`.
//!
//! ## Port Protocol:
//! - **In**: `audio-chunk {data}`, `start`, `stop`, `clear`
//! - **Out**: `chunk-added`, `pre-buffering`, `pre-buffer-complete`,
//!   `buffer-overflow {droppedSamples}`, `started`, `stopped`

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};

use super::buffer::{JitterBuffer, JitterConfig, WriteReport};
use super::codec::carrier_payload_to_device;
use crate::error::AudioError;

/// Messages posted into the render loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PortCommand {
    AudioChunk { data: Vec<f32> },
    Start,
    Stop,
    Clear,
}

/// Notices posted out of the render loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum PortStatus {
    ChunkAdded {
        samples_available: usize,
        chunk_size: usize,
        latency_ms: f64,
        is_pre_buffering: bool,
    },
    PreBuffering {
        samples_available: usize,
        min_buffer_size: usize,
    },
    PreBufferComplete {
        samples_buffered: usize,
    },
    BufferOverflow {
        dropped_samples: usize,
        latency_ms: f64,
    },
    Started,
    Stopped,
}

/// Create a connected port/processor pair.
pub fn playback_channel(config: JitterConfig) -> (PlaybackPort, PlaybackProcessor) {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (status_tx, status_rx) = mpsc::unbounded_channel();

    let device_rate = config.sample_rate;
    let port = PlaybackPort {
        commands: command_tx,
        statuses: status_rx,
        device_rate,
    };
    let processor = PlaybackProcessor {
        buffer: JitterBuffer::new(config),
        commands: command_rx,
        statuses: status_tx,
    };
    (port, processor)
}

/// Control-side handle to a [`PlaybackProcessor`].
pub struct PlaybackPort {
    commands: UnboundedSender<PortCommand>,
    statuses: UnboundedReceiver<PortStatus>,
    device_rate: u32,
}

impl PlaybackPort {
    /// Post a command. Returns `false` once the processor is gone.
    pub fn post(&self, command: PortCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    pub fn start(&self) -> bool {
        self.post(PortCommand::Start)
    }

    pub fn stop(&self) -> bool {
        self.post(PortCommand::Stop)
    }

    pub fn clear(&self) -> bool {
        self.post(PortCommand::Clear)
    }

    /// Decode a base64 mu-law carrier payload, resample it to the device
    /// rate and post it as one chunk.
    pub fn post_carrier_payload(&self, payload: &str) -> Result<bool, AudioError> {
        let data = carrier_payload_to_device(payload, self.device_rate)?;
        Ok(self.post(PortCommand::AudioChunk { data }))
    }

    /// Next pending status without waiting.
    pub fn try_status(&mut self) -> Option<PortStatus> {
        self.statuses.try_recv().ok()
    }

    /// Wait for the next status. `None` once the processor is dropped.
    pub async fn next_status(&mut self) -> Option<PortStatus> {
        self.statuses.recv().await
    }
}

/// Render-side owner of a jitter buffer.
pub struct PlaybackProcessor {
    buffer: JitterBuffer,
    commands: UnboundedReceiver<PortCommand>,
    statuses: UnboundedSender<PortStatus>,
}

impl PlaybackProcessor {
    /// One render tick: apply every queued command, then fill `out`.
    ///
    /// Returns `false` once the port has been dropped and no commands remain,
    /// so the host can tear the callback down.
    pub fn process(&mut self, out: &mut [f32]) -> bool {
        let alive = loop {
            match self.commands.try_recv() {
                Ok(command) => self.apply(command),
                Err(TryRecvError::Empty) => break true,
                Err(TryRecvError::Disconnected) => break false,
            }
        };
        self.buffer.render(out);
        alive
    }

    pub fn buffer(&self) -> &JitterBuffer {
        &self.buffer
    }

    fn apply(&mut self, command: PortCommand) {
        match command {
            PortCommand::AudioChunk { data } => {
                let report = self.buffer.write(&data);
                self.report_write(report);
            }
            PortCommand::Start => {
                self.buffer.start();
                self.notify(PortStatus::Started);
            }
            PortCommand::Stop => {
                self.buffer.stop();
                self.notify(PortStatus::Stopped);
            }
            PortCommand::Clear => self.buffer.clear(),
        }
    }

    fn report_write(&self, report: WriteReport) {
        let latency_ms = self.buffer.latency_ms();

        if report.dropped_samples > 0 {
            self.notify(PortStatus::BufferOverflow {
                dropped_samples: report.dropped_samples,
                latency_ms,
            });
        }
        if report.entered_pre_buffering {
            self.notify(PortStatus::PreBuffering {
                samples_available: report.samples_available,
                min_buffer_size: self.buffer.config().pre_roll_samples,
            });
        }
        if report.completed_pre_buffering {
            self.notify(PortStatus::PreBufferComplete {
                samples_buffered: report.samples_available,
            });
        }
        self.notify(PortStatus::ChunkAdded {
            samples_available: report.samples_available,
            chunk_size: report.chunk_size,
            latency_ms,
            is_pre_buffering: report.is_pre_buffering,
        });
    }

    fn notify(&self, status: PortStatus) {
        // A dropped port only means nobody is listening
        let _ = self.statuses.send(status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD, Engine as _};

    fn drain(port: &mut PlaybackPort) -> Vec<PortStatus> {
        std::iter::from_fn(|| port.try_status()).collect()
    }

    #[test]
    fn test_commands_apply_on_next_tick() {
        let (mut port, mut processor) = playback_channel(JitterConfig::default());
        port.start();
        port.post(PortCommand::AudioChunk { data: vec![0.5; 3000] });

        let mut out = [0.0f32; 128];
        assert!(processor.process(&mut out));
        assert!(out.iter().all(|&s| s == 0.5));

        let statuses = drain(&mut port);
        assert_eq!(statuses[0], PortStatus::Started);
        assert!(matches!(
            statuses[1],
            PortStatus::ChunkAdded { chunk_size: 3000, samples_available: 3000, .. }
        ));
    }

    #[test]
    fn test_small_chunks_report_gate_transitions() {
        let (mut port, mut processor) = playback_channel(JitterConfig::default());
        for _ in 0..10 {
            port.post(PortCommand::AudioChunk { data: vec![0.1; 480] });
        }
        let mut out = [0.0f32; 128];
        processor.process(&mut out);

        let statuses = drain(&mut port);
        let entered = statuses
            .iter()
            .filter(|s| matches!(s, PortStatus::PreBuffering { .. }))
            .count();
        let completed: Vec<_> = statuses
            .iter()
            .filter(|s| matches!(s, PortStatus::PreBufferComplete { .. }))
            .collect();
        assert_eq!(entered, 9);
        assert_eq!(completed, vec![&PortStatus::PreBufferComplete { samples_buffered: 4800 }]);
    }

    #[test]
    fn test_overflow_status_precedes_chunk_added() {
        let (mut port, mut processor) = playback_channel(JitterConfig::default());
        port.post(PortCommand::AudioChunk { data: vec![0.1; 40000] });
        port.post(PortCommand::AudioChunk { data: vec![0.1; 10000] });
        processor.process(&mut [0.0f32; 128]);

        let statuses = drain(&mut port);
        let overflow_at = statuses
            .iter()
            .position(|s| matches!(s, PortStatus::BufferOverflow { dropped_samples: 2000, .. }))
            .unwrap();
        assert!(matches!(
            statuses[overflow_at + 1],
            PortStatus::ChunkAdded { samples_available: 48000, .. }
        ));
    }

    #[test]
    fn test_stop_resets_and_reports() {
        let (mut port, mut processor) = playback_channel(JitterConfig::default());
        port.start();
        port.post(PortCommand::AudioChunk { data: vec![0.5; 6000] });
        port.stop();
        let mut out = [1.0f32; 64];
        processor.process(&mut out);

        assert_eq!(processor.buffer().available(), 0);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(drain(&mut port).last(), Some(&PortStatus::Stopped));
    }

    #[test]
    fn test_carrier_payload_is_resampled_before_posting() {
        let (port, mut processor) = playback_channel(JitterConfig::default());
        let payload = STANDARD.encode([0xFFu8; 160]);
        assert!(port.post_carrier_payload(&payload).unwrap());
        processor.process(&mut [0.0f32; 16]);
        assert_eq!(processor.buffer().available(), 960);
    }

    #[test]
    fn test_processor_notices_dropped_port() {
        let (port, mut processor) = playback_channel(JitterConfig::default());
        drop(port);
        assert!(!processor.process(&mut [0.0f32; 16]));
    }

    #[test]
    fn test_status_wire_format() {
        let json = serde_json::to_value(PortStatus::BufferOverflow {
            dropped_samples: 12,
            latency_ms: 1000.0,
        })
        .unwrap();
        assert_eq!(json["type"], "buffer-overflow");
        assert_eq!(json["droppedSamples"], 12);

        let command: PortCommand =
            serde_json::from_str(r#"{"type":"audio-chunk","data":[0.5,-0.5]}"#).unwrap();
        assert_eq!(command, PortCommand::AudioChunk { data: vec![0.5, -0.5] });
    }
}
