//! Synthetic sine source paced by the wall clock.
//!
//! Behaves like a device endpoint: each poll delivers the frames that would
//! have been captured since the previous poll, split into blocks of at most
//! `block_frames`. Useful as a stand-in when no loopback endpoint exists.

use std::f32::consts::TAU;
use std::time::Instant;

use crate::models::audio_models::{FormatInfo, FrameBlock};
use crate::models::error::MeterError;
use crate::traits::capture_source::CaptureSource;

/// Backlog cap so a stalled consumer does not receive a burst of stale audio.
const MAX_BACKLOG_SECS: f64 = 0.5;

pub struct ToneSource {
    format: FormatInfo,
    frequency_hz: f32,
    left_amplitude: f32,
    right_amplitude: f32,
    block_frames: usize,
    phase: f32,
    accrued_frames: f64,
    last_poll: Option<Instant>,
    buffer: Vec<f32>,
}

impl ToneSource {
    pub fn new(sample_rate: u32, channels: u16, frequency_hz: f32) -> Self {
        Self {
            format: FormatInfo::f32(sample_rate, channels),
            frequency_hz,
            left_amplitude: 0.5,
            right_amplitude: 0.5,
            block_frames: (sample_rate / 100).max(1) as usize,
            phase: 0.0,
            accrued_frames: 0.0,
            last_poll: None,
            buffer: Vec::new(),
        }
    }

    /// Peak amplitude of channel 0 and of every other channel.
    pub fn with_amplitudes(mut self, left: f32, right: f32) -> Self {
        self.left_amplitude = left;
        self.right_amplitude = right;
        self
    }

    pub fn with_block_frames(mut self, frames: usize) -> Self {
        self.block_frames = frames.max(1);
        self
    }

    fn accrue(&mut self) {
        let now = Instant::now();
        if let Some(last) = self.last_poll {
            let elapsed = now.duration_since(last).as_secs_f64();
            let max = self.format.sample_rate as f64 * MAX_BACKLOG_SECS;
            self.accrued_frames = (self.accrued_frames + elapsed * self.format.sample_rate as f64).min(max);
        }
        self.last_poll = Some(now);
    }

    fn render(&mut self, frames: usize) {
        let channels = self.format.channels as usize;
        let step = TAU * self.frequency_hz / self.format.sample_rate as f32;

        self.buffer.clear();
        for _ in 0..frames {
            let value = self.phase.sin();
            for ch in 0..channels {
                let amplitude = if ch == 0 { self.left_amplitude } else { self.right_amplitude };
                self.buffer.push(value * amplitude);
            }
            self.phase = (self.phase + step) % TAU;
        }
    }
}

impl CaptureSource for ToneSource {
    fn initialize(&mut self) -> Result<FormatInfo, MeterError> {
        self.format.validate()?;
        Ok(self.format)
    }

    fn start(&mut self) -> Result<(), MeterError> {
        self.accrued_frames = 0.0;
        self.last_poll = Some(Instant::now());
        Ok(())
    }

    fn stop(&mut self) -> Result<(), MeterError> {
        self.last_poll = None;
        Ok(())
    }

    fn next_block(&mut self) -> Result<Option<FrameBlock<'_>>, MeterError> {
        self.accrue();
        let frames = (self.accrued_frames as usize).min(self.block_frames);
        if frames == 0 {
            return Ok(None);
        }

        self.render(frames);
        Ok(Some(FrameBlock::new(&self.buffer, self.format.channels)))
    }

    fn release_block(&mut self, frames: usize) -> Result<(), MeterError> {
        self.accrued_frames = (self.accrued_frames - frames as f64).max(0.0);
        Ok(())
    }

    fn device_name(&self) -> String {
        format!("Test Tone ({} Hz)", self.frequency_hz)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::processing::loudness::rms;

    #[test]
    fn nothing_before_time_passes() {
        let mut source = ToneSource::new(48000, 2, 440.0);
        source.start().unwrap();
        source.accrued_frames = 0.0;
        source.last_poll = Some(Instant::now() + Duration::from_secs(60));

        assert!(source.next_block().unwrap().is_none());
    }

    #[test]
    fn delivers_elapsed_frames_in_bounded_blocks() {
        let mut source = ToneSource::new(48000, 2, 440.0).with_block_frames(64);
        source.start().unwrap();
        thread::sleep(Duration::from_millis(20));

        let mut total = 0;
        while let Some(block) = source.next_block().unwrap() {
            assert!(block.frame_count() <= 64);
            assert_eq!(block.channels, 2);
            let frames = block.frame_count();
            total += frames;
            source.release_block(frames).unwrap();
            if total > 48000 {
                break;
            }
        }

        // At least the 20 ms that were slept (960 frames at 48 kHz).
        assert!(total >= 960, "only {total} frames");
    }

    #[test]
    fn per_channel_amplitude() {
        let mut source = ToneSource::new(48000, 2, 1000.0).with_amplitudes(1.0, 0.0);
        source.render(480);

        let left: Vec<f32> = source.buffer.iter().step_by(2).copied().collect();
        let right: Vec<f32> = source.buffer.iter().skip(1).step_by(2).copied().collect();

        // Ten full cycles of a unit sine.
        assert!((rms(&left) - std::f32::consts::FRAC_1_SQRT_2).abs() < 0.01);
        assert_eq!(rms(&right), 0.0);
    }

    #[test]
    fn rejects_zero_channels() {
        let mut source = ToneSource::new(48000, 0, 440.0);
        assert!(source.initialize().is_err());
    }
}
