use serde::{Deserialize, Serialize};

use super::error::MeterError;

/// One side of the stereo meter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    #[serde(rename = "L")]
    Left,
    #[serde(rename = "R")]
    Right,
}

/// Sample encoding delivered by a capture source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    F32,
    I16,
    I24,
    I32,
}

/// Stream format negotiated by a capture source during initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatInfo {
    pub sample_rate: u32,
    pub channels: u16,
    pub sample_format: SampleFormat,
}

impl FormatInfo {
    pub fn f32(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            sample_format: SampleFormat::F32,
        }
    }

    /// The meter only understands interleaved 32-bit float frames.
    pub fn validate(&self) -> Result<(), MeterError> {
        if self.sample_rate == 0 {
            return Err(MeterError::UnsupportedFormat("sample rate is zero".into()));
        }
        if self.channels == 0 {
            return Err(MeterError::UnsupportedFormat("channel count is zero".into()));
        }
        if self.sample_format != SampleFormat::F32 {
            return Err(MeterError::UnsupportedFormat(format!(
                "sample format {:?} (expected f32)",
                self.sample_format
            )));
        }
        Ok(())
    }
}

/// A batch of interleaved frames borrowed from a capture source.
///
/// Only valid until the block is handed back with
/// [`CaptureSource::release_block`](crate::CaptureSource::release_block).
#[derive(Debug, Clone, Copy)]
pub struct FrameBlock<'a> {
    pub samples: &'a [f32],
    pub channels: u16,
    pub silent: bool,
}

impl<'a> FrameBlock<'a> {
    pub fn new(samples: &'a [f32], channels: u16) -> Self {
        Self {
            samples,
            channels,
            silent: false,
        }
    }

    pub fn silent(samples: &'a [f32], channels: u16) -> Self {
        Self {
            samples,
            channels,
            silent: true,
        }
    }

    /// Number of complete frames. A trailing partial frame is not counted.
    pub fn frame_count(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }
}

/// Snapshot of both level cells (0.0–1.0).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StereoLevels {
    pub left: f32,
    pub right: f32,
}

/// An audio output endpoint that can be opened for loopback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputDevice {
    pub id: String,
    pub name: String,
    pub is_default: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_count_ignores_partial_frame() {
        let samples = [0.1, 0.2, 0.3, 0.4, 0.5];
        assert_eq!(FrameBlock::new(&samples, 2).frame_count(), 2);
        assert_eq!(FrameBlock::new(&samples, 1).frame_count(), 5);
        assert_eq!(FrameBlock::new(&samples, 0).frame_count(), 0);
    }

    #[test]
    fn format_validation() {
        assert!(FormatInfo::f32(48000, 2).validate().is_ok());
        assert!(FormatInfo::f32(0, 2).validate().is_err());
        assert!(FormatInfo::f32(48000, 0).validate().is_err());

        let pcm = FormatInfo {
            sample_format: SampleFormat::I16,
            ..FormatInfo::f32(44100, 2)
        };
        assert!(matches!(pcm.validate(), Err(MeterError::UnsupportedFormat(_))));
    }
}
