//! Latest-value level register shared between the capture thread and a
//! render loop.
//!
//! Each channel is one `AtomicU32` holding the `f32` bit pattern, so a read
//! always sees a complete previously published value. The two channels are
//! independent: a reader may pair a fresh left level with the right level
//! from the previous block.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::models::audio_models::{Channel, StereoLevels};

#[derive(Debug)]
pub struct LevelStore {
    left: AtomicU32,
    right: AtomicU32,
}

impl LevelStore {
    /// Both cells start at 0.0.
    pub fn new() -> Self {
        Self {
            left: AtomicU32::new(0.0f32.to_bits()),
            right: AtomicU32::new(0.0f32.to_bits()),
        }
    }

    /// Overwrite one channel. Values are clamped to `[0.0, 1.0]`; NaN stores 0.0.
    pub fn publish(&self, channel: Channel, value: f32) {
        let value = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
        self.cell(channel).store(value.to_bits(), Ordering::Release);
    }

    /// Most recently published value for `channel`. Never blocks.
    pub fn read(&self, channel: Channel) -> f32 {
        f32::from_bits(self.cell(channel).load(Ordering::Acquire))
    }

    /// Reads both channels. The pair is not read atomically.
    pub fn snapshot(&self) -> StereoLevels {
        StereoLevels {
            left: self.read(Channel::Left),
            right: self.read(Channel::Right),
        }
    }

    pub fn reset(&self) {
        self.publish(Channel::Left, 0.0);
        self.publish(Channel::Right, 0.0);
    }

    fn cell(&self, channel: Channel) -> &AtomicU32 {
        match channel {
            Channel::Left => &self.left,
            Channel::Right => &self.right,
        }
    }
}

impl Default for LevelStore {
    fn default() -> Self {
        Self::new()
    }
}
