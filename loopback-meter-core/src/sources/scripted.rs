//! Replayable in-memory capture source.
//!
//! Blocks and faults are queued as [`ScriptStep`]s. The queue is shared with
//! a [`ScriptHandle`] so more steps can be fed while a session is running,
//! and [`SourceStats`] counts what the capture thread actually did.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::audio_models::{FormatInfo, FrameBlock};
use crate::models::error::MeterError;
use crate::traits::capture_source::CaptureSource;

/// One scripted delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    /// Interleaved samples delivered as a normal block.
    Block(Vec<f32>),
    /// Interleaved samples delivered with the silent flag set.
    Silent(Vec<f32>),
    /// Nothing queued for one poll.
    Gap,
    /// `next_block` fails with this error.
    Fault(MeterError),
    /// The block is delivered but releasing it fails.
    ReleaseFault(Vec<f32>, MeterError),
}

/// Counters observed from outside the capture thread.
#[derive(Debug, Default)]
pub struct SourceStats {
    starts: AtomicU64,
    stops: AtomicU64,
    delivered: AtomicU64,
    released: AtomicU64,
}

impl SourceStats {
    pub fn starts(&self) -> u64 {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> u64 {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn blocks_delivered(&self) -> u64 {
        self.delivered.load(Ordering::SeqCst)
    }

    pub fn blocks_released(&self) -> u64 {
        self.released.load(Ordering::SeqCst)
    }
}

/// Feeds steps into a [`ScriptedSource`] that may already be running.
#[derive(Debug, Clone)]
pub struct ScriptHandle {
    script: Arc<Mutex<VecDeque<ScriptStep>>>,
}

impl ScriptHandle {
    pub fn push(&self, step: ScriptStep) {
        self.script.lock().push_back(step);
    }

    pub fn extend(&self, steps: impl IntoIterator<Item = ScriptStep>) {
        self.script.lock().extend(steps);
    }

    /// Steps not yet consumed by the source.
    pub fn remaining(&self) -> usize {
        self.script.lock().len()
    }
}

pub struct ScriptedSource {
    format: FormatInfo,
    init_error: Option<MeterError>,
    start_error: Option<MeterError>,
    script: Arc<Mutex<VecDeque<ScriptStep>>>,
    stats: Arc<SourceStats>,
    current: Vec<f32>,
    release_error: Option<MeterError>,
}

impl ScriptedSource {
    pub fn new(format: FormatInfo) -> Self {
        Self {
            format,
            init_error: None,
            start_error: None,
            script: Arc::new(Mutex::new(VecDeque::new())),
            stats: Arc::new(SourceStats::default()),
            current: Vec::new(),
            release_error: None,
        }
    }

    /// Stereo 48 kHz float source.
    pub fn stereo() -> Self {
        Self::new(FormatInfo::f32(48000, 2))
    }

    pub fn with_steps(mut self, steps: impl IntoIterator<Item = ScriptStep>) -> Self {
        self.script.lock().extend(steps);
        self
    }

    /// Make `initialize` fail with `error`.
    pub fn failing_initialize(mut self, error: MeterError) -> Self {
        self.init_error = Some(error);
        self
    }

    /// Make `start` fail with `error`.
    pub fn failing_start(mut self, error: MeterError) -> Self {
        self.start_error = Some(error);
        self
    }

    pub fn handle(&self) -> ScriptHandle {
        ScriptHandle {
            script: Arc::clone(&self.script),
        }
    }

    pub fn stats(&self) -> Arc<SourceStats> {
        Arc::clone(&self.stats)
    }
}

impl CaptureSource for ScriptedSource {
    fn initialize(&mut self) -> Result<FormatInfo, MeterError> {
        match &self.init_error {
            Some(e) => Err(e.clone()),
            None => Ok(self.format),
        }
    }

    fn start(&mut self) -> Result<(), MeterError> {
        if let Some(e) = &self.start_error {
            return Err(e.clone());
        }
        self.stats.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), MeterError> {
        self.stats.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn next_block(&mut self) -> Result<Option<FrameBlock<'_>>, MeterError> {
        let step = self.script.lock().pop_front();
        let silent = match step {
            None | Some(ScriptStep::Gap) => return Ok(None),
            Some(ScriptStep::Fault(e)) => return Err(e),
            Some(ScriptStep::Block(samples)) => {
                self.current = samples;
                false
            }
            Some(ScriptStep::Silent(samples)) => {
                self.current = samples;
                true
            }
            Some(ScriptStep::ReleaseFault(samples, e)) => {
                self.current = samples;
                self.release_error = Some(e);
                false
            }
        };

        self.stats.delivered.fetch_add(1, Ordering::SeqCst);
        Ok(Some(FrameBlock {
            samples: &self.current,
            channels: self.format.channels,
            silent,
        }))
    }

    fn release_block(&mut self, _frames: usize) -> Result<(), MeterError> {
        if let Some(e) = self.release_error.take() {
            return Err(e);
        }
        self.stats.released.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn device_name(&self) -> String {
        "Scripted Source".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replays_steps_in_order() {
        let mut source = ScriptedSource::stereo().with_steps([
            ScriptStep::Block(vec![0.1, 0.2]),
            ScriptStep::Silent(vec![0.0, 0.0]),
            ScriptStep::Gap,
            ScriptStep::Block(vec![0.3, 0.4]),
        ]);

        let block = source.next_block().unwrap().unwrap();
        assert_eq!(block.samples, &[0.1, 0.2]);
        assert!(!block.silent);
        source.release_block(1).unwrap();

        assert!(source.next_block().unwrap().unwrap().silent);
        source.release_block(1).unwrap();

        assert!(source.next_block().unwrap().is_none());
        assert_eq!(source.next_block().unwrap().unwrap().samples, &[0.3, 0.4]);
        source.release_block(1).unwrap();
        assert!(source.next_block().unwrap().is_none());

        let stats = source.stats();
        assert_eq!(stats.blocks_delivered(), 3);
        assert_eq!(stats.blocks_released(), 3);
    }

    #[test]
    fn scripted_faults() {
        let mut source = ScriptedSource::stereo().with_steps([
            ScriptStep::ReleaseFault(vec![0.5, 0.5], MeterError::StreamFault("release".into())),
            ScriptStep::Fault(MeterError::StreamFault("lost".into())),
        ]);

        assert!(source.next_block().unwrap().is_some());
        assert_eq!(
            source.release_block(1),
            Err(MeterError::StreamFault("release".into()))
        );
        assert_eq!(
            source.next_block().unwrap_err(),
            MeterError::StreamFault("lost".into())
        );
    }

    #[test]
    fn handle_feeds_running_source() {
        let mut source = ScriptedSource::stereo();
        let handle = source.handle();
        assert!(source.next_block().unwrap().is_none());

        handle.push(ScriptStep::Block(vec![0.25, 0.75]));
        assert_eq!(handle.remaining(), 1);
        assert!(source.next_block().unwrap().is_some());
        assert_eq!(handle.remaining(), 0);
    }

    #[test]
    fn injected_lifecycle_errors() {
        let mut source = ScriptedSource::stereo()
            .failing_initialize(MeterError::DeviceNotAvailable)
            .failing_start(MeterError::StreamFault("busy".into()));

        assert_eq!(source.initialize(), Err(MeterError::DeviceNotAvailable));
        assert!(source.start().is_err());
        assert_eq!(source.stats().starts(), 0);
    }
}
