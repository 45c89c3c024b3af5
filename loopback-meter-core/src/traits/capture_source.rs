use std::thread;
use std::time::Duration;

use crate::models::audio_models::{FormatInfo, FrameBlock};
use crate::models::error::MeterError;

/// A pull-based source of interleaved audio frames.
///
/// Implemented by:
/// - `WasapiLoopbackSource` (Windows, in `loopback-meter-windows`)
/// - [`ToneSource`](crate::ToneSource) and [`ScriptedSource`](crate::ScriptedSource)
///
/// `initialize` runs on the thread that builds the meter. Everything else
/// runs on the capture thread, which owns the source exclusively while a
/// session is active.
pub trait CaptureSource: Send {
    /// Open the endpoint and negotiate a format. Failures here are fatal for
    /// the meter and are reported before any session starts.
    fn initialize(&mut self) -> Result<FormatInfo, MeterError>;

    /// Begin streaming. Called on the capture thread.
    fn start(&mut self) -> Result<(), MeterError>;

    /// Stop streaming and release per-session resources. Called on the
    /// capture thread on every exit path, including after a fault.
    fn stop(&mut self) -> Result<(), MeterError>;

    /// The next queued block, or `Ok(None)` when nothing is queued. Must not
    /// block waiting for data.
    fn next_block(&mut self) -> Result<Option<FrameBlock<'_>>, MeterError>;

    /// Hand the most recent block back to the source.
    fn release_block(&mut self, frames: usize) -> Result<(), MeterError>;

    /// Wait up to `timeout` for more data. The default is a plain sleep;
    /// event-driven sources may return as soon as data is signalled.
    fn wait_for_data(&mut self, timeout: Duration) -> Result<(), MeterError> {
        thread::sleep(timeout);
        Ok(())
    }

    /// Human-readable name of the endpoint backing this source.
    fn device_name(&self) -> String;
}
