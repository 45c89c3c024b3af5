use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crossbeam_channel::Sender;
use parking_lot::Mutex;

use crate::models::audio_models::{Channel, FormatInfo, FrameBlock};
use crate::models::config::{MeterConfiguration, SilencePolicy};
use crate::models::error::MeterError;
use crate::models::session_report::{SessionEnd, SessionReport};
use crate::models::state::CaptureState;
use crate::processing::channel_splitter::ChannelSplitter;
use crate::store::level_store::LevelStore;
use crate::traits::capture_source::CaptureSource;
use crate::traits::meter_delegate::MeterDelegate;

/// Everything the capture thread shares with the controlling `LevelMeter`.
#[derive(Clone)]
struct CaptureContext {
    running: Arc<AtomicBool>,
    levels: Arc<LevelStore>,
    state: Arc<Mutex<CaptureState>>,
    delegate: Option<Arc<dyn MeterDelegate>>,
    config: MeterConfiguration,
}

impl CaptureContext {
    fn set_state(&self, new_state: CaptureState) {
        log::debug!("capture state -> {:?}", new_state);
        *self.state.lock() = new_state.clone();
        if let Some(ref delegate) = self.delegate {
            delegate.on_state_changed(&new_state);
        }
    }
}

/// Returned by the capture thread when it exits.
struct CaptureOutcome<S> {
    source: S,
    report: SessionReport,
}

/// Drives a [`CaptureSource`] on a dedicated thread and keeps a
/// [`LevelStore`] updated with per-channel loudness.
///
/// ```text
/// [CaptureSource] → next_block → [ChannelSplitter] → loudness ×2 → [LevelStore] ← render loop
/// ```
///
/// The capture thread owns the source while a session runs and hands it back
/// when joined, so the meter can be restarted after `stop()` or a fault.
pub struct LevelMeter<S: CaptureSource + 'static> {
    source: Option<S>,
    format: FormatInfo,
    device_name: String,
    context: CaptureContext,
    capture_handle: Option<thread::JoinHandle<CaptureOutcome<S>>>,
}

impl<S: CaptureSource + 'static> LevelMeter<S> {
    /// Initialize `source` and build a meter around it.
    ///
    /// Endpoint and format problems are reported here, before any session
    /// is started.
    pub fn initialize(mut source: S, config: MeterConfiguration) -> Result<Self, MeterError> {
        config.validate().map_err(MeterError::ConfigurationFailed)?;

        let format = source.initialize()?;
        format.validate()?;

        let device_name = source.device_name();
        log::info!(
            "Initialized {}: {} Hz, {} channel(s)",
            device_name,
            format.sample_rate,
            format.channels
        );

        Ok(Self {
            source: Some(source),
            format,
            device_name,
            context: CaptureContext {
                running: Arc::new(AtomicBool::new(false)),
                levels: Arc::new(LevelStore::new()),
                state: Arc::new(Mutex::new(CaptureState::Ready)),
                delegate: None,
                config,
            },
            capture_handle: None,
        })
    }

    /// Takes effect from the next `start()`.
    pub fn set_delegate(&mut self, delegate: Arc<dyn MeterDelegate>) {
        self.context.delegate = Some(delegate);
    }

    /// Shared handle for the render loop.
    pub fn levels(&self) -> Arc<LevelStore> {
        Arc::clone(&self.context.levels)
    }

    pub fn read(&self, channel: Channel) -> f32 {
        self.context.levels.read(channel)
    }

    pub fn state(&self) -> CaptureState {
        self.context.state.lock().clone()
    }

    pub fn format(&self) -> FormatInfo {
        self.format
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn config(&self) -> &MeterConfiguration {
        &self.context.config
    }

    /// Whether the capture loop is currently running. Turns false on its own
    /// when the source faults.
    pub fn is_capturing(&self) -> bool {
        self.context.running.load(Ordering::SeqCst)
    }

    /// Start a capture session. Transitions: ready/stopped/failed → capturing.
    ///
    /// Blocks until the capture thread has started the source, so a source
    /// that cannot start is reported here rather than as a session fault.
    pub fn start(&mut self) -> Result<(), MeterError> {
        // A session that ended on its own still has an unjoined thread.
        // Once `running` is false the thread has reported its outcome and
        // only has to return, so joining it here does not block for long.
        if let Some(handle) = self.capture_handle.take() {
            if self.context.running.load(Ordering::SeqCst) {
                self.capture_handle = Some(handle);
                return Err(MeterError::InvalidState("already capturing".into()));
            }
            self.finish(handle)?;
        }

        if !self.state().can_start() {
            return Err(MeterError::InvalidState(format!(
                "cannot start from {:?}",
                self.state()
            )));
        }

        let source = self
            .source
            .take()
            .ok_or_else(|| MeterError::InvalidState("capture source unavailable".into()))?;

        self.context.running.store(true, Ordering::SeqCst);
        let context = self.context.clone();
        let (started_tx, started_rx) = crossbeam_channel::bounded(1);

        let handle = thread::Builder::new()
            .name("loopback-meter-capture".into())
            .spawn(move || run_capture(source, context, started_tx))
            .map_err(|e| {
                self.context.running.store(false, Ordering::SeqCst);
                let error = MeterError::Unknown(format!("failed to spawn capture thread: {}", e));
                self.context.set_state(CaptureState::Failed(error.clone()));
                error
            })?;

        match started_rx.recv() {
            Ok(Ok(())) => {
                log::info!("Capture started on {}", self.device_name);
                self.capture_handle = Some(handle);
                Ok(())
            }
            Ok(Err(e)) => {
                log::error!("Failed to start {}: {}", self.device_name, e);
                self.context.running.store(false, Ordering::SeqCst);
                let outcome = self.join(handle)?;
                self.source = Some(outcome.source);
                self.context.set_state(CaptureState::Failed(e.clone()));
                Err(e)
            }
            // The thread dropped the sender without answering: it panicked.
            Err(_) => {
                self.context.running.store(false, Ordering::SeqCst);
                match self.join(handle) {
                    Ok(outcome) => {
                        self.source = Some(outcome.source);
                        Err(MeterError::Unknown("capture thread exited during start".into()))
                    }
                    Err(e) => Err(e),
                }
            }
        }
    }

    /// Stop the session and wait for the capture thread to exit.
    ///
    /// Once this returns the level store is no longer written. Also valid
    /// after the session ended on a fault; the report then carries
    /// [`SessionEnd::Faulted`].
    pub fn stop(&mut self) -> Result<SessionReport, MeterError> {
        let handle = self
            .capture_handle
            .take()
            .ok_or_else(|| MeterError::InvalidState("not capturing".into()))?;

        self.context.running.store(false, Ordering::SeqCst);
        self.finish(handle)
    }

    fn finish(&mut self, handle: thread::JoinHandle<CaptureOutcome<S>>) -> Result<SessionReport, MeterError> {
        let CaptureOutcome { source, report } = self.join(handle)?;
        self.source = Some(source);

        if !report.is_faulted() {
            self.context.set_state(CaptureState::Stopped);
        }

        log::info!(
            "Capture session {} ended after {:.2}s: {} blocks ({} silent), {} frames, {:?}",
            report.id,
            report.duration_secs,
            report.blocks_processed,
            report.silent_blocks,
            report.frames_processed,
            report.end
        );

        if let Some(ref delegate) = self.context.delegate {
            delegate.on_session_ended(&report);
        }
        Ok(report)
    }

    fn join(&self, handle: thread::JoinHandle<CaptureOutcome<S>>) -> Result<CaptureOutcome<S>, MeterError> {
        handle.join().map_err(|_| {
            let error = MeterError::Unknown("capture thread panicked".into());
            log::error!("{}", error);
            self.context.running.store(false, Ordering::SeqCst);
            self.context.set_state(CaptureState::Failed(error.clone()));
            error
        })
    }
}

impl<S: CaptureSource + 'static> Drop for LevelMeter<S> {
    fn drop(&mut self) {
        if self.capture_handle.is_some() {
            if let Err(e) = self.stop() {
                log::warn!("Failed to stop capture on drop: {}", e);
            }
        }
    }
}

/// Capture thread entry point.
///
/// Starts the source, reports the result through `started`, runs the loop
/// and stops the source on every exit path.
fn run_capture<S: CaptureSource>(
    mut source: S,
    context: CaptureContext,
    started: Sender<Result<(), MeterError>>,
) -> CaptureOutcome<S> {
    let mut report = SessionReport::new();

    if let Err(e) = source.start() {
        let _ = started.send(Err(e));
        return CaptureOutcome { source, report };
    }
    context.set_state(CaptureState::Capturing);
    let _ = started.send(Ok(()));

    let began = Instant::now();
    let result = capture_loop(&mut source, &context, &mut report);

    if let Err(e) = source.stop() {
        log::warn!("Failed to stop {}: {}", source.device_name(), e);
    }
    report.duration_secs = began.elapsed().as_secs_f64();

    if let Err(e) = result {
        log::error!("Capture error on {}: {}", source.device_name(), e);
        report.end = SessionEnd::Faulted(e.to_string());
        context.set_state(CaptureState::Failed(e.clone()));
        if let Some(ref delegate) = context.delegate {
            delegate.on_error(&e);
        }
    }

    // Cleared last, so a false flag means the final state is already set.
    context.running.store(false, Ordering::SeqCst);
    CaptureOutcome { source, report }
}

/// Drain, then wait, until the running flag clears or the source fails.
fn capture_loop<S: CaptureSource>(
    source: &mut S,
    context: &CaptureContext,
    report: &mut SessionReport,
) -> Result<(), MeterError> {
    let mut splitter = ChannelSplitter::new();
    let poll_interval = context.config.poll_interval();

    while context.running.load(Ordering::SeqCst) {
        if drain(source, &mut splitter, context, report)? == 0 {
            report.empty_polls += 1;
        }
        source.wait_for_data(poll_interval)?;
    }
    Ok(())
}

/// Process every block currently queued. Returns the number of blocks.
fn drain<S: CaptureSource>(
    source: &mut S,
    splitter: &mut ChannelSplitter,
    context: &CaptureContext,
    report: &mut SessionReport,
) -> Result<u64, MeterError> {
    let mut blocks = 0;
    loop {
        let Some(block) = source.next_block()? else {
            break;
        };
        let frames = block.frame_count();
        if block.silent {
            report.silent_blocks += 1;
        }
        publish_block(&block, splitter, &context.levels, &context.config);

        source.release_block(frames)?;
        blocks += 1;
        report.blocks_processed += 1;
        report.frames_processed += frames as u64;
    }
    Ok(blocks)
}

/// Compute and publish both channel levels for one block.
fn publish_block(
    block: &FrameBlock<'_>,
    splitter: &mut ChannelSplitter,
    levels: &LevelStore,
    config: &MeterConfiguration,
) {
    if block.silent {
        if config.silence_policy == SilencePolicy::Zero {
            levels.publish(Channel::Left, 0.0);
            levels.publish(Channel::Right, 0.0);
        }
        return;
    }

    let (left, right) = splitter.split(block);
    let left_level = config.scale.level(left);
    let right_level = if block.channels > 1 {
        config.scale.level(right)
    } else {
        left_level
    };

    levels.publish(Channel::Left, left_level);
    levels.publish(Channel::Right, right_level);
}
