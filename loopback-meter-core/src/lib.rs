//! # loopback-meter-core
//!
//! Platform-agnostic core of the loopback level meter.
//!
//! A capture thread pulls interleaved frames from a [`CaptureSource`],
//! splits them into left/right channels, maps each channel's RMS onto a
//! 0–1 loudness and publishes the result into a lock-free [`LevelStore`].
//! A render loop reads the store at its own cadence without ever blocking.
//! Platform backends (Windows WASAPI loopback) implement `CaptureSource`
//! and plug into the generic [`LevelMeter`].
//!
//! ## Architecture
//!
//! ```text
//! loopback-meter-core (this crate)
//! ├── traits/       ← CaptureSource, MeterDelegate
//! ├── models/       ← MeterError, CaptureState, MeterConfiguration, FrameBlock, SessionReport
//! ├── processing/   ← loudness calculator, ChannelSplitter
//! ├── store/        ← LevelStore (atomic latest-value register)
//! ├── session/      ← LevelMeter (capture thread lifecycle)
//! └── sources/      ← ScriptedSource, ToneSource
//! ```

pub mod models;
pub mod processing;
pub mod session;
pub mod sources;
pub mod store;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use models::audio_models::{Channel, FormatInfo, FrameBlock, OutputDevice, SampleFormat, StereoLevels};
pub use models::config::{MeterConfiguration, SilencePolicy};
pub use models::error::MeterError;
pub use models::session_report::{SessionEnd, SessionReport};
pub use models::state::CaptureState;
pub use processing::channel_splitter::ChannelSplitter;
pub use processing::loudness::{loudness, rms, LoudnessScale};
pub use session::level_meter::LevelMeter;
pub use sources::scripted::{ScriptHandle, ScriptStep, ScriptedSource, SourceStats};
pub use sources::tone::ToneSource;
pub use store::level_store::LevelStore;
pub use traits::capture_source::CaptureSource;
pub use traits::meter_delegate::MeterDelegate;
