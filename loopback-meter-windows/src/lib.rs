//! # loopback-meter-windows
//!
//! Windows WASAPI backend for loopback-meter.
//!
//! Provides:
//! - `WasapiLoopbackSource`: system audio via WASAPI loopback on a render endpoint
//! - `DeviceEnumerator`: render endpoint enumeration via the MMDevice API
//!
//! ## Platform Requirements
//! - Windows Vista+ for shared-mode loopback
//! - The endpoint's mix format must be 32-bit float (the shared-mode default)
//!
//! ## Usage
//! ```ignore
//! use loopback_meter_core::{LevelMeter, MeterConfiguration};
//! use loopback_meter_windows::WasapiLoopbackSource;
//!
//! let source = WasapiLoopbackSource::default_device()?;
//! let mut meter = LevelMeter::initialize(source, MeterConfiguration::default())?;
//! let levels = meter.levels();
//! meter.start()?;
//! ```

#[cfg(target_os = "windows")]
mod com;
#[cfg(target_os = "windows")]
pub mod device_enumerator;
#[cfg(target_os = "windows")]
pub mod wasapi_loopback;

#[cfg(target_os = "windows")]
pub use device_enumerator::DeviceEnumerator;
#[cfg(target_os = "windows")]
pub use wasapi_loopback::WasapiLoopbackSource;
