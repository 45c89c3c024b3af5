//! WASAPI loopback capture source for system audio.
//!
//! Captures the mix going to a render endpoint using
//! `AUDCLNT_STREAMFLAGS_LOOPBACK` in shared mode. No special permissions
//! are needed on Windows; DRM-protected audio arrives as silence.
//!
//! `initialize` probes the endpoint on the caller's thread and releases it
//! again. The stream itself is opened in `start`, which the meter calls on
//! its capture thread, so every COM object used while streaming lives on
//! that one thread.

use std::slice;

use windows::core::PCWSTR;
use windows::Win32::Media::Audio::*;
use windows::Win32::Media::KernelStreaming::{KSDATAFORMAT_SUBTYPE_IEEE_FLOAT, WAVE_FORMAT_EXTENSIBLE};
use windows::Win32::Media::Multimedia::WAVE_FORMAT_IEEE_FLOAT;
use windows::Win32::System::Com::*;
use windows::Win32::System::Threading::AvSetMmThreadCharacteristicsW;

use loopback_meter_core::models::audio_models::{FormatInfo, FrameBlock, SampleFormat};
use loopback_meter_core::models::error::MeterError;
use loopback_meter_core::traits::capture_source::CaptureSource;

use crate::com::ComApartment;
use crate::device_enumerator::{create_enumerator, default_render_device, friendly_name, render_device_by_id};

/// Shared-mode buffer duration: one second in 100 ns units.
const BUFFER_DURATION_HNS: i64 = 10_000_000;

/// An open loopback stream. Only exists on the capture thread.
struct LoopbackStream {
    audio_client: IAudioClient,
    capture_client: IAudioCaptureClient,
    channels: u16,
    /// Frames handed out by the last GetBuffer, released as a unit.
    pending_frames: u32,
    // Dropped last, after the interfaces above are released.
    _com: ComApartment,
}

/// WASAPI loopback source for the default (or a chosen) render endpoint.
pub struct WasapiLoopbackSource {
    device_id: Option<String>,
    device_name: String,
    format: Option<FormatInfo>,
    stream: Option<LoopbackStream>,
}

// SAFETY: `stream` is created in `start` and destroyed in `stop`, both of
// which run on the meter's capture thread; the source only moves between
// threads while `stream` is `None`.
unsafe impl Send for WasapiLoopbackSource {}

impl WasapiLoopbackSource {
    /// Loopback on the default console render endpoint.
    pub fn default_device() -> Result<Self, MeterError> {
        Ok(Self {
            device_id: None,
            device_name: "System Audio (Loopback)".into(),
            format: None,
            stream: None,
        })
    }

    /// Loopback on a specific render endpoint, by MMDevice ID.
    pub fn with_device(id: String) -> Self {
        Self {
            device_id: Some(id),
            device_name: "System Audio (Loopback)".into(),
            format: None,
            stream: None,
        }
    }

    fn open_device(&self) -> Result<IMMDevice, MeterError> {
        let enumerator = create_enumerator()?;
        match self.device_id {
            Some(ref id) => render_device_by_id(&enumerator, id),
            None => default_render_device(&enumerator),
        }
    }

    fn active_stream(&mut self) -> Result<&mut LoopbackStream, MeterError> {
        self.stream
            .as_mut()
            .ok_or_else(|| MeterError::InvalidState("loopback stream not started".into()))
    }
}

impl CaptureSource for WasapiLoopbackSource {
    /// Probe sequence:
    /// 1. CoInitializeEx (MTA), scoped to this call
    /// 2. Get the render endpoint and its friendly name
    /// 3. Activate IAudioClient and read the mix format
    /// 4. Initialize with the LOOPBACK flag to surface negotiation errors now
    fn initialize(&mut self) -> Result<FormatInfo, MeterError> {
        let _com = ComApartment::enter();

        let device = self.open_device()?;
        if let Some(name) = friendly_name(&device) {
            self.device_name = format!("{} (Loopback)", name);
        }

        let audio_client = activate_client(&device)?;
        let format = unsafe { initialize_loopback(&audio_client)? };

        self.format = Some(format);
        Ok(format)
    }

    fn start(&mut self) -> Result<(), MeterError> {
        if self.stream.is_some() {
            return Err(MeterError::InvalidState("loopback capture already running".into()));
        }
        let expected = self
            .format
            .ok_or_else(|| MeterError::InvalidState("loopback source not initialized".into()))?;

        let com = ComApartment::enter();
        let device = self.open_device()?;
        let audio_client = activate_client(&device)?;

        unsafe {
            let format = initialize_loopback(&audio_client)?;
            if format != expected {
                return Err(MeterError::UnsupportedFormat(format!(
                    "mix format changed since initialization: {:?} → {:?}",
                    expected, format
                )));
            }

            let capture_client: IAudioCaptureClient = audio_client
                .GetService()
                .map_err(|e| MeterError::ConfigurationFailed(format!("GetService failed: {}", e)))?;

            // MMCSS registration; metering still works without it.
            let mut task_index: u32 = 0;
            let task_name: Vec<u16> = "Audio\0".encode_utf16().collect();
            if AvSetMmThreadCharacteristicsW(PCWSTR(task_name.as_ptr()), &mut task_index).is_err() {
                log::warn!("MMCSS registration failed for loopback capture thread");
            }

            audio_client
                .Start()
                .map_err(|e| MeterError::StreamFault(format!("IAudioClient::Start failed: {}", e)))?;

            self.stream = Some(LoopbackStream {
                audio_client,
                capture_client,
                channels: format.channels,
                pending_frames: 0,
                _com: com,
            });
        }

        log::debug!("Loopback stream started on {}", self.device_name);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), MeterError> {
        let Some(stream) = self.stream.take() else {
            return Ok(());
        };
        unsafe {
            stream
                .audio_client
                .Stop()
                .map_err(|e| MeterError::StreamFault(format!("IAudioClient::Stop failed: {}", e)))
        }
    }

    fn next_block(&mut self) -> Result<Option<FrameBlock<'_>>, MeterError> {
        let stream = self.active_stream()?;

        unsafe {
            let packet_length = stream
                .capture_client
                .GetNextPacketSize()
                .map_err(|e| MeterError::StreamFault(format!("GetNextPacketSize failed: {}", e)))?;
            if packet_length == 0 {
                return Ok(None);
            }

            let mut buffer_ptr: *mut u8 = std::ptr::null_mut();
            let mut num_frames: u32 = 0;
            let mut flags: u32 = 0;

            stream
                .capture_client
                .GetBuffer(&mut buffer_ptr, &mut num_frames, &mut flags, None, None)
                .map_err(|e| MeterError::StreamFault(format!("GetBuffer failed: {}", e)))?;
            stream.pending_frames = num_frames;

            let silent = flags & (AUDCLNT_BUFFERFLAGS_SILENT.0 as u32) != 0;
            let samples: &[f32] = if num_frames == 0 || buffer_ptr.is_null() {
                &[]
            } else {
                // Valid until ReleaseBuffer, which needs `&mut self` again.
                let total_samples = num_frames as usize * stream.channels as usize;
                slice::from_raw_parts(buffer_ptr as *const f32, total_samples)
            };

            Ok(Some(FrameBlock {
                samples,
                channels: stream.channels,
                silent,
            }))
        }
    }

    fn release_block(&mut self, frames: usize) -> Result<(), MeterError> {
        let stream = self.active_stream()?;
        // WASAPI wants back exactly what GetBuffer handed out.
        let pending = std::mem::take(&mut stream.pending_frames);
        if frames != pending as usize {
            log::trace!("releasing {} frames for a {}-frame block view", pending, frames);
        }
        unsafe {
            stream
                .capture_client
                .ReleaseBuffer(pending)
                .map_err(|e| MeterError::StreamFault(format!("ReleaseBuffer failed: {}", e)))
        }
    }

    fn device_name(&self) -> String {
        self.device_name.clone()
    }
}

fn activate_client(device: &IMMDevice) -> Result<IAudioClient, MeterError> {
    unsafe {
        device
            .Activate(CLSCTX_ALL, None)
            .map_err(|e| MeterError::ConfigurationFailed(format!("Activate failed: {}", e)))
    }
}

/// Read the mix format, check it is 32-bit float, and initialize the client
/// for shared-mode loopback with it.
unsafe fn initialize_loopback(audio_client: &IAudioClient) -> Result<FormatInfo, MeterError> {
    let mix_format_ptr = audio_client
        .GetMixFormat()
        .map_err(|e| MeterError::ConfigurationFailed(format!("GetMixFormat failed: {}", e)))?;

    let result = mix_format_info(mix_format_ptr).and_then(|format| {
        format.validate()?;
        audio_client
            .Initialize(
                AUDCLNT_SHAREMODE_SHARED,
                AUDCLNT_STREAMFLAGS_LOOPBACK,
                BUFFER_DURATION_HNS,
                0,
                mix_format_ptr,
                None,
            )
            .map_err(|e| MeterError::ConfigurationFailed(format!("IAudioClient::Initialize (loopback) failed: {}", e)))?;
        Ok(format)
    });

    CoTaskMemFree(Some(mix_format_ptr as *const _ as *const _));
    result
}

/// Translate a `WAVEFORMATEX` (possibly extensible) into a [`FormatInfo`].
unsafe fn mix_format_info(ptr: *const WAVEFORMATEX) -> Result<FormatInfo, MeterError> {
    let mix_format = std::ptr::read_unaligned(ptr);
    let tag = mix_format.wFormatTag as u32;
    let bits = mix_format.wBitsPerSample;

    let is_float = if tag == WAVE_FORMAT_IEEE_FLOAT {
        true
    } else if tag == WAVE_FORMAT_EXTENSIBLE {
        let extensible = ptr as *const WAVEFORMATEXTENSIBLE;
        let sub_format = std::ptr::addr_of!((*extensible).SubFormat).read_unaligned();
        sub_format == KSDATAFORMAT_SUBTYPE_IEEE_FLOAT
    } else {
        false
    };

    let sample_format = match (is_float, bits) {
        (true, 32) => SampleFormat::F32,
        (false, 16) => SampleFormat::I16,
        (false, 24) => SampleFormat::I24,
        (false, 32) => SampleFormat::I32,
        _ => {
            return Err(MeterError::UnsupportedFormat(format!(
                "mix format tag {:#x} with {} bits per sample",
                tag, bits
            )))
        }
    };

    if sample_format != SampleFormat::F32 {
        log::warn!("Loopback mix format is {:?}; only 32-bit float is metered", sample_format);
    }

    Ok(FormatInfo {
        sample_rate: mix_format.nSamplesPerSec,
        channels: mix_format.nChannels,
        sample_format,
    })
}
