//! Render endpoint enumeration via the MMDevice API.
//!
//! Lists active output devices so a caller can pick which one to meter.

use windows::core::PCWSTR;
use windows::Win32::Devices::FunctionDiscovery::PKEY_Device_FriendlyName;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;

use loopback_meter_core::models::audio_models::OutputDevice;
use loopback_meter_core::models::error::MeterError;

use crate::com::ComApartment;

/// Output device enumerator. Holds its own COM apartment membership.
pub struct DeviceEnumerator {
    enumerator: IMMDeviceEnumerator,
    _com: ComApartment,
}

impl DeviceEnumerator {
    pub fn new() -> Result<Self, MeterError> {
        let com = ComApartment::enter();
        let enumerator = create_enumerator()?;
        Ok(Self {
            enumerator,
            _com: com,
        })
    }

    /// List active render (output) endpoints.
    pub fn list_render_devices(&self) -> Result<Vec<OutputDevice>, MeterError> {
        unsafe {
            let collection = self
                .enumerator
                .EnumAudioEndpoints(eRender, DEVICE_STATE_ACTIVE)
                .map_err(|e| MeterError::Unknown(format!("EnumAudioEndpoints failed: {}", e)))?;

            let count = collection
                .GetCount()
                .map_err(|e| MeterError::Unknown(format!("GetCount failed: {}", e)))?;

            let default_id = self.default_render_device_id().ok();

            let mut devices = Vec::new();
            for i in 0..count {
                let device = match collection.Item(i) {
                    Ok(d) => d,
                    Err(_) => continue,
                };
                let id = match device_id(&device) {
                    Some(id) => id,
                    None => continue,
                };
                let name = friendly_name(&device).unwrap_or_else(|| format!("Output {}", i));
                let is_default = default_id.as_deref() == Some(id.as_str());

                devices.push(OutputDevice { id, name, is_default });
            }
            Ok(devices)
        }
    }

    /// ID of the default console render endpoint.
    pub fn default_render_device_id(&self) -> Result<String, MeterError> {
        let device = default_render_device(&self.enumerator)?;
        device_id(&device).ok_or_else(|| MeterError::Unknown("GetId failed".into()))
    }
}

pub(crate) fn create_enumerator() -> Result<IMMDeviceEnumerator, MeterError> {
    unsafe {
        CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)
            .map_err(|e| MeterError::Unknown(format!("failed to create enumerator: {}", e)))
    }
}

pub(crate) fn default_render_device(enumerator: &IMMDeviceEnumerator) -> Result<IMMDevice, MeterError> {
    // Loopback reads from a render endpoint, never a capture one.
    unsafe {
        enumerator
            .GetDefaultAudioEndpoint(eRender, eConsole)
            .map_err(|_| MeterError::DeviceNotAvailable)
    }
}

pub(crate) fn render_device_by_id(enumerator: &IMMDeviceEnumerator, id: &str) -> Result<IMMDevice, MeterError> {
    let wide_id: Vec<u16> = id.encode_utf16().chain(std::iter::once(0)).collect();
    unsafe {
        enumerator
            .GetDevice(PCWSTR(wide_id.as_ptr()))
            .map_err(|_| MeterError::DeviceNotAvailable)
    }
}

pub(crate) fn device_id(device: &IMMDevice) -> Option<String> {
    unsafe {
        let id = device.GetId().ok()?;
        let value = id.to_string().ok();
        CoTaskMemFree(Some(id.0 as *const _));
        value
    }
}

/// PKEY_Device_FriendlyName, e.g. "Speakers (Realtek(R) Audio)".
pub(crate) fn friendly_name(device: &IMMDevice) -> Option<String> {
    unsafe {
        let store = device.OpenPropertyStore(STGM_READ).ok()?;
        let value = store.GetValue(&PKEY_Device_FriendlyName).ok()?;
        let name = value.to_string();
        if name.is_empty() {
            None
        } else {
            Some(name)
        }
    }
}
