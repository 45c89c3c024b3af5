//! Per-thread COM apartment guard.

use windows::Win32::System::Com::{CoInitializeEx, CoUninitialize, COINIT_MULTITHREADED};

/// Joins the multithreaded apartment for the lifetime of the guard.
///
/// If the thread already lives in a single-threaded apartment the guard
/// does nothing on drop; COM is still usable from that thread.
pub(crate) struct ComApartment {
    initialized: bool,
}

impl ComApartment {
    pub(crate) fn enter() -> Self {
        // S_FALSE (already initialized) still needs a matching CoUninitialize.
        let hr = unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) };
        if hr.is_err() {
            log::debug!("CoInitializeEx returned {:?}; using the existing apartment", hr);
        }
        Self {
            initialized: hr.is_ok(),
        }
    }
}

impl Drop for ComApartment {
    fn drop(&mut self) {
        if self.initialized {
            unsafe {
                CoUninitialize();
            }
        }
    }
}
