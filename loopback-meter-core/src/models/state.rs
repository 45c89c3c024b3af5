use super::error::MeterError;

/// Capture session state machine.
///
/// State transitions:
/// ```text
/// ready → capturing → stopped
///             ↓    ↖______↙
///           failed ──→ capturing (fresh start)
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureState {
    /// Source initialized, no session started yet.
    Ready,
    Capturing,
    Stopped,
    Failed(MeterError),
}

impl CaptureState {
    pub fn is_capturing(&self) -> bool {
        matches!(self, Self::Capturing)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Whether `start()` may be called from this state.
    pub fn can_start(&self) -> bool {
        matches!(self, Self::Ready | Self::Stopped | Self::Failed(_))
    }
}
