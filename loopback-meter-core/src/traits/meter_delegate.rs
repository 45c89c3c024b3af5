use crate::models::error::MeterError;
use crate::models::session_report::SessionReport;
use crate::models::state::CaptureState;

/// Event delegate for metering session notifications.
///
/// Fault-driven events are delivered on the capture thread; everything else
/// on the thread that called `start`/`stop`. Implementations should marshal
/// to a UI thread if needed and must not block.
pub trait MeterDelegate: Send + Sync {
    /// Called when the session state changes.
    fn on_state_changed(&self, state: &CaptureState);

    /// Called once when the capture source faults and the session ends.
    fn on_error(&self, error: &MeterError);

    /// Called after the capture thread has been joined.
    fn on_session_ended(&self, report: &SessionReport);
}
