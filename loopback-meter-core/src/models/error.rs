use thiserror::Error;

/// Errors that can occur while metering a capture source.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MeterError {
    #[error("device not available")]
    DeviceNotAvailable,

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    /// The capture stream failed after it was started (device lost,
    /// stream invalidated). Terminal for the current session.
    #[error("stream fault: {0}")]
    StreamFault(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("unknown error: {0}")]
    Unknown(String),
}
