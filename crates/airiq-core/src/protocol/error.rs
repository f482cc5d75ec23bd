//! Protocol errors

use serde::Serialize;
use thiserror::Error;

/// Errors that can occur while talking to a sensor
#[derive(Error, Debug)]
pub enum SensorError {
    /// Port could not be opened or configured
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// No start marker within the scan budget
    #[error("No frame start marker found after scanning {scanned} bytes")]
    SyncTimeout { scanned: usize },

    /// Link went quiet before the frame was complete
    #[error("Truncated frame: expected {expected} bytes, got {actual}")]
    TruncatedFrame { expected: usize, actual: usize },

    /// Computed checksum differs from the transmitted one
    #[error("Checksum mismatch: computed {expected:#06x}, frame carries {actual:#06x}")]
    ChecksumMismatch { expected: u16, actual: u16 },

    /// Frame does not begin with the protocol start byte
    #[error("Unexpected start byte: {0:#04x}")]
    StartByteMismatch(u8),

    /// Response echoes a different command
    #[error("Command mismatch: expected {expected:#04x}, got {actual:#04x}")]
    CommandMismatch { expected: u8, actual: u8 },

    /// Declared PM payload length above the cap
    #[error("Declared frame length {0} exceeds protocol maximum")]
    FrameTooLong(usize),

    /// Serial driver error on an open port
    #[error("Serial port error: {0}")]
    SerialError(String),

    /// I/O error on an open port
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Coarse classification of a [`SensorError`], used when aggregating failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FailureKind {
    /// Transport could not be opened
    Connection,
    /// No start marker within the read budget
    SyncTimeout,
    /// Fewer bytes than the declared or fixed frame length
    TruncatedFrame,
    /// Computed checksum differs from the transmitted one
    Checksum,
    /// Start byte, command byte or declared length is not what the protocol allows
    ProtocolMismatch,
    /// The link failed underneath an open session
    Transport,
}

impl SensorError {
    /// Classify this error
    pub fn kind(&self) -> FailureKind {
        match self {
            SensorError::ConnectionFailed(_) => FailureKind::Connection,
            SensorError::SyncTimeout { .. } => FailureKind::SyncTimeout,
            SensorError::TruncatedFrame { .. } => FailureKind::TruncatedFrame,
            SensorError::ChecksumMismatch { .. } => FailureKind::Checksum,
            SensorError::StartByteMismatch(_)
            | SensorError::CommandMismatch { .. }
            | SensorError::FrameTooLong(_) => FailureKind::ProtocolMismatch,
            SensorError::SerialError(_) | SensorError::IoError(_) => FailureKind::Transport,
        }
    }

    /// Whether a polling session may carry on after this error.
    ///
    /// Decode failures are expected on a serial link and are retried on the
    /// next cycle. Connection and transport failures are not.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self.kind(),
            FailureKind::Connection | FailureKind::Transport
        )
    }
}
