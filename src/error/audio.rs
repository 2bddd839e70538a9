// Audio capture and session lifecycle errors

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Audio error code constants
///
/// Single source of truth for the numeric codes reported by [`AudioError`].
///
/// Error code range: 1001-1009
pub struct AudioErrorCodes {}

impl AudioErrorCodes {
    /// Tick rate is invalid (must be finite and > 0)
    pub const TICK_RATE_INVALID: i32 = 1001;

    /// Capture session is already running
    pub const ALREADY_RUNNING: i32 = 1002;

    /// Capture session is not running
    pub const NOT_RUNNING: i32 = 1003;

    /// Hardware error occurred
    pub const HARDWARE_ERROR: i32 = 1004;

    /// Failed to open audio stream
    pub const STREAM_OPEN_FAILED: i32 = 1005;

    /// Mutex/RwLock was poisoned
    pub const LOCK_POISONED: i32 = 1006;

    /// Audio stream disconnected or channel closed unexpectedly
    pub const STREAM_FAILURE: i32 = 1007;

    /// Producer lapped the snapshot region on every retry
    pub const SNAPSHOT_CONTENDED: i32 = 1008;

    /// Requested snapshot is larger than the ring capacity
    pub const SNAPSHOT_TOO_LARGE: i32 = 1009;
}

/// Log an audio error with structured context
///
/// The logging is non-blocking and will not panic on failure.
pub fn log_audio_error(err: &AudioError, context: &str) {
    error!(
        "Audio error in {}: code={}, component=Capture, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Audio-related errors
///
/// Covers capture stream management, hardware access and the ring buffer
/// snapshot path.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioError {
    /// Tick rate must be finite and greater than zero
    TickRateInvalid { hz: f32 },

    /// Capture session is already running
    AlreadyRunning,

    /// Capture session is not running
    NotRunning,

    /// Hardware error occurred
    HardwareError { details: String },

    /// Failed to open audio stream
    StreamOpenFailed { reason: String },

    /// Mutex/RwLock was poisoned
    LockPoisoned { component: String },

    /// Stream channel disconnected unexpectedly
    StreamFailure { reason: String },

    /// Snapshot could not be taken without observing overwritten data
    SnapshotContended { attempts: u32 },

    /// Snapshot length exceeds ring capacity
    SnapshotTooLarge { requested: usize, capacity: usize },
}

impl ErrorCode for AudioError {
    fn code(&self) -> i32 {
        match self {
            AudioError::TickRateInvalid { .. } => AudioErrorCodes::TICK_RATE_INVALID,
            AudioError::AlreadyRunning => AudioErrorCodes::ALREADY_RUNNING,
            AudioError::NotRunning => AudioErrorCodes::NOT_RUNNING,
            AudioError::HardwareError { .. } => AudioErrorCodes::HARDWARE_ERROR,
            AudioError::StreamOpenFailed { .. } => AudioErrorCodes::STREAM_OPEN_FAILED,
            AudioError::LockPoisoned { .. } => AudioErrorCodes::LOCK_POISONED,
            AudioError::StreamFailure { .. } => AudioErrorCodes::STREAM_FAILURE,
            AudioError::SnapshotContended { .. } => AudioErrorCodes::SNAPSHOT_CONTENDED,
            AudioError::SnapshotTooLarge { .. } => AudioErrorCodes::SNAPSHOT_TOO_LARGE,
        }
    }

    fn message(&self) -> String {
        match self {
            AudioError::TickRateInvalid { hz } => {
                format!("Tick rate must be a positive number of ticks per second (got {})", hz)
            }
            AudioError::AlreadyRunning => {
                "Capture already running. Call pause() first.".to_string()
            }
            AudioError::NotRunning => "Capture not running. Call start() first.".to_string(),
            AudioError::HardwareError { details } => {
                format!("Hardware error: {}", details)
            }
            AudioError::StreamOpenFailed { reason } => {
                format!("Failed to open audio stream: {}", reason)
            }
            AudioError::LockPoisoned { component } => {
                format!("Lock poisoned on {}", component)
            }
            AudioError::StreamFailure { reason } => {
                format!("Audio stream failed: {}", reason)
            }
            AudioError::SnapshotContended { attempts } => {
                format!("Capture ring overwritten during snapshot ({} attempts)", attempts)
            }
            AudioError::SnapshotTooLarge {
                requested,
                capacity,
            } => {
                format!(
                    "Snapshot of {} samples exceeds ring capacity {}",
                    requested, capacity
                )
            }
        }
    }
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AudioError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for AudioError {}

impl From<std::io::Error> for AudioError {
    fn from(err: std::io::Error) -> Self {
        AudioError::HardwareError {
            details: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_error_codes() {
        assert_eq!(
            AudioError::TickRateInvalid { hz: 0.0 }.code(),
            AudioErrorCodes::TICK_RATE_INVALID
        );
        assert_eq!(
            AudioError::AlreadyRunning.code(),
            AudioErrorCodes::ALREADY_RUNNING
        );
        assert_eq!(AudioError::NotRunning.code(), AudioErrorCodes::NOT_RUNNING);
        assert_eq!(
            AudioError::SnapshotContended { attempts: 4 }.code(),
            AudioErrorCodes::SNAPSHOT_CONTENDED
        );
        assert_eq!(
            AudioError::SnapshotTooLarge {
                requested: 10,
                capacity: 5
            }
            .code(),
            1009
        );
    }

    #[test]
    fn test_audio_error_messages() {
        let err = AudioError::TickRateInvalid { hz: 0.0 };
        assert!(err.message().contains("got 0"));

        let err = AudioError::AlreadyRunning;
        assert!(err.message().contains("already running"));

        let err = AudioError::HardwareError {
            details: "test error".to_string(),
        };
        assert_eq!(err.message(), "Hardware error: test error");
    }

    #[test]
    fn test_audio_error_display() {
        let err = AudioError::NotRunning;
        let display = format!("{}", err);
        assert!(display.contains("AudioError"));
        assert!(display.contains(&err.code().to_string()));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::other("test io error");
        let audio_err: AudioError = io_err.into();
        match audio_err {
            AudioError::HardwareError { details } => {
                assert!(details.contains("test io error"));
            }
            _ => panic!("Expected HardwareError"),
        }
    }
}
