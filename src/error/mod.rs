// Error types for the note decision pipeline
//
// This module defines custom error types for capture and classification,
// providing structured error handling with numeric error codes.

mod audio;
mod classifier;

use std::fmt;

pub use audio::{log_audio_error, AudioError, AudioErrorCodes};
pub use classifier::{log_classifier_error, ClassifierError, ClassifierErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the game-loop boundary.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}

/// Error returned by the note decision service
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceError {
    Audio(AudioError),
    Classifier(ClassifierError),
    /// Configuration rejected by `AppConfig::validate`
    ConfigInvalid { reason: String },
}

/// Code reported for [`ServiceError::ConfigInvalid`]
pub const CONFIG_INVALID_CODE: i32 = 3001;

impl ErrorCode for ServiceError {
    fn code(&self) -> i32 {
        match self {
            ServiceError::Audio(err) => err.code(),
            ServiceError::Classifier(err) => err.code(),
            ServiceError::ConfigInvalid { .. } => CONFIG_INVALID_CODE,
        }
    }

    fn message(&self) -> String {
        match self {
            ServiceError::Audio(err) => err.message(),
            ServiceError::Classifier(err) => err.message(),
            ServiceError::ConfigInvalid { reason } => format!("Invalid configuration: {}", reason),
        }
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::Audio(err) => err.fmt(f),
            ServiceError::Classifier(err) => err.fmt(f),
            ServiceError::ConfigInvalid { .. } => {
                write!(f, "ServiceError {}: {}", self.code(), self.message())
            }
        }
    }
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServiceError::Audio(err) => Some(err),
            ServiceError::Classifier(err) => Some(err),
            ServiceError::ConfigInvalid { .. } => None,
        }
    }
}

impl From<AudioError> for ServiceError {
    fn from(err: AudioError) -> Self {
        ServiceError::Audio(err)
    }
}

impl From<ClassifierError> for ServiceError {
    fn from(err: ClassifierError) -> Self {
        ServiceError::Classifier(err)
    }
}
