// Classifier pipeline error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Classifier error code constants
///
/// Error code range: 2001-2005
pub struct ClassifierErrorCodes {}

impl ClassifierErrorCodes {
    /// Model failed to load at startup
    pub const MODEL_UNAVAILABLE: i32 = 2001;

    /// Model rejected the input or produced an unusable output
    pub const INFERENCE_ERROR: i32 = 2002;

    /// Frame handed to the preprocessor has the wrong length
    pub const INVALID_FRAME_LENGTH: i32 = 2003;

    /// Label selection over an empty distribution
    pub const EMPTY_DISTRIBUTION: i32 = 2004;

    /// Model label set is empty or would alias the rest label
    pub const LABEL_COUNT_INVALID: i32 = 2005;
}

/// Log a classifier error with structured context
pub fn log_classifier_error(err: &ClassifierError, context: &str) {
    error!(
        "Classifier error in {}: code={}, component=PitchClassifier, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised between the frame preprocessor and label selection
///
/// `ModelUnavailable` and `LabelCountInvalid` are construction-time and abort
/// session setup. `InferenceError` is recoverable per tick.
/// `InvalidFrameLength` and `EmptyDistribution` indicate wiring bugs.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassifierError {
    /// Model could not be loaded
    ModelUnavailable { reason: String },

    /// Model rejected the frame or returned malformed scores
    InferenceError { reason: String },

    /// Frame length differs from the configured window length
    InvalidFrameLength { expected: usize, actual: usize },

    /// Probability vector was empty
    EmptyDistribution,

    /// Label count outside 1..=max
    LabelCountInvalid { count: usize, max: usize },
}

impl ClassifierError {
    /// Whether a tick that failed with this error may fall back and continue
    pub fn is_transient(&self) -> bool {
        matches!(self, ClassifierError::InferenceError { .. })
    }
}

impl ErrorCode for ClassifierError {
    fn code(&self) -> i32 {
        match self {
            ClassifierError::ModelUnavailable { .. } => ClassifierErrorCodes::MODEL_UNAVAILABLE,
            ClassifierError::InferenceError { .. } => ClassifierErrorCodes::INFERENCE_ERROR,
            ClassifierError::InvalidFrameLength { .. } => {
                ClassifierErrorCodes::INVALID_FRAME_LENGTH
            }
            ClassifierError::EmptyDistribution => ClassifierErrorCodes::EMPTY_DISTRIBUTION,
            ClassifierError::LabelCountInvalid { .. } => ClassifierErrorCodes::LABEL_COUNT_INVALID,
        }
    }

    fn message(&self) -> String {
        match self {
            ClassifierError::ModelUnavailable { reason } => {
                format!("Pitch model unavailable: {}", reason)
            }
            ClassifierError::InferenceError { reason } => {
                format!("Inference failed: {}", reason)
            }
            ClassifierError::InvalidFrameLength { expected, actual } => {
                format!(
                    "Invalid frame length: expected {} samples, got {}",
                    expected, actual
                )
            }
            ClassifierError::EmptyDistribution => {
                "Cannot select a label from an empty distribution".to_string()
            }
            ClassifierError::LabelCountInvalid { count, max } => {
                format!("Model label count must be within 1..={} (got {})", max, count)
            }
        }
    }
}

impl fmt::Display for ClassifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ClassifierError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for ClassifierError {}
