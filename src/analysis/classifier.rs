// Pitch classifier - wraps an opaque scoring model behind a fixed contract
//
// Any model mapping a [1, L] float tensor to a fixed-length score vector can
// sit behind `ScoringModel`. The wrapper validates the label set once at
// construction and every score vector on the way out, so downstream label
// selection only ever sees well-formed input.

use super::frame::Tensor;
use super::models::{ChromaModel, DenseModel};
use super::NoteLabel;
use crate::config::{AppConfig, ModelConfig};
use crate::error::{log_classifier_error, ClassifierError};

/// Opaque scoring function: fixed-length frame in, raw scores out
///
/// Implementations are loaded once and read-only afterwards.
pub trait ScoringModel: Send + Sync {
    /// Raw, unnormalized scores; one per label
    fn score(&self, frame: &Tensor) -> Result<Vec<f32>, ClassifierError>;

    /// Size of the label set the model scores
    fn label_count(&self) -> usize;

    /// Short identifier for logs and reports
    fn name(&self) -> &str;
}

/// Validated wrapper around a loaded [`ScoringModel`]
pub struct PitchClassifier {
    model: Box<dyn ScoringModel>,
    label_count: usize,
}

impl PitchClassifier {
    /// Wrap an already loaded model
    ///
    /// # Errors
    /// `LabelCountInvalid` when the model scores no labels or more labels
    /// than fit below the REST sentinel.
    pub fn new(model: Box<dyn ScoringModel>) -> Result<Self, ClassifierError> {
        let label_count = model.label_count();
        if label_count == 0 || label_count > NoteLabel::MAX_PITCH_LABELS {
            return Err(ClassifierError::LabelCountInvalid {
                count: label_count,
                max: NoteLabel::MAX_PITCH_LABELS,
            });
        }
        Ok(Self { model, label_count })
    }

    /// Load the model named by `config`
    ///
    /// Load failures surface as `ModelUnavailable` and are meant to abort
    /// session initialization.
    pub fn from_config(config: &AppConfig) -> Result<Self, ClassifierError> {
        let model: Box<dyn ScoringModel> = match &config.model {
            ModelConfig::Chroma {
                base_hz,
                label_count,
            } => Box::new(ChromaModel::new(
                config.capture.sample_rate,
                config.capture.window_len,
                *base_hz,
                *label_count,
            )?),
            ModelConfig::Dense { path } => {
                let model = DenseModel::load(path)?;
                if model.input_len() != config.capture.window_len {
                    let err = ClassifierError::ModelUnavailable {
                        reason: format!(
                            "{}: model expects {} samples per frame, capture window is {}",
                            path.display(),
                            model.input_len(),
                            config.capture.window_len
                        ),
                    };
                    log_classifier_error(&err, "PitchClassifier::from_config");
                    return Err(err);
                }
                Box::new(model)
            }
        };

        let classifier = Self::new(model).map_err(|err| {
            log_classifier_error(&err, "PitchClassifier::from_config");
            err
        })?;
        log::info!(
            "[PitchClassifier] Loaded model '{}' with {} labels",
            classifier.model.name(),
            classifier.label_count
        );
        Ok(classifier)
    }

    pub fn label_count(&self) -> usize {
        self.label_count
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Score a prepared frame
    ///
    /// # Errors
    /// `InferenceError` when the model fails, returns the wrong number of
    /// scores, or returns non-finite scores.
    pub fn classify(&self, frame: &Tensor) -> Result<Vec<f32>, ClassifierError> {
        let scores = self.model.score(frame)?;

        if scores.len() != self.label_count {
            return Err(ClassifierError::InferenceError {
                reason: format!(
                    "model '{}' returned {} scores, expected {}",
                    self.model.name(),
                    scores.len(),
                    self.label_count
                ),
            });
        }
        if let Some(index) = scores.iter().position(|s| !s.is_finite()) {
            return Err(ClassifierError::InferenceError {
                reason: format!(
                    "model '{}' returned non-finite score at index {}",
                    self.model.name(),
                    index
                ),
            });
        }

        Ok(scores)
    }
}

#[cfg(test)]
#[path = "classifier_tests.rs"]
mod tests;
