// DenseModel - fully connected network persisted as JSON
//
// File layout:
// {
//   "input_len": 4410,
//   "layers": [
//     { "weights": [[...], ...], "bias": [...], "activation": "relu" },
//     { "weights": [[...], ...], "bias": [...], "activation": "linear" }
//   ]
// }
// `weights` is row-major [outputs][inputs]; the last layer's outputs are the
// label scores.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::analysis::classifier::ScoringModel;
use crate::analysis::frame::Tensor;
use crate::error::ClassifierError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Linear,
    Relu,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseLayer {
    pub weights: Vec<Vec<f32>>,
    pub bias: Vec<f32>,
    #[serde(default = "default_activation")]
    pub activation: Activation,
}

fn default_activation() -> Activation {
    Activation::Linear
}

impl DenseLayer {
    fn forward(&self, input: &[f32]) -> Vec<f32> {
        self.weights
            .iter()
            .zip(&self.bias)
            .map(|(row, bias)| {
                let z = row.iter().zip(input).map(|(w, x)| w * x).sum::<f32>() + bias;
                match self.activation {
                    Activation::Linear => z,
                    Activation::Relu => z.max(0.0),
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseModel {
    input_len: usize,
    layers: Vec<DenseLayer>,
}

impl DenseModel {
    /// Build from layers, checking that dimensions chain
    pub fn new(input_len: usize, layers: Vec<DenseLayer>) -> Result<Self, ClassifierError> {
        let model = Self { input_len, layers };
        model.validate()?;
        Ok(model)
    }

    /// Read and validate a model file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        let unavailable = |reason: String| ClassifierError::ModelUnavailable {
            reason: format!("{}: {}", path.display(), reason),
        };

        let json = fs::read_to_string(path).map_err(|e| unavailable(e.to_string()))?;
        let model: DenseModel = serde_json::from_str(&json).map_err(|e| unavailable(e.to_string()))?;
        model.validate().map_err(|e| match e {
            ClassifierError::ModelUnavailable { reason } => unavailable(reason),
            other => other,
        })?;
        Ok(model)
    }

    pub fn input_len(&self) -> usize {
        self.input_len
    }

    fn validate(&self) -> Result<(), ClassifierError> {
        let invalid = |reason: String| Err(ClassifierError::ModelUnavailable { reason });

        if self.layers.is_empty() {
            return invalid("model has no layers".to_string());
        }

        let mut width = self.input_len;
        for (index, layer) in self.layers.iter().enumerate() {
            if layer.weights.is_empty() {
                return invalid(format!("layer {} has no outputs", index));
            }
            if layer.bias.len() != layer.weights.len() {
                return invalid(format!(
                    "layer {} has {} outputs but {} biases",
                    index,
                    layer.weights.len(),
                    layer.bias.len()
                ));
            }
            if let Some(row) = layer.weights.iter().position(|r| r.len() != width) {
                return invalid(format!(
                    "layer {} row {} expects {} inputs, previous width is {}",
                    index,
                    row,
                    layer.weights[row].len(),
                    width
                ));
            }
            width = layer.weights.len();
        }
        Ok(())
    }
}

impl ScoringModel for DenseModel {
    fn score(&self, frame: &Tensor) -> Result<Vec<f32>, ClassifierError> {
        if frame.len() != self.input_len {
            return Err(ClassifierError::InferenceError {
                reason: format!(
                    "dense model expects {} inputs, frame has {}",
                    self.input_len,
                    frame.len()
                ),
            });
        }

        let mut activations = frame.as_slice().to_vec();
        for layer in &self.layers {
            activations = layer.forward(&activations);
        }
        Ok(activations)
    }

    fn label_count(&self) -> usize {
        self.layers.last().map(|l| l.weights.len()).unwrap_or(0)
    }

    fn name(&self) -> &str {
        "dense"
    }
}
