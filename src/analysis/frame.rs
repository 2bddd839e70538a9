// Frame preprocessing - validate and lay out a sample window for the model
//
// The model consumes raw time-domain samples, so preparation is a pure
// reshape/copy into a [1, L] tensor with no numeric transformation.

use crate::error::ClassifierError;

/// Samples per classification window (100ms at 44.1kHz)
pub const FRAME_LEN: usize = 4410;

/// Row-major float tensor handed to scoring models
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: [usize; 2],
    data: Vec<f32>,
}

impl Tensor {
    pub fn shape(&self) -> [usize; 2] {
        self.shape
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Shapes sample windows into model input tensors
#[derive(Debug, Clone, Copy)]
pub struct FramePreprocessor {
    frame_len: usize,
}

impl FramePreprocessor {
    pub fn new(frame_len: usize) -> Self {
        Self { frame_len }
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Copy `window` into a `[1, frame_len]` tensor
    ///
    /// # Errors
    /// `InvalidFrameLength` when `window.len() != frame_len`; partial windows
    /// are never submitted to the model.
    pub fn prepare(&self, window: &[f32]) -> Result<Tensor, ClassifierError> {
        if window.len() != self.frame_len {
            return Err(ClassifierError::InvalidFrameLength {
                expected: self.frame_len,
                actual: window.len(),
            });
        }

        Ok(Tensor {
            shape: [1, self.frame_len],
            data: window.to_vec(),
        })
    }
}

impl Default for FramePreprocessor {
    fn default() -> Self {
        Self::new(FRAME_LEN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_exact_length() {
        let window: Vec<f32> = (0..FRAME_LEN).map(|i| i as f32 * 1e-4).collect();
        let tensor = FramePreprocessor::default().prepare(&window).unwrap();

        assert_eq!(tensor.shape(), [1, 4410]);
        assert_eq!(tensor.as_slice(), window.as_slice());
    }

    #[test]
    fn test_prepare_rejects_wrong_lengths() {
        let pre = FramePreprocessor::default();
        for len in [0, 1, 4409, 4411, 8820] {
            let window = vec![0.0; len];
            assert_eq!(
                pre.prepare(&window),
                Err(ClassifierError::InvalidFrameLength {
                    expected: 4410,
                    actual: len
                }),
                "length {} must be rejected",
                len
            );
        }
    }

    #[test]
    fn test_prepare_is_pure() {
        let pre = FramePreprocessor::new(4);
        let window = [0.5, -0.5, 0.25, 0.0];
        assert_eq!(pre.prepare(&window), pre.prepare(&window));
    }
}
