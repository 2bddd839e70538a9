// ChromaModel - harmonic template scoring over a magnitude spectrum
//
// Label k is tuned to base_hz * 2^(k/12). Its score is the log of the
// harmonic-weighted magnitude at that pitch and its first overtones, so a
// sustained tone scores highest on its own lane.

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::analysis::classifier::ScoringModel;
use crate::analysis::frame::Tensor;
use crate::error::ClassifierError;

/// Harmonics summed per label (fundamental included)
const HARMONICS: usize = 4;

/// Keeps the log finite for an all-zero spectrum
const LOG_FLOOR: f32 = 1e-9;

pub struct ChromaModel {
    fft: Arc<dyn Fft<f32>>,
    fft_size: usize,
    frame_len: usize,
    /// Hann window (pre-computed)
    window: Vec<f32>,
    /// Fractional FFT bin per (label, harmonic)
    template_bins: Vec<[f32; HARMONICS]>,
}

impl ChromaModel {
    /// Plan the FFT and the per-label templates
    ///
    /// # Arguments
    /// * `sample_rate` - Rate the frames were captured at
    /// * `frame_len` - Samples per frame
    /// * `base_hz` - Frequency of label 0
    /// * `label_count` - Number of semitone lanes above `base_hz`
    pub fn new(
        sample_rate: u32,
        frame_len: usize,
        base_hz: f32,
        label_count: usize,
    ) -> Result<Self, ClassifierError> {
        if sample_rate == 0 || frame_len == 0 || !(base_hz.is_finite() && base_hz > 0.0) {
            return Err(ClassifierError::ModelUnavailable {
                reason: format!(
                    "chroma model needs positive parameters (sample_rate={}, frame_len={}, base_hz={})",
                    sample_rate, frame_len, base_hz
                ),
            });
        }

        if label_count == 0 {
            return Err(ClassifierError::ModelUnavailable {
                reason: "chroma model needs at least one label".to_string(),
            });
        }

        let fft_size = (frame_len * 2).next_power_of_two();
        let nyquist = sample_rate as f32 / 2.0;
        let top_hz = base_hz * 2f32.powf((label_count - 1) as f32 / 12.0);
        if top_hz >= nyquist {
            return Err(ClassifierError::ModelUnavailable {
                reason: format!(
                    "chroma label {} at {:.1} Hz is above Nyquist ({:.1} Hz)",
                    label_count - 1,
                    top_hz,
                    nyquist
                ),
            });
        }

        let bin_hz = sample_rate as f32 / fft_size as f32;
        let template_bins = (0..label_count)
            .map(|k| {
                let f0 = base_hz * 2f32.powf(k as f32 / 12.0);
                let mut bins = [0.0; HARMONICS];
                for (h, bin) in bins.iter_mut().enumerate() {
                    *bin = f0 * (h + 1) as f32 / bin_hz;
                }
                bins
            })
            .collect();

        let window = (0..frame_len)
            .map(|i| {
                if frame_len == 1 {
                    1.0
                } else {
                    0.5 * (1.0
                        - ((2.0 * std::f32::consts::PI * i as f32) / (frame_len as f32 - 1.0))
                            .cos())
                }
            })
            .collect();

        let fft = FftPlanner::new().plan_fft_forward(fft_size);

        Ok(Self {
            fft,
            fft_size,
            frame_len,
            window,
            template_bins,
        })
    }

    fn magnitude_spectrum(&self, samples: &[f32]) -> Vec<f32> {
        let mut buffer: Vec<Complex<f32>> = samples
            .iter()
            .zip(&self.window)
            .map(|(s, w)| Complex::new(s * w, 0.0))
            .collect();
        buffer.resize(self.fft_size, Complex::new(0.0, 0.0));

        self.fft.process(&mut buffer);

        buffer[..self.fft_size / 2 + 1]
            .iter()
            .map(|c| c.norm())
            .collect()
    }

    /// Peak magnitude within one bin of `bin`
    fn peak_near(spectrum: &[f32], bin: f32) -> f32 {
        let last = spectrum.len() - 1;
        let centre = (bin.round() as usize).min(last);
        let lo = centre.saturating_sub(1);
        let hi = (centre + 1).min(last);
        spectrum[lo..=hi].iter().copied().fold(0.0, f32::max)
    }
}

impl ScoringModel for ChromaModel {
    fn score(&self, frame: &Tensor) -> Result<Vec<f32>, ClassifierError> {
        if frame.len() != self.frame_len {
            return Err(ClassifierError::InferenceError {
                reason: format!(
                    "chroma model planned for {} samples, frame has {}",
                    self.frame_len,
                    frame.len()
                ),
            });
        }

        let spectrum = self.magnitude_spectrum(frame.as_slice());
        let nyquist_bin = (spectrum.len() - 1) as f32;

        Ok(self
            .template_bins
            .iter()
            .map(|bins| {
                let energy: f32 = bins
                    .iter()
                    .enumerate()
                    .filter(|(_, &bin)| bin <= nyquist_bin)
                    .map(|(h, &bin)| Self::peak_near(&spectrum, bin) / (h + 1) as f32)
                    .sum();
                (LOG_FLOOR + energy).ln()
            })
            .collect())
    }

    fn label_count(&self) -> usize {
        self.template_bins.len()
    }

    fn name(&self) -> &str {
        "chroma"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::decision::argmax;
    use crate::analysis::frame::{FramePreprocessor, FRAME_LEN};

    const BASE_HZ: f32 = 174.61;

    fn tone(freq: f32, amplitude: f32) -> Tensor {
        let samples: Vec<f32> = (0..FRAME_LEN)
            .map(|i| amplitude * (2.0 * std::f32::consts::PI * freq * i as f32 / 44100.0).sin())
            .collect();
        FramePreprocessor::default().prepare(&samples).unwrap()
    }

    #[test]
    fn test_each_semitone_scores_its_own_lane() {
        let model = ChromaModel::new(44100, FRAME_LEN, BASE_HZ, 13).unwrap();
        for k in 0..13 {
            let freq = BASE_HZ * 2f32.powf(k as f32 / 12.0);
            let scores = model.score(&tone(freq, 0.5)).unwrap();
            assert_eq!(scores.len(), 13);
            assert_eq!(argmax(&scores.iter().map(|&s| s as f64).collect::<Vec<f64>>()).unwrap(), k, "tone {:.2} Hz", freq);
        }
    }

    #[test]
    fn test_zero_frame_scores_are_finite() {
        let model = ChromaModel::new(44100, FRAME_LEN, BASE_HZ, 13).unwrap();
        let frame = FramePreprocessor::default()
            .prepare(&vec![0.0; FRAME_LEN])
            .unwrap();
        let scores = model.score(&frame).unwrap();
        assert!(scores.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_rejects_labels_above_nyquist() {
        let result = ChromaModel::new(8000, FRAME_LEN, 3000.0, 13);
        assert!(matches!(result, Err(ClassifierError::ModelUnavailable { .. })));
    }

    #[test]
    fn test_rejects_empty_label_set() {
        for base_hz in [BASE_HZ, 30000.0] {
            assert!(matches!(
                ChromaModel::new(44100, FRAME_LEN, base_hz, 0),
                Err(ClassifierError::ModelUnavailable { .. })
            ));
        }
    }

    #[test]
    fn test_frame_length_mismatch() {
        let model = ChromaModel::new(44100, 1024, BASE_HZ, 13).unwrap();
        assert!(matches!(
            model.score(&tone(220.0, 0.5)),
            Err(ClassifierError::InferenceError { .. })
        ));
    }
}
