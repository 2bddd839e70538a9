// Decision post-processing - scores to a single note label
//
// softmax normalizes raw scores, argmax picks the first strictly largest
// probability, and the silence gate overrides both with REST.

use super::NoteLabel;
use crate::error::ClassifierError;

/// Default amplitude gate: a window is silent when no |sample| exceeds this
pub const DEFAULT_SILENCE_THRESHOLD: f32 = 0.1;

/// Normalize raw scores into a probability distribution
///
/// The maximum score is subtracted before exponentiating so large logits
/// cannot overflow; the result is mathematically identical to the plain form.
/// Computed in f64. An empty input yields an empty distribution.
pub fn softmax(scores: &[f32]) -> Vec<f64> {
    let max = scores
        .iter()
        .map(|&s| s as f64)
        .fold(f64::NEG_INFINITY, f64::max);

    let exps: Vec<f64> = scores.iter().map(|&s| (s as f64 - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Index of the strictly largest value; ties resolve to the lowest index
///
/// # Errors
/// `EmptyDistribution` for an empty slice.
pub fn argmax(probabilities: &[f64]) -> Result<usize, ClassifierError> {
    if probabilities.is_empty() {
        return Err(ClassifierError::EmptyDistribution);
    }

    let mut best_index = 0;
    let mut best_value = f64::NEG_INFINITY;
    for (index, &value) in probabilities.iter().enumerate() {
        if value > best_value {
            best_value = value;
            best_index = index;
        }
    }
    Ok(best_index)
}

/// True when no sample's magnitude exceeds `threshold`
pub fn is_silent(window: &[f32], threshold: f32) -> bool {
    window.iter().all(|s| s.abs() <= threshold)
}

/// REST when silent, otherwise `argmax(softmax(scores))`
pub fn decide(silent: bool, scores: &[f32]) -> Result<NoteLabel, ClassifierError> {
    if silent {
        return Ok(NoteLabel::REST);
    }

    let index = argmax(&softmax(scores))?;
    NoteLabel::pitch(index).ok_or(ClassifierError::LabelCountInvalid {
        count: scores.len(),
        max: NoteLabel::MAX_PITCH_LABELS,
    })
}

/// Silence gate plus label selection for one window
#[derive(Debug, Clone, Copy)]
pub struct DecisionPolicy {
    silence_threshold: f32,
}

impl DecisionPolicy {
    pub fn new(silence_threshold: f32) -> Self {
        Self { silence_threshold }
    }

    pub fn silence_threshold(&self) -> f32 {
        self.silence_threshold
    }

    pub fn is_silent(&self, window: &[f32]) -> bool {
        is_silent(window, self.silence_threshold)
    }

    /// Decide a label for `window`, calling `score` only for audible windows
    pub fn decide_window<F>(&self, window: &[f32], score: F) -> Result<NoteLabel, ClassifierError>
    where
        F: FnOnce(&[f32]) -> Result<Vec<f32>, ClassifierError>,
    {
        if self.is_silent(window) {
            return Ok(NoteLabel::REST);
        }
        let scores = score(window)?;
        decide(false, &scores)
    }
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_SILENCE_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use std::cell::Cell;

    #[test]
    fn test_softmax_sums_to_one() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let len = rng.gen_range(1..32);
            let scores: Vec<f32> = (0..len).map(|_| rng.gen_range(-50.0..50.0)).collect();
            let probs = softmax(&scores);

            let sum: f64 = probs.iter().sum();
            assert!((sum - 1.0).abs() < 1e-6, "sum was {}", sum);
            assert!(probs.iter().all(|&p| p > 0.0 && p <= 1.0));
        }
    }

    #[test]
    fn test_softmax_elements_in_unit_interval() {
        let probs = softmax(&[0.5, -1.0, 2.0, 0.0]);
        assert!(probs.iter().all(|&p| p > 0.0 && p <= 1.0));
        assert_eq!(softmax(&[3.0]), vec![1.0]);
    }

    #[test]
    fn test_softmax_large_logits_stay_finite() {
        let probs = softmax(&[1000.0, 999.0, -1000.0]);
        assert!(probs.iter().all(|p| p.is_finite()));
        assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert_eq!(argmax(&probs).unwrap(), 0);
    }

    #[test]
    fn test_softmax_matches_unstabilized_form() {
        let scores = [1.0_f32, 2.0, 3.0];
        let naive: Vec<f64> = {
            let exps: Vec<f64> = scores.iter().map(|&s| (s as f64).exp()).collect();
            let sum: f64 = exps.iter().sum();
            exps.iter().map(|e| e / sum).collect()
        };
        for (a, b) in softmax(&scores).iter().zip(naive.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_argmax_unique_maximum() {
        assert_eq!(argmax(&[0.1, 0.7, 0.2]).unwrap(), 1);
    }

    #[test]
    fn test_argmax_ties_take_lowest_index() {
        let probs = [0.1, 0.1, 0.3, 0.05, 0.1, 0.3, 0.05];
        assert_eq!(argmax(&probs).unwrap(), 2);
    }

    #[test]
    fn test_argmax_empty_distribution() {
        assert_eq!(argmax(&[]), Err(ClassifierError::EmptyDistribution));
    }

    #[test]
    fn test_ascending_logits_pick_max() {
        let scores = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0, 0.0];
        let label = decide(false, &scores).unwrap();
        assert_eq!(label.value(), 11);
    }

    #[test]
    fn test_tied_logits_pick_first() {
        let scores = [0.0, 1.0, 5.0, 2.0, 0.5, 5.0, 1.0];
        assert_eq!(decide(false, &scores).unwrap().value(), 2);
    }

    #[test]
    fn test_silence_overrides_scores() {
        let scores = [9.0, 1.0, 0.0];
        assert_eq!(decide(true, &scores).unwrap(), NoteLabel::REST);
        assert_eq!(decide(true, &[]).unwrap(), NoteLabel::REST);
    }

    #[test]
    fn test_decide_empty_scores_fails() {
        assert_eq!(decide(false, &[]), Err(ClassifierError::EmptyDistribution));
    }

    #[test]
    fn test_decide_rejects_oversized_label_set() {
        let mut scores = vec![0.0_f32; 14];
        scores[13] = 5.0;
        assert!(matches!(
            decide(false, &scores),
            Err(ClassifierError::LabelCountInvalid { count: 14, .. })
        ));
    }

    #[test]
    fn test_is_silent_threshold_is_inclusive() {
        assert!(is_silent(&[0.0, 0.1, -0.1], 0.1));
        assert!(!is_silent(&[0.0, 0.1001], 0.1));
        assert!(!is_silent(&[-0.5], 0.1));
        assert!(is_silent(&[], 0.1));
    }

    #[test]
    fn test_policy_skips_scoring_for_silence() {
        let policy = DecisionPolicy::default();
        let calls = Cell::new(0);
        let mut rng = StdRng::seed_from_u64(11);

        for _ in 0..50 {
            let window: Vec<f32> = (0..64).map(|_| rng.gen_range(-0.1..=0.1)).collect();
            let label = policy
                .decide_window(&window, |_| {
                    calls.set(calls.get() + 1);
                    Ok(vec![10.0, 0.0])
                })
                .unwrap();
            assert_eq!(label, NoteLabel::REST);
        }
        assert_eq!(calls.get(), 0, "scorer must not run on silent windows");
    }

    #[test]
    fn test_policy_scores_audible_window() {
        let policy = DecisionPolicy::default();
        let mut window = vec![0.0_f32; 16];
        window[0] = 0.5;

        let mut seen = Vec::new();
        let label = policy
            .decide_window(&window, |w| {
                seen = w.to_vec();
                Ok(vec![0.0, 3.0, 1.0])
            })
            .unwrap();
        assert_eq!(label.value(), 1);
        assert_eq!(seen, window);
    }
}
