// Analysis module - frame preparation, pitch scoring and label selection
//
// Pipeline per tick:
//   SampleWindow → FramePreprocessor → PitchClassifier → softmax/argmax → NoteLabel
//
// The silence gate in `decision` short-circuits the pipeline before the
// classifier is touched.

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod classifier;
pub mod decision;
pub mod frame;
pub mod models;
pub mod smoothing;

pub use classifier::{PitchClassifier, ScoringModel};
pub use decision::{argmax, decide, is_silent, softmax, DecisionPolicy};
pub use frame::{FramePreprocessor, Tensor, FRAME_LEN};
pub use smoothing::{LabelSmoother, Smoothing, MAX_SMOOTHING_WINDOW};

/// Discrete lane label published once per tick
///
/// Values `0..=12` are model output indices (pitch lanes, low to high as the
/// model was trained); [`NoteLabel::REST`] (13) means no active pitch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct NoteLabel(u8);

impl NoteLabel {
    /// Sentinel for silence / no pitch
    pub const REST: NoteLabel = NoteLabel(13);

    /// Largest label set a model may emit without aliasing REST
    pub const MAX_PITCH_LABELS: usize = 13;

    /// Label for a model output index, `None` if it would collide with REST
    pub fn pitch(index: usize) -> Option<Self> {
        (index < Self::MAX_PITCH_LABELS).then_some(NoteLabel(index as u8))
    }

    /// Parse a raw published value (`0..=13`)
    pub fn from_value(value: u8) -> Option<Self> {
        (value as usize <= Self::MAX_PITCH_LABELS).then_some(NoteLabel(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_rest(self) -> bool {
        self == Self::REST
    }

    /// Pitch index if this is not REST
    pub fn pitch_index(self) -> Option<usize> {
        (!self.is_rest()).then_some(self.0 as usize)
    }
}

impl fmt::Display for NoteLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_rest() {
            write!(f, "rest")
        } else {
            write!(f, "note {}", self.0)
        }
    }
}

impl TryFrom<u8> for NoteLabel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        NoteLabel::from_value(value).ok_or_else(|| format!("note label out of range: {}", value))
    }
}

impl From<NoteLabel> for u8 {
    fn from(label: NoteLabel) -> Self {
        label.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rest_is_thirteen() {
        assert_eq!(NoteLabel::REST.value(), 13);
        assert!(NoteLabel::REST.is_rest());
        assert_eq!(NoteLabel::REST.pitch_index(), None);
    }

    #[test]
    fn test_pitch_never_aliases_rest() {
        assert_eq!(NoteLabel::pitch(0).map(NoteLabel::value), Some(0));
        assert_eq!(NoteLabel::pitch(12).map(NoteLabel::value), Some(12));
        assert_eq!(NoteLabel::pitch(13), None);
    }

    #[test]
    fn test_from_value_range() {
        assert_eq!(NoteLabel::from_value(13), Some(NoteLabel::REST));
        assert_eq!(NoteLabel::from_value(14), None);
    }

    #[test]
    fn test_serde_as_integer() {
        let json = serde_json::to_string(&NoteLabel::REST).unwrap();
        assert_eq!(json, "13");
        let parsed: NoteLabel = serde_json::from_str("4").unwrap();
        assert_eq!(parsed.pitch_index(), Some(4));
        assert!(serde_json::from_str::<NoteLabel>("20").is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(NoteLabel::REST.to_string(), "rest");
        assert_eq!(NoteLabel::pitch(3).unwrap().to_string(), "note 3");
    }
}
