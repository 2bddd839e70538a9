// LaneMap - where each label sits on the note highway
//
// Heights are fractions of the playfield height measured from the bottom.
// Pitch labels climb in equal steps; REST has its own zone below them.

use serde::{Deserialize, Serialize};

use crate::analysis::NoteLabel;

/// Vertical position per label, indexed by label value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaneMap {
    heights: [f32; NoteLabel::MAX_PITCH_LABELS + 1],
}

impl LaneMap {
    pub const LOWEST_PITCH: f32 = 0.30;
    pub const PITCH_STEP: f32 = 0.05;
    pub const REST_ZONE: f32 = 0.15;

    /// Lane height for `label`
    pub fn height(&self, label: NoteLabel) -> f32 {
        self.heights[label.value() as usize]
    }

    /// Label whose lane is closest to `height`
    ///
    /// Equidistant lanes resolve to the lower label value.
    pub fn nearest(&self, height: f32) -> NoteLabel {
        let mut best = NoteLabel::REST;
        let mut best_distance = f32::INFINITY;
        for (value, lane) in self.heights.iter().enumerate() {
            let distance = (lane - height).abs();
            if distance < best_distance {
                best_distance = distance;
                best = NoteLabel::from_value(value as u8).unwrap_or(NoteLabel::REST);
            }
        }
        best
    }
}

impl Default for LaneMap {
    fn default() -> Self {
        let mut heights = [0.0; NoteLabel::MAX_PITCH_LABELS + 1];
        for (index, height) in heights
            .iter_mut()
            .take(NoteLabel::MAX_PITCH_LABELS)
            .enumerate()
        {
            *height = Self::LOWEST_PITCH + Self::PITCH_STEP * index as f32;
        }
        heights[NoteLabel::REST.value() as usize] = Self::REST_ZONE;
        Self { heights }
    }
}
