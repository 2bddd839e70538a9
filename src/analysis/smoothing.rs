// Optional temporal smoothing across ticks
//
// Every tick is independent by default, which can make the published label
// flicker. `MajorityVote` trades a few ticks of latency for stability.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::NoteLabel;

/// Longest majority window a configuration may ask for
pub const MAX_SMOOTHING_WINDOW: usize = 64;

/// Smoothing mode applied to consecutive tick labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Smoothing {
    /// Publish each tick's label unchanged
    #[default]
    Off,
    /// Publish the most frequent label among the last `window` ticks
    MajorityVote { window: usize },
}

/// Stateful smoother fed one label per tick
#[derive(Debug, Clone)]
pub struct LabelSmoother {
    mode: Smoothing,
    history: VecDeque<NoteLabel>,
}

impl LabelSmoother {
    pub fn new(mode: Smoothing) -> Self {
        Self {
            mode,
            history: VecDeque::new(),
        }
    }

    pub fn mode(&self) -> Smoothing {
        self.mode
    }

    /// Record `label` and return the label to publish
    ///
    /// Majority ties go to whichever tied label occurred most recently.
    /// Windows are clamped to `1..=MAX_SMOOTHING_WINDOW`.
    pub fn push(&mut self, label: NoteLabel) -> NoteLabel {
        let window = match self.mode {
            Smoothing::Off => return label,
            Smoothing::MajorityVote { window } => window.clamp(1, MAX_SMOOTHING_WINDOW),
        };

        if self.history.len() == window {
            self.history.pop_front();
        }
        self.history.push_back(label);

        let mut counts = [0usize; NoteLabel::MAX_PITCH_LABELS + 1];
        for l in &self.history {
            counts[l.value() as usize] += 1;
        }

        // Walk newest to oldest so the first strict winner is the most recent
        let mut best = label;
        let mut best_count = 0;
        for l in self.history.iter().rev() {
            let count = counts[l.value() as usize];
            if count > best_count {
                best = *l;
                best_count = count;
            }
        }
        best
    }

    /// Drop history, e.g. when capture pauses
    pub fn clear(&mut self) {
        self.history.clear();
    }
}
