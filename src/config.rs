//! Configuration management for the note decision pipeline
//!
//! Runtime configuration is loaded from JSON files so capture sizes, the
//! silence gate and the model choice can be tuned without recompilation.
//! Missing or malformed files fall back to defaults with a warning.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::analysis::frame::FRAME_LEN;
use crate::analysis::smoothing::{Smoothing, MAX_SMOOTHING_WINDOW};
use crate::analysis::NoteLabel;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub decision: DecisionConfig,
    #[serde(default)]
    pub model: ModelConfig,
}

/// Capture ring and sample window parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Expected input sample rate in Hz
    pub sample_rate: u32,
    /// Samples per classification window
    pub window_len: usize,
    /// Ring capacity in samples (must be >= window_len)
    pub ring_capacity: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            window_len: FRAME_LEN,
            // Three windows of headroom keeps the producer away from the
            // region being copied out
            ring_capacity: FRAME_LEN * 3,
        }
    }
}

/// What a tick reports when inference fails or the snapshot is contended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Emit the rest label
    Rest,
    /// Repeat the previous tick's label (rest if there is none)
    HoldPrevious,
}

/// Per-tick decision parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    /// Polling frequency in ticks per second
    pub tick_hz: f32,
    /// A window is silent when no |sample| exceeds this amplitude
    pub silence_threshold: f32,
    pub fallback: FallbackPolicy,
    pub smoothing: Smoothing,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            tick_hz: 20.0,
            silence_threshold: 0.1,
            fallback: FallbackPolicy::Rest,
            smoothing: Smoothing::Off,
        }
    }
}

/// Which scoring model backs the pitch classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelConfig {
    /// Harmonic template scorer that needs no trained weights
    Chroma {
        #[serde(default = "default_base_hz")]
        base_hz: f32,
        #[serde(default = "default_label_count")]
        label_count: usize,
    },
    /// Dense network persisted as JSON
    Dense { path: PathBuf },
}

/// F3, the lowest lane of the highway
pub const DEFAULT_BASE_HZ: f32 = 174.61;

fn default_base_hz() -> f32 {
    DEFAULT_BASE_HZ
}

fn default_label_count() -> usize {
    NoteLabel::MAX_PITCH_LABELS
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig::Chroma {
            base_hz: default_base_hz(),
            label_count: default_label_count(),
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The parsed configuration, or defaults if the file is missing or invalid
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration from the default asset location
    pub fn load() -> Self {
        Self::load_from_file("assets/note_config.json")
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), String> {
        if self.capture.window_len == 0 {
            return Err("capture.window_len must be greater than 0".to_string());
        }
        if self.capture.ring_capacity < self.capture.window_len {
            return Err(format!(
                "capture.ring_capacity ({}) must be >= capture.window_len ({})",
                self.capture.ring_capacity, self.capture.window_len
            ));
        }
        if self.capture.sample_rate == 0 {
            return Err("capture.sample_rate must be greater than 0".to_string());
        }
        if !self.decision.tick_hz.is_finite() || self.decision.tick_hz <= 0.0 {
            return Err(format!(
                "decision.tick_hz must be positive (got {})",
                self.decision.tick_hz
            ));
        }
        if !self.decision.silence_threshold.is_finite() || self.decision.silence_threshold < 0.0 {
            return Err("decision.silence_threshold must be a non-negative number".to_string());
        }
        if let Smoothing::MajorityVote { window } = self.decision.smoothing {
            if window == 0 || window > MAX_SMOOTHING_WINDOW {
                return Err(format!(
                    "decision.smoothing window must be within 1..={} (got {})",
                    MAX_SMOOTHING_WINDOW, window
                ));
            }
        }
        Ok(())
    }

    /// Samples delivered between two ticks at the configured rate
    pub fn samples_per_tick(&self) -> usize {
        ((self.capture.sample_rate as f32 / self.decision.tick_hz).round() as usize).max(1)
    }
}
