// Audio module - capture ring shared by the audio callback and the polling tick

pub mod capture_ring;
#[cfg(feature = "live_audio")]
pub mod engine_cpal;

// Re-export commonly used types for convenience
pub use capture_ring::{CaptureRing, CaptureWriter, SnapshotInfo, MAX_SNAPSHOT_ATTEMPTS};
#[cfg(feature = "live_audio")]
pub use engine_cpal::InputCapture;
