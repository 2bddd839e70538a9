//! Capture backends feeding the engine's ring.
//!
//! A backend owns whatever produces audio (a microphone stream, a decoded
//! file) and drives the single `CaptureWriter` of the ring it is started
//! with. The decision side never sees which backend is active.

use crate::audio::CaptureRing;
use crate::error::AudioError;

/// Trait implemented by audio producers.
///
/// Each backend claims the ring's writer on `start` and releases it on
/// `stop`, so a ring is only ever fed by one backend at a time.
pub trait CaptureBackend: Send + Sync {
    fn start(&self, ring: &CaptureRing) -> Result<(), AudioError>;
    fn stop(&self) -> Result<(), AudioError>;
    /// Rate of the samples this backend appends
    fn sample_rate(&self) -> u32;
}

mod replay;
pub use replay::ReplayBackend;

cfg_if::cfg_if! {
    if #[cfg(feature = "live_audio")] {
        mod cpal;
        pub use self::cpal::CpalBackend;
    }
}

/// Claim the ring's writer or report that another producer holds it
pub(crate) fn claim_writer(ring: &CaptureRing) -> Result<crate::audio::CaptureWriter, AudioError> {
    ring.writer().ok_or(AudioError::AlreadyRunning)
}
