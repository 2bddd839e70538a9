// Pitch Lane Core - real-time note decisions for a pitch-driven game loop
// Lock-free capture ring, pluggable pitch classifier and a fixed-rate ticker

// Module declarations
pub mod analysis;
pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod fixtures;
pub mod lanes;

// Re-exports for convenience
pub use analysis::NoteLabel;
pub use config::AppConfig;
pub use engine::{LabelEvent, NoteDecisionService, NoteSession, PollingTicker};
pub use error::{AudioError, ClassifierError, ErrorCode, ServiceError};
pub use lanes::LaneMap;

use once_cell::sync::Lazy;
use tracing_subscriber::EnvFilter;

static LOGGING: Lazy<()> = Lazy::new(|| {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // Another subscriber may already be installed by the host; keep it
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
});

/// Install the stderr tracing subscriber once per process
///
/// Honors `RUST_LOG`; defaults to `info`. `log` records are forwarded too.
pub fn init_logging() {
    Lazy::force(&LOGGING);
}
