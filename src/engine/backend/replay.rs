use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::audio::CaptureRing;
use crate::error::AudioError;

use super::{claim_writer, CaptureBackend};

struct ReplayThread {
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Feeds a pre-decoded mono buffer into the ring in fixed-size chunks.
///
/// Used for deterministic runs and tests without audio hardware. In paced
/// mode each chunk is appended when its wall-clock time arrives, mimicking
/// a device callback; otherwise the buffer is appended as fast as possible.
pub struct ReplayBackend {
    samples: Arc<Vec<f32>>,
    sample_rate: u32,
    chunk_len: usize,
    paced: bool,
    finished: Arc<AtomicBool>,
    worker: Mutex<Option<ReplayThread>>,
}

impl ReplayBackend {
    pub fn new(samples: Vec<f32>, sample_rate: u32, chunk_len: usize) -> Self {
        Self {
            samples: Arc::new(samples),
            sample_rate,
            chunk_len: chunk_len.max(1),
            paced: true,
            finished: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
        }
    }

    /// Append without waiting between chunks
    pub fn unpaced(mut self) -> Self {
        self.paced = false;
        self
    }

    /// Whether every sample has been appended
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    fn lock_worker(&self) -> Result<std::sync::MutexGuard<'_, Option<ReplayThread>>, AudioError> {
        self.worker.lock().map_err(|_| AudioError::LockPoisoned {
            component: "replay_worker".to_string(),
        })
    }
}

impl CaptureBackend for ReplayBackend {
    fn start(&self, ring: &CaptureRing) -> Result<(), AudioError> {
        let mut worker = self.lock_worker()?;
        if worker.is_some() {
            return Err(AudioError::AlreadyRunning);
        }

        let mut writer = claim_writer(ring)?;
        let running = Arc::new(AtomicBool::new(true));
        let samples = Arc::clone(&self.samples);
        let finished = Arc::clone(&self.finished);
        let chunk_len = self.chunk_len;
        let chunk_period = if self.paced {
            Some(Duration::from_secs_f64(
                chunk_len as f64 / self.sample_rate.max(1) as f64,
            ))
        } else {
            None
        };
        finished.store(false, Ordering::Release);

        let thread_running = Arc::clone(&running);
        let handle = thread::Builder::new()
            .name("replay-capture".to_string())
            .spawn(move || {
                let started = Instant::now();
                for (index, chunk) in samples.chunks(chunk_len).enumerate() {
                    if !thread_running.load(Ordering::Acquire) {
                        return;
                    }
                    if let Some(period) = chunk_period {
                        let due = started + period * index as u32;
                        let now = Instant::now();
                        if due > now {
                            thread::sleep(due - now);
                        }
                    }
                    writer.append(chunk);
                }
                finished.store(true, Ordering::Release);
                tracing::debug!("[ReplayBackend] Replayed {} samples", writer.cursor());
            })
            .map_err(|e| AudioError::StreamOpenFailed {
                reason: format!("failed to spawn replay thread: {}", e),
            })?;

        *worker = Some(ReplayThread { running, handle });
        tracing::info!(
            "[ReplayBackend] Replaying {} samples at {} Hz",
            self.samples.len(),
            self.sample_rate
        );
        Ok(())
    }

    fn stop(&self) -> Result<(), AudioError> {
        let worker = self.lock_worker()?.take().ok_or(AudioError::NotRunning)?;
        worker.running.store(false, Ordering::Release);
        worker.handle.join().map_err(|_| AudioError::StreamFailure {
            reason: "replay thread panicked".to_string(),
        })
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}
