//! CPAL-based capture backend for desktop platforms (Linux, macOS, Windows)
//!
//! `cpal::Stream` cannot cross threads, so the stream is opened, run and
//! dropped on a dedicated capture thread. `start` waits until the device is
//! open so open failures surface synchronously.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{mpsc, Mutex};
use std::thread::{self, JoinHandle};

use crate::audio::{CaptureRing, InputCapture};
use crate::error::AudioError;

use super::{claim_writer, CaptureBackend};

struct CaptureThread {
    stop_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

/// Default input device feeding a capture ring
pub struct CpalBackend {
    preferred_rate: u32,
    sample_rate: AtomicU32,
    worker: Mutex<Option<CaptureThread>>,
}

impl CpalBackend {
    pub fn new(preferred_rate: u32) -> Self {
        Self {
            preferred_rate,
            sample_rate: AtomicU32::new(preferred_rate),
            worker: Mutex::new(None),
        }
    }
}

impl CaptureBackend for CpalBackend {
    fn start(&self, ring: &CaptureRing) -> Result<(), AudioError> {
        let mut worker = self.worker.lock().map_err(|_| AudioError::LockPoisoned {
            component: "cpal_worker".to_string(),
        })?;
        if worker.is_some() {
            return Err(AudioError::AlreadyRunning);
        }

        let writer = claim_writer(ring)?;
        let preferred_rate = self.preferred_rate;
        let (ready_tx, ready_rx) = mpsc::channel::<Result<u32, AudioError>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let handle = thread::Builder::new()
            .name("cpal-capture".to_string())
            .spawn(move || {
                let capture = match InputCapture::open(writer, preferred_rate) {
                    Ok(capture) => capture,
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(capture.sample_rate()));

                // Blocks until stop() sends or the backend is dropped
                let _ = stop_rx.recv();
                if let Err(err) = capture.pause() {
                    tracing::warn!("[CpalBackend] {}", err);
                }
            })
            .map_err(|e| AudioError::StreamOpenFailed {
                reason: format!("failed to spawn capture thread: {}", e),
            })?;

        let opened = ready_rx.recv().unwrap_or_else(|_| {
            Err(AudioError::StreamFailure {
                reason: "capture thread exited before opening the device".to_string(),
            })
        });

        match opened {
            Ok(rate) => {
                self.sample_rate.store(rate, Ordering::Release);
                *worker = Some(CaptureThread { stop_tx, handle });
                tracing::info!("[CpalBackend] Capturing at {} Hz", rate);
                Ok(())
            }
            Err(err) => {
                let _ = handle.join();
                Err(err)
            }
        }
    }

    fn stop(&self) -> Result<(), AudioError> {
        let worker = self
            .worker
            .lock()
            .map_err(|_| AudioError::LockPoisoned {
                component: "cpal_worker".to_string(),
            })?
            .take()
            .ok_or(AudioError::NotRunning)?;

        let _ = worker.stop_tx.send(());
        worker.handle.join().map_err(|_| AudioError::StreamFailure {
            reason: "capture thread panicked".to_string(),
        })?;
        tracing::info!("[CpalBackend] Capture stopped");
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate.load(Ordering::Acquire)
    }
}
