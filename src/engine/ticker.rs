// PollingTicker - drives NoteDecisionService::tick at a fixed rate
//
// The service is moved onto a dedicated thread and handed back by `stop()`.
// Each label goes out on a tokio broadcast channel; the newest one is also
// mirrored into an atomic so a render loop can poll it without subscribing.

use std::future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use futures::{Stream, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use super::core::{DecisionSource, NoteDecisionService, ServiceState};
use crate::analysis::NoteLabel;
use crate::error::AudioError;

/// Labels buffered per subscriber before it starts lagging
const LABEL_CHANNEL_CAPACITY: usize = 64;

/// Stored in `latest` before the first label is published
const NO_LABEL: u8 = u8::MAX;

/// One published tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LabelEvent {
    pub label: NoteLabel,
    pub source: DecisionSource,
    /// Zero-based tick index since the ticker started
    pub tick: u64,
    /// Milliseconds since the ticker started
    pub timestamp_ms: u64,
}

pub struct PollingTicker {
    running: Arc<AtomicBool>,
    latest: Arc<AtomicU8>,
    published: Arc<AtomicU64>,
    tx: broadcast::Sender<LabelEvent>,
    handle: Option<JoinHandle<Option<NoteDecisionService>>>,
}

impl PollingTicker {
    /// Start ticking `service` at `tick_hz`
    ///
    /// An idle service is started first. Ticking halts on its own after a
    /// tick panics or returns an error; `is_running` then reports false and
    /// `stop` still hands the service back.
    ///
    /// # Errors
    /// `TickRateInvalid` for a non-finite or non-positive rate.
    pub fn spawn(service: NoteDecisionService, tick_hz: f32) -> Result<Self, AudioError> {
        Self::try_spawn(service, tick_hz).map_err(|(err, _)| err)
    }

    /// Like [`spawn`](Self::spawn) but returns the service on failure
    ///
    /// A service started here is paused again before it is returned.
    pub fn try_spawn(
        mut service: NoteDecisionService,
        tick_hz: f32,
    ) -> Result<Self, (AudioError, NoteDecisionService)> {
        if !tick_hz.is_finite() || tick_hz <= 0.0 {
            return Err((AudioError::TickRateInvalid { hz: tick_hz }, service));
        }
        let started_here = service.state() == ServiceState::Idle;
        if started_here {
            if let Err(err) = service.start() {
                return Err((err, service));
            }
        }

        let running = Arc::new(AtomicBool::new(true));
        let latest = Arc::new(AtomicU8::new(NO_LABEL));
        let published = Arc::new(AtomicU64::new(0));
        let (tx, _) = broadcast::channel(LABEL_CHANNEL_CAPACITY);

        let period = Duration::from_secs_f64(1.0 / tick_hz as f64);
        let worker = TickWorker {
            running: Arc::clone(&running),
            latest: Arc::clone(&latest),
            published: Arc::clone(&published),
            tx: tx.clone(),
            period,
        };

        // The service is sent once the thread exists so a failed spawn
        // cannot drop it along with the closure
        let (service_tx, service_rx) = mpsc::channel::<NoteDecisionService>();
        let spawned = thread::Builder::new()
            .name("note-ticker".to_string())
            .spawn(move || service_rx.recv().ok().map(|service| worker.run(service)));

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                let err = AudioError::StreamFailure {
                    reason: format!("failed to spawn ticker thread: {}", e),
                };
                return Err(Self::hand_back(err, service, started_here));
            }
        };
        if let Err(mpsc::SendError(service)) = service_tx.send(service) {
            let _ = handle.join();
            let err = AudioError::StreamFailure {
                reason: "ticker thread exited before its first tick".to_string(),
            };
            return Err(Self::hand_back(err, service, started_here));
        }

        tracing::info!("[Ticker] Started at {:.1} Hz ({:?} period)", tick_hz, period);

        Ok(Self {
            running,
            latest,
            published,
            tx,
            handle: Some(handle),
        })
    }

    fn hand_back(
        err: AudioError,
        mut service: NoteDecisionService,
        started_here: bool,
    ) -> (AudioError, NoteDecisionService) {
        if started_here {
            let _ = service.pause();
        }
        (err, service)
    }

    /// New receiver for every label published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<LabelEvent> {
        self.tx.subscribe()
    }

    /// Labels as a stream; lagged gaps are skipped
    pub fn label_stream(&self) -> impl Stream<Item = LabelEvent> + Send + 'static {
        BroadcastStream::new(self.tx.subscribe()).filter_map(|result| future::ready(result.ok()))
    }

    /// Most recently published label, if any
    pub fn latest(&self) -> Option<NoteLabel> {
        NoteLabel::from_value(self.latest.load(Ordering::Acquire))
    }

    /// Number of labels published so far
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stop ticking and hand the service back
    ///
    /// A tick already in progress finishes, but its label is not published.
    pub fn stop(mut self) -> Result<NoteDecisionService, AudioError> {
        self.shutdown().ok_or(AudioError::NotRunning)?
    }

    fn shutdown(&mut self) -> Option<Result<NoteDecisionService, AudioError>> {
        let handle = self.handle.take()?;
        self.running.store(false, Ordering::Release);
        handle.thread().unpark();

        let result = match handle.join() {
            Ok(Some(service)) => Ok(service),
            Ok(None) => Err(AudioError::StreamFailure {
                reason: "ticker thread never received its service".to_string(),
            }),
            Err(_) => Err(AudioError::StreamFailure {
                reason: "ticker thread panicked".to_string(),
            }),
        };
        tracing::info!("[Ticker] Stopped after {} labels", self.published());
        Some(result)
    }
}

impl Drop for PollingTicker {
    fn drop(&mut self) {
        if let Some(Err(err)) = self.shutdown() {
            tracing::error!("[Ticker] {}", err);
        }
    }
}

struct TickWorker {
    running: Arc<AtomicBool>,
    latest: Arc<AtomicU8>,
    published: Arc<AtomicU64>,
    tx: broadcast::Sender<LabelEvent>,
    period: Duration,
}

impl TickWorker {
    fn run(self, mut service: NoteDecisionService) -> NoteDecisionService {
        let started = Instant::now();
        let mut next = started + self.period;
        let mut tick: u64 = 0;

        while self.running.load(Ordering::Acquire) {
            let now = Instant::now();
            if now < next {
                thread::park_timeout(next - now);
                continue;
            }

            let result = match panic::catch_unwind(AssertUnwindSafe(|| service.tick_decision())) {
                Ok(result) => result,
                Err(_) => {
                    tracing::error!("[Ticker] Tick {} panicked; halting", tick);
                    self.running.store(false, Ordering::Release);
                    break;
                }
            };
            if !self.running.load(Ordering::Acquire) {
                tracing::debug!("[Ticker] Discarding tick {} completed after stop", tick);
                break;
            }

            match result {
                Ok(decision) => {
                    self.latest.store(decision.label.value(), Ordering::Release);
                    self.published.fetch_add(1, Ordering::AcqRel);
                    // No subscribers is fine; `latest` still advances
                    let _ = self.tx.send(LabelEvent {
                        label: decision.label,
                        source: decision.source,
                        tick,
                        timestamp_ms: started.elapsed().as_millis() as u64,
                    });
                }
                Err(err) => {
                    tracing::error!("[Ticker] Tick {} failed, halting: {}", tick, err);
                    self.running.store(false, Ordering::Release);
                    break;
                }
            }
            tick += 1;

            next += self.period;
            let now = Instant::now();
            if next < now {
                tracing::debug!("[Ticker] Overran tick {} by {:?}", tick, now - next);
                next = now + self.period;
            }
        }

        service
    }
}
