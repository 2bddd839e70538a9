//! NoteSession: composition root for one live note-highway session.
//!
//! Wires a capture backend, the capture ring, the decision service and the
//! polling ticker together. The session is the only place that knows about
//! all four; each piece stays testable on its own.

use futures::Stream;
use tokio::sync::broadcast;

use super::backend::CaptureBackend;
use super::core::{DecisionStats, NoteDecisionService};
use super::ticker::{LabelEvent, PollingTicker};
use crate::analysis::{NoteLabel, PitchClassifier};
use crate::audio::CaptureRing;
use crate::config::AppConfig;
use crate::error::{AudioError, ServiceError};

pub struct NoteSession {
    config: AppConfig,
    backend: Box<dyn CaptureBackend>,
    ring: CaptureRing,
    /// Held here while paused, owned by the ticker while running
    service: Option<NoteDecisionService>,
    ticker: Option<PollingTicker>,
}

impl NoteSession {
    /// Validate `config`, load its model and build an idle session
    ///
    /// # Errors
    /// `ConfigInvalid` for a rejected configuration and `ModelUnavailable`
    /// when the model cannot be loaded; the session never starts either way.
    pub fn new(config: AppConfig, backend: Box<dyn CaptureBackend>) -> Result<Self, ServiceError> {
        config
            .validate()
            .map_err(|reason| ServiceError::ConfigInvalid { reason })?;
        let classifier = PitchClassifier::from_config(&config)?;
        Self::with_classifier(config, classifier, backend)
    }

    /// Build a session around an already loaded classifier
    pub fn with_classifier(
        config: AppConfig,
        classifier: PitchClassifier,
        backend: Box<dyn CaptureBackend>,
    ) -> Result<Self, ServiceError> {
        config
            .validate()
            .map_err(|reason| ServiceError::ConfigInvalid { reason })?;

        // Live backends only know their real rate once started; `start`
        // enforces the match
        if backend.sample_rate() != config.capture.sample_rate {
            tracing::warn!(
                "[NoteSession] Backend rate {} Hz differs from configured {} Hz",
                backend.sample_rate(),
                config.capture.sample_rate
            );
        }

        let ring = CaptureRing::new(config.capture.ring_capacity);
        let service = NoteDecisionService::new(&config, classifier, ring.clone())?;

        Ok(Self {
            config,
            backend,
            ring,
            service: Some(service),
            ticker: None,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.ticker.is_some()
    }

    /// Start capture and periodic decisions
    ///
    /// # Errors
    /// `StreamOpenFailed` when the backend opened at a different sample
    /// rate than the model was built for; nothing keeps running then.
    pub fn start(&mut self) -> Result<(), ServiceError> {
        if self.ticker.is_some() {
            return Err(AudioError::AlreadyRunning.into());
        }
        let mut service = self.service.take().ok_or_else(|| AudioError::StreamFailure {
            reason: "decision service was lost; rebuild the session".to_string(),
        })?;

        if let Err(err) = self.backend.start(&self.ring) {
            self.service = Some(service);
            return Err(err.into());
        }

        let actual_rate = self.backend.sample_rate();
        if actual_rate != self.config.capture.sample_rate {
            let _ = self.backend.stop();
            self.service = Some(service);
            return Err(AudioError::StreamOpenFailed {
                reason: format!(
                    "device opened at {} Hz but the model expects {} Hz; set capture.sample_rate to {}",
                    actual_rate, self.config.capture.sample_rate, actual_rate
                ),
            }
            .into());
        }

        if let Err(err) = service.start() {
            let _ = self.backend.stop();
            self.service = Some(service);
            return Err(err.into());
        }

        match PollingTicker::try_spawn(service, self.config.decision.tick_hz) {
            Ok(ticker) => {
                self.ticker = Some(ticker);
                Ok(())
            }
            Err((err, mut service)) => {
                let _ = service.pause();
                let _ = self.backend.stop();
                self.service = Some(service);
                Err(err.into())
            }
        }
    }

    /// Stop future ticks, release the device and drop captured audio
    ///
    /// The backend is stopped even when the ticker reports a failure.
    pub fn pause(&mut self) -> Result<(), ServiceError> {
        let ticker = self.ticker.take().ok_or(AudioError::NotRunning)?;
        let ticker_result = ticker.stop();
        let backend_result = self.backend.stop();

        let mut service = ticker_result?;
        let paused = service.pause();
        self.service = Some(service);
        paused?;
        backend_result?;
        Ok(())
    }

    /// False once ticking halted after a failed tick, until `pause`
    pub fn is_ticking(&self) -> bool {
        self.ticker.as_ref().is_some_and(PollingTicker::is_running)
    }

    /// Receiver for labels of the running session
    pub fn subscribe(&self) -> Option<broadcast::Receiver<LabelEvent>> {
        self.ticker.as_ref().map(PollingTicker::subscribe)
    }

    pub fn label_stream(&self) -> Option<impl Stream<Item = LabelEvent> + Send + 'static> {
        self.ticker.as_ref().map(PollingTicker::label_stream)
    }

    /// Most recent label, `None` while paused or before the first tick
    pub fn latest(&self) -> Option<NoteLabel> {
        self.ticker.as_ref().and_then(PollingTicker::latest)
    }

    /// Counters of the paused service; `None` while running
    pub fn stats(&self) -> Option<DecisionStats> {
        self.service.as_ref().map(NoteDecisionService::stats)
    }
}

impl Drop for NoteSession {
    fn drop(&mut self) {
        if self.ticker.is_some() {
            if let Err(err) = self.pause() {
                tracing::warn!("[NoteSession] Shutdown: {}", err);
            }
        }
    }
}
