//! NoteDecisionService: per-tick capture → classify → label pipeline.
//!
//! One service owns the consumer side of a capture ring, the loaded
//! classifier and the decision policy. Each `tick()` snapshots the most
//! recent window and turns it into exactly one `NoteLabel`. Ticks are
//! serialized by `&mut self`; the producer keeps appending independently.

use serde::Serialize;

use crate::analysis::{
    decide, DecisionPolicy, FramePreprocessor, LabelSmoother, NoteLabel, PitchClassifier,
};
use crate::audio::CaptureRing;
use crate::config::{AppConfig, FallbackPolicy};
use crate::error::{AudioError, ClassifierError, ServiceError};

/// Lifecycle of a decision service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ServiceState {
    /// Not capturing; ticks are rejected
    Idle,
    /// Capturing, waiting for the next tick
    Capturing,
    /// A tick is being evaluated
    Deciding,
}

/// Where a tick's label came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DecisionSource {
    /// Silence gate, classifier not invoked
    Silence,
    /// argmax over the classifier's scores
    Model,
    /// Fallback policy after a transient failure
    Fallback,
}

/// Label produced by one tick plus its provenance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TickDecision {
    pub label: NoteLabel,
    pub source: DecisionSource,
}

/// Running counters for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DecisionStats {
    pub ticks: u64,
    pub silent_ticks: u64,
    pub classified_ticks: u64,
    pub fallback_ticks: u64,
    /// Ticks whose window was partly zero-filled
    pub underfilled_ticks: u64,
    /// Ticks that ended in a propagated error
    pub failed_ticks: u64,
}

pub struct NoteDecisionService {
    ring: CaptureRing,
    preprocessor: FramePreprocessor,
    classifier: PitchClassifier,
    policy: DecisionPolicy,
    fallback: FallbackPolicy,
    smoother: LabelSmoother,
    state: ServiceState,
    window: Vec<f32>,
    last_label: Option<NoteLabel>,
    stats: DecisionStats,
}

impl NoteDecisionService {
    /// Wire a loaded classifier to the consumer side of `ring`
    ///
    /// # Errors
    /// `SnapshotTooLarge` when the ring cannot hold one window.
    pub fn new(
        config: &AppConfig,
        classifier: PitchClassifier,
        ring: CaptureRing,
    ) -> Result<Self, ServiceError> {
        let window_len = config.capture.window_len;
        if ring.capacity() < window_len {
            return Err(AudioError::SnapshotTooLarge {
                requested: window_len,
                capacity: ring.capacity(),
            }
            .into());
        }

        Ok(Self {
            ring,
            preprocessor: FramePreprocessor::new(window_len),
            classifier,
            policy: DecisionPolicy::new(config.decision.silence_threshold),
            fallback: config.decision.fallback,
            smoother: LabelSmoother::new(config.decision.smoothing),
            state: ServiceState::Idle,
            window: vec![0.0; window_len],
            last_label: None,
            stats: DecisionStats::default(),
        })
    }

    pub fn state(&self) -> ServiceState {
        self.state
    }

    pub fn stats(&self) -> DecisionStats {
        self.stats
    }

    pub fn ring(&self) -> &CaptureRing {
        &self.ring
    }

    pub fn classifier(&self) -> &PitchClassifier {
        &self.classifier
    }

    /// Most recent label returned by `tick`
    pub fn last_label(&self) -> Option<NoteLabel> {
        self.last_label
    }

    /// Idle → Capturing
    pub fn start(&mut self) -> Result<(), AudioError> {
        if self.state != ServiceState::Idle {
            return Err(AudioError::AlreadyRunning);
        }
        self.state = ServiceState::Capturing;
        tracing::info!(
            "[NoteDecision] Capturing with model '{}'",
            self.classifier.model_name()
        );
        Ok(())
    }

    /// Back to Idle; captured audio and smoothing history are dropped
    pub fn pause(&mut self) -> Result<(), AudioError> {
        if self.state == ServiceState::Idle {
            return Err(AudioError::NotRunning);
        }
        self.state = ServiceState::Idle;
        self.ring.reset();
        self.smoother.clear();
        self.last_label = None;
        tracing::info!("[NoteDecision] Paused after {} ticks", self.stats.ticks);
        Ok(())
    }

    /// Evaluate one window and return its label
    pub fn tick(&mut self) -> Result<NoteLabel, ServiceError> {
        self.tick_decision().map(|decision| decision.label)
    }

    /// Like [`tick`](Self::tick) but also reports where the label came from
    ///
    /// Inference failures and snapshot contention are absorbed by the
    /// fallback policy. Frame-length and empty-distribution errors are
    /// propagated.
    pub fn tick_decision(&mut self) -> Result<TickDecision, ServiceError> {
        if self.state == ServiceState::Idle {
            return Err(AudioError::NotRunning.into());
        }

        self.state = ServiceState::Deciding;
        let result = self.evaluate();
        self.state = ServiceState::Capturing;

        let decision = match result {
            Ok(decision) => decision,
            Err(err) if Self::is_recoverable(&err) => {
                tracing::warn!("[NoteDecision] Tick {} fell back: {}", self.stats.ticks, err);
                self.stats.fallback_ticks += 1;
                TickDecision {
                    label: self.fallback_label(),
                    source: DecisionSource::Fallback,
                }
            }
            Err(err) => {
                tracing::error!("[NoteDecision] Tick {} failed: {}", self.stats.ticks, err);
                self.stats.ticks += 1;
                self.stats.failed_ticks += 1;
                return Err(err);
            }
        };

        self.stats.ticks += 1;
        match decision.source {
            DecisionSource::Silence => self.stats.silent_ticks += 1,
            DecisionSource::Model => self.stats.classified_ticks += 1,
            DecisionSource::Fallback => {}
        }

        let label = self.smoother.push(decision.label);
        self.last_label = Some(label);
        Ok(TickDecision {
            label,
            source: decision.source,
        })
    }

    fn evaluate(&mut self) -> Result<TickDecision, ServiceError> {
        let info = self.ring.snapshot(&mut self.window)?;
        if !info.is_complete(self.window.len()) {
            self.stats.underfilled_ticks += 1;
            tracing::trace!(
                "[NoteDecision] Window underfilled: {}/{} samples",
                info.filled,
                self.window.len()
            );
        }

        if self.policy.is_silent(&self.window) {
            return Ok(TickDecision {
                label: NoteLabel::REST,
                source: DecisionSource::Silence,
            });
        }

        let frame = self.preprocessor.prepare(&self.window)?;
        let scores = self.classifier.classify(&frame)?;
        let label = decide(false, &scores)?;

        Ok(TickDecision {
            label,
            source: DecisionSource::Model,
        })
    }

    fn is_recoverable(err: &ServiceError) -> bool {
        matches!(
            err,
            ServiceError::Classifier(ClassifierError::InferenceError { .. })
                | ServiceError::Audio(AudioError::SnapshotContended { .. })
        )
    }

    fn fallback_label(&self) -> NoteLabel {
        match self.fallback {
            FallbackPolicy::Rest => NoteLabel::REST,
            FallbackPolicy::HoldPrevious => self.last_label.unwrap_or(NoteLabel::REST),
        }
    }
}
