//! Integration tests for the note decision pipeline
//!
//! These tests drive the public API end to end:
//! - Per-tick decisions through the capture ring and classifier seam
//! - Session lifecycle with a replay backend and the polling ticker
//! - Error propagation for rejected configurations and models

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use pitch_lane::analysis::{NoteLabel, PitchClassifier, ScoringModel, Tensor, FRAME_LEN};
use pitch_lane::audio::CaptureRing;
use pitch_lane::config::{AppConfig, ModelConfig};
use pitch_lane::engine::{DecisionSource, NoteDecisionService, NoteSession, ReplayBackend};
use pitch_lane::error::{AudioError, ClassifierError, ServiceError};
use pitch_lane::fixtures::{lane_base_hz, synthesize, ToneSpec};

/// Model that records every frame it scores
struct RecordingModel {
    scores: Vec<f32>,
    frames: Frames,
}

impl ScoringModel for RecordingModel {
    fn score(&self, frame: &Tensor) -> Result<Vec<f32>, ClassifierError> {
        self.frames.lock().unwrap().push(frame.as_slice().to_vec());
        Ok(self.scores.clone())
    }

    fn label_count(&self) -> usize {
        self.scores.len()
    }

    fn name(&self) -> &str {
        "recording"
    }
}

type Frames = Arc<Mutex<Vec<Vec<f32>>>>;

/// Model whose scoring always panics
struct CrashingModel;

impl ScoringModel for CrashingModel {
    fn score(&self, _frame: &Tensor) -> Result<Vec<f32>, ClassifierError> {
        panic!("inference runtime crashed");
    }

    fn label_count(&self) -> usize {
        13
    }

    fn name(&self) -> &str {
        "crashing"
    }
}

fn service_with_scores(scores: Vec<f32>) -> (NoteDecisionService, CaptureRing, Frames) {
    let config = AppConfig::default();
    let frames = Arc::new(Mutex::new(Vec::new()));
    let model = RecordingModel {
        scores,
        frames: Arc::clone(&frames),
    };
    let classifier = PitchClassifier::new(Box::new(model)).unwrap();
    let ring = CaptureRing::new(config.capture.ring_capacity);
    let mut service = NoteDecisionService::new(&config, classifier, ring.clone()).unwrap();
    service.start().unwrap();
    (service, ring, frames)
}

#[test]
fn scenario_a_silence_is_rest() {
    let (mut service, ring, frames) = service_with_scores(vec![0.0, 9.0, 0.0]);
    ring.writer().unwrap().append(&vec![0.0; FRAME_LEN]);

    assert_eq!(service.tick().unwrap().value(), 13);
    assert!(frames.lock().unwrap().is_empty());
}

#[test]
fn scenario_b_single_loud_sample_reaches_classifier() {
    let (mut service, ring, frames) = service_with_scores(vec![0.0, 9.0, 0.0]);
    let mut window = vec![0.0; FRAME_LEN];
    window[0] = 0.5;
    ring.writer().unwrap().append(&window);

    let decision = service.tick_decision().unwrap();
    assert_eq!(decision.source, DecisionSource::Model);
    assert_eq!(decision.label.value(), 1);

    let frames = frames.lock().unwrap();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0], window);
}

#[test]
fn scenario_c_ascending_logits() {
    let scores = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0, 0.0];
    let (mut service, ring, _frames) = service_with_scores(scores);
    ring.writer().unwrap().append(&vec![0.3; FRAME_LEN]);

    assert_eq!(service.tick().unwrap().value(), 11);
}

#[test]
fn scenario_d_tie_resolves_to_lowest_index() {
    let mut scores = vec![0.0; 13];
    scores[2] = 3.5;
    scores[5] = 3.5;
    let (mut service, ring, _frames) = service_with_scores(scores);
    ring.writer().unwrap().append(&vec![-0.4; FRAME_LEN]);

    assert_eq!(service.tick().unwrap().value(), 2);
}

#[test]
fn window_is_most_recent_samples() {
    let (mut service, ring, frames) = service_with_scores(vec![1.0, 0.0]);
    let mut writer = ring.writer().unwrap();
    let older: Vec<f32> = vec![0.9; FRAME_LEN];
    let newer: Vec<f32> = (0..FRAME_LEN).map(|i| 0.2 + i as f32 * 1e-5).collect();
    writer.append(&older);
    writer.append(&newer);

    service.tick().unwrap();
    assert_eq!(frames.lock().unwrap()[0], newer);
}

#[test]
fn session_rejects_invalid_config() {
    let mut config = AppConfig::default();
    config.decision.tick_hz = 0.0;
    let backend = ReplayBackend::new(Vec::new(), 44_100, 441);

    match NoteSession::new(config, Box::new(backend)) {
        Err(ServiceError::ConfigInvalid { reason }) => assert!(reason.contains("tick_hz")),
        Err(other) => panic!("expected ConfigInvalid, got {other:?}"),
        Ok(_) => panic!("expected ConfigInvalid, got a session"),
    }
}

#[test]
fn session_aborts_when_model_is_missing() {
    let mut config = AppConfig::default();
    config.model = ModelConfig::Dense {
        path: "/nonexistent/model.json".into(),
    };
    let backend = ReplayBackend::new(Vec::new(), 44_100, 441);

    assert!(matches!(
        NoteSession::new(config, Box::new(backend)),
        Err(ServiceError::Classifier(ClassifierError::ModelUnavailable { .. }))
    ));
}

#[test]
fn session_lifecycle_errors() {
    let backend = ReplayBackend::new(vec![0.0; 44_100], 44_100, 441);
    let mut session = NoteSession::new(AppConfig::default(), Box::new(backend)).unwrap();

    assert!(matches!(
        session.pause(),
        Err(ServiceError::Audio(AudioError::NotRunning))
    ));
    session.start().unwrap();
    assert!(session.is_running());
    assert!(matches!(
        session.start(),
        Err(ServiceError::Audio(AudioError::AlreadyRunning))
    ));
    session.pause().unwrap();
    assert!(!session.is_running());
    assert!(session.stats().is_some());
}

#[test]
fn session_replays_tone_into_labels() {
    let config = AppConfig::default();
    let label = NoteLabel::pitch(5).unwrap();
    let samples = synthesize(
        &[ToneSpec::note(label, 3000)],
        lane_base_hz(&config),
        config.capture.sample_rate,
        9,
    );
    let backend = ReplayBackend::new(samples, config.capture.sample_rate, 441);
    let mut session = NoteSession::new(config, Box::new(backend)).unwrap();

    session.start().unwrap();
    let mut rx = session.subscribe().unwrap();
    let events: Vec<_> = (0..12).map(|_| rx.blocking_recv().unwrap()).collect();
    assert!(session.latest().is_some());
    session.pause().unwrap();

    let classified: Vec<_> = events
        .iter()
        .filter(|e| e.source == DecisionSource::Model)
        .collect();
    assert!(classified.len() >= 8, "too few classified ticks: {events:?}");
    let hits = classified.iter().filter(|e| e.label == label).count();
    assert!(
        hits * 10 >= classified.len() * 8,
        "expected label 5 to dominate, got {events:?}"
    );

    let stats = session.stats().unwrap();
    assert!(stats.ticks >= 12);
    assert_eq!(session.latest(), None);
}

#[test]
fn session_restart_after_pause() {
    let backend = ReplayBackend::new(vec![0.0; 4410], 44_100, 441).unpaced();
    let mut session = NoteSession::new(AppConfig::default(), Box::new(backend)).unwrap();

    session.start().unwrap();
    session.pause().unwrap();
    session.start().unwrap();

    let mut rx = session.subscribe().unwrap();
    let event = rx.blocking_recv().unwrap();
    assert_eq!(event.label, NoteLabel::REST);
    std::thread::sleep(Duration::from_millis(10));
    session.pause().unwrap();
}

#[test]
fn session_recovers_after_model_panic() {
    let config = AppConfig::default();
    let classifier = PitchClassifier::new(Box::new(CrashingModel)).unwrap();
    let backend = ReplayBackend::new(vec![0.5; 44_100], 44_100, 441);
    let mut session = NoteSession::with_classifier(config, classifier, Box::new(backend)).unwrap();

    session.start().unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    while session.is_ticking() {
        assert!(Instant::now() < deadline, "ticking never halted");
        std::thread::sleep(Duration::from_millis(5));
    }

    session.pause().unwrap();
    assert!(!session.is_running());
    assert_eq!(session.stats().unwrap().ticks, 0);

    session.start().unwrap();
    session.pause().unwrap();
}

#[test]
fn session_rejects_device_rate_mismatch() {
    let backend = ReplayBackend::new(vec![0.5; 4800], 48_000, 480);
    let mut session = NoteSession::new(AppConfig::default(), Box::new(backend)).unwrap();

    for _ in 0..2 {
        match session.start() {
            Err(ServiceError::Audio(AudioError::StreamOpenFailed { reason })) => {
                assert!(reason.contains("48000"), "reason: {reason}");
            }
            Err(other) => panic!("expected StreamOpenFailed, got {other:?}"),
            Ok(()) => panic!("expected StreamOpenFailed, session started"),
        }
        assert!(!session.is_running());
        assert!(session.stats().is_some());
    }
}
