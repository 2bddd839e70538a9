//! Fixture utilities for the deterministic CLI harness.
//!
//! This module discovers fixture assets, loads mono WAV input, parses
//! optional expectation JSON and replays the audio through the same
//! capture ring and decision service the live session uses, one tick per
//! `sample_rate / tick_hz` samples. It also synthesizes test tones so the
//! harness runs without recorded assets.

use std::f32::consts::PI;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::analysis::{NoteLabel, PitchClassifier};
use crate::audio::CaptureRing;
use crate::config::{AppConfig, ModelConfig, DEFAULT_BASE_HZ};
use crate::engine::{DecisionSource, NoteDecisionService};

/// Default location for fixture WAV/JSON assets.
pub const DEFAULT_FIXTURE_ROOT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures");

/// Metadata describing an available fixture.
#[derive(Clone, Debug)]
pub struct FixtureMetadata {
    pub name: String,
    pub wav_path: PathBuf,
    pub expect_path: Option<PathBuf>,
}

/// Loaded fixture data with decoded PCM samples.
pub struct FixtureData {
    pub metadata: FixtureMetadata,
    pub sample_rate: u32,
    pub samples: Vec<f32>,
    pub expectations: Option<FixtureExpectations>,
}

/// One offline tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TickEvent {
    pub tick: u64,
    /// Audio time at which the tick fired
    pub timestamp_ms: u64,
    pub label: NoteLabel,
    pub source: DecisionSource,
}

/// JSON expectation schema for fixture verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureExpectations {
    pub fixture: String,
    #[serde(default)]
    pub notes: Option<String>,
    pub segments: Vec<ExpectedSegment>,
}

/// Time span that should mostly carry one label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectedSegment {
    pub start_ms: u64,
    pub end_ms: u64,
    pub label: NoteLabel,
    /// Share of ticks inside the span that must match
    #[serde(default = "default_min_ratio")]
    pub min_ratio: f32,
}

fn default_min_ratio() -> f32 {
    0.8
}

impl FixtureExpectations {
    pub fn verify(&self, actual: &[TickEvent]) -> std::result::Result<(), ExpectationDiff> {
        let failures: Vec<ExpectationFailure> = self
            .segments
            .iter()
            .enumerate()
            .filter_map(|(index, segment)| {
                let inside: Vec<&TickEvent> = actual
                    .iter()
                    .filter(|e| e.timestamp_ms >= segment.start_ms && e.timestamp_ms < segment.end_ms)
                    .collect();
                let matched = inside.iter().filter(|e| e.label == segment.label).count();
                let ratio = if inside.is_empty() {
                    0.0
                } else {
                    matched as f32 / inside.len() as f32
                };

                (ratio < segment.min_ratio).then(|| ExpectationFailure {
                    index,
                    expected: segment.clone(),
                    ticks: inside.len(),
                    matched,
                    ratio,
                    dominant: dominant_label(inside.iter().copied()),
                })
            })
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ExpectationDiff { failures })
        }
    }
}

/// Outcome of comparing actual results with expectations.
#[derive(Debug)]
pub struct ExpectationDiff {
    pub failures: Vec<ExpectationFailure>,
}

impl ExpectationDiff {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "failures": self.failures.iter().map(|failure| {
                serde_json::json!({
                    "index": failure.index,
                    "expected": {
                        "start_ms": failure.expected.start_ms,
                        "end_ms": failure.expected.end_ms,
                        "label": failure.expected.label,
                        "min_ratio": failure.expected.min_ratio,
                    },
                    "ticks": failure.ticks,
                    "matched": failure.matched,
                    "ratio": failure.ratio,
                    "dominant": failure.dominant,
                })
            }).collect::<Vec<_>>()
        })
    }
}

/// Detailed diff entry for a single segment.
#[derive(Debug)]
pub struct ExpectationFailure {
    pub index: usize,
    pub expected: ExpectedSegment,
    /// Ticks that fell inside the segment
    pub ticks: usize,
    pub matched: usize,
    pub ratio: f32,
    /// Most frequent label actually seen in the segment
    pub dominant: Option<NoteLabel>,
}

/// Most frequent label; ties go to the lower label value
pub fn dominant_label<'a, I>(events: I) -> Option<NoteLabel>
where
    I: IntoIterator<Item = &'a TickEvent>,
{
    let mut counts = [0usize; NoteLabel::MAX_PITCH_LABELS + 1];
    let mut any = false;
    for event in events {
        counts[event.label.value() as usize] += 1;
        any = true;
    }
    if !any {
        return None;
    }

    let mut best = 0;
    for (value, &count) in counts.iter().enumerate() {
        if count > counts[best] {
            best = value;
        }
    }
    NoteLabel::from_value(best as u8)
}

/// Catalog responsible for discovering fixtures on disk.
pub struct FixtureCatalog {
    root: PathBuf,
}

impl FixtureCatalog {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// List all fixtures by their metadata.
    pub fn discover(&self) -> Result<Vec<FixtureMetadata>> {
        let mut fixtures = Vec::new();
        if !self.root.exists() {
            return Ok(fixtures);
        }

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                let path = entry.path();
                if path.extension().and_then(|ext| ext.to_str()) == Some("wav") {
                    fixtures.push(self.metadata_for_path(&path)?);
                }
            }
        }

        fixtures.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(fixtures)
    }

    /// Load fixture samples + expectations for provided name or path.
    pub fn load(&self, fixture: &str, override_expect: Option<PathBuf>) -> Result<FixtureData> {
        let wav_path = self.resolve_fixture_path(fixture)?;
        let metadata = self.metadata_for_path(&wav_path)?;
        let (samples, sample_rate) = read_wav(&wav_path)?;

        let expectation_path = override_expect.or(metadata.expect_path.clone());
        let expectations = match expectation_path {
            Some(path) => {
                let json = fs::read_to_string(&path)
                    .with_context(|| format!("reading expectation {}", path.display()))?;
                Some(
                    serde_json::from_str(&json)
                        .with_context(|| format!("parsing {}", path.display()))?,
                )
            }
            None => None,
        };

        Ok(FixtureData {
            metadata,
            sample_rate,
            samples,
            expectations,
        })
    }

    fn resolve_fixture_path(&self, fixture: &str) -> Result<PathBuf> {
        let as_path = Path::new(fixture);
        if as_path.exists() {
            return Ok(as_path.to_path_buf());
        }

        let candidate = self.root.join(format!("{fixture}.wav"));
        if candidate.exists() {
            Ok(candidate)
        } else {
            Err(anyhow!(
                "Fixture '{fixture}' not found in {}",
                self.root.display()
            ))
        }
    }

    fn metadata_for_path(&self, wav_path: &Path) -> Result<FixtureMetadata> {
        let name = wav_path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| anyhow!("Invalid fixture name for {}", wav_path.display()))?
            .to_string();
        let expect_path = wav_path.with_extension("expect.json");
        Ok(FixtureMetadata {
            name,
            wav_path: wav_path.to_path_buf(),
            expect_path: expect_path.exists().then_some(expect_path),
        })
    }
}

impl Default for FixtureCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_FIXTURE_ROOT)
    }
}

/// Replays decoded PCM through the capture ring and decision service.
pub struct FixtureProcessor {
    config: AppConfig,
}

impl FixtureProcessor {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// Run every tick the fixture's duration allows
    ///
    /// The configured sample rate is replaced by the fixture's own rate so
    /// frequency-based models are planned for the audio they will see.
    pub fn run(&self, data: &FixtureData) -> Result<Vec<TickEvent>> {
        let mut config = self.config.clone();
        config.capture.sample_rate = data.sample_rate;
        config
            .validate()
            .map_err(|reason| anyhow!("invalid configuration: {reason}"))?;

        let classifier = PitchClassifier::from_config(&config)
            .with_context(|| format!("loading model for {}", data.metadata.name))?;
        self.run_with(&config, classifier, data)
    }

    /// Run with an already loaded classifier
    pub fn run_with(
        &self,
        config: &AppConfig,
        classifier: PitchClassifier,
        data: &FixtureData,
    ) -> Result<Vec<TickEvent>> {
        if data.samples.is_empty() {
            return Ok(Vec::new());
        }

        let ring = CaptureRing::new(config.capture.ring_capacity);
        let mut writer = ring
            .writer()
            .ok_or_else(|| anyhow!("capture ring already has a writer"))?;
        let mut service = NoteDecisionService::new(config, classifier, ring)?;
        service.start()?;

        let per_tick = config.samples_per_tick();
        let mut events = Vec::with_capacity(data.samples.len() / per_tick + 1);

        for (tick, chunk) in data.samples.chunks(per_tick).enumerate() {
            writer.append(chunk);
            let decision = service
                .tick_decision()
                .with_context(|| format!("tick {} of {}", tick, data.metadata.name))?;
            let timestamp_ms = writer.cursor() * 1000 / data.sample_rate.max(1) as u64;

            events.push(TickEvent {
                tick: tick as u64,
                timestamp_ms,
                label: decision.label,
                source: decision.source,
            });
        }

        let stats = service.stats();
        log::info!(
            "[Fixture] {}: {} ticks ({} silent, {} classified, {} fallback)",
            data.metadata.name,
            stats.ticks,
            stats.silent_ticks,
            stats.classified_ticks,
            stats.fallback_ticks
        );
        Ok(events)
    }
}

/// Parameters for a synthetic test tone.
#[derive(Debug, Clone)]
pub struct ToneSpec {
    /// `None` renders silence (plus noise)
    pub label: Option<NoteLabel>,
    pub duration_ms: u32,
    pub amplitude: f32,
    /// Peak amplitude of uniform noise mixed in
    pub noise: f32,
}

impl ToneSpec {
    pub fn note(label: NoteLabel, duration_ms: u32) -> Self {
        Self {
            label: Some(label),
            duration_ms,
            amplitude: 0.5,
            noise: 0.01,
        }
    }

    pub fn rest(duration_ms: u32) -> Self {
        Self {
            label: None,
            duration_ms,
            amplitude: 0.0,
            noise: 0.01,
        }
    }
}

/// Frequency of `label` on a lane layout starting at `base_hz`
pub fn label_frequency(label: NoteLabel, base_hz: f32) -> Option<f32> {
    label
        .pitch_index()
        .map(|k| base_hz * 2f32.powf(k as f32 / 12.0))
}

/// Base frequency of the chroma lanes, or the default tuning for other models
pub fn lane_base_hz(config: &AppConfig) -> f32 {
    match config.model {
        ModelConfig::Chroma { base_hz, .. } => base_hz,
        ModelConfig::Dense { .. } => DEFAULT_BASE_HZ,
    }
}

/// Render a sequence of tones and rests; deterministic for a given seed
pub fn synthesize(parts: &[ToneSpec], base_hz: f32, sample_rate: u32, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut samples = Vec::new();
    let mut phase = 0.0_f32;

    for part in parts {
        let count = (sample_rate as u64 * part.duration_ms as u64 / 1000) as usize;
        let step = part
            .label
            .and_then(|label| label_frequency(label, base_hz))
            .map(|freq| 2.0 * PI * freq / sample_rate as f32)
            .unwrap_or(0.0);

        samples.extend((0..count).map(|_| {
            let tone = part.amplitude * phase.sin();
            phase = (phase + step) % (2.0 * PI);
            let noise = if part.noise > 0.0 {
                rng.gen_range(-part.noise..=part.noise)
            } else {
                0.0
            };
            tone + noise
        }));
    }

    samples
}

/// Write mono 16-bit PCM
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer =
        hound::WavWriter::create(path, spec).with_context(|| format!("creating {}", path.display()))?;
    for &sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
        writer.write_sample(value)?;
    }
    writer
        .finalize()
        .with_context(|| format!("finalizing {}", path.display()))?;
    Ok(())
}

/// Decode a mono WAV file into f32 samples in [-1, 1]
pub fn read_wav(path: &Path) -> Result<(Vec<f32>, u32)> {
    let mut reader =
        hound::WavReader::open(path).with_context(|| format!("opening {}", path.display()))?;
    let spec = reader.spec();
    if spec.channels != 1 {
        return Err(anyhow!(
            "Fixture {} must be mono (found {} channels)",
            path.display(),
            spec.channels
        ));
    }

    let sample_rate = spec.sample_rate;

    let samples = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|sample| sample.map_err(|err| anyhow!(err)))
            .collect::<Result<Vec<f32>>>()?,
        hound::SampleFormat::Int => {
            let max = ((1i64 << (spec.bits_per_sample - 1)) - 1) as f32;
            match spec.bits_per_sample {
                16 => reader
                    .samples::<i16>()
                    .map(|sample| sample.map(|v| v as f32 / max).map_err(|err| anyhow!(err)))
                    .collect::<Result<Vec<f32>>>()?,
                24 | 32 => reader
                    .samples::<i32>()
                    .map(|sample| sample.map(|v| v as f32 / max).map_err(|err| anyhow!(err)))
                    .collect::<Result<Vec<f32>>>()?,
                other => {
                    return Err(anyhow!(
                        "Unsupported bits per sample {} in {}",
                        other,
                        path.display()
                    ))
                }
            }
        }
    };

    Ok((samples, sample_rate))
}

impl FixtureData {
    /// Wrap in-memory samples, e.g. from [`synthesize`]
    pub fn from_samples(name: &str, samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            metadata: FixtureMetadata {
                name: name.to_string(),
                wav_path: PathBuf::new(),
                expect_path: None,
            },
            sample_rate,
            samples,
            expectations: None,
        }
    }
}
