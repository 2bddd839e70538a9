use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use pitch_lane::analysis::NoteLabel;
use pitch_lane::config::AppConfig;
use pitch_lane::fixtures::{
    dominant_label, lane_base_hz, synthesize, write_wav, ExpectationDiff, FixtureCatalog,
    FixtureProcessor, TickEvent, ToneSpec,
};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(
    name = "note_cli",
    about = "Offline and live harness for the note decision pipeline"
)]
struct Cli {
    /// Override directory containing fixture assets (defaults to ./fixtures)
    #[arg(long)]
    fixtures_dir: Option<PathBuf>,
    /// JSON configuration file (defaults are used when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a WAV file through the pipeline and optionally compare against expectations
    Classify {
        /// Fixture name or path to a mono WAV file
        #[arg(long)]
        wav: String,
        #[arg(long)]
        expect: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print labels from the default input device
    Listen {
        #[arg(long, default_value_t = 10)]
        seconds: u64,
    },
    /// Write a synthetic tone for a label, followed by optional silence
    Synth {
        #[arg(long)]
        out: PathBuf,
        /// Label 0..=12, or 13 for silence
        #[arg(long)]
        label: u8,
        #[arg(long, default_value_t = 2000)]
        duration_ms: u32,
        #[arg(long, default_value_t = 0)]
        rest_ms: u32,
        #[arg(long, default_value_t = 0.5)]
        amplitude: f32,
        #[arg(long, default_value_t = 1)]
        seed: u64,
    },
    /// Print the effective configuration as JSON
    DumpConfig,
    /// List available fixtures on disk
    DumpFixtures,
}

fn main() -> ExitCode {
    pitch_lane::init_logging();
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let catalog = cli
        .fixtures_dir
        .map(FixtureCatalog::new)
        .unwrap_or_default();

    match cli.command {
        Commands::Classify {
            wav,
            expect,
            output,
        } => run_classify(&catalog, config, &wav, expect, output),
        Commands::Listen { seconds } => run_listen(config, seconds),
        Commands::Synth {
            out,
            label,
            duration_ms,
            rest_ms,
            amplitude,
            seed,
        } => run_synth(&config, &out, label, duration_ms, rest_ms, amplitude, seed),
        Commands::DumpConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(ExitCode::from(0))
        }
        Commands::DumpFixtures => run_dump(&catalog),
    }
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::load_from_file(path),
        None => AppConfig::default(),
    };
    config
        .validate()
        .map_err(|reason| anyhow!("invalid configuration: {reason}"))?;
    Ok(config)
}

fn run_classify(
    catalog: &FixtureCatalog,
    config: AppConfig,
    wav: &str,
    override_expect: Option<PathBuf>,
    output_path: Option<PathBuf>,
) -> Result<ExitCode> {
    let data = catalog.load(wav, override_expect)?;
    let actual = FixtureProcessor::new(config)
        .run(&data)
        .with_context(|| format!("processing {}", wav))?;

    emit_report(&data.metadata.name, data.sample_rate, &actual, output_path)?;

    if let Some(expectations) = data.expectations {
        match expectations.verify(&actual) {
            Ok(()) => Ok(ExitCode::from(0)),
            Err(diff) => {
                emit_diff(&diff)?;
                Ok(ExitCode::from(2))
            }
        }
    } else {
        Ok(ExitCode::from(0))
    }
}

#[cfg(feature = "live_audio")]
fn run_listen(config: AppConfig, seconds: u64) -> Result<ExitCode> {
    use std::time::{Duration, Instant};

    use futures::StreamExt;
    use pitch_lane::engine::{CpalBackend, NoteSession};

    let backend = CpalBackend::new(config.capture.sample_rate);
    let mut session = NoteSession::new(config, Box::new(backend))?;
    session.start()?;
    let stream = session
        .label_stream()
        .ok_or_else(|| anyhow!("session did not start"))?;

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("creating runtime")?;

    let deadline = Instant::now() + Duration::from_secs(seconds);
    rt.block_on(async move {
        let mut stream = Box::pin(stream);
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match tokio::time::timeout(remaining, stream.next()).await {
                Ok(Some(event)) => match serde_json::to_string(&event) {
                    Ok(line) => println!("{line}"),
                    Err(err) => eprintln!("Error: {err}"),
                },
                Ok(None) | Err(_) => break,
            }
        }
    });

    session.pause()?;
    if let Some(stats) = session.stats() {
        eprintln!("{}", serde_json::to_string(&stats)?);
    }
    Ok(ExitCode::from(0))
}

#[cfg(not(feature = "live_audio"))]
fn run_listen(_config: AppConfig, _seconds: u64) -> Result<ExitCode> {
    Err(anyhow!(
        "live capture is unavailable; rebuild with the `live_audio` feature"
    ))
}

fn run_synth(
    config: &AppConfig,
    out: &Path,
    label: u8,
    duration_ms: u32,
    rest_ms: u32,
    amplitude: f32,
    seed: u64,
) -> Result<ExitCode> {
    let label = NoteLabel::from_value(label)
        .ok_or_else(|| anyhow!("label must be within 0..=13 (got {label})"))?;

    let mut tone = if label.is_rest() {
        ToneSpec::rest(duration_ms)
    } else {
        ToneSpec::note(label, duration_ms)
    };
    if !label.is_rest() {
        tone.amplitude = amplitude;
    }

    let mut parts = vec![tone];
    if rest_ms > 0 {
        parts.push(ToneSpec::rest(rest_ms));
    }

    let sample_rate = config.capture.sample_rate;
    let samples = synthesize(&parts, lane_base_hz(config), sample_rate, seed);
    write_wav(out, &samples, sample_rate)?;
    eprintln!(
        "Wrote {} samples ({}) to {}",
        samples.len(),
        label,
        out.display()
    );
    Ok(ExitCode::from(0))
}

fn run_dump(catalog: &FixtureCatalog) -> Result<ExitCode> {
    let fixtures = catalog.discover()?;
    if fixtures.is_empty() {
        println!("No fixtures found under {}", catalog.root().display());
        return Ok(ExitCode::from(0));
    }

    for metadata in fixtures {
        if let Some(expect) = metadata.expect_path {
            println!("{} -> {}", metadata.name, expect.display());
        } else {
            println!("{}", metadata.name);
        }
    }
    Ok(ExitCode::from(0))
}

fn emit_report(
    fixture: &str,
    sample_rate: u32,
    events: &[TickEvent],
    output_path: Option<PathBuf>,
) -> Result<()> {
    let report = FixtureReportPayload {
        fixture,
        sample_rate,
        tick_count: events.len(),
        dominant_label: dominant_label(events),
        events,
    };
    let json = serde_json::to_string_pretty(&report)?;

    if let Some(path) = output_path {
        fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    } else {
        println!("{json}");
    }

    Ok(())
}

fn emit_diff(diff: &ExpectationDiff) -> Result<()> {
    let json = serde_json::to_string_pretty(&diff.to_json())?;
    eprintln!("{json}");
    Ok(())
}

#[derive(Serialize)]
struct FixtureReportPayload<'a> {
    fixture: &'a str,
    sample_rate: u32,
    tick_count: usize,
    dominant_label: Option<NoteLabel>,
    #[serde(skip_serializing_if = "slice_empty")]
    events: &'a [TickEvent],
}

fn slice_empty(events: &&[TickEvent]) -> bool {
    events.is_empty()
}
