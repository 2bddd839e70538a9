use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde_json::Value;

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_note_cli"))
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("note_cli_{}_{}", name, std::process::id()));
    fs::create_dir_all(&dir).expect("create scratch dir");
    dir
}

fn synth(out: &Path, label: u8) {
    let output = cli()
        .args(["synth", "--out"])
        .arg(out)
        .arg("--label")
        .arg(label.to_string())
        .output()
        .expect("failed to run note_cli synth");
    assert!(
        output.status.success(),
        "synth exited with {:?}: {}",
        output.status.code(),
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn classify_synthetic_tone_finds_its_label() {
    let dir = scratch_dir("tone");
    let wav = dir.join("note5.wav");
    synth(&wav, 5);

    let output = cli()
        .args(["classify", "--wav"])
        .arg(&wav)
        .output()
        .expect("failed to run note_cli classify");
    assert!(
        output.status.success(),
        "CLI exited with {:?}",
        output.status.code()
    );

    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    let json: Value = serde_json::from_str(stdout.trim()).expect("classification report JSON");
    assert_eq!(json["fixture"], "note5");
    assert_eq!(json["sample_rate"], 44_100);
    assert_eq!(json["tick_count"], 40);
    assert_eq!(json["dominant_label"], 5);

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn classify_detects_expectation_mismatch() {
    let dir = scratch_dir("mismatch");
    let wav = dir.join("note5.wav");
    synth(&wav, 5);

    let expect = dir.join("wrong.expect.json");
    fs::write(
        &expect,
        r#"{"fixture":"note5","segments":[{"start_ms":0,"end_ms":2000,"label":9}]}"#,
    )
    .unwrap();

    let output = cli()
        .args(["classify", "--wav"])
        .arg(&wav)
        .arg("--expect")
        .arg(&expect)
        .output()
        .expect("failed to run mismatch classify");
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8(output.stderr).expect("stderr UTF-8");
    assert!(
        stderr.contains("\"failures\""),
        "expected diff JSON in stderr, got {stderr}"
    );

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn classify_matching_expectation_writes_report() {
    let dir = scratch_dir("match");
    let wav = dir.join("rest.wav");
    synth(&wav, 13);

    let expect = dir.join("rest.expect.json");
    fs::write(
        &expect,
        r#"{"fixture":"rest","segments":[{"start_ms":0,"end_ms":2000,"label":13,"min_ratio":1.0}]}"#,
    )
    .unwrap();
    let report = dir.join("report.json");

    let output = cli()
        .args(["classify", "--wav"])
        .arg(&wav)
        .arg("--output")
        .arg(&report)
        .output()
        .expect("failed to run classify");
    assert_eq!(output.status.code(), Some(0));

    let json: Value = serde_json::from_str(&fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(json["dominant_label"], 13);

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn dump_config_prints_defaults() {
    let output = cli()
        .arg("dump-config")
        .output()
        .expect("failed to run dump-config");
    assert!(output.status.success());

    let json: Value = serde_json::from_slice(&output.stdout).expect("config JSON");
    assert_eq!(json["capture"]["window_len"], 4410);
    let threshold = json["decision"]["silence_threshold"].as_f64().unwrap();
    assert!((threshold - 0.1).abs() < 1e-6);
    assert_eq!(json["model"]["kind"], "chroma");
}

#[test]
fn synth_rejects_out_of_range_label() {
    let dir = scratch_dir("bad_label");
    let output = cli()
        .args(["synth", "--out"])
        .arg(dir.join("x.wav"))
        .args(["--label", "14"])
        .output()
        .expect("failed to run synth");
    assert_eq!(output.status.code(), Some(1));
    fs::remove_dir_all(&dir).ok();
}
