use std::path::PathBuf;
use std::process::Command;

use note_control::fixtures::{write_wav, Segment, SyntheticRecording};
use serde_json::Value;

const SAMPLE_RATE: u32 = 44_100;

fn note_client() -> Command {
    Command::new(env!("CARGO_BIN_EXE_note-client"))
}

fn calibrate() -> Command {
    Command::new(env!("CARGO_BIN_EXE_calibrate"))
}

fn config_file() -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("assets")
        .join("note_config.json")
        .to_string_lossy()
        .into_owned()
}

fn temp_wav(name: &str, script: &[Segment]) -> PathBuf {
    let path = std::env::temp_dir().join(format!("{}-{}.wav", name, std::process::id()));
    let samples = SyntheticRecording::new(SAMPLE_RATE).render(script);
    write_wav(&path, &samples, SAMPLE_RATE).expect("write fixture WAV");
    path
}

#[test]
fn replay_prints_note_events() {
    let wav = temp_wav(
        "note-client-replay",
        &[
            Segment::tone(950.0, 400),
            Segment::silence(400),
            Segment::tone(1100.0, 400),
            Segment::silence(400),
        ],
    );

    let output = note_client()
        .args(["--config", &config_file(), "replay", "--wav"])
        .arg(&wav)
        .output()
        .expect("failed to run note-client replay");
    let _ = std::fs::remove_file(&wav);

    assert!(
        output.status.success(),
        "CLI exited with {:?}",
        output.status.code()
    );
    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    let events: Vec<Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("one JSON event per line"))
        .collect();

    let notes: Vec<&str> = events.iter().filter_map(|e| e["note"].as_str()).collect();
    assert_eq!(notes, vec!["D", "E"]);
    assert_eq!(events[0]["command"], "move_up");
    assert_eq!(events[1]["command"], "move_down");
    assert!(events[0]["duration_ms"].as_u64().unwrap_or_default() >= 300);
}

#[test]
fn replay_missing_file_fails() {
    let output = note_client()
        .args(["replay", "--wav", "/nonexistent/recording.wav"])
        .output()
        .expect("failed to run note-client replay");
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn bands_prints_config_ready_json() {
    let output = calibrate()
        .args([
            "bands", "--center", "D=950", "--center", "E=1100", "--margin", "50",
        ])
        .output()
        .expect("failed to run calibrate bands");
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    let bands: Value = serde_json::from_str(stdout.trim()).expect("band table JSON");
    assert_eq!(bands[0]["note"], "D");
    assert_eq!(bands[0]["low_hz"], 900.0);
    assert_eq!(bands[0]["high_hz"], 1025.0);
    assert_eq!(bands[1]["note"], "E");
    assert_eq!(bands[1]["high_hz"], 1150.0);
}

#[test]
fn bands_rejects_bad_center() {
    let output = calibrate()
        .args(["bands", "--center", "H=950"])
        .output()
        .expect("failed to run calibrate bands");
    assert!(!output.status.success());
}
