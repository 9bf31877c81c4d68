//! Integration tests for the calibration workflow
//!
//! Simulates a player holding each note for a second, derives bands from
//! the measured means and checks the recognizer with those bands.

use note_control::analysis::{FrequencyEstimator, Note, NoteBands, NotePipeline, SegmentEvent};
use note_control::calibration::{
    analyse_recording, suggest_bands, CalibrationReport, CalibrationSession, CalibrationSettings,
};
use note_control::config::AppConfig;
use note_control::fixtures::{Segment, SyntheticRecording};

const SAMPLE_RATE: u32 = 44_100;

/// Recorder whose notes sit a little sharp of the default table
const PLAYED: [(Note, f32); 4] = [
    (Note::D, 980.0),
    (Note::E, 1150.0),
    (Note::F, 1320.0),
    (Note::G, 1480.0),
];

fn measure(frequency: f32) -> f32 {
    let config = AppConfig::default();
    let volume = config.recognition.volume_threshold;
    let mut estimator = FrequencyEstimator::new(config.audio.estimator_settings(volume));
    let mut session = CalibrationSession::new(
        CalibrationSettings {
            volume_threshold: volume,
            ..CalibrationSettings::default()
        },
        NoteBands::default_recorder(),
    );

    let samples = SyntheticRecording::new(SAMPLE_RATE).render(&[Segment::tone(frequency, 1000)]);
    let reports = analyse_recording(
        &mut estimator,
        &mut session,
        &samples,
        SAMPLE_RATE,
        config.audio.window_size,
    )
    .expect("recording analyses cleanly");

    reports
        .iter()
        .find_map(|report| match report {
            CalibrationReport::Summary(summary) => Some(summary.mean_hz),
            CalibrationReport::Volume { .. } => None,
        })
        .expect("one second of tone yields a summary")
}

#[test]
fn test_measured_means_are_close_to_played_pitch() {
    for (_, frequency) in PLAYED {
        let measured = measure(frequency);
        assert!(
            (measured - frequency).abs() < 15.0,
            "played {} Hz, measured {} Hz",
            frequency,
            measured
        );
    }
}

#[test]
fn test_suggested_bands_drive_recognition() {
    let centers: Vec<(Note, f32)> = PLAYED
        .iter()
        .map(|&(note, frequency)| (note, measure(frequency)))
        .collect();
    let bands = suggest_bands(&centers, 60.0).expect("distinct centres");

    for (note, frequency) in PLAYED {
        assert_eq!(bands.lookup(frequency), Some(note));
    }

    let mut config = AppConfig::default();
    config.audio.window_size = 882;
    config.recognition.note_bands = bands.bands().to_vec();

    let mut script = Vec::new();
    for (_, frequency) in PLAYED {
        script.push(Segment::tone(frequency, 300));
        script.push(Segment::silence(300));
    }
    let samples = SyntheticRecording::new(SAMPLE_RATE).render(&script);

    let mut pipeline = NotePipeline::from_config(&config).expect("suggested bands are valid");
    let recognized: Vec<Note> = pipeline
        .run_offline(&samples, SAMPLE_RATE, config.audio.window_size)
        .unwrap()
        .into_iter()
        .filter_map(|event| match event {
            SegmentEvent::Completed(note) => Some(note.note),
            SegmentEvent::Confirmed { .. } => None,
        })
        .collect();

    let expected: Vec<Note> = PLAYED.iter().map(|(note, _)| *note).collect();
    assert_eq!(recognized, expected);
}
