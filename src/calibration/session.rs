// Live calibration session - periodic frequency and volume summaries
//
// Readings are collected on the audio clock (reading timestamps), so a
// session driven from a WAV file reports exactly like one driven from the
// microphone.

use std::time::Duration;

use serde::Serialize;

use crate::analysis::classifier::{NoteBands, NoteLabel};
use crate::analysis::estimator::{
    FrequencyEstimator, FrequencyReading, SampleWindow, DEFAULT_VOLUME_THRESHOLD,
};
use crate::error::AnalysisError;

#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationSettings {
    /// Only readings inside this range enter summaries
    pub display_min_hz: f32,
    pub display_max_hz: f32,
    pub summary_interval: Duration,
    pub volume_interval: Duration,
    pub volume_threshold: f32,
}

impl Default for CalibrationSettings {
    fn default() -> Self {
        Self {
            display_min_hz: 500.0,
            display_max_hz: 3000.0,
            summary_interval: Duration::from_millis(500),
            volume_interval: Duration::from_secs(2),
            volume_threshold: DEFAULT_VOLUME_THRESHOLD,
        }
    }
}

/// Aggregate of the readings seen in one summary interval
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrequencySummary {
    pub count: usize,
    pub mean_hz: f32,
    pub min_hz: f32,
    pub max_hz: f32,
    pub mean_amplitude: f32,
    /// Current band of the mean frequency
    pub label: NoteLabel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "report", rename_all = "snake_case")]
pub enum CalibrationReport {
    Summary(FrequencySummary),
    Volume {
        amplitude: f32,
        threshold: f32,
        above_threshold: bool,
    },
}

pub struct CalibrationSession {
    settings: CalibrationSettings,
    bands: NoteBands,
    pending: Vec<(f32, f32)>,
    next_summary: Option<Duration>,
    next_volume: Option<Duration>,
}

impl CalibrationSession {
    pub fn new(settings: CalibrationSettings, bands: NoteBands) -> Self {
        Self {
            settings,
            bands,
            pending: Vec::new(),
            next_summary: None,
            next_volume: None,
        }
    }

    /// Record one reading, returning any reports that fell due
    pub fn observe(&mut self, reading: &FrequencyReading) -> Vec<CalibrationReport> {
        let now = reading.timestamp;
        let mut reports = Vec::new();

        let next_volume = *self.next_volume.get_or_insert(now);
        if now >= next_volume {
            reports.push(CalibrationReport::Volume {
                amplitude: reading.amplitude,
                threshold: self.settings.volume_threshold,
                above_threshold: reading.amplitude >= self.settings.volume_threshold,
            });
            self.next_volume = Some(now + self.settings.volume_interval);
        }

        if let Some(frequency) = reading.frequency {
            if frequency >= self.settings.display_min_hz && frequency <= self.settings.display_max_hz
            {
                self.pending.push((frequency, reading.amplitude));
            }
        }

        let next_summary = *self
            .next_summary
            .get_or_insert(now + self.settings.summary_interval);
        if now >= next_summary {
            if let Some(summary) = self.summarize() {
                reports.push(CalibrationReport::Summary(summary));
            }
            self.pending.clear();
            self.next_summary = Some(now + self.settings.summary_interval);
        }

        reports
    }

    fn summarize(&self) -> Option<FrequencySummary> {
        if self.pending.is_empty() {
            return None;
        }
        let count = self.pending.len();
        let mean_hz = self.pending.iter().map(|(f, _)| f).sum::<f32>() / count as f32;
        let min_hz = self.pending.iter().map(|(f, _)| *f).fold(f32::INFINITY, f32::min);
        let max_hz = self
            .pending
            .iter()
            .map(|(f, _)| *f)
            .fold(f32::NEG_INFINITY, f32::max);
        let mean_amplitude = self.pending.iter().map(|(_, a)| a).sum::<f32>() / count as f32;
        let label = self
            .bands
            .lookup(mean_hz)
            .map(NoteLabel::Note)
            .unwrap_or(NoteLabel::Unknown);

        Some(FrequencySummary {
            count,
            mean_hz,
            min_hz,
            max_hz,
            mean_amplitude,
            label,
        })
    }
}

/// Run a whole recording through `estimator` and `session`
///
/// A trailing partial window is ignored.
pub fn analyse_recording(
    estimator: &mut FrequencyEstimator,
    session: &mut CalibrationSession,
    samples: &[f32],
    sample_rate: u32,
    window_size: usize,
) -> Result<Vec<CalibrationReport>, AnalysisError> {
    if window_size == 0 {
        return Err(AnalysisError::InvalidWindow {
            reason: "window size must be positive".to_string(),
        });
    }

    let mut reports = Vec::new();
    for (index, chunk) in samples.chunks_exact(window_size).enumerate() {
        let window = SampleWindow::at_frame(chunk, sample_rate, (index * window_size) as u64);
        let reading = estimator.estimate(&window)?;
        reports.extend(session.observe(&reading));
    }
    Ok(reports)
}
