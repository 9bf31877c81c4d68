// Classifier - maps a frequency reading onto a calibrated note label
//
// Each control note owns a half-open frequency band [low, high). Bands are
// validated once when the table is built (sorted, non-empty, disjoint, one
// band per note) and never change afterwards, so classification is a pure
// lookup with no memory of earlier readings.
//
// Readings without a frequency or below the volume threshold are Silence;
// frequencies outside every band (harmonics, noise, other pitches) are
// Unknown.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::analysis::estimator::FrequencyReading;
use crate::error::ConfigError;

/// The six recorder notes used as controls
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Note {
    C,
    D,
    E,
    F,
    G,
    A,
}

impl Note {
    pub const ALL: [Note; 6] = [Note::C, Note::D, Note::E, Note::F, Note::G, Note::A];

    pub fn name(&self) -> &'static str {
        match self {
            Note::C => "C",
            Note::D => "D",
            Note::E => "E",
            Note::F => "F",
            Note::G => "G",
            Note::A => "A",
        }
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Note {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Note::ALL
            .iter()
            .copied()
            .find(|note| note.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown note {:?} (expected one of C, D, E, F, G, A)", s))
    }
}

/// Result of classifying a single reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteLabel {
    /// Frequency fell inside a calibrated band
    Note(Note),
    /// No tone: too quiet or no dominant frequency
    Silence,
    /// A tone outside every calibrated band
    Unknown,
}

impl NoteLabel {
    /// The note carried by this label, if any
    pub fn note(&self) -> Option<Note> {
        match self {
            NoteLabel::Note(note) => Some(*note),
            NoteLabel::Silence | NoteLabel::Unknown => None,
        }
    }
}

impl fmt::Display for NoteLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoteLabel::Note(note) => write!(f, "{}", note),
            NoteLabel::Silence => f.write_str("SILENCE"),
            NoteLabel::Unknown => f.write_str("UNKNOWN"),
        }
    }
}

/// Half-open frequency interval `[low_hz, high_hz)` owned by one note
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoteBand {
    pub note: Note,
    pub low_hz: f32,
    pub high_hz: f32,
}

impl NoteBand {
    pub fn new(note: Note, low_hz: f32, high_hz: f32) -> Self {
        Self {
            note,
            low_hz,
            high_hz,
        }
    }

    pub fn contains(&self, frequency: f32) -> bool {
        frequency >= self.low_hz && frequency < self.high_hz
    }
}

/// Validated, ordered band table
#[derive(Debug, Clone, PartialEq)]
pub struct NoteBands {
    bands: Vec<NoteBand>,
}

impl NoteBands {
    /// Build a band table, sorting by lower edge and rejecting overlaps
    pub fn new(mut bands: Vec<NoteBand>) -> Result<Self, ConfigError> {
        if bands.is_empty() {
            return Err(ConfigError::InvalidBands {
                reason: "band table is empty".to_string(),
            });
        }

        for band in &bands {
            if !band.low_hz.is_finite() || !band.high_hz.is_finite() || band.low_hz < 0.0 {
                return Err(ConfigError::InvalidBands {
                    reason: format!(
                        "{} band [{}, {}) has invalid edges",
                        band.note, band.low_hz, band.high_hz
                    ),
                });
            }
            if band.low_hz >= band.high_hz {
                return Err(ConfigError::InvalidBands {
                    reason: format!(
                        "{} band [{}, {}) is empty",
                        band.note, band.low_hz, band.high_hz
                    ),
                });
            }
        }

        bands.sort_by(|a, b| a.low_hz.total_cmp(&b.low_hz));

        for pair in bands.windows(2) {
            if pair[1].low_hz < pair[0].high_hz {
                return Err(ConfigError::InvalidBands {
                    reason: format!(
                        "{} band [{}, {}) overlaps {} band [{}, {})",
                        pair[0].note,
                        pair[0].low_hz,
                        pair[0].high_hz,
                        pair[1].note,
                        pair[1].low_hz,
                        pair[1].high_hz
                    ),
                });
            }
        }

        for (i, band) in bands.iter().enumerate() {
            if bands[i + 1..].iter().any(|other| other.note == band.note) {
                return Err(ConfigError::InvalidBands {
                    reason: format!("note {} has more than one band", band.note),
                });
            }
        }

        Ok(Self { bands })
    }

    /// Bands measured on a soprano recorder
    pub fn default_recorder() -> Self {
        Self {
            bands: default_band_table(),
        }
    }

    pub fn bands(&self) -> &[NoteBand] {
        &self.bands
    }

    /// Find the note whose band contains `frequency`
    pub fn lookup(&self, frequency: f32) -> Option<Note> {
        let idx = self
            .bands
            .partition_point(|band| band.low_hz <= frequency);
        if idx == 0 {
            return None;
        }
        let band = &self.bands[idx - 1];
        band.contains(frequency).then_some(band.note)
    }
}

/// Default band table, sorted by lower edge
pub fn default_band_table() -> Vec<NoteBand> {
    vec![
        NoteBand::new(Note::C, 500.0, 790.0),
        NoteBand::new(Note::A, 800.0, 881.0),
        NoteBand::new(Note::D, 900.0, 1001.0),
        NoteBand::new(Note::E, 1001.0, 1200.0),
        NoteBand::new(Note::F, 1210.0, 1300.0),
        NoteBand::new(Note::G, 1310.0, 3000.0),
    ]
}

/// NoteClassifier applies the band table and volume gate to readings
#[derive(Debug, Clone)]
pub struct NoteClassifier {
    bands: NoteBands,
    volume_threshold: f32,
}

impl NoteClassifier {
    pub fn new(bands: NoteBands, volume_threshold: f32) -> Self {
        Self {
            bands,
            volume_threshold,
        }
    }

    /// Classify a reading
    ///
    /// Returns `Silence` for missing frequencies and quiet readings
    /// regardless of the measured frequency, otherwise the matching band's
    /// note or `Unknown`.
    pub fn classify(&self, reading: &FrequencyReading) -> NoteLabel {
        if reading.amplitude < self.volume_threshold {
            return NoteLabel::Silence;
        }

        match reading.frequency {
            None => NoteLabel::Silence,
            Some(frequency) => self
                .bands
                .lookup(frequency)
                .map(NoteLabel::Note)
                .unwrap_or(NoteLabel::Unknown),
        }
    }

    pub fn bands(&self) -> &NoteBands {
        &self.bands
    }

    pub fn volume_threshold(&self) -> f32 {
        self.volume_threshold
    }
}

#[cfg(test)]
#[path = "classifier_tests.rs"]
mod tests;
