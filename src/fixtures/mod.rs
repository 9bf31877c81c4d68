//! Fixture utilities for offline runs and tests.
//!
//! Synthetic recordings are built from a script of tone, silence and noise
//! segments with a seeded RNG, so the same script always renders the same
//! samples. WAV helpers load recordings for the replay tool and write
//! generated audio for integration tests.

use std::f32::consts::PI;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::analysis::classifier::{Note, NoteBands};

/// One piece of a synthetic recording
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Segment {
    Tone {
        frequency_hz: f32,
        amplitude: f32,
        duration_ms: u32,
    },
    Silence {
        duration_ms: u32,
    },
    /// Uniform white noise
    Noise {
        amplitude: f32,
        duration_ms: u32,
    },
}

impl Segment {
    pub fn tone(frequency_hz: f32, duration_ms: u32) -> Self {
        Segment::Tone {
            frequency_hz,
            amplitude: 0.3,
            duration_ms,
        }
    }

    pub fn silence(duration_ms: u32) -> Self {
        Segment::Silence { duration_ms }
    }

    pub fn duration_ms(&self) -> u32 {
        match self {
            Segment::Tone { duration_ms, .. }
            | Segment::Silence { duration_ms }
            | Segment::Noise { duration_ms, .. } => *duration_ms,
        }
    }
}

/// Deterministic renderer for segment scripts
pub struct SyntheticRecording {
    sample_rate: u32,
    rng: StdRng,
    phase: f32,
}

impl SyntheticRecording {
    pub fn new(sample_rate: u32) -> Self {
        Self::with_seed(sample_rate, 0x5A5A_FFF0)
    }

    pub fn with_seed(sample_rate: u32, seed: u64) -> Self {
        Self {
            sample_rate,
            rng: StdRng::seed_from_u64(seed),
            phase: 0.0,
        }
    }

    /// Render a script to mono samples
    ///
    /// Tone phase carries across consecutive tones, so note changes have no
    /// click at the boundary.
    pub fn render(&mut self, script: &[Segment]) -> Vec<f32> {
        let mut out = Vec::new();
        for segment in script {
            let len = (segment.duration_ms() as u64 * self.sample_rate as u64 / 1000) as usize;
            match *segment {
                Segment::Tone {
                    frequency_hz,
                    amplitude,
                    ..
                } => {
                    let step = 2.0 * PI * frequency_hz / self.sample_rate as f32;
                    for _ in 0..len {
                        out.push(amplitude * self.phase.sin());
                        self.phase = (self.phase + step) % (2.0 * PI);
                    }
                }
                Segment::Silence { .. } => out.extend(std::iter::repeat(0.0).take(len)),
                Segment::Noise { amplitude, .. } => {
                    for _ in 0..len {
                        out.push(self.rng.gen_range(-amplitude..=amplitude));
                    }
                }
            }
        }
        out
    }
}

/// Centre frequency of a note's calibrated band
pub fn band_center(bands: &NoteBands, note: Note) -> Option<f32> {
    bands
        .bands()
        .iter()
        .find(|band| band.note == note)
        .map(|band| (band.low_hz + band.high_hz) / 2.0)
}

/// Read a WAV file as mono f32 samples (first channel)
pub fn read_wav(path: &Path) -> Result<(Vec<f32>, u32)> {
    let mut reader =
        hound::WavReader::open(path).with_context(|| format!("opening {}", path.display()))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;
    let sample_rate = spec.sample_rate;

    let interleaved = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|sample| sample.map_err(|err| anyhow!(err)))
            .collect::<Result<Vec<f32>>>()?,
        hound::SampleFormat::Int => {
            let max = (1i64 << (spec.bits_per_sample - 1)) - 1;
            match spec.bits_per_sample {
                16 => reader
                    .samples::<i16>()
                    .map(|sample| {
                        sample
                            .map(|value| value as f32 / max as f32)
                            .map_err(|err| anyhow!(err))
                    })
                    .collect::<Result<Vec<f32>>>()?,
                24 | 32 => reader
                    .samples::<i32>()
                    .map(|sample| {
                        sample
                            .map(|value| value as f32 / max as f32)
                            .map_err(|err| anyhow!(err))
                    })
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

    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved.iter().step_by(channels).copied().collect()
    };
    Ok((samples, sample_rate))
}

/// Write mono f32 samples as a 16-bit PCM WAV file
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
        let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer.write_sample(value)?;
    }
    writer.finalize()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_lengths() {
        let mut rec = SyntheticRecording::new(44_100);
        let samples = rec.render(&[Segment::tone(950.0, 100), Segment::silence(50)]);
        assert_eq!(samples.len(), 4410 + 2205);
        assert!(samples[4410..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_noise_is_seeded() {
        let script = [Segment::Noise {
            amplitude: 0.1,
            duration_ms: 10,
        }];
        let a = SyntheticRecording::with_seed(8000, 7).render(&script);
        let b = SyntheticRecording::with_seed(8000, 7).render(&script);
        assert_eq!(a, b);
        assert!(a.iter().all(|s| s.abs() <= 0.1));
    }

    #[test]
    fn test_band_center() {
        let bands = NoteBands::default_recorder();
        assert_eq!(band_center(&bands, Note::D), Some(950.5));
    }

    #[test]
    fn test_wav_roundtrip_preserves_shape() {
        let path = std::env::temp_dir().join(format!(
            "note_control_fixture_{}.wav",
            std::process::id()
        ));
        let samples = SyntheticRecording::new(8000).render(&[Segment::tone(1000.0, 20)]);
        write_wav(&path, &samples, 8000).unwrap();

        let (loaded, rate) = read_wav(&path).unwrap();
        assert_eq!(rate, 8000);
        assert_eq!(loaded.len(), samples.len());
        for (a, b) in samples.iter().zip(&loaded) {
            assert!((a - b).abs() < 1e-3, "{} vs {}", a, b);
        }
        let _ = std::fs::remove_file(&path);
    }
}
