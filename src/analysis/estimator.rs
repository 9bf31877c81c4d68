// Frequency estimator - dominant pitch and loudness of one sample window
//
// The estimator applies a Hann window, runs a forward FFT and picks the
// strongest positive-frequency bin (DC excluded). Loudness is the mean
// absolute sample level, the same measure the volume threshold is
// calibrated against.
//
// FFT plans and the Hann window are cached per window length, so repeated
// calls with fixed-size windows only pay for the transform itself.

use std::sync::Arc;
use std::time::Duration;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::error::AnalysisError;

/// Borrowed view of one fixed-size block of mono samples
#[derive(Debug, Clone, Copy)]
pub struct SampleWindow<'a> {
    pub samples: &'a [f32],
    pub sample_rate: u32,
    /// Capture time of the first frame, relative to stream start
    pub timestamp: Duration,
}

impl<'a> SampleWindow<'a> {
    pub fn new(samples: &'a [f32], sample_rate: u32, timestamp: Duration) -> Self {
        Self {
            samples,
            sample_rate,
            timestamp,
        }
    }

    /// Build a window positioned at `start_frame` frames into the stream
    pub fn at_frame(samples: &'a [f32], sample_rate: u32, start_frame: u64) -> Self {
        Self::new(samples, sample_rate, frames_to_duration(start_frame, sample_rate))
    }

    /// Time span covered by the window
    pub fn duration(&self) -> Duration {
        frames_to_duration(self.samples.len() as u64, self.sample_rate)
    }
}

/// Convert a frame count to elapsed time without floating-point drift
pub fn frames_to_duration(frames: u64, sample_rate: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::ZERO;
    }
    let nanos = frames as u128 * 1_000_000_000 / sample_rate as u128;
    Duration::from_nanos(nanos.min(u64::MAX as u128) as u64)
}

/// Estimator output for one window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrequencyReading {
    /// Dominant frequency in Hz, `None` when quiet or out of range
    pub frequency: Option<f32>,
    /// Mean absolute sample level (0.0..=1.0 for normalized audio)
    pub amplitude: f32,
    pub timestamp: Duration,
    pub duration: Duration,
}

/// Mean level below which a window counts as silence (200 on a 16-bit scale)
pub const DEFAULT_VOLUME_THRESHOLD: f32 = 200.0 / 32768.0;

/// Tunables for [`FrequencyEstimator`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimatorSettings {
    pub min_samples: usize,
    pub volume_threshold: f32,
    pub min_frequency_hz: f32,
    pub max_frequency_hz: f32,
}

impl Default for EstimatorSettings {
    fn default() -> Self {
        Self {
            min_samples: 256,
            volume_threshold: DEFAULT_VOLUME_THRESHOLD,
            min_frequency_hz: 500.0,
            max_frequency_hz: 3000.0,
        }
    }
}

struct CachedPlan {
    len: usize,
    fft: Arc<dyn Fft<f32>>,
    hann: Vec<f32>,
}

/// FFT peak-picking frequency estimator
pub struct FrequencyEstimator {
    settings: EstimatorSettings,
    planner: FftPlanner<f32>,
    plan: Option<CachedPlan>,
    buffer: Vec<Complex<f32>>,
}

impl FrequencyEstimator {
    pub fn new(settings: EstimatorSettings) -> Self {
        Self {
            settings,
            planner: FftPlanner::new(),
            plan: None,
            buffer: Vec::new(),
        }
    }

    pub fn settings(&self) -> &EstimatorSettings {
        &self.settings
    }

    /// Estimate the dominant frequency and amplitude of `window`
    pub fn estimate(&mut self, window: &SampleWindow<'_>) -> Result<FrequencyReading, AnalysisError> {
        if window.sample_rate == 0 {
            return Err(AnalysisError::InvalidWindow {
                reason: "sample rate is zero".to_string(),
            });
        }

        let len = window.samples.len();
        let required = self.settings.min_samples.max(2);
        if len < required {
            return Err(AnalysisError::InsufficientSamples {
                required,
                actual: len,
            });
        }

        let amplitude = mean_absolute_level(window.samples);
        let mut reading = FrequencyReading {
            frequency: None,
            amplitude,
            timestamp: window.timestamp,
            duration: window.duration(),
        };

        if amplitude < self.settings.volume_threshold {
            return Ok(reading);
        }

        let (peak_bin, peak_magnitude) = self.peak_bin(window.samples);
        if peak_magnitude <= 0.0 {
            return Ok(reading);
        }

        let frequency = peak_bin as f32 * window.sample_rate as f32 / len as f32;
        if frequency >= self.settings.min_frequency_hz && frequency <= self.settings.max_frequency_hz
        {
            reading.frequency = Some(frequency);
        }

        Ok(reading)
    }

    /// Strongest bin in 1..=len/2 of the Hann-windowed spectrum
    fn peak_bin(&mut self, samples: &[f32]) -> (usize, f32) {
        let len = samples.len();
        if self.plan.as_ref().map(|p| p.len) != Some(len) {
            self.plan = Some(CachedPlan {
                len,
                fft: self.planner.plan_fft_forward(len),
                hann: hann_window(len),
            });
        }
        let Some(plan) = self.plan.as_ref() else {
            return (0, 0.0);
        };

        self.buffer.clear();
        self.buffer.extend(
            samples
                .iter()
                .zip(&plan.hann)
                .map(|(&s, &w)| Complex::new(s * w, 0.0)),
        );
        plan.fft.process(&mut self.buffer);

        self.buffer[1..=len / 2]
            .iter()
            .enumerate()
            .map(|(i, c)| (i + 1, c.norm()))
            .fold((0, 0.0), |best, (bin, mag)| if mag > best.1 { (bin, mag) } else { best })
    }
}

/// Mean absolute sample level
pub fn mean_absolute_level(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(|s| s.abs()).sum::<f32>() / samples.len() as f32
}

fn hann_window(len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| 0.5 * (1.0 - ((2.0 * std::f32::consts::PI * i as f32) / (len as f32 - 1.0)).cos()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: u32 = 44_100;

    fn sine(frequency: f32, amplitude: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| {
                amplitude
                    * (2.0 * std::f32::consts::PI * frequency * i as f32 / SAMPLE_RATE as f32).sin()
            })
            .collect()
    }

    #[test]
    fn test_estimates_pure_tone_within_one_bin() {
        let mut estimator = FrequencyEstimator::new(EstimatorSettings::default());
        let samples = sine(880.0, 0.5, 4096);
        let reading = estimator
            .estimate(&SampleWindow::new(&samples, SAMPLE_RATE, Duration::ZERO))
            .unwrap();

        let bin_width = SAMPLE_RATE as f32 / 4096.0;
        let frequency = reading.frequency.expect("tone should be detected");
        assert!(
            (frequency - 880.0).abs() <= bin_width,
            "Expected ~880 Hz, got {} Hz",
            frequency
        );
        // Mean absolute level of a sine is 2/pi of its peak
        assert!((reading.amplitude - 0.5 * 2.0 / std::f32::consts::PI).abs() < 0.01);
    }

    #[test]
    fn test_quiet_window_has_no_frequency() {
        let mut estimator = FrequencyEstimator::new(EstimatorSettings::default());
        let samples = sine(880.0, 0.001, 4096);
        let reading = estimator
            .estimate(&SampleWindow::new(&samples, SAMPLE_RATE, Duration::ZERO))
            .unwrap();

        assert_eq!(reading.frequency, None);
        assert!(reading.amplitude > 0.0, "Amplitude is still reported");
    }

    #[test]
    fn test_out_of_range_peak_has_no_frequency() {
        let mut estimator = FrequencyEstimator::new(EstimatorSettings::default());
        let samples = sine(200.0, 0.5, 4096);
        let reading = estimator
            .estimate(&SampleWindow::new(&samples, SAMPLE_RATE, Duration::ZERO))
            .unwrap();

        assert_eq!(reading.frequency, None, "200 Hz is below the search range");
    }

    #[test]
    fn test_short_window_is_insufficient() {
        let mut estimator = FrequencyEstimator::new(EstimatorSettings::default());
        let samples = sine(880.0, 0.5, 100);
        let err = estimator
            .estimate(&SampleWindow::new(&samples, SAMPLE_RATE, Duration::ZERO))
            .unwrap_err();

        assert_eq!(
            err,
            AnalysisError::InsufficientSamples {
                required: 256,
                actual: 100
            }
        );
    }

    #[test]
    fn test_zero_sample_rate_is_invalid() {
        let mut estimator = FrequencyEstimator::new(EstimatorSettings::default());
        let samples = sine(880.0, 0.5, 4096);
        let result = estimator.estimate(&SampleWindow::new(&samples, 0, Duration::ZERO));
        assert!(matches!(result, Err(AnalysisError::InvalidWindow { .. })));
    }

    #[test]
    fn test_plan_cache_follows_window_length() {
        let mut estimator = FrequencyEstimator::new(EstimatorSettings::default());
        for len in [4096, 2048, 4096] {
            let samples = sine(1100.0, 0.5, len);
            let reading = estimator
                .estimate(&SampleWindow::new(&samples, SAMPLE_RATE, Duration::ZERO))
                .unwrap();
            let bin_width = SAMPLE_RATE as f32 / len as f32;
            let frequency = reading.frequency.unwrap();
            assert!(
                (frequency - 1100.0).abs() <= bin_width,
                "len {}: expected ~1100 Hz, got {}",
                len,
                frequency
            );
        }
    }

    #[test]
    fn test_window_timing_from_frames() {
        let samples = vec![0.0; 882];
        let window = SampleWindow::at_frame(&samples, SAMPLE_RATE, 44_100);
        assert_eq!(window.timestamp, Duration::from_secs(1));
        assert_eq!(window.duration(), Duration::from_millis(20));
    }
}
