// NotePipeline - estimator, smoother, classifier and segmenter for one stream
//
// The pipeline is the unit driven by the live analysis thread, the WAV
// replay tool and the tests: windows go in, labelled readings and segment
// events come out.

use crate::analysis::classifier::{NoteClassifier, NoteLabel};
use crate::analysis::estimator::{FrequencyEstimator, FrequencyReading, SampleWindow};
use crate::analysis::segmenter::{NoteSegmenter, Observation, SegmentEvent, SegmenterPhase};
use crate::analysis::smoothing::FrequencySmoother;
use crate::config::AppConfig;
use crate::error::{AnalysisError, ConfigError};

/// Everything produced by analysing one window
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineStep {
    /// Smoothed reading the label was derived from
    pub reading: FrequencyReading,
    pub label: NoteLabel,
    pub events: Vec<SegmentEvent>,
}

pub struct NotePipeline {
    estimator: FrequencyEstimator,
    smoother: FrequencySmoother,
    classifier: NoteClassifier,
    segmenter: NoteSegmenter,
}

impl NotePipeline {
    pub fn new(
        estimator: FrequencyEstimator,
        smoother: FrequencySmoother,
        classifier: NoteClassifier,
        segmenter: NoteSegmenter,
    ) -> Self {
        Self {
            estimator,
            smoother,
            classifier,
            segmenter,
        }
    }

    /// Build a pipeline from validated configuration
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let recognition = &config.recognition;

        Ok(Self::new(
            FrequencyEstimator::new(config.audio.estimator_settings(recognition.volume_threshold)),
            FrequencySmoother::new(recognition.smoothing_window),
            NoteClassifier::new(recognition.bands()?, recognition.volume_threshold),
            NoteSegmenter::new(recognition.segmenter_config()),
        ))
    }

    /// Analyse one window
    ///
    /// Errors leave every stage untouched. After `InsufficientSamples` the
    /// caller can retry with a longer window; an `OutOfOrderSample` window is
    /// rejected before it reaches the smoother.
    pub fn process(&mut self, window: &SampleWindow<'_>) -> Result<PipelineStep, AnalysisError> {
        let raw = self.estimator.estimate(window)?;
        self.segmenter.check_order(raw.timestamp)?;
        let reading = self.smoother.smooth(raw);
        let label = self.classifier.classify(&reading);
        let events = self.segmenter.push(Observation::new(
            label,
            reading.timestamp,
            reading.duration,
        ))?;

        Ok(PipelineStep {
            reading,
            label,
            events,
        })
    }

    /// Run a whole recording through the pipeline in `window_size` steps
    ///
    /// A trailing partial window is not analysed. The stream ends afterwards,
    /// so a note still sounding at the end is discarded.
    pub fn run_offline(
        &mut self,
        samples: &[f32],
        sample_rate: u32,
        window_size: usize,
    ) -> Result<Vec<SegmentEvent>, AnalysisError> {
        if window_size == 0 {
            return Err(AnalysisError::InvalidWindow {
                reason: "window size is zero".to_string(),
            });
        }

        let mut events = Vec::new();
        for (i, chunk) in samples.chunks_exact(window_size).enumerate() {
            let window = SampleWindow::at_frame(chunk, sample_rate, (i * window_size) as u64);
            events.extend(self.process(&window)?.events);
        }

        let discarded = self.reset();
        if discarded != SegmenterPhase::Idle {
            tracing::debug!(?discarded, "Recording ended with an open note");
        }
        Ok(events)
    }

    /// End the stream, discarding any open note
    pub fn reset(&mut self) -> SegmenterPhase {
        self.smoother.reset();
        self.segmenter.reset()
    }

    pub fn classifier(&self) -> &NoteClassifier {
        &self.classifier
    }

    pub fn segmenter(&self) -> &NoteSegmenter {
        &self.segmenter
    }
}
