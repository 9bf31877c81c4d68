// Analysis module - note recognition pipeline
//
// This module turns fixed-size sample windows into discrete note events and
// runs that pipeline on a dedicated thread fed by the capture callback.
//
// Architecture:
// - AnalysisWorker: main loop that consumes windows from DATA_QUEUE
// - Pipeline: FrequencyEstimator → FrequencySmoother → NoteClassifier → NoteSegmenter
// - Output: completed NoteEvents sent via tokio mpsc to the command dispatcher

pub mod classifier;
pub mod estimator;
pub mod pipeline;
pub mod segmenter;
pub mod smoothing;
pub mod worker;

pub use classifier::{Note, NoteBand, NoteBands, NoteClassifier, NoteLabel};
pub use estimator::{
    EstimatorSettings, FrequencyEstimator, FrequencyReading, SampleWindow, DEFAULT_VOLUME_THRESHOLD,
};
pub use pipeline::{NotePipeline, PipelineStep};
pub use segmenter::{
    NoteEvent, NoteSegmenter, Observation, SegmentEvent, SegmenterConfig, SegmenterPhase,
};
pub use smoothing::FrequencySmoother;
pub use worker::{spawn_analysis_thread, AnalysisWorker, WorkerSettings, WorkerSummary};
