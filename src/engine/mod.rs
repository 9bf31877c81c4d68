//! Recognition engine tying capture, analysis and the note channel together.
//!
//! The engine owns the capture backend and the analysis thread. Completed
//! notes leave through the `mpsc::Sender` handed to `start`; the engine keeps
//! no clone of it, so the receiver sees the channel close once the analysis
//! thread has stopped.

pub mod backend;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use tokio::sync::mpsc;

use crate::analysis::classifier::{NoteBands, NoteClassifier};
use crate::analysis::estimator::FrequencyEstimator;
use crate::analysis::pipeline::NotePipeline;
use crate::analysis::segmenter::{NoteEvent, NoteSegmenter};
use crate::analysis::smoothing::FrequencySmoother;
use crate::analysis::worker::{spawn_analysis_thread, AnalysisWorker, WorkerSettings, WorkerSummary};
use crate::audio::buffer_pool::BufferPool;
use crate::config::AppConfig;
use crate::error::{log_audio_error, AnalysisError, AudioError, ConfigError};

pub use backend::{CaptureBackend, CaptureInfo, CpalBackend, ReplayBackend};

type WorkerHandle = JoinHandle<Result<WorkerSummary, AnalysisError>>;

pub struct RecognitionEngine<B: CaptureBackend> {
    backend: B,
    config: AppConfig,
    bands: NoteBands,
    running: Arc<AtomicBool>,
    worker: Option<WorkerHandle>,
}

impl<B: CaptureBackend> RecognitionEngine<B> {
    /// Create an engine; the configuration is validated up front
    pub fn new(backend: B, config: AppConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let bands = config.recognition.bands()?;
        Ok(Self {
            backend,
            config,
            bands,
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    fn build_pipeline(&self) -> NotePipeline {
        let recognition = &self.config.recognition;
        NotePipeline::new(
            FrequencyEstimator::new(
                self.config
                    .audio
                    .estimator_settings(recognition.volume_threshold),
            ),
            FrequencySmoother::new(recognition.smoothing_window),
            NoteClassifier::new(self.bands.clone(), recognition.volume_threshold),
            NoteSegmenter::new(recognition.segmenter_config()),
        )
    }

    /// Start capture and the analysis thread
    ///
    /// Completed notes are sent to `events`; a full channel drops the note.
    pub fn start(&mut self, events: mpsc::Sender<NoteEvent>) -> Result<CaptureInfo, AudioError> {
        if self.worker.is_some() {
            return Err(AudioError::AlreadyRunning);
        }

        let audio = &self.config.audio;
        let (capture, analysis) =
            BufferPool::new(audio.buffer_pool_size, audio.window_size).split();
        let max_backlog = audio.max_backlog;

        let info = self.backend.start(capture)?;
        self.running.store(true, Ordering::SeqCst);

        let worker = AnalysisWorker::new(
            analysis,
            self.build_pipeline(),
            WorkerSettings {
                sample_rate: info.sample_rate,
                max_backlog,
            },
            events,
            Arc::clone(&self.running),
        )
        .with_capture_overruns(Arc::clone(&info.overruns));

        match spawn_analysis_thread(worker) {
            Ok(handle) => self.worker = Some(handle),
            Err(err) => {
                self.running.store(false, Ordering::SeqCst);
                if let Err(stop_err) = self.backend.stop() {
                    log_audio_error(&stop_err, "RecognitionEngine::start");
                }
                return Err(AudioError::HardwareError {
                    details: format!("Failed to spawn analysis thread: {}", err),
                });
            }
        }

        tracing::info!(
            sample_rate = info.sample_rate,
            window_size = self.config.audio.window_size,
            "Recognition engine started"
        );
        Ok(info)
    }

    /// Stop capture, join the analysis thread and return its counters
    ///
    /// A note still sounding at this point is discarded.
    pub fn stop(&mut self) -> Result<WorkerSummary, AudioError> {
        let handle = self.worker.take().ok_or(AudioError::NotRunning)?;

        let backend_result = self.backend.stop();
        self.running.store(false, Ordering::SeqCst);

        let summary = handle
            .join()
            .map_err(|_| AudioError::StreamFailure {
                reason: "Analysis thread panicked".to_string(),
            })?
            .map_err(|err| AudioError::StreamFailure {
                reason: err.to_string(),
            })?;
        backend_result?;

        tracing::info!(
            processed = summary.windows_processed,
            dropped = summary.windows_dropped,
            notes = summary.notes_completed,
            "Recognition engine stopped"
        );
        Ok(summary)
    }
}

impl<B: CaptureBackend> Drop for RecognitionEngine<B> {
    fn drop(&mut self) {
        if self.worker.is_some() {
            if let Err(err) = self.stop() {
                log_audio_error(&err, "RecognitionEngine::drop");
            }
        }
    }
}
