// Analysis thread - drains the window queue through the note pipeline
//
// Windows are processed strictly in arrival order. When the capture side
// gets ahead by more than `max_backlog` windows, the oldest queued windows
// are dropped so recognition stays close to real time. Completed notes are
// forwarded to the async dispatcher with `try_send`; a full channel drops
// the note instead of stalling analysis.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rtrb::PopError;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::analysis::estimator::SampleWindow;
use crate::analysis::pipeline::NotePipeline;
use crate::analysis::segmenter::{NoteEvent, SegmentEvent, SegmenterPhase};
use crate::audio::buffer_pool::AnalysisChannels;
use crate::error::{log_analysis_error, AnalysisError};
use crate::telemetry;

/// Counters reported when the analysis thread exits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    pub windows_processed: u64,
    pub windows_dropped: u64,
    pub notes_completed: u64,
    pub notes_forwarded: u64,
}

pub struct WorkerSettings {
    pub sample_rate: u32,
    pub max_backlog: usize,
}

pub struct AnalysisWorker {
    channels: AnalysisChannels,
    pipeline: NotePipeline,
    settings: WorkerSettings,
    events: mpsc::Sender<NoteEvent>,
    running: Arc<AtomicBool>,
    capture_overruns: Option<Arc<AtomicU64>>,
    summary: WorkerSummary,
}

impl AnalysisWorker {
    pub fn new(
        channels: AnalysisChannels,
        pipeline: NotePipeline,
        settings: WorkerSettings,
        events: mpsc::Sender<NoteEvent>,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            channels,
            pipeline,
            settings,
            events,
            running,
            capture_overruns: None,
            summary: WorkerSummary::default(),
        }
    }

    /// Report the capture side's overrun counter alongside analysis metrics
    pub fn with_capture_overruns(mut self, overruns: Arc<AtomicU64>) -> Self {
        self.capture_overruns = Some(overruns);
        self
    }

    /// Loop until `running` is cleared
    ///
    /// Returns an error only for `OutOfOrderSample`, which ends the stream.
    pub fn run(mut self) -> Result<WorkerSummary, AnalysisError> {
        tracing::info!(
            sample_rate = self.settings.sample_rate,
            max_backlog = self.settings.max_backlog,
            "[AnalysisThread] Starting analysis loop"
        );

        let result = self.run_loop();

        let discarded = self.pipeline.reset();
        if discarded != SegmenterPhase::Idle {
            tracing::debug!(?discarded, "[AnalysisThread] Discarding open note on stop");
        }
        tracing::info!(
            processed = self.summary.windows_processed,
            dropped = self.summary.windows_dropped,
            notes = self.summary.notes_completed,
            "[AnalysisThread] Analysis loop stopped"
        );

        result.map(|()| self.summary)
    }

    fn run_loop(&mut self) -> Result<(), AnalysisError> {
        while self.running.load(Ordering::SeqCst) {
            self.shed_backlog();

            let window = match self.channels.data_consumer.pop() {
                Ok(window) => window,
                Err(PopError::Empty) => {
                    // Small sleep to avoid busy loop when empty
                    thread::sleep(Duration::from_millis(1));
                    continue;
                }
            };

            let started = Instant::now();
            let view = SampleWindow::at_frame(
                &window.samples,
                self.settings.sample_rate,
                window.start_frame,
            );
            let outcome = self.pipeline.process(&view);
            self.channels.recycle(window);

            match outcome {
                Ok(step) => {
                    self.summary.windows_processed += 1;
                    tracing::trace!(
                        label = %step.label,
                        frequency = ?step.reading.frequency,
                        amplitude = step.reading.amplitude,
                        "[AnalysisThread] Window classified"
                    );
                    for event in step.events {
                        self.handle_event(event);
                    }
                }
                Err(err @ AnalysisError::InsufficientSamples { .. }) => {
                    tracing::debug!("[AnalysisThread] Skipping window: {}", err);
                }
                Err(err) => {
                    log_analysis_error(&err, "AnalysisWorker::run");
                    telemetry::hub().record_error(&err, "AnalysisWorker::run");
                    return Err(err);
                }
            }

            telemetry::hub()
                .record_analysis_time(started.elapsed().as_secs_f32() * 1000.0);
            telemetry::hub()
                .record_queue_occupancy("analysis_queue", self.channels.occupancy_percent());
            if let Some(overruns) = self.capture_overruns.as_ref() {
                telemetry::hub().record_capture_overruns(overruns.load(Ordering::Relaxed));
            }
        }
        Ok(())
    }

    fn shed_backlog(&mut self) {
        let dropped = self.channels.shed_backlog(self.settings.max_backlog) as u64;
        if dropped > 0 {
            self.summary.windows_dropped += dropped;
            tracing::warn!(
                dropped,
                total = self.summary.windows_dropped,
                "[AnalysisThread] Analysis behind capture, dropped oldest windows"
            );
            telemetry::hub().record_windows_dropped(dropped);
        }
    }

    fn handle_event(&mut self, event: SegmentEvent) {
        match event {
            SegmentEvent::Confirmed { note, start } => {
                tracing::info!(
                    note = %note,
                    start_ms = start.as_millis() as u64,
                    "[AnalysisThread] Note started"
                );
            }
            SegmentEvent::Completed(note_event) => {
                self.summary.notes_completed += 1;
                tracing::info!(
                    note = %note_event.note,
                    start_ms = note_event.start.as_millis() as u64,
                    duration_ms = note_event.duration().as_millis() as u64,
                    "[AnalysisThread] Note completed"
                );
                telemetry::hub().record_note(&note_event);

                match self.events.try_send(note_event) {
                    Ok(()) => self.summary.notes_forwarded += 1,
                    Err(TrySendError::Full(dropped)) => {
                        tracing::warn!(
                            note = %dropped.note,
                            "[AnalysisThread] Dispatcher backlog full, dropping note"
                        );
                        telemetry::hub()
                            .record_command_dropped(None, "dispatcher channel full");
                    }
                    Err(TrySendError::Closed(_)) => {
                        tracing::warn!("[AnalysisThread] Dispatcher gone, note not forwarded");
                    }
                }
            }
        }
    }
}

/// Spawn the analysis thread
pub fn spawn_analysis_thread(
    worker: AnalysisWorker,
) -> std::io::Result<JoinHandle<Result<WorkerSummary, AnalysisError>>> {
    thread::Builder::new()
        .name("note-analysis".to_string())
        .spawn(move || worker.run())
}
