//! Replay backend feeding a recording through the capture path.
//!
//! Samples are pushed through the same `WindowAssembler` the device callback
//! uses, in callback-sized chunks paced at the recording's sample rate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::audio::buffer_pool::CaptureChannels;
use crate::audio::capture::WindowAssembler;
use crate::error::AudioError;

use super::{CaptureBackend, CaptureInfo};

const DEFAULT_CHUNK_FRAMES: usize = 512;

pub struct ReplayBackend {
    samples: Arc<Vec<f32>>,
    sample_rate: u32,
    chunk_frames: usize,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ReplayBackend {
    /// Replay mono `samples` recorded at `sample_rate`
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples: Arc::new(samples),
            sample_rate,
            chunk_frames: DEFAULT_CHUNK_FRAMES,
            stop: Arc::new(AtomicBool::new(false)),
            thread: None,
        }
    }

    /// True once every sample has been delivered
    pub fn is_finished(&self) -> bool {
        self.thread
            .as_ref()
            .map(JoinHandle::is_finished)
            .unwrap_or(false)
    }
}

impl CaptureBackend for ReplayBackend {
    fn start(&mut self, channels: CaptureChannels) -> Result<CaptureInfo, AudioError> {
        if self.thread.is_some() {
            return Err(AudioError::AlreadyRunning);
        }
        if self.sample_rate == 0 {
            return Err(AudioError::StreamOpenFailed {
                reason: "Recording has no sample rate".to_string(),
            });
        }

        let mut assembler = WindowAssembler::new(channels);
        let overruns = assembler.overruns();
        let samples = Arc::clone(&self.samples);
        let stop = Arc::clone(&self.stop);
        let chunk_frames = self.chunk_frames;
        let chunk_period =
            Duration::from_secs_f64(chunk_frames as f64 / f64::from(self.sample_rate));
        stop.store(false, Ordering::SeqCst);

        let thread = thread::Builder::new()
            .name("note-replay".to_string())
            .spawn(move || {
                for chunk in samples.chunks(chunk_frames) {
                    if stop.load(Ordering::SeqCst) {
                        break;
                    }
                    assembler.push_interleaved(chunk, 1);
                    thread::sleep(chunk_period);
                }
                tracing::debug!(frames = assembler.frames_seen(), "Replay finished");
            })
            .map_err(|err| AudioError::HardwareError {
                details: format!("Failed to spawn replay thread: {}", err),
            })?;

        self.thread = Some(thread);
        Ok(CaptureInfo {
            sample_rate: self.sample_rate,
            overruns,
        })
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        let thread = self.thread.take().ok_or(AudioError::NotRunning)?;
        self.stop.store(true, Ordering::SeqCst);
        thread.join().map_err(|_| AudioError::StreamFailure {
            reason: "Replay thread panicked".to_string(),
        })
    }
}
