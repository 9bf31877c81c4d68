//! Capture backends for the recognition engine.

use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use crate::audio::buffer_pool::CaptureChannels;
use crate::error::AudioError;

mod cpal;
pub use cpal::CpalBackend;

mod replay;
pub use replay::ReplayBackend;

/// What a backend reports once capture is running.
#[derive(Debug, Clone)]
pub struct CaptureInfo {
    pub sample_rate: u32,
    /// Starved stretches on the capture side, shared with analysis telemetry
    pub overruns: Arc<AtomicU64>,
}

/// Source of audio windows for the engine.
///
/// A backend owns whatever drives the capture side of the buffer pool: a
/// device callback, or a thread replaying a recording.
pub trait CaptureBackend {
    fn start(&mut self, channels: CaptureChannels) -> Result<CaptureInfo, AudioError>;
    fn stop(&mut self) -> Result<(), AudioError>;
}
