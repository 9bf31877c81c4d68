//! Microphone backend on the default cpal input device.
//!
//! `cpal::Stream` is not `Send` on every platform, so this backend (and the
//! engine holding it) stays on the thread that created it.

use crate::audio::buffer_pool::CaptureChannels;
use crate::audio::capture::CaptureStream;
use crate::error::AudioError;

use super::{CaptureBackend, CaptureInfo};

pub struct CpalBackend {
    preferred_rate: u32,
    stream: Option<CaptureStream>,
}

impl CpalBackend {
    pub fn new(preferred_rate: u32) -> Self {
        Self {
            preferred_rate,
            stream: None,
        }
    }

    /// Name of the open input device
    pub fn device_name(&self) -> Option<&str> {
        self.stream.as_ref().map(CaptureStream::device_name)
    }
}

impl CaptureBackend for CpalBackend {
    fn start(&mut self, channels: CaptureChannels) -> Result<CaptureInfo, AudioError> {
        if self.stream.is_some() {
            return Err(AudioError::AlreadyRunning);
        }

        let stream = CaptureStream::open(self.preferred_rate, channels)?;
        stream.play()?;

        if stream.sample_rate() != self.preferred_rate {
            tracing::warn!(
                requested = self.preferred_rate,
                actual = stream.sample_rate(),
                "Input device does not support requested sample rate"
            );
        }

        let info = CaptureInfo {
            sample_rate: stream.sample_rate(),
            overruns: stream.overruns(),
        };
        self.stream = Some(stream);
        Ok(info)
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        // Dropping the stream stops the callback
        self.stream.take().map(drop).ok_or(AudioError::NotRunning)
    }
}
