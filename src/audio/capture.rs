// Microphone capture - cpal input stream feeding the window pool
//
// The cpal callback takes the first channel of each frame and packs it into
// fixed-size windows borrowed from the buffer pool. Every window is stamped
// with the stream frame of its first sample, so analysis timestamps follow
// the audio clock even when windows are dropped along the way.
//
// The callback never allocates or blocks. When the pool is empty the
// incoming audio is discarded and an overrun is counted. With a validated
// config the analysis thread sheds the oldest queued windows first, so the
// pool only runs dry while analysis is fully stalled.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};

use super::buffer_pool::{AudioWindow, CaptureChannels};
use crate::error::AudioError;

/// Packs interleaved device frames into pooled analysis windows
pub struct WindowAssembler {
    channels: CaptureChannels,
    current: Option<AudioWindow>,
    fill: usize,
    next_frame: u64,
    starved: bool,
    overruns: Arc<AtomicU64>,
}

impl WindowAssembler {
    pub fn new(channels: CaptureChannels) -> Self {
        Self {
            channels,
            current: None,
            fill: 0,
            next_frame: 0,
            starved: false,
            overruns: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Shared overrun counter, readable from other threads
    pub fn overruns(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.overruns)
    }

    /// Frames seen so far, including discarded ones
    pub fn frames_seen(&self) -> u64 {
        self.next_frame
    }

    /// Consume one callback's worth of interleaved samples
    pub fn push_interleaved<T>(&mut self, data: &[T], channel_count: usize)
    where
        T: Sample,
        f32: FromSample<T>,
    {
        for frame in data.chunks(channel_count.max(1)) {
            let sample = frame[0].to_sample::<f32>();
            self.push_sample(sample);
        }
    }

    fn push_sample(&mut self, sample: f32) {
        let frame = self.next_frame;
        self.next_frame += 1;

        if self.current.is_none() {
            match self.channels.pool_consumer.pop() {
                Ok(mut window) => {
                    window.start_frame = frame;
                    self.current = Some(window);
                    self.fill = 0;
                    self.starved = false;
                }
                Err(_) => {
                    if !self.starved {
                        self.overruns.fetch_add(1, Ordering::Relaxed);
                        self.starved = true;
                    }
                    return;
                }
            }
        }

        let Some(window) = self.current.as_mut() else {
            return;
        };
        window.samples[self.fill] = sample;
        self.fill += 1;

        if self.fill == window.samples.len() {
            if let Some(full) = self.current.take() {
                if let Err(rtrb::PushError::Full(rejected)) = self.channels.data_producer.push(full)
                {
                    // Keep the buffer and overwrite it with the next window
                    self.overruns.fetch_add(1, Ordering::Relaxed);
                    self.current = Some(rejected);
                    if let Some(window) = self.current.as_mut() {
                        window.start_frame = self.next_frame;
                    }
                }
            }
            self.fill = 0;
        }
    }
}

/// Running input stream and the format it negotiated
pub struct CaptureStream {
    stream: cpal::Stream,
    sample_rate: u32,
    channel_count: u16,
    device_name: String,
    overruns: Arc<AtomicU64>,
}

impl CaptureStream {
    /// Open the default input device, preferring `preferred_rate`
    pub fn open(preferred_rate: u32, channels: CaptureChannels) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| AudioError::StreamOpenFailed {
                reason: "No default input device found".to_string(),
            })?;
        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());

        let config = choose_input_config(&device, preferred_rate)?;
        let sample_rate = config.sample_rate().0;
        let channel_count = config.channels();
        let stream_config: cpal::StreamConfig = config.clone().into();

        let assembler = WindowAssembler::new(channels);
        let overruns = assembler.overruns();

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => build_stream::<f32>,
            cpal::SampleFormat::I16 => build_stream::<i16>,
            cpal::SampleFormat::U16 => build_stream::<u16>,
            other => {
                return Err(AudioError::StreamOpenFailed {
                    reason: format!("Unsupported sample format {:?}", other),
                })
            }
        }(&device, &stream_config, assembler)?;

        tracing::info!(
            device = %device_name,
            sample_rate,
            channels = channel_count,
            format = ?config.sample_format(),
            "Opened input stream"
        );

        Ok(Self {
            stream,
            sample_rate,
            channel_count,
            device_name,
            overruns,
        })
    }

    pub fn play(&self) -> Result<(), AudioError> {
        self.stream.play().map_err(|e| AudioError::HardwareError {
            details: format!("Input start failed: {}", e),
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn overruns(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.overruns)
    }
}

/// Pick the supported config closest to `target_rate`, preferring f32
fn choose_input_config(
    device: &cpal::Device,
    target_rate: u32,
) -> Result<cpal::SupportedStreamConfig, AudioError> {
    let ranges = device
        .supported_input_configs()
        .map_err(|e| AudioError::StreamOpenFailed {
            reason: format!("Failed to query input configs: {}", e),
        })?;

    let mut best: Option<cpal::SupportedStreamConfig> = None;
    let mut best_score = i32::MIN;
    for range in ranges {
        let min = range.min_sample_rate().0;
        let max = range.max_sample_rate().0;
        let rate = target_rate.clamp(min, max);
        let cfg = range.with_sample_rate(cpal::SampleRate(rate));

        let mut score = 0;
        if cfg.sample_rate().0 == target_rate {
            score += 2;
        }
        if cfg.sample_format() == cpal::SampleFormat::F32 {
            score += 1;
        }

        if score > best_score {
            best_score = score;
            best = Some(cfg);
        }
    }

    match best {
        Some(cfg) => Ok(cfg),
        None => device
            .default_input_config()
            .map_err(|e| AudioError::StreamOpenFailed {
                reason: format!("Failed to get default input config: {}", e),
            }),
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut assembler: WindowAssembler,
) -> Result<cpal::Stream, AudioError>
where
    T: Sample + SizedSample,
    f32: FromSample<T>,
{
    let channel_count = config.channels as usize;
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                assembler.push_interleaved(data, channel_count);
            },
            |err| tracing::error!("Input stream error: {}", err),
            None,
        )
        .map_err(|e| AudioError::StreamOpenFailed {
            reason: format!("{:?}", e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::buffer_pool::BufferPool;

    #[test]
    fn test_assembler_stamps_consecutive_windows() {
        let (capture, mut analysis) = BufferPool::new(4, 4).split();
        let mut assembler = WindowAssembler::new(capture);

        let samples: Vec<f32> = (0..10).map(|i| i as f32).collect();
        assembler.push_interleaved(&samples, 1);

        let first = analysis.data_consumer.pop().unwrap();
        let second = analysis.data_consumer.pop().unwrap();
        assert!(analysis.data_consumer.pop().is_err(), "Third window is partial");

        assert_eq!(first.start_frame, 0);
        assert_eq!(first.samples, vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(second.start_frame, 4);
        assert_eq!(second.samples, vec![4.0, 5.0, 6.0, 7.0]);
        assert_eq!(assembler.frames_seen(), 10);
    }

    #[test]
    fn test_assembler_takes_first_channel() {
        let (capture, mut analysis) = BufferPool::new(2, 3).split();
        let mut assembler = WindowAssembler::new(capture);

        // Interleaved stereo: left = 1, 2, 3; right = -1
        assembler.push_interleaved(&[1.0_f32, -1.0, 2.0, -1.0, 3.0, -1.0], 2);

        let window = analysis.data_consumer.pop().unwrap();
        assert_eq!(window.samples, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_assembler_converts_integer_samples() {
        let (capture, mut analysis) = BufferPool::new(2, 2).split();
        let mut assembler = WindowAssembler::new(capture);

        assembler.push_interleaved(&[i16::MAX, 0_i16], 1);

        let window = analysis.data_consumer.pop().unwrap();
        assert!((window.samples[0] - 1.0).abs() < 1e-3);
        assert_eq!(window.samples[1], 0.0);
    }

    #[test]
    fn test_assembler_counts_overrun_when_pool_empty() {
        let (capture, mut analysis) = BufferPool::new(2, 2).split();
        let mut assembler = WindowAssembler::new(capture);
        let overruns = assembler.overruns();

        // Two windows fill the pool, the next four frames have nowhere to go
        assembler.push_interleaved(&[0.1_f32; 8], 1);
        assert_eq!(overruns.load(Ordering::Relaxed), 1, "One overrun per starved stretch");

        // Free one window; capture resumes with a truthful frame stamp
        let window = analysis.data_consumer.pop().unwrap();
        analysis.recycle(window);
        assembler.push_interleaved(&[0.2_f32; 2], 1);

        let _second = analysis.data_consumer.pop().unwrap();
        let resumed = analysis.data_consumer.pop().unwrap();
        assert_eq!(resumed.start_frame, 8);
        assert_eq!(resumed.samples, vec![0.2, 0.2]);
    }
}
