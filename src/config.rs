//! Configuration management for recognition and control tuning
//!
//! This module provides runtime configuration loading from JSON files,
//! so note bands and timing thresholds can be recalibrated for a different
//! instrument or room without recompiling. Every section has defaults that
//! match the recorder the system was first tuned on.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::analysis::classifier::{default_band_table, NoteBand, NoteBands};
use crate::analysis::estimator::{EstimatorSettings, DEFAULT_VOLUME_THRESHOLD};
use crate::analysis::segmenter::SegmenterConfig;
use crate::command::{default_note_actions, NoteAction};
use crate::error::ConfigError;

/// Default location of the config file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "assets/note_config.json";

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub recognition: RecognitionConfig,
    pub audio: AudioConfig,
    pub command: CommandConfig,
    pub controller: ControllerConfig,
}

/// Note recognition parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// A note must be held this long before it counts
    pub min_note_duration_ms: u64,
    /// Silence this long ends a held note
    pub silence_threshold_ms: u64,
    /// Gap after which a different note may take over immediately
    pub dropout_tolerance_ms: u64,
    /// Mean absolute level below which a window is silence
    pub volume_threshold: f32,
    /// Rolling median length over frequency readings (<= 1 disables)
    pub smoothing_window: usize,
    /// Calibrated frequency band per note
    pub note_bands: Vec<NoteBand>,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            min_note_duration_ms: 50,
            silence_threshold_ms: 100,
            dropout_tolerance_ms: 50,
            // 200 on the int16 scale
            volume_threshold: DEFAULT_VOLUME_THRESHOLD,
            smoothing_window: 5,
            note_bands: default_band_table(),
        }
    }
}

impl RecognitionConfig {
    pub fn segmenter_config(&self) -> SegmenterConfig {
        SegmenterConfig {
            min_note_duration: Duration::from_millis(self.min_note_duration_ms),
            silence_threshold: Duration::from_millis(self.silence_threshold_ms),
            dropout_tolerance: Duration::from_millis(self.dropout_tolerance_ms),
        }
    }

    /// Validated band table
    pub fn bands(&self) -> Result<NoteBands, ConfigError> {
        NoteBands::new(self.note_bands.clone())
    }
}

/// Audio capture and analysis window parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Preferred capture sample rate
    pub sample_rate: u32,
    /// Samples per analysis window
    pub window_size: usize,
    /// Shortest window the estimator accepts
    pub min_window_samples: usize,
    /// Lowest frequency the estimator reports
    pub min_frequency_hz: f32,
    /// Highest frequency the estimator reports
    pub max_frequency_hz: f32,
    /// Number of preallocated window buffers
    pub buffer_pool_size: usize,
    /// Filled windows allowed to queue before the oldest are dropped
    pub max_backlog: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            window_size: 4096,
            min_window_samples: 256,
            min_frequency_hz: 500.0,
            max_frequency_hz: 3000.0,
            buffer_pool_size: 16,
            max_backlog: 4,
        }
    }
}

impl AudioConfig {
    pub fn estimator_settings(&self, volume_threshold: f32) -> EstimatorSettings {
        EstimatorSettings {
            min_samples: self.min_window_samples,
            volume_threshold,
            min_frequency_hz: self.min_frequency_hz,
            max_frequency_hz: self.max_frequency_hz,
        }
    }
}

/// Command channel parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    pub host: String,
    pub port: u16,
    /// Note events buffered between analysis thread and dispatcher
    pub channel_capacity: usize,
    pub note_actions: Vec<NoteAction>,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9999,
            channel_capacity: 64,
            note_actions: default_note_actions(),
        }
    }
}

impl CommandConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Mouse controller geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Pixels moved per directional command
    pub move_step: i32,
    /// Largest single pointer step when a movement is split up
    pub max_step_px: i32,
    /// Offset of each card relative to card 1
    pub card_offsets: Vec<[i32; 2]>,
    /// Drag that takes a held card off the board
    pub reset_drag: [i32; 2],
    /// Move back to card 1 after a reset drag
    pub reset_return: [i32; 2],
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            move_step: 50,
            max_step_px: 10,
            card_offsets: vec![[0, 0], [103, 0], [180, 0], [270, 0]],
            reset_drag: [-1000, 1000],
            reset_return: [550, -80],
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// Falls back to defaults with a warning if the file is missing or
    /// invalid, so the tools always start.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match Self::try_load(&path) {
            Ok(config) => {
                log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                config
            }
            Err(err) => {
                log::warn!("[Config] {}. Using defaults.", err);
                Self::default()
            }
        }
    }

    /// Load and validate configuration, reporting any failure
    pub fn try_load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let display = path.as_ref().display().to_string();
        let contents = fs::read_to_string(&path).map_err(|err| ConfigError::Io {
            path: display.clone(),
            reason: err.to_string(),
        })?;
        let config: AppConfig = serde_json::from_str(&contents).map_err(|err| ConfigError::Parse {
            path: display,
            reason: err.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the default location
    pub fn load() -> Self {
        Self::load_from_file(DEFAULT_CONFIG_PATH)
    }

    /// Check cross-field invariants
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.recognition.segmenter_config().validate()?;
        self.recognition.bands()?;

        let volume = self.recognition.volume_threshold;
        if !volume.is_finite() || volume < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "recognition.volume_threshold".to_string(),
                reason: format!("must be non-negative, got {}", volume),
            });
        }

        let audio = &self.audio;
        if audio.sample_rate == 0 || audio.window_size < audio.min_window_samples.max(2) {
            return Err(ConfigError::InvalidValue {
                field: "audio.window_size".to_string(),
                reason: format!(
                    "window of {} samples at {} Hz is below the {} sample minimum",
                    audio.window_size, audio.sample_rate, audio.min_window_samples
                ),
            });
        }
        // One buffer is always being filled, so shedding must trigger before
        // the capture side runs out of buffers
        if audio.max_backlog == 0 || audio.max_backlog + 1 >= audio.buffer_pool_size {
            return Err(ConfigError::InvalidValue {
                field: "audio.max_backlog".to_string(),
                reason: format!(
                    "backlog of {} needs to be at least 1 and below {} (buffer pool size minus one)",
                    audio.max_backlog,
                    audio.buffer_pool_size.saturating_sub(1)
                ),
            });
        }
        if audio.min_frequency_hz >= audio.max_frequency_hz {
            return Err(ConfigError::InvalidBands {
                reason: format!(
                    "frequency range [{}, {}] is empty",
                    audio.min_frequency_hz, audio.max_frequency_hz
                ),
            });
        }

        Ok(())
    }
}
