//! Core telemetry event types describing pipeline and command channel
//! health, exposed to the CLI tools and log subscribers.

use serde::{Deserialize, Serialize};

use crate::analysis::classifier::Note;
use crate::command::Command;

/// Metric events covering queue pressure, recognition and command delivery.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum MetricEvent {
    /// Oldest queued windows were discarded to keep up with capture
    WindowsDropped {
        count: u64,
        total: u64,
    },
    /// Capture callback found no free buffer
    CaptureOverrun {
        total: u64,
    },
    QueueOccupancy {
        channel: String,
        percent: f32,
    },
    /// Rolling per-window analysis time
    AnalysisLatency {
        avg_ms: f32,
        max_ms: f32,
        sample_count: usize,
    },
    NoteCompleted {
        note: Note,
        start_ms: f64,
        duration_ms: f64,
    },
    CommandSent {
        command: Command,
    },
    CommandDropped {
        command: Option<Command>,
        reason: String,
    },
    Error {
        code: i32,
        context: String,
    },
}
