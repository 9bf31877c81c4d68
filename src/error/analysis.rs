// Analysis error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;
use std::time::Duration;

/// Analysis error code constants
///
/// Error code range: 2001-2003
pub struct AnalysisErrorCodes;

impl AnalysisErrorCodes {
    /// Window shorter than the estimator's minimum sample count
    pub const INSUFFICIENT_SAMPLES: i32 = 2001;

    /// Reading timestamp did not advance past the previous one
    pub const OUT_OF_ORDER_SAMPLE: i32 = 2002;

    /// Window metadata cannot be analysed (e.g. zero sample rate)
    pub const INVALID_WINDOW: i32 = 2003;
}

/// Log an analysis error with structured context
pub fn log_analysis_error(err: &AnalysisError, context: &str) {
    error!(
        "Analysis error in {}: code={}, component=NotePipeline, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised by the recognition pipeline
///
/// `InsufficientSamples` is recoverable: the caller buffers more audio and
/// tries again with a longer window. `OutOfOrderSample` is fatal to the
/// stream instance that produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// Window is too short to estimate a frequency
    InsufficientSamples { required: usize, actual: usize },

    /// Timestamps must strictly increase within one stream
    OutOfOrderSample {
        previous: Duration,
        current: Duration,
    },

    /// Window cannot be analysed
    InvalidWindow { reason: String },
}

impl ErrorCode for AnalysisError {
    fn code(&self) -> i32 {
        match self {
            AnalysisError::InsufficientSamples { .. } => AnalysisErrorCodes::INSUFFICIENT_SAMPLES,
            AnalysisError::OutOfOrderSample { .. } => AnalysisErrorCodes::OUT_OF_ORDER_SAMPLE,
            AnalysisError::InvalidWindow { .. } => AnalysisErrorCodes::INVALID_WINDOW,
        }
    }

    fn message(&self) -> String {
        match self {
            AnalysisError::InsufficientSamples { required, actual } => {
                format!("Insufficient samples: need {}, got {}", required, actual)
            }
            AnalysisError::OutOfOrderSample { previous, current } => format!(
                "Out-of-order sample: {:.1} ms does not follow {:.1} ms",
                current.as_secs_f64() * 1000.0,
                previous.as_secs_f64() * 1000.0
            ),
            AnalysisError::InvalidWindow { reason } => format!("Invalid window: {}", reason),
        }
    }
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AnalysisError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for AnalysisError {}
