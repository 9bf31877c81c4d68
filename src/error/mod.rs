// Error types for the note controller
//
// This module defines custom error types for audio capture, note analysis,
// configuration and the command channel, each carrying a stable numeric code
// so log lines and the CLI can report failures consistently.

mod analysis;
mod audio;
mod command;
mod config;

pub use analysis::{log_analysis_error, AnalysisError, AnalysisErrorCodes};
pub use audio::{log_audio_error, AudioError, AudioErrorCodes};
pub use command::{log_command_error, CommandError, CommandErrorCodes};
pub use config::{ConfigError, ConfigErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the library and the binaries.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
