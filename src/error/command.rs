// Command channel error types and constants

use crate::error::ErrorCode;
use log::warn;
use std::fmt;

/// Command channel error code constants
///
/// Error code range: 4001-4004
pub struct CommandErrorCodes;

impl CommandErrorCodes {
    /// Could not connect to the control server
    pub const CONNECT_FAILED: i32 = 4001;

    /// Writing a command to the socket failed
    pub const SEND_FAILED: i32 = 4002;

    /// No connection is currently open
    pub const NOT_CONNECTED: i32 = 4003;

    /// A received line is not a valid control message
    pub const MALFORMED_MESSAGE: i32 = 4004;
}

/// Log a command channel error
///
/// Command failures are recoverable, so they are reported at warn level.
pub fn log_command_error(err: &CommandError, context: &str) {
    warn!(
        "Command error in {}: code={}, component=CommandChannel, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors on the command channel between recognizer and executor
#[derive(Debug, Clone, PartialEq)]
pub enum CommandError {
    ConnectFailed { addr: String, reason: String },
    SendFailed { reason: String },
    NotConnected,
    MalformedMessage { line: String, reason: String },
}

impl ErrorCode for CommandError {
    fn code(&self) -> i32 {
        match self {
            CommandError::ConnectFailed { .. } => CommandErrorCodes::CONNECT_FAILED,
            CommandError::SendFailed { .. } => CommandErrorCodes::SEND_FAILED,
            CommandError::NotConnected => CommandErrorCodes::NOT_CONNECTED,
            CommandError::MalformedMessage { .. } => CommandErrorCodes::MALFORMED_MESSAGE,
        }
    }

    fn message(&self) -> String {
        match self {
            CommandError::ConnectFailed { addr, reason } => {
                format!("Could not connect to control server at {}: {}", addr, reason)
            }
            CommandError::SendFailed { reason } => format!("Failed to send command: {}", reason),
            CommandError::NotConnected => "Not connected to control server".to_string(),
            CommandError::MalformedMessage { line, reason } => {
                format!("Malformed control message {:?}: {}", line, reason)
            }
        }
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CommandError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for CommandError {}

impl From<std::io::Error> for CommandError {
    fn from(err: std::io::Error) -> Self {
        CommandError::SendFailed {
            reason: err.to_string(),
        }
    }
}
