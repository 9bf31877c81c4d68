// Note Control Core - recorder notes to game commands
// Real-time pitch recognition with a lock-free capture pipeline

// Module declarations
pub mod analysis;
pub mod audio;
pub mod calibration;
pub mod command;
pub mod config;
pub mod control;
pub mod engine;
pub mod error;
pub mod fixtures;
pub mod telemetry;

use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber used by every binary
///
/// `RUST_LOG` overrides `default_filter`. Records from the `log` facade are
/// forwarded as well. Calling this twice is harmless.
pub fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
