// Control server loop - one client at a time, one JSON message per line

use std::future::Future;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;

use crate::command::decode_line;
use crate::control::controller::{ControlExecutor, Flow, InputSink};
use crate::error::log_command_error;

/// Counters reported when the server stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerStats {
    pub clients: u64,
    pub handled: u64,
    pub malformed: u64,
}

/// Serve control clients until `exit` arrives or `shutdown` resolves
///
/// Clients are handled sequentially; a new connection is accepted only after
/// the previous client disconnects. Malformed lines are logged and skipped.
pub async fn run_control_server<S, F>(
    listener: TcpListener,
    executor: &mut ControlExecutor<S>,
    shutdown: F,
) -> anyhow::Result<ServerStats>
where
    S: InputSink,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut stats = ServerStats::default();

    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "Control server listening");
    }

    'serve: loop {
        let (socket, peer) = tokio::select! {
            _ = &mut shutdown => break 'serve,
            accepted = listener.accept() => accepted.context("accepting control client")?,
        };
        stats.clients += 1;
        tracing::info!(%peer, "Note client connected");

        let mut lines = BufReader::new(socket).lines();
        loop {
            let line = tokio::select! {
                _ = &mut shutdown => break 'serve,
                line = lines.next_line() => line,
            };

            let line = match line {
                Ok(Some(line)) => line,
                Ok(None) => {
                    tracing::info!(%peer, "Note client disconnected");
                    break;
                }
                Err(err) => {
                    tracing::warn!(%peer, error = %err, "Control client read failed");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            match decode_line(&line) {
                Ok(message) => {
                    stats.handled += 1;
                    if executor.handle(message) == Flow::Exit {
                        tracing::info!("Exit requested by client");
                        break 'serve;
                    }
                }
                Err(err) => {
                    stats.malformed += 1;
                    log_command_error(&err, "run_control_server");
                }
            }
        }
    }

    executor.shutdown();
    tracing::info!(
        clients = stats.clients,
        handled = stats.handled,
        malformed = stats.malformed,
        "Control server stopped"
    );
    Ok(stats)
}
