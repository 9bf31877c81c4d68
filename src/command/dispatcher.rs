// Command dispatcher - forwards recognized notes to the control server
//
// Runs as a tokio task fed by a bounded mpsc channel from the analysis
// thread. Each note event is mapped to a command and written as one JSON
// line. A failed write drops that command, closes the socket and lets the
// next command reconnect. Commands are never retried.

use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::analysis::segmenter::NoteEvent;
use crate::command::{encode_line, Command, ControlMessage, NoteActions};
use crate::error::{log_command_error, CommandError};
use crate::telemetry;

const CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

/// Delivery counters reported when the dispatcher stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub sent: u64,
    pub dropped: u64,
    pub unmapped: u64,
}

/// Maps note events to commands and delivers them over TCP
pub struct CommandDispatcher {
    addr: String,
    actions: NoteActions,
    stream: Option<TcpStream>,
    stats: DispatchStats,
}

impl CommandDispatcher {
    pub fn new(addr: impl Into<String>, actions: NoteActions) -> Self {
        Self {
            addr: addr.into(),
            actions,
            stream: None,
            stats: DispatchStats::default(),
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Open the connection now instead of on the first command
    pub async fn connect(&mut self) -> Result<(), CommandError> {
        let connect_failed = |reason: String| CommandError::ConnectFailed {
            addr: self.addr.clone(),
            reason,
        };
        let stream = timeout(CONNECT_TIMEOUT, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| connect_failed("timed out".to_string()))?
            .map_err(|err| connect_failed(err.to_string()))?;
        let _ = stream.set_nodelay(true);

        tracing::info!(addr = %self.addr, "Connected to control server");
        self.stream = Some(stream);
        Ok(())
    }

    /// Send one message, connecting first if needed
    ///
    /// On failure the socket is closed so the next send reconnects.
    pub async fn send(&mut self, message: &ControlMessage) -> Result<(), CommandError> {
        let line = encode_line(message)?;
        if self.stream.is_none() {
            self.connect().await?;
        }
        let stream = self.stream.as_mut().ok_or(CommandError::NotConnected)?;

        if let Err(err) = stream.write_all(line.as_bytes()).await {
            self.stream = None;
            return Err(err.into());
        }
        Ok(())
    }

    /// Map a completed note to its command and deliver it
    ///
    /// Returns the command if it was sent.
    pub async fn dispatch(&mut self, event: &NoteEvent) -> Option<Command> {
        let Some(command) = self.actions.command_for(event.note) else {
            self.stats.unmapped += 1;
            tracing::debug!(note = %event.note, "No command mapped for note");
            return None;
        };

        match self.send(&ControlMessage::from(command)).await {
            Ok(()) => {
                self.stats.sent += 1;
                tracing::info!(
                    note = %event.note,
                    command = %command,
                    duration_ms = event.duration().as_millis() as u64,
                    "Command sent"
                );
                telemetry::hub().record_command_sent(command);
                Some(command)
            }
            Err(err) => {
                self.stats.dropped += 1;
                log_command_error(&err, "CommandDispatcher::dispatch");
                telemetry::hub().record_command_dropped(Some(command), err.to_string());
                telemetry::hub().record_error(&err, "CommandDispatcher::dispatch");
                None
            }
        }
    }

    /// Drain `events` until every sender is gone, then say goodbye
    pub async fn run(mut self, mut events: mpsc::Receiver<NoteEvent>) -> DispatchStats {
        tracing::info!(addr = %self.addr, "Command dispatcher started");

        while let Some(event) = events.recv().await {
            self.dispatch(&event).await;
        }

        self.shutdown().await;
        tracing::info!(
            sent = self.stats.sent,
            dropped = self.stats.dropped,
            unmapped = self.stats.unmapped,
            "Command dispatcher stopped"
        );
        self.stats
    }

    /// Send `exit` if connected and close the socket
    pub async fn shutdown(&mut self) {
        if self.stream.is_none() {
            return;
        }
        if let Err(err) = self.send(&ControlMessage::Exit).await {
            log_command_error(&err, "CommandDispatcher::shutdown");
        }
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::classifier::Note;
    use crate::command::decode_line;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::TcpListener;

    fn note(note: Note) -> NoteEvent {
        NoteEvent {
            note,
            start: Duration::ZERO,
            end: Duration::from_millis(200),
        }
    }

    #[tokio::test]
    async fn test_dispatch_writes_json_lines() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let reader = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut lines = BufReader::new(socket).lines();
            let mut received = Vec::new();
            while let Some(line) = lines.next_line().await.unwrap() {
                received.push(decode_line(&line).unwrap());
            }
            received
        });

        let mut dispatcher = CommandDispatcher::new(addr, NoteActions::default());
        assert_eq!(dispatcher.dispatch(&note(Note::D)).await, Some(Command::MoveUp));
        assert_eq!(dispatcher.dispatch(&note(Note::A)).await, Some(Command::Place));
        dispatcher.shutdown().await;

        let received = reader.await.unwrap();
        assert_eq!(
            received,
            vec![
                ControlMessage::MoveUp,
                ControlMessage::Place,
                ControlMessage::Exit
            ]
        );
        assert_eq!(dispatcher.stats().sent, 2);
    }

    #[tokio::test]
    async fn test_unreachable_server_drops_command() {
        // Bind then release a port so nothing is listening on it
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().to_string()
        };

        let mut dispatcher = CommandDispatcher::new(addr, NoteActions::default());
        assert_eq!(dispatcher.dispatch(&note(Note::C)).await, None);
        assert_eq!(dispatcher.dispatch(&note(Note::E)).await, None);

        let stats = dispatcher.stats();
        assert_eq!(stats.dropped, 2, "Each failed command is dropped once");
        assert_eq!(stats.sent, 0);
        assert!(!dispatcher.is_connected());
    }

    #[tokio::test]
    async fn test_unmapped_note_is_skipped() {
        let mut dispatcher = CommandDispatcher::new("127.0.0.1:1", NoteActions::new(&[]));
        assert_eq!(dispatcher.dispatch(&note(Note::G)).await, None);
        assert_eq!(dispatcher.stats().unmapped, 1);
        assert_eq!(dispatcher.stats().dropped, 0);
    }

    #[tokio::test]
    async fn test_run_stops_when_senders_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let reader = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut lines = BufReader::new(socket).lines();
            let mut count = 0;
            while lines.next_line().await.unwrap().is_some() {
                count += 1;
            }
            count
        });

        let (tx, rx) = mpsc::channel(4);
        let task = tokio::spawn(CommandDispatcher::new(addr, NoteActions::default()).run(rx));
        tx.send(note(Note::F)).await.unwrap();
        drop(tx);

        let stats = task.await.unwrap();
        assert_eq!(stats.sent, 1);
        assert_eq!(reader.await.unwrap(), 2, "Command plus exit");
    }
}
