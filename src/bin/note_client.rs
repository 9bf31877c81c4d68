use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use note_control::analysis::{NoteEvent, NotePipeline, SegmentEvent};
use note_control::command::{Command, CommandDispatcher, NoteActions};
use note_control::config::AppConfig;
use note_control::engine::{CpalBackend, RecognitionEngine};
use note_control::fixtures::read_wav;
use note_control::telemetry;
use serde::Serialize;
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(
    name = "note-client",
    about = "Recognize recorder notes and send game commands to the control server"
)]
struct Cli {
    /// Configuration file; without it assets/note_config.json is tried, then defaults
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Listen on the default microphone until Ctrl-C
    Listen,
    /// Run a WAV recording through the recognizer and print note events
    Replay {
        #[arg(long)]
        wav: PathBuf,
        /// Also send the mapped commands to the control server
        #[arg(long)]
        send: bool,
    },
}

fn main() -> ExitCode {
    note_control::init_tracing("info");
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    config.validate().context("validating configuration")?;

    match cli.command {
        Commands::Listen => run_listen(config),
        Commands::Replay { wav, send } => run_replay(config, &wav, send),
    }
}

fn build_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("building tokio runtime")
}

fn run_listen(config: AppConfig) -> Result<ExitCode> {
    let runtime = build_runtime()?;
    let (tx, rx) = mpsc::channel(config.command.channel_capacity.max(1));

    let dispatcher = CommandDispatcher::new(
        config.command.address(),
        NoteActions::new(&config.command.note_actions),
    );
    let dispatch_task = runtime.spawn(dispatcher.run(rx));

    let backend = CpalBackend::new(config.audio.sample_rate);
    let mut engine = RecognitionEngine::new(backend, config)?;
    engine.start(tx).context("starting recognition engine")?;
    if let Some(device) = engine.backend().device_name() {
        println!("Listening on {device}. Press Ctrl-C to stop.");
    }

    runtime
        .block_on(tokio::signal::ctrl_c())
        .context("waiting for Ctrl-C")?;

    let summary = engine.stop().context("stopping recognition engine")?;
    // The analysis thread dropped its sender, so the dispatcher drains and exits
    let stats = runtime
        .block_on(dispatch_task)
        .context("joining command dispatcher")?;

    let snapshot = telemetry::hub().snapshot();
    println!(
        "Processed {} windows ({} dropped), {} notes, {} commands sent, {} dropped",
        summary.windows_processed,
        snapshot.windows_dropped,
        summary.notes_completed,
        stats.sent,
        stats.dropped
    );
    Ok(ExitCode::SUCCESS)
}

#[derive(Serialize)]
struct NotePayload {
    note: String,
    start_ms: u64,
    end_ms: u64,
    duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    command: Option<Command>,
}

impl NotePayload {
    fn new(event: &NoteEvent, command: Option<Command>) -> Self {
        Self {
            note: event.note.to_string(),
            start_ms: event.start.as_millis() as u64,
            end_ms: event.end.as_millis() as u64,
            duration_ms: event.duration().as_millis() as u64,
            command,
        }
    }
}

fn run_replay(config: AppConfig, wav: &Path, send: bool) -> Result<ExitCode> {
    let (samples, sample_rate) = read_wav(wav)?;
    let mut pipeline = NotePipeline::from_config(&config)?;
    let events = pipeline
        .run_offline(&samples, sample_rate, config.audio.window_size)
        .with_context(|| format!("analysing {}", wav.display()))?;

    let notes: Vec<NoteEvent> = events
        .into_iter()
        .filter_map(|event| match event {
            SegmentEvent::Completed(note) => Some(note),
            SegmentEvent::Confirmed { .. } => None,
        })
        .collect();

    let actions = NoteActions::new(&config.command.note_actions);
    if send {
        let runtime = build_runtime()?;
        let mut dispatcher = CommandDispatcher::new(config.command.address(), actions);
        runtime.block_on(async {
            for note in &notes {
                let sent = dispatcher.dispatch(note).await;
                println!("{}", serde_json::to_string(&NotePayload::new(note, sent))?);
            }
            anyhow::Ok(())
        })?;
        let stats = dispatcher.stats();
        eprintln!("{} commands sent, {} dropped", stats.sent, stats.dropped);
    } else {
        for note in &notes {
            let command = actions.command_for(note.note);
            println!("{}", serde_json::to_string(&NotePayload::new(note, command))?);
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// An explicit `--config` must load; the default path may fall back
fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => {
            AppConfig::try_load(path).with_context(|| format!("loading {}", path.display()))
        }
        None => Ok(AppConfig::load()),
    }
}
