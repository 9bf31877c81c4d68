use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use note_control::analysis::{FrequencyEstimator, Note, SampleWindow};
use note_control::audio::{BufferPool, CaptureStream};
use note_control::calibration::{
    analyse_recording, parse_center, suggest_bands, CalibrationReport, CalibrationSession,
    CalibrationSettings,
};
use note_control::config::AppConfig;
use note_control::error::AnalysisError;
use note_control::fixtures::read_wav;

#[derive(Parser, Debug)]
#[command(
    name = "calibrate",
    about = "Measure played notes and derive frequency bands"
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
    /// Print frequency summaries while notes are played
    Listen(ListenArgs),
    /// Build a band table from measured note centres
    Bands {
        /// Measured centre as NOTE=HZ, repeat for each note
        #[arg(long = "center", value_parser = parse_center, required = true)]
        centers: Vec<(Note, f32)>,
        /// Largest extension of the outermost bands (Hz)
        #[arg(long, default_value_t = 100.0)]
        margin: f32,
    },
}

#[derive(Args, Debug)]
struct ListenArgs {
    /// Stop after this many seconds (0 runs until Ctrl-C)
    #[arg(long, default_value_t = 0)]
    duration_secs: u64,
    /// Analyse a WAV recording instead of the microphone
    #[arg(long)]
    wav: Option<PathBuf>,
    #[arg(long, default_value_t = 500.0)]
    min_hz: f32,
    #[arg(long, default_value_t = 3000.0)]
    max_hz: f32,
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

    match cli.command {
        Commands::Listen(args) => run_listen(&config, &args),
        Commands::Bands { centers, margin } => run_bands(&centers, margin),
    }
}

fn print_report(report: &CalibrationReport) {
    match report {
        CalibrationReport::Summary(summary) => println!(
            "{:>4} readings  mean {:7.1} Hz  min {:7.1}  max {:7.1}  volume {:.4}  -> {}",
            summary.count,
            summary.mean_hz,
            summary.min_hz,
            summary.max_hz,
            summary.mean_amplitude,
            summary.label
        ),
        CalibrationReport::Volume {
            amplitude,
            threshold,
            above_threshold,
        } => println!(
            "[volume] {:.4} (threshold {:.4}){}",
            amplitude,
            threshold,
            if *above_threshold { "" } else { " - too quiet" }
        ),
    }
}

fn run_listen(config: &AppConfig, args: &ListenArgs) -> Result<ExitCode> {
    config.validate().context("validating configuration")?;
    let volume_threshold = config.recognition.volume_threshold;
    let settings = CalibrationSettings {
        display_min_hz: args.min_hz,
        display_max_hz: args.max_hz,
        volume_threshold,
        ..CalibrationSettings::default()
    };
    let mut session = CalibrationSession::new(settings, config.recognition.bands()?);
    let mut estimator =
        FrequencyEstimator::new(config.audio.estimator_settings(volume_threshold));

    if let Some(wav) = args.wav.as_deref() {
        return listen_recording(config, wav, &mut estimator, &mut session);
    }

    let (capture, mut analysis) =
        BufferPool::new(config.audio.buffer_pool_size, config.audio.window_size).split();
    let stream = CaptureStream::open(config.audio.sample_rate, capture)?;
    stream.play()?;
    let sample_rate = stream.sample_rate();
    println!(
        "Listening on {} at {} Hz. Hold one note at a time; Ctrl-C to stop.",
        stream.device_name(),
        sample_rate
    );

    let stop = install_ctrl_c()?;
    let deadline =
        (args.duration_secs > 0).then(|| Instant::now() + Duration::from_secs(args.duration_secs));

    while !stop.load(Ordering::SeqCst) && deadline.map_or(true, |end| Instant::now() < end) {
        analysis.shed_backlog(config.audio.max_backlog);
        let Ok(window) = analysis.data_consumer.pop() else {
            thread::sleep(Duration::from_millis(5));
            continue;
        };

        let view = SampleWindow::at_frame(&window.samples, sample_rate, window.start_frame);
        let reading = estimator.estimate(&view);
        analysis.recycle(window);

        match reading {
            Ok(reading) => session.observe(&reading).iter().for_each(print_report),
            Err(err @ AnalysisError::InsufficientSamples { .. }) => {
                tracing::debug!("Skipping window: {}", err)
            }
            Err(err) => return Err(err.into()),
        }
    }

    drop(stream);
    Ok(ExitCode::SUCCESS)
}

fn listen_recording(
    config: &AppConfig,
    wav: &Path,
    estimator: &mut FrequencyEstimator,
    session: &mut CalibrationSession,
) -> Result<ExitCode> {
    let (samples, sample_rate) = read_wav(wav)?;
    let reports = analyse_recording(
        estimator,
        session,
        &samples,
        sample_rate,
        config.audio.window_size,
    )
    .with_context(|| format!("analysing {}", wav.display()))?;
    reports.iter().for_each(print_report);
    Ok(ExitCode::SUCCESS)
}

/// Flag set when Ctrl-C arrives, watched from a small signal thread
fn install_ctrl_c() -> Result<Arc<AtomicBool>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;
    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);

    thread::Builder::new()
        .name("ctrl-c".to_string())
        .spawn(move || {
            if runtime.block_on(tokio::signal::ctrl_c()).is_ok() {
                flag.store(true, Ordering::SeqCst);
            }
        })
        .context("spawning Ctrl-C watcher")?;
    Ok(stop)
}

fn run_bands(centers: &[(Note, f32)], margin: f32) -> Result<ExitCode> {
    let bands = suggest_bands(centers, margin)?;
    for band in bands.bands() {
        eprintln!(
            "{}: {:.1} - {:.1} Hz",
            band.note, band.low_hz, band.high_hz
        );
    }
    // Paste into recognition.note_bands
    println!("{}", serde_json::to_string_pretty(bands.bands())?);
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
