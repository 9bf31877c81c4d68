use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use note_control::config::AppConfig;
use note_control::control::{run_control_server, ControlExecutor, LoggingSink, MouseController};
use tokio::net::TcpListener;

#[derive(Parser, Debug)]
#[command(
    name = "control-server",
    about = "Execute control messages from the note client as pointer input"
)]
struct Cli {
    /// Configuration file; without it assets/note_config.json is tried, then defaults
    #[arg(long)]
    config: Option<PathBuf>,
    /// Port to listen on; overrides the configured port
    #[arg(long)]
    port: Option<u16>,
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
    let port = cli.port.unwrap_or(config.command.port);
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    let stats = runtime.block_on(async {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("binding control listener on {addr}"))?;
        let mut executor =
            ControlExecutor::new(MouseController::new(LoggingSink, config.controller.clone()));

        run_control_server(listener, &mut executor, async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %err, "Ctrl-C handler unavailable");
                std::future::pending::<()>().await;
            }
        })
        .await
    })?;

    println!(
        "{} client(s), {} message(s) handled, {} malformed",
        stats.clients, stats.handled, stats.malformed
    );
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
