//! Wrangle CLI - Binary entry point and terminal session management.
//!
//! # Architecture
//!
//! The CLI bridges [`wrangle_engine`] (session state and backend orchestration) and
//! [`wrangle_tui`] (rendering and key handling), providing RAII-based terminal
//! management with guaranteed cleanup.
//!
//! ```text
//! main() -> Settings -> SessionRuntime<HttpGateway> -> TerminalSession -> run_app()
//! ```
//!
//! # Event Loop
//!
//! A fixed 8ms (~120 FPS) render cadence:
//!
//! 1. Wait for frame tick
//! 2. Drain input queue (non-blocking via [`wrangle_tui::InputPump`]), dispatching intents
//! 3. Fold finished backend calls into the session (`process_completions`)
//! 4. Render frame

use std::{
    env,
    fs::{self, OpenOptions},
    io::{Stdout, stdout},
    path::PathBuf,
    sync::Mutex,
    time::Duration,
};

use anyhow::{Context, Result};
use crossterm::{
    event::{DisableBracketedPaste, EnableBracketedPaste},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use wrangle_engine::{
    API_URL_ENV, HttpGateway, Intent, SessionRuntime, Settings, WrangleConfig,
};
use wrangle_tui::{InputPump, UiState, draw, handle_events};

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (log_file, init_warnings) = open_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // If we can't open a log file, prefer "no logs" over corrupting the TUI
    // by writing to stdout/stderr.
    tracing_subscriber::registry().with(env_filter).init();
}

fn open_log_file() -> (Option<(PathBuf, std::fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&candidate)
        {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // Primary: ~/.wrangle/logs/wrangle.log
    if let Some(config_path) = WrangleConfig::path()
        && let Some(config_dir) = config_path.parent()
    {
        candidates.push(config_dir.join("logs").join("wrangle.log"));
    }

    // Fallback: ./.wrangle/logs/wrangle.log
    candidates.push(PathBuf::from(".wrangle").join("logs").join("wrangle.log"));

    candidates
}

/// Load `~/.wrangle/config.toml` and resolve it against the environment.
///
/// A broken config file falls back to defaults; an unusable backend URL does not.
fn load_settings() -> Result<Settings> {
    let config = match WrangleConfig::load() {
        Ok(config) => config.unwrap_or_default(),
        Err(err) => {
            tracing::warn!("Ignoring config: {err}");
            WrangleConfig::default()
        }
    };
    let url_override = env::var(API_URL_ENV).ok();
    let settings = config
        .resolve(url_override.as_deref())
        .context("invalid backend configuration")?;
    tracing::info!(
        base_url = settings.gateway.base_url(),
        export_dir = %settings.export_dir.display(),
        "Settings resolved"
    );
    Ok(settings)
}

/// RAII wrapper for terminal state with guaranteed cleanup on drop.
///
/// Enables raw mode, bracketed paste and the alternate screen; all of it is restored
/// on drop, so the terminal stays usable after panics or early returns.
struct TerminalSession {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl TerminalSession {
    fn new() -> Result<Self> {
        enable_raw_mode()?;

        let mut out = stdout();
        if let Err(err) = execute!(out, EnableBracketedPaste, EnterAlternateScreen) {
            let _ = disable_raw_mode();
            let _ = execute!(out, LeaveAlternateScreen, DisableBracketedPaste);
            return Err(err.into());
        }

        let terminal = match Terminal::new(CrosstermBackend::new(out)) {
            Ok(t) => t,
            Err(err) => {
                let _ = disable_raw_mode();
                let _ = execute!(stdout(), LeaveAlternateScreen, DisableBracketedPaste);
                return Err(err.into());
            }
        };

        Ok(Self { terminal })
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(
            self.terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableBracketedPaste
        );
        let _ = self.terminal.show_cursor();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let settings = load_settings()?;
    let gateway = HttpGateway::new(settings.gateway.clone())?;
    let mut runtime = SessionRuntime::new(gateway, settings.export_dir.clone());
    let mut ui = UiState::new(settings.ui, settings.page_size);

    // `wrangle data.csv` uploads on start; otherwise pick up whatever the backend holds.
    let startup = match env::args_os().nth(1) {
        Some(path) => Intent::Upload(PathBuf::from(path)),
        None => Intent::Sync,
    };
    if let Err(rejected) = runtime.dispatch(startup) {
        tracing::warn!("Startup intent rejected: {rejected}");
    }

    let result = {
        let mut session = TerminalSession::new()?;
        run_app(&mut session.terminal, &mut runtime, &mut ui).await
    };

    if let Err(err) = &result {
        tracing::error!("Exiting after error: {err:?}");
        eprintln!("Error: {err:?}");
    }
    tracing::info!(
        in_flight = runtime.in_flight(),
        applied = runtime.state().history().len(),
        "Session ended"
    );
    result
}

const FRAME_DURATION: Duration = Duration::from_millis(8);

async fn run_app<B>(
    terminal: &mut Terminal<B>,
    runtime: &mut SessionRuntime<HttpGateway>,
    ui: &mut UiState,
) -> Result<()>
where
    B: Backend,
    B::Error: Send + Sync + 'static,
{
    let mut input = InputPump::new();
    let mut frames = tokio::time::interval(FRAME_DURATION);
    frames.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let result: Result<()> = loop {
        frames.tick().await;

        // Non-blocking input (drain queue only)
        match handle_events(ui, runtime, &mut input) {
            Ok(true) => break Ok(()),
            Ok(false) => {}
            Err(e) => break Err(e),
        }

        runtime.process_completions();
        ui.tick();

        if let Err(e) = terminal.draw(|frame| draw(frame, runtime.state(), ui)) {
            break Err(e.into());
        }
    };

    input.shutdown().await;
    result
}
