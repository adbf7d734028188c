//! Input handling for the Wrangle TUI.
//!
//! Keys are mapped to [`Action`]s by [`handle_key`], a pure function of the key, the
//! surface state and the current session snapshot. [`handle_events`] drains the
//! terminal and forwards the resulting intents to the runtime.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Result, anyhow};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tokio::sync::mpsc;
use tracing::debug;

use wrangle_engine::{Gateway, Intent, SessionRuntime, SessionState};

use crate::UiState;

const INPUT_POLL_TIMEOUT: Duration = Duration::from_millis(25); // shutdown responsiveness
const INPUT_CHANNEL_CAPACITY: usize = 1024; // bounded: no OOM
const MAX_EVENTS_PER_FRAME: usize = 64; // never starve rendering

/// What a one-line prompt collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Upload,
    Filter,
}

impl PromptKind {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Upload => "UPLOAD",
            Self::Filter => "FILTER",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Normal,
    Prompt { kind: PromptKind, text: String },
}

/// Result of a key press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    None,
    Dispatch(Intent),
    Quit,
}

enum InputMsg {
    Event(Event),
    Error(String),
}

pub struct InputPump {
    rx: mpsc::Receiver<InputMsg>,
    stop: Arc<AtomicBool>,
    join: Option<tokio::task::JoinHandle<()>>,
}

impl InputPump {
    /// Start the blocking terminal reader. Must be called from within a tokio runtime.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(INPUT_CHANNEL_CAPACITY);
        let stop = Arc::new(AtomicBool::new(false));
        let stop2 = stop.clone();

        let join = tokio::task::spawn_blocking(move || input_loop(&stop2, &tx));
        Self {
            rx,
            stop,
            join: Some(join),
        }
    }

    pub async fn shutdown(&mut self) {
        // Unblock a reader that is backpressured on a send.
        self.rx.close();

        self.stop.store(true, Ordering::Release);
        if let Some(join) = self.join.take() {
            let _ = tokio::time::timeout(Duration::from_secs(2), join).await;
        }
    }
}

impl Default for InputPump {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InputPump {
    fn drop(&mut self) {
        // Best-effort stop if caller exits early; do not block in Drop.
        self.rx.close();
        self.stop.store(true, Ordering::Release);
    }
}

fn input_loop(stop: &AtomicBool, tx: &mpsc::Sender<InputMsg>) {
    while !stop.load(Ordering::Acquire) {
        match event::poll(INPUT_POLL_TIMEOUT) {
            Ok(true) => match event::read() {
                Ok(ev) => {
                    if tx.blocking_send(InputMsg::Event(ev)).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    let _ = tx.blocking_send(InputMsg::Error(e.to_string()));
                    break;
                }
            },
            Ok(false) => {}
            Err(e) => {
                let _ = tx.blocking_send(InputMsg::Error(e.to_string()));
                break;
            }
        }
    }
}

/// Drain pending terminal events, forwarding intents to `runtime`.
///
/// Returns `Ok(true)` when the user asked to quit.
pub fn handle_events<G: Gateway>(
    ui: &mut UiState,
    runtime: &mut SessionRuntime<G>,
    input: &mut InputPump,
) -> Result<bool> {
    let mut processed = 0;
    while processed < MAX_EVENTS_PER_FRAME {
        let ev = match input.rx.try_recv() {
            Ok(InputMsg::Event(ev)) => ev,
            Ok(InputMsg::Error(msg)) => return Err(anyhow!("input error: {msg}")),
            Err(mpsc::error::TryRecvError::Empty) => break,
            Err(mpsc::error::TryRecvError::Disconnected) => {
                return Err(anyhow!("input pump disconnected"));
            }
        };
        processed += 1;

        ui.view.observe(runtime.state());
        let action = match ev {
            Event::Key(key) if key.kind != KeyEventKind::Release => {
                handle_key(ui, runtime.state(), key)
            }
            Event::Paste(text) => {
                handle_paste(ui, &text);
                Action::None
            }
            _ => Action::None,
        };

        match action {
            Action::None => {}
            Action::Quit => return Ok(true),
            Action::Dispatch(intent) => {
                // A rejection is already surfaced as a notice on the session.
                if let Err(rejected) = runtime.dispatch(intent) {
                    debug!("Key intent rejected: {rejected}");
                }
            }
        }
    }
    Ok(false)
}

/// Map one key press to an [`Action`], updating surface-local state on the way.
pub fn handle_key(ui: &mut UiState, session: &SessionState, key: KeyEvent) -> Action {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Action::Quit;
    }

    match &mut ui.mode {
        InputMode::Normal => handle_normal_mode(ui, session, key),
        InputMode::Prompt { kind, text } => {
            let kind = *kind;
            match key.code {
                KeyCode::Esc => {
                    ui.mode = InputMode::Normal;
                    Action::None
                }
                KeyCode::Enter => {
                    let submitted = std::mem::take(text);
                    ui.mode = InputMode::Normal;
                    submit_prompt(ui, kind, &submitted)
                }
                KeyCode::Backspace => {
                    text.pop();
                    Action::None
                }
                KeyCode::Char(c)
                    if !key
                        .modifiers
                        .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
                {
                    text.push(c);
                    Action::None
                }
                _ => Action::None,
            }
        }
    }
}

fn handle_normal_mode(ui: &mut UiState, session: &SessionState, key: KeyEvent) -> Action {
    let batch_len = session.suggestions().len();
    match key.code {
        KeyCode::Char('q') => Action::Quit,
        KeyCode::Char('o') => {
            ui.mode = InputMode::Prompt {
                kind: PromptKind::Upload,
                text: String::new(),
            };
            Action::None
        }
        KeyCode::Char('/') => {
            ui.mode = InputMode::Prompt {
                kind: PromptKind::Filter,
                text: ui.view.filter().to_owned(),
            };
            Action::None
        }
        KeyCode::Char('j') | KeyCode::Down => {
            ui.view.cursor_down(batch_len);
            Action::None
        }
        KeyCode::Char('k') | KeyCode::Up => {
            ui.view.cursor_up();
            Action::None
        }
        KeyCode::Enter => ui
            .view
            .cursor_suggestion(session)
            .map_or(Action::None, |s| {
                Action::Dispatch(Intent::Select(s.id().clone()))
            }),
        KeyCode::Char('a') => Action::Dispatch(Intent::Apply),
        KeyCode::Char('d') => Action::Dispatch(Intent::Discard),
        KeyCode::Char('r') => Action::Dispatch(Intent::RefreshSuggestions),
        KeyCode::Char('e') => Action::Dispatch(Intent::ExportData),
        KeyCode::Char('c') => Action::Dispatch(Intent::ExportCode),
        KeyCode::Char('x') => Action::Dispatch(Intent::DismissError),
        KeyCode::Char('s') => {
            if let Some(dataset) = session.dataset() {
                ui.view.cycle_sort(dataset.columns());
            }
            Action::None
        }
        KeyCode::Char('S') => {
            ui.view.toggle_sort_direction();
            Action::None
        }
        KeyCode::PageDown => {
            let total = ui.view.visible_rows(session).len();
            ui.view.next_page(total);
            Action::None
        }
        KeyCode::PageUp => {
            ui.view.prev_page();
            Action::None
        }
        _ => Action::None,
    }
}

fn submit_prompt(ui: &mut UiState, kind: PromptKind, text: &str) -> Action {
    match kind {
        PromptKind::Filter => {
            ui.view.set_filter(text.trim());
            Action::None
        }
        PromptKind::Upload => match prompt_path(text) {
            Some(path) => Action::Dispatch(Intent::Upload(path)),
            None => Action::None,
        },
    }
}

fn handle_paste(ui: &mut UiState, pasted: &str) {
    if let InputMode::Prompt { text, .. } = &mut ui.mode {
        text.extend(pasted.chars().filter(|c| !c.is_control()));
    }
}

/// Interpret prompt text as a file path.
///
/// Terminals quote dropped paths, so one layer of matching quotes is removed, and a
/// leading `~/` expands to the home directory.
fn prompt_path(text: &str) -> Option<PathBuf> {
    let trimmed = text.trim();
    let unquoted = ['"', '\'']
        .iter()
        .find_map(|q| {
            trimmed
                .strip_prefix(*q)
                .and_then(|rest| rest.strip_suffix(*q))
        })
        .unwrap_or(trimmed);
    if unquoted.is_empty() {
        return None;
    }
    if let Some(rest) = unquoted.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return Some(home.join(rest));
    }
    Some(PathBuf::from(unquoted))
}
