//! Boundary runtime: executes effects and feeds completions back into the state machine.
//!
//! [`SessionRuntime`] is the only owner of the live [`SessionState`]. Every change goes
//! through [`SessionRuntime::dispatch`] (intents) or the completion pump, one transition
//! at a time, and every committed phase change is checked against the transition graph.

use std::panic::Location;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::mpsc;

use wrangle_gateway::{Gateway, UploadFile};
use wrangle_utils::atomic_write;

use crate::event::{Completion, Effect, Event, Intent, Rejected};
use crate::export::ExportError;
use crate::operation;
use crate::state::{Notice, SessionState};
use crate::transition::{Disposition, Transition, transition};

/// Upper bound on completions folded in per [`SessionRuntime::process_completions`] call.
const MAX_COMPLETIONS_PER_TICK: usize = 64;

pub struct SessionRuntime<G: Gateway> {
    state: SessionState,
    gateway: Arc<G>,
    export_dir: PathBuf,
    tx: mpsc::UnboundedSender<Completion>,
    rx: mpsc::UnboundedReceiver<Completion>,
    in_flight: usize,
}

impl<G: Gateway> SessionRuntime<G> {
    pub fn new(gateway: G, export_dir: impl Into<PathBuf>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            state: SessionState::new(),
            gateway: Arc::new(gateway),
            export_dir: export_dir.into(),
            tx,
            rx,
            in_flight: 0,
        }
    }

    /// Read-only snapshot of the session.
    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    #[must_use]
    pub fn export_dir(&self) -> &Path {
        &self.export_dir
    }

    /// Number of effects whose completion has not been folded in yet.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Apply a user intent. Must be called from within a tokio runtime.
    ///
    /// A rejected intent leaves the session untouched apart from a warning notice.
    #[track_caller]
    pub fn dispatch(&mut self, intent: Intent) -> Result<(), Rejected> {
        let name = intent.name();
        match transition(&self.state, Event::Intent(intent)) {
            Ok(next) => {
                tracing::debug!(intent = name, "Intent accepted");
                self.commit(next);
                Ok(())
            }
            Err(rejected) => {
                if matches!(rejected, Rejected::Consistency(_)) {
                    tracing::error!(intent = name, "Inconsistent intent rejected: {rejected}");
                } else {
                    tracing::warn!(intent = name, "Intent rejected: {rejected}");
                }
                self.state = self.state.with_notice(Notice::warning(rejected.to_string()));
                Err(rejected)
            }
        }
    }

    /// Fold in every completion that is already available, without waiting.
    ///
    /// Returns how many were processed.
    pub fn process_completions(&mut self) -> usize {
        let mut processed = 0;
        while processed < MAX_COMPLETIONS_PER_TICK {
            match self.rx.try_recv() {
                Ok(completion) => {
                    self.complete(completion);
                    processed += 1;
                }
                Err(_) => break,
            }
        }
        processed
    }

    /// Wait for the next completion and fold it in. Returns `false` when nothing is
    /// in flight.
    pub async fn next_completion(&mut self) -> bool {
        if self.in_flight == 0 {
            return false;
        }
        match self.rx.recv().await {
            Some(completion) => {
                self.complete(completion);
                true
            }
            None => false,
        }
    }

    /// Run until every in-flight effect (including follow-ups) has completed.
    pub async fn settle(&mut self) {
        while self.next_completion().await {}
    }

    fn complete(&mut self, completion: Completion) {
        self.in_flight = self.in_flight.saturating_sub(1);
        let name = completion.name();
        let op = completion.op();
        match transition(&self.state, Event::Completion(completion)) {
            Ok(next) => {
                if next.disposition == Disposition::Discarded {
                    tracing::debug!(completion = name, %op, "Completion discarded");
                }
                self.commit(next);
            }
            Err(rejected) => {
                tracing::error!(completion = name, %op, "Completion rejected: {rejected}");
            }
        }
    }

    /// Authoritative state replacement point: logs the phase edge, checks it against
    /// the transition graph, then spawns the requested effects.
    #[track_caller]
    fn commit(&mut self, next: Transition) {
        let from = self.state.phase().tag();
        let to = next.state.phase().tag();
        if from != to {
            let loc = Location::caller();
            let receipt = operation::transition_receipt(from, to);
            if let Some(receipt) = receipt {
                let legal = operation::receipt_is_legal(receipt);
                if !legal {
                    tracing::warn!(
                        from = ?receipt.from(),
                        to = ?receipt.to(),
                        edge = receipt.edge().as_str(),
                        file = loc.file(),
                        line = loc.line(),
                        "Illegal session transition",
                    );
                }
                debug_assert!(
                    legal,
                    "Illegal session transition: {from:?} --{:?}--> {to:?}",
                    receipt.edge()
                );
                tracing::debug!(
                    from = from.as_str(),
                    to = to.as_str(),
                    edge = receipt.edge().as_str(),
                    "Session transition",
                );
            } else {
                tracing::warn!(
                    from = from.as_str(),
                    to = to.as_str(),
                    file = loc.file(),
                    line = loc.line(),
                    "Session transition has no edge",
                );
            }
            debug_assert!(
                receipt.is_some(),
                "Session transition has no edge: {from:?} -> {to:?}"
            );
        }

        let consistency = next.state.check_consistency();
        if let Err(err) = &consistency {
            tracing::error!("Session consistency violated: {err}");
        }
        debug_assert!(consistency.is_ok(), "Session consistency violated: {consistency:?}");

        self.state = next.state;
        for effect in next.effects {
            self.spawn(effect);
        }
    }

    fn spawn(&mut self, effect: Effect) {
        self.in_flight += 1;
        let gateway = Arc::clone(&self.gateway);
        let export_dir = self.export_dir.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let completion = run_effect(gateway.as_ref(), &export_dir, effect).await;
            // The receiver only goes away when the runtime is dropped.
            let _ = tx.send(completion);
        });
    }
}

async fn run_effect<G: Gateway>(gateway: &G, export_dir: &Path, effect: Effect) -> Completion {
    match effect {
        Effect::UploadFile { op, path } => {
            let result = match UploadFile::read(&path).await {
                Ok(file) => gateway.upload_file(file).await,
                Err(e) => Err(e),
            };
            Completion::Uploaded { op, result }
        }
        Effect::FetchData { op } => Completion::DataFetched {
            op,
            result: gateway.fetch_data().await,
        },
        Effect::FetchSuggestions { op } => Completion::SuggestionsFetched {
            op,
            result: gateway.fetch_suggestions().await,
        },
        Effect::ApplyTransformation { op, suggestion } => {
            let result = gateway.apply_transformation(&suggestion).await;
            Completion::Applied {
                op,
                result,
                at: SystemTime::now(),
            }
        }
        Effect::ExportData { op, fallback_name } => {
            let result = match gateway.export_current_data().await {
                Ok(exported) => {
                    let name = exported.file_name.unwrap_or(fallback_name);
                    write_export(export_dir.join(name), exported.bytes).await
                }
                Err(e) => Err(ExportError::from(e)),
            };
            Completion::DataExported { op, result }
        }
        Effect::WriteScript {
            op,
            file_name,
            contents,
        } => Completion::ScriptWritten {
            op,
            result: write_export(export_dir.join(file_name), contents.into_bytes()).await,
        },
    }
}

async fn write_export(path: PathBuf, bytes: Vec<u8>) -> Result<PathBuf, ExportError> {
    let target = path.clone();
    let written = tokio::task::spawn_blocking(move || atomic_write(&target, &bytes))
        .await
        .map_err(std::io::Error::other)
        .and_then(|inner| inner);
    match written {
        Ok(written) => {
            if written != path {
                tracing::info!(
                    requested = %path.display(),
                    written = %written.display(),
                    "Export name taken; wrote alongside"
                );
            }
            Ok(written)
        }
        Err(source) => Err(ExportError::Write { path, source }),
    }
}
