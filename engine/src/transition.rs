//! The pure session transition function.
//!
//! `transition(&state, event)` never performs IO. It returns the next state plus the
//! effects the runtime must execute. Completions that no longer match the state
//! they were issued against are discarded here (the stale-response guard).

use std::sync::Arc;
use std::time::SystemTime;

use tracing::{debug, info, warn};

use wrangle_gateway::{ErrorKind, GatewayError, display_name};
use wrangle_types::{
    ConsistencyError, Dataset, DatasetVersion, FileFormat, NonEmptyStaticStr, NonEmptyString,
    Suggestion, SuggestionBatch, SuggestionId,
};

use crate::event::{Completion, Effect, Event, Intent, Rejected};
use crate::export::{csv_file_name, render_script, script_file_name};
use crate::state::{
    ApplyStage, LoadSource, LoadStage, Notice, OperationId, PendingApply, PendingLoad, Phase,
    RefreshTicket, SessionState,
};

const UNKNOWN_FAILURE: NonEmptyStaticStr = NonEmptyStaticStr::new("operation failed");

/// Whether the event changed the session or was dropped as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Accepted,
    Discarded,
}

#[derive(Debug)]
pub struct Transition {
    pub state: SessionState,
    pub effects: Vec<Effect>,
    pub disposition: Disposition,
}

impl Transition {
    fn accepted(state: SessionState, effects: Vec<Effect>) -> Self {
        Self {
            state,
            effects,
            disposition: Disposition::Accepted,
        }
    }

    fn discarded(state: &SessionState) -> Self {
        Self {
            state: state.clone(),
            effects: Vec::new(),
            disposition: Disposition::Discarded,
        }
    }
}

/// Compute the next session state for `event`.
///
/// Intents may be rejected; completions never are.
pub fn transition(state: &SessionState, event: Event) -> Result<Transition, Rejected> {
    match event {
        Event::Intent(intent) => on_intent(state, intent),
        Event::Completion(completion) => Ok(on_completion(state, completion)),
    }
}

fn ensure_idle(state: &SessionState) -> Result<(), Rejected> {
    if state.is_busy() {
        Err(Rejected::Busy {
            phase: state.phase.tag(),
        })
    } else {
        Ok(())
    }
}

fn error_message(err: &impl std::fmt::Display) -> NonEmptyString {
    NonEmptyString::or_fallback(err.to_string(), UNKNOWN_FAILURE)
}

/// Phase to return to when nothing is in flight and no error is shown.
fn settled_phase(state: &SessionState) -> Phase {
    if state.dataset.is_some() {
        Phase::Ready
    } else {
        Phase::Empty
    }
}

fn on_intent(state: &SessionState, intent: Intent) -> Result<Transition, Rejected> {
    let mut next = state.clone();
    next.notice = None;

    let effects = match intent {
        Intent::Upload(path) => {
            ensure_idle(state)?;
            FileFormat::from_path(&path)?;
            let op = next.allocate_op();
            let label = display_name(&path);
            next.refresh = None;
            next.phase = Phase::Loading(PendingLoad {
                op,
                source: LoadSource::Upload {
                    path: path.clone(),
                    label,
                },
                stage: LoadStage::Sending,
            });
            vec![Effect::UploadFile { op, path }]
        }
        Intent::Sync => {
            ensure_idle(state)?;
            let op = next.allocate_op();
            next.refresh = None;
            next.phase = Phase::Loading(PendingLoad {
                op,
                source: LoadSource::Sync,
                stage: LoadStage::FetchingData,
            });
            vec![Effect::FetchData { op }]
        }
        Intent::Select(id) => {
            ensure_idle(state)?;
            if state.batch.get(&id).is_none() {
                return Err(ConsistencyError::UnknownSuggestion { id }.into());
            }
            next.selection = Some(id);
            Vec::new()
        }
        Intent::Discard => {
            if state.selection.is_none() {
                return Ok(Transition::accepted(next, Vec::new()));
            }
            ensure_idle(state)?;
            next.selection = None;
            Vec::new()
        }
        Intent::Apply => {
            ensure_idle(state)?;
            if state.dataset.is_none() {
                return Err(Rejected::NoDataset);
            }
            let id = state.selection.clone().ok_or(Rejected::NothingSelected)?;
            state.batch.ensure_matches(state.version)?;
            let suggestion = state
                .batch
                .get(&id)
                .cloned()
                .ok_or(ConsistencyError::UnknownSuggestion { id })?;
            let op = next.allocate_op();
            next.refresh = None;
            next.phase = Phase::Applying(PendingApply {
                op,
                suggestion: suggestion.clone(),
                stage: ApplyStage::Submitting,
            });
            vec![Effect::ApplyTransformation { op, suggestion }]
        }
        Intent::RefreshSuggestions => {
            ensure_idle(state)?;
            if state.dataset.is_none() {
                return Err(Rejected::NoDataset);
            }
            let op = next.allocate_op();
            if let Some(previous) = state.refresh {
                debug!(superseded = %previous.op, by = %op, "Suggestion refresh superseded");
            }
            next.refresh = Some(RefreshTicket {
                op,
                version: state.version,
            });
            vec![Effect::FetchSuggestions { op }]
        }
        Intent::ExportData => {
            if state.dataset.is_none() {
                return Err(Rejected::NoDataset);
            }
            let op = next.allocate_op();
            vec![Effect::ExportData {
                op,
                fallback_name: csv_file_name(state.label.as_deref()),
            }]
        }
        Intent::ExportCode => {
            if state.history.is_empty() {
                return Err(Rejected::EmptyHistory);
            }
            let op = next.allocate_op();
            let label = state.label.as_deref();
            vec![Effect::WriteScript {
                op,
                file_name: script_file_name(label),
                contents: render_script(label, &state.history),
            }]
        }
        Intent::DismissError => {
            if matches!(state.phase, Phase::Error(_)) {
                next.phase = settled_phase(state);
            }
            Vec::new()
        }
    };

    Ok(Transition::accepted(next, effects))
}

fn on_completion(state: &SessionState, completion: Completion) -> Transition {
    let op = completion.op();
    match completion {
        Completion::Uploaded { result, .. } => on_uploaded(state, op, result.map(|_| ())),
        Completion::DataFetched { result, .. } => on_data_fetched(state, op, result),
        Completion::SuggestionsFetched { result, .. } => on_suggestions(state, op, result),
        Completion::Applied { result, at, .. } => on_applied(state, op, result, at),
        Completion::DataExported { result, .. } => {
            let mut next = state.clone();
            next.notice = Some(match result {
                Ok(path) => {
                    info!(path = %path.display(), "Exported dataset");
                    Notice::info(format!("Exported {}", path.display()))
                }
                Err(e) => {
                    warn!("Dataset export failed: {e}");
                    Notice::warning(format!("Export failed: {e}"))
                }
            });
            Transition::accepted(next, Vec::new())
        }
        Completion::ScriptWritten { result, .. } => {
            let mut next = state.clone();
            next.notice = Some(match result {
                Ok(path) => {
                    info!(path = %path.display(), "Exported transformation script");
                    Notice::info(format!("Wrote {}", path.display()))
                }
                Err(e) => {
                    warn!("Script export failed: {e}");
                    Notice::warning(format!("Script export failed: {e}"))
                }
            });
            Transition::accepted(next, Vec::new())
        }
    }
}

fn pending_load(state: &SessionState, op: OperationId) -> Option<&PendingLoad> {
    match &state.phase {
        Phase::Loading(load) if load.op == op => Some(load),
        _ => None,
    }
}

fn on_uploaded(
    state: &SessionState,
    op: OperationId,
    result: Result<(), GatewayError>,
) -> Transition {
    let Some(load) = pending_load(state, op).filter(|l| l.stage == LoadStage::Sending) else {
        debug!(%op, "Discarding stale upload completion");
        return Transition::discarded(state);
    };

    let mut next = state.clone();
    match result {
        Ok(()) => {
            next.phase = Phase::Loading(PendingLoad {
                stage: LoadStage::FetchingData,
                ..load.clone()
            });
            Transition::accepted(next, vec![Effect::FetchData { op }])
        }
        Err(e) => {
            warn!(%op, "Upload failed: {e}");
            next.phase = Phase::Error(error_message(&e));
            Transition::accepted(next, Vec::new())
        }
    }
}

fn on_data_fetched(
    state: &SessionState,
    op: OperationId,
    result: Result<Dataset, GatewayError>,
) -> Transition {
    let Some(load) = pending_load(state, op).filter(|l| l.stage == LoadStage::FetchingData) else {
        debug!(%op, "Discarding stale data completion");
        return Transition::discarded(state);
    };

    let mut next = state.clone();
    match result {
        Ok(dataset) => {
            next.phase = Phase::Loading(PendingLoad {
                stage: LoadStage::FetchingSuggestions {
                    dataset: Arc::new(dataset),
                },
                ..load.clone()
            });
            Transition::accepted(next, vec![Effect::FetchSuggestions { op }])
        }
        Err(e) if load.source == LoadSource::Sync && e.kind() == ErrorKind::NotFound => {
            info!("Backend holds no dataset");
            next.version = state.version.next();
            next.dataset = None;
            next.batch = SuggestionBatch::empty(next.version);
            next.selection = None;
            next.label = None;
            next.phase = Phase::Empty;
            Transition::accepted(next, Vec::new())
        }
        Err(e) => {
            warn!(%op, "Fetching dataset failed: {e}");
            next.phase = Phase::Error(error_message(&e));
            Transition::accepted(next, Vec::new())
        }
    }
}

fn build_batch(
    version: DatasetVersion,
    suggestions: Vec<Suggestion>,
) -> SuggestionBatch {
    let (batch, dropped) = SuggestionBatch::new(version, suggestions);
    if !dropped.is_empty() {
        let ids: Vec<&str> = dropped.iter().map(SuggestionId::as_str).collect();
        warn!(?ids, "Dropped suggestions with duplicate ids");
    }
    batch
}

fn on_suggestions(
    state: &SessionState,
    op: OperationId,
    result: Result<Vec<Suggestion>, GatewayError>,
) -> Transition {
    if let Some(load) = pending_load(state, op) {
        let LoadStage::FetchingSuggestions { dataset } = &load.stage else {
            debug!(%op, "Discarding out-of-order suggestion completion");
            return Transition::discarded(state);
        };
        return commit_load(state, load, Arc::clone(dataset), result);
    }

    if let Phase::Applying(apply) = &state.phase
        && apply.op == op
    {
        if apply.stage != ApplyStage::RefreshingSuggestions {
            debug!(%op, "Discarding out-of-order suggestion completion");
            return Transition::discarded(state);
        }
        let mut next = state.clone();
        next.phase = Phase::Ready;
        match result {
            Ok(suggestions) => {
                next.batch = build_batch(state.version, suggestions);
                info!(
                    suggestion = %apply.suggestion.id(),
                    version = %state.version,
                    available = next.batch.len(),
                    "Transformation applied"
                );
                next.notice = Some(Notice::info(format!(
                    "Applied \"{}\"",
                    apply.suggestion.title()
                )));
            }
            Err(e) => {
                // Dataset update already committed; an empty batch is still consistent.
                warn!(%op, "Suggestion refresh after apply failed: {e}");
                next.notice = Some(Notice::warning(format!(
                    "Applied \"{}\" but suggestions are unavailable: {e}",
                    apply.suggestion.title()
                )));
            }
        }
        return Transition::accepted(next, Vec::new());
    }

    let Some(ticket) = state.refresh.filter(|t| t.op == op) else {
        debug!(%op, "Discarding stale suggestion completion");
        return Transition::discarded(state);
    };
    if state.is_busy() || ticket.version != state.version {
        debug!(%op, ticket = %ticket.version, current = %state.version, "Discarding stale suggestion refresh");
        let mut next = state.clone();
        next.refresh = None;
        return Transition {
            disposition: Disposition::Discarded,
            ..Transition::accepted(next, Vec::new())
        };
    }

    let mut next = state.clone();
    next.refresh = None;
    match result {
        Ok(suggestions) => {
            next.batch = build_batch(state.version, suggestions);
            next.selection = None;
            next.phase = settled_phase(state);
        }
        Err(e) => {
            warn!(%op, "Suggestion refresh failed: {e}");
            next.phase = Phase::Error(error_message(&e));
        }
    }
    Transition::accepted(next, Vec::new())
}

/// Replace dataset and suggestions together, or leave both untouched on failure.
fn commit_load(
    state: &SessionState,
    load: &PendingLoad,
    dataset: Arc<Dataset>,
    result: Result<Vec<Suggestion>, GatewayError>,
) -> Transition {
    let mut next = state.clone();
    let suggestions = match result {
        Ok(suggestions) => suggestions,
        Err(e) => {
            warn!(op = %load.op, "Fetching suggestions failed: {e}");
            next.phase = Phase::Error(error_message(&e));
            return Transition::accepted(next, Vec::new());
        }
    };

    next.version = state.version.next();
    next.batch = build_batch(next.version, suggestions);
    next.selection = None;
    if let LoadSource::Upload { label, .. } = &load.source {
        next.label = Some(label.clone());
    }
    let rows = dataset.row_count();
    let columns = dataset.column_count();
    next.dataset = Some(dataset);
    next.phase = Phase::Ready;

    let name = next.label.clone().unwrap_or_else(|| "dataset".to_string());
    info!(
        dataset = %name,
        rows,
        columns,
        suggestions = next.batch.len(),
        version = %next.version,
        "Dataset loaded"
    );
    next.notice = Some(Notice::info(format!(
        "Loaded {name} ({rows} rows, {columns} columns)"
    )));
    Transition::accepted(next, Vec::new())
}

fn on_applied(
    state: &SessionState,
    op: OperationId,
    result: Result<Dataset, GatewayError>,
    at: SystemTime,
) -> Transition {
    let apply = match &state.phase {
        Phase::Applying(apply) if apply.op == op && apply.stage == ApplyStage::Submitting => apply,
        _ => {
            debug!(%op, "Discarding stale apply completion");
            return Transition::discarded(state);
        }
    };

    let mut next = state.clone();
    match result {
        Ok(dataset) => {
            // Old batch and selection go in the same step as the dataset.
            next.history = state
                .history
                .appended(apply.suggestion.clone(), state.version, at);
            next.version = state.version.next();
            next.dataset = Some(Arc::new(dataset));
            next.batch = SuggestionBatch::empty(next.version);
            next.selection = None;
            next.phase = Phase::Applying(PendingApply {
                stage: ApplyStage::RefreshingSuggestions,
                ..apply.clone()
            });
            Transition::accepted(next, vec![Effect::FetchSuggestions { op }])
        }
        Err(e) => {
            warn!(%op, suggestion = %apply.suggestion.id(), "Apply failed: {e}");
            next.phase = Phase::Error(error_message(&e));
            Transition::accepted(next, Vec::new())
        }
    }
}
