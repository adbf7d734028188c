//! Snapshot builders for view and render tests.
//!
//! States are produced by driving the real transition function, so every snapshot
//! a test renders is one the session could actually be in.

use std::time::{Duration, SystemTime};

use serde_json::json;

use wrangle_engine::wrangle_gateway::UploadReceipt;
use wrangle_engine::{
    Completion, Dataset, Effect, Event, GatewayError, Intent, Record, SessionState, Suggestion,
    transition,
};

pub(crate) fn dataset(rows: usize) -> Dataset {
    let records = (0..rows)
        .map(|i| {
            Record::new()
                .with("zip", 19525 + i as i64)
                .with("title", "EMS: BACK PAINS/INJURY")
                .with("twp", "NEW HANOVER")
        })
        .collect();
    Dataset::normalized(vec!["zip".into(), "title".into(), "twp".into()], records).0
}

pub(crate) fn suggestions(count: usize) -> Vec<Suggestion> {
    (1..=count)
        .map(|i| {
            Suggestion::from_payload(json!({
                "id": i,
                "title": format!("Split title #{i}"),
                "explanation": "Separates the call category from its description",
                "code": "df[['title0', 'title1']] = df['title'].str.split(':', expand=True)",
            }))
            .unwrap()
        })
        .collect()
}

fn step(state: &SessionState, event: impl Into<Event>) -> (SessionState, Vec<Effect>) {
    let next = transition(state, event.into()).unwrap();
    (next.state, next.effects)
}

/// Finish a load that is waiting on `FetchData`.
fn finish_load(
    state: SessionState,
    effects: &[Effect],
    rows: usize,
    count: usize,
) -> SessionState {
    let op = effects[0].op();
    let (state, effects) = step(
        &state,
        Completion::DataFetched {
            op,
            result: Ok(dataset(rows)),
        },
    );
    let (state, _) = step(
        &state,
        Completion::SuggestionsFetched {
            op: effects[0].op(),
            result: Ok(suggestions(count)),
        },
    );
    state
}

/// `Ready` session loaded from an upload of `911.csv`.
pub(crate) fn ready_state(rows: usize, count: usize) -> SessionState {
    let (state, effects) = step(&SessionState::new(), Intent::Upload("911.csv".into()));
    let (state, effects) = step(
        &state,
        Completion::Uploaded {
            op: effects[0].op(),
            result: Ok(UploadReceipt::default()),
        },
    );
    finish_load(state, &effects, rows, count)
}

/// Re-sync `state`, producing a new dataset version.
pub(crate) fn reload(state: &SessionState, rows: usize, count: usize) -> SessionState {
    let (state, effects) = step(state, Intent::Sync);
    finish_load(state, &effects, rows, count)
}

/// `state` with a request in flight: apply when something is selected, otherwise a sync.
pub(crate) fn busy(state: &SessionState) -> SessionState {
    let intent = if state.selection().is_some() {
        Intent::Apply
    } else {
        Intent::Sync
    };
    step(state, intent).0
}

pub(crate) fn selected(state: &SessionState, id: u64) -> SessionState {
    step(state, Intent::Select(id.into())).0
}

/// Apply the current selection successfully and refetch `count` suggestions.
pub(crate) fn applied(state: &SessionState, rows: usize, count: usize) -> SessionState {
    let (state, effects) = step(state, Intent::Apply);
    let (state, effects) = step(
        &state,
        Completion::Applied {
            op: effects[0].op(),
            result: Ok(dataset(rows)),
            at: SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000),
        },
    );
    step(
        &state,
        Completion::SuggestionsFetched {
            op: effects[0].op(),
            result: Ok(suggestions(count)),
        },
    )
    .0
}

/// Apply the current selection and have the backend reject it.
pub(crate) fn failed_apply(state: &SessionState, message: &str) -> SessionState {
    let (state, effects) = step(state, Intent::Apply);
    step(
        &state,
        Completion::Applied {
            op: effects[0].op(),
            result: Err(GatewayError::transformation(message)),
            at: SystemTime::UNIX_EPOCH,
        },
    )
    .0
}
