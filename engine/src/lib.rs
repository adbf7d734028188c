//! Session engine for Wrangle: state machine and orchestration.
//!
//! This crate owns the authoritative session state without any TUI dependencies.
//!
//! - [`transition`] - Pure `(state, event) -> (state, effects)` function
//! - [`SessionRuntime`] - Executes effects against a [`Gateway`] and folds completions back in
//! - [`WrangleConfig`] - `~/.wrangle/config.toml` loading and resolution into [`Settings`]
//!
//! Presentation code reads [`SessionState`] snapshots and raises [`Intent`]s; it never
//! mutates session state directly.

mod config;
mod event;
mod export;
mod operation;
mod runtime;
mod state;
mod transition;

pub use config::{
    API_URL_ENV, AppConfig, BackendConfig, ConfigError, DEFAULT_PAGE_SIZE, Settings,
    WrangleConfig, config_path, expand_env_vars,
};
pub use event::{Completion, Effect, Event, Intent, Rejected};
pub use export::{ExportError, csv_file_name, render_script, script_file_name};
pub use operation::{PhaseEdge, is_legal_transition, transition_edge};
pub use runtime::SessionRuntime;
pub use state::{
    ApplyStage, LoadSource, LoadStage, Notice, NoticeLevel, OperationId, PendingApply,
    PendingLoad, Phase, PhaseTag, RefreshTicket, SessionState, SessionStatus,
};
pub use transition::{Disposition, Transition, transition};

pub use wrangle_gateway::{self, Gateway, GatewayConfig, GatewayError, HttpGateway};
pub use wrangle_types::{
    self, Dataset, DatasetVersion, NonEmptyString, Record, Scalar, Suggestion, SuggestionBatch,
    SuggestionId, TransformationHistory, TransformationRecord, UiOptions,
};
