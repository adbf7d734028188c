//! Inputs to and outputs from the session state machine.

use std::path::PathBuf;
use std::time::SystemTime;

use thiserror::Error;

use wrangle_gateway::{GatewayError, UploadReceipt};
use wrangle_types::{
    ConsistencyError, Dataset, Suggestion, SuggestionId, UnsupportedFormat,
};

use crate::export::ExportError;
use crate::state::{OperationId, PhaseTag};

/// User-initiated requests raised by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Upload(PathBuf),
    Sync,
    Select(SuggestionId),
    Discard,
    Apply,
    RefreshSuggestions,
    ExportData,
    ExportCode,
    DismissError,
}

impl Intent {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Intent::Upload(_) => "upload",
            Intent::Sync => "sync",
            Intent::Select(_) => "select",
            Intent::Discard => "discard",
            Intent::Apply => "apply",
            Intent::RefreshSuggestions => "refresh_suggestions",
            Intent::ExportData => "export_data",
            Intent::ExportCode => "export_code",
            Intent::DismissError => "dismiss_error",
        }
    }
}

/// Result of a side effect, fed back into the state machine.
#[derive(Debug)]
pub enum Completion {
    Uploaded {
        op: OperationId,
        result: Result<UploadReceipt, GatewayError>,
    },
    DataFetched {
        op: OperationId,
        result: Result<Dataset, GatewayError>,
    },
    SuggestionsFetched {
        op: OperationId,
        result: Result<Vec<Suggestion>, GatewayError>,
    },
    Applied {
        op: OperationId,
        result: Result<Dataset, GatewayError>,
        at: SystemTime,
    },
    DataExported {
        op: OperationId,
        result: Result<PathBuf, ExportError>,
    },
    ScriptWritten {
        op: OperationId,
        result: Result<PathBuf, ExportError>,
    },
}

impl Completion {
    #[must_use]
    pub fn op(&self) -> OperationId {
        match self {
            Completion::Uploaded { op, .. }
            | Completion::DataFetched { op, .. }
            | Completion::SuggestionsFetched { op, .. }
            | Completion::Applied { op, .. }
            | Completion::DataExported { op, .. }
            | Completion::ScriptWritten { op, .. } => *op,
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Completion::Uploaded { .. } => "uploaded",
            Completion::DataFetched { .. } => "data_fetched",
            Completion::SuggestionsFetched { .. } => "suggestions_fetched",
            Completion::Applied { .. } => "applied",
            Completion::DataExported { .. } => "data_exported",
            Completion::ScriptWritten { .. } => "script_written",
        }
    }
}

#[derive(Debug)]
pub enum Event {
    Intent(Intent),
    Completion(Completion),
}

impl From<Intent> for Event {
    fn from(intent: Intent) -> Self {
        Event::Intent(intent)
    }
}

impl From<Completion> for Event {
    fn from(completion: Completion) -> Self {
        Event::Completion(completion)
    }
}

/// Side effects requested by a transition. Executed by the runtime, never by
/// the state machine itself.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    UploadFile {
        op: OperationId,
        path: PathBuf,
    },
    FetchData {
        op: OperationId,
    },
    FetchSuggestions {
        op: OperationId,
    },
    ApplyTransformation {
        op: OperationId,
        suggestion: Suggestion,
    },
    ExportData {
        op: OperationId,
        fallback_name: String,
    },
    WriteScript {
        op: OperationId,
        file_name: String,
        contents: String,
    },
}

impl Effect {
    #[must_use]
    pub fn op(&self) -> OperationId {
        match self {
            Effect::UploadFile { op, .. }
            | Effect::FetchData { op }
            | Effect::FetchSuggestions { op }
            | Effect::ApplyTransformation { op, .. }
            | Effect::ExportData { op, .. }
            | Effect::WriteScript { op, .. } => *op,
        }
    }
}

/// Why an intent was refused. Rejections leave the session untouched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Rejected {
    #[error("busy: wait for the current {phase} operation to finish")]
    Busy { phase: PhaseTag },
    #[error("no dataset loaded")]
    NoDataset,
    #[error("no suggestion selected")]
    NothingSelected,
    #[error("no transformations applied yet")]
    EmptyHistory,
    #[error(transparent)]
    UnsupportedFile(#[from] UnsupportedFormat),
    #[error(transparent)]
    Consistency(#[from] ConsistencyError),
}
