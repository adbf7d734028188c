//! Session state types.
//!
//! [`SessionState`] is immutable per transition: [`crate::transition`] takes a reference
//! and returns a new value. Large members sit behind `Arc` so a transition that only
//! touches the selection or phase costs a handful of refcount bumps.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use wrangle_types::{
    ConsistencyError, Dataset, DatasetVersion, NonEmptyString, Suggestion, SuggestionBatch,
    SuggestionId, TransformationHistory,
};

/// Identifies one asynchronous operation so its completion can be matched to the
/// request that started it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationId(u64);

impl OperationId {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op#{}", self.0)
    }
}

/// What started a dataset load.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadSource {
    /// User uploaded a file; `label` is its display name.
    Upload { path: PathBuf, label: String },
    /// Pull whatever the backend currently holds.
    Sync,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadStage {
    Sending,
    FetchingData,
    /// The new dataset is staged here, uncommitted, until its suggestions arrive.
    FetchingSuggestions { dataset: Arc<Dataset> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingLoad {
    pub op: OperationId,
    pub source: LoadSource,
    pub stage: LoadStage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyStage {
    Submitting,
    /// Dataset already replaced; waiting on suggestions for the new version.
    RefreshingSuggestions,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingApply {
    pub op: OperationId,
    pub suggestion: Suggestion,
    pub stage: ApplyStage,
}

/// Read-only suggestion fetch that is not part of a mutating operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshTicket {
    pub op: OperationId,
    pub version: DatasetVersion,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Empty,
    Loading(PendingLoad),
    Ready,
    Applying(PendingApply),
    Error(NonEmptyString),
}

/// Variant-only view of [`Phase`], used by the transition graph and in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseTag {
    Empty,
    Loading,
    Ready,
    Applying,
    Error,
}

impl PhaseTag {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Applying => "applying",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for PhaseTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Phase {
    #[must_use]
    pub fn tag(&self) -> PhaseTag {
        match self {
            Phase::Empty => PhaseTag::Empty,
            Phase::Loading(_) => PhaseTag::Loading,
            Phase::Ready => PhaseTag::Ready,
            Phase::Applying(_) => PhaseTag::Applying,
            Phase::Error(_) => PhaseTag::Error,
        }
    }

    /// Whether a mutating operation (upload, sync, apply) is in flight.
    #[must_use]
    pub fn is_mutating(&self) -> bool {
        matches!(self, Phase::Loading(_) | Phase::Applying(_))
    }
}

/// Coarse status shown to the user and used to gate affordances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Empty,
    Loading,
    Ready,
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
}

/// Transient, non-error message. Cleared by the next accepted intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            text: text.into(),
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            text: text.into(),
        }
    }
}

/// The authoritative session record.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub(crate) dataset: Option<Arc<Dataset>>,
    pub(crate) version: DatasetVersion,
    pub(crate) batch: SuggestionBatch,
    pub(crate) selection: Option<SuggestionId>,
    pub(crate) history: TransformationHistory,
    pub(crate) phase: Phase,
    pub(crate) refresh: Option<RefreshTicket>,
    pub(crate) label: Option<String>,
    pub(crate) notice: Option<Notice>,
    pub(crate) next_op: u64,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            dataset: None,
            version: DatasetVersion::INITIAL,
            batch: SuggestionBatch::empty(DatasetVersion::INITIAL),
            selection: None,
            history: TransformationHistory::default(),
            phase: Phase::Empty,
            refresh: None,
            label: None,
            notice: None,
            next_op: 1,
        }
    }

    #[must_use]
    pub fn dataset(&self) -> Option<&Arc<Dataset>> {
        self.dataset.as_ref()
    }

    #[must_use]
    pub fn version(&self) -> DatasetVersion {
        self.version
    }

    #[must_use]
    pub fn suggestions(&self) -> &SuggestionBatch {
        &self.batch
    }

    #[must_use]
    pub fn selection(&self) -> Option<&SuggestionId> {
        self.selection.as_ref()
    }

    /// The selected suggestion, resolved against the current batch.
    #[must_use]
    pub fn selected(&self) -> Option<&Suggestion> {
        self.selection.as_ref().and_then(|id| self.batch.get(id))
    }

    #[must_use]
    pub fn history(&self) -> &TransformationHistory {
        &self.history
    }

    #[must_use]
    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    #[must_use]
    pub fn refresh(&self) -> Option<RefreshTicket> {
        self.refresh
    }

    /// Display name of the loaded dataset (the uploaded file name).
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    #[must_use]
    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        match &self.phase {
            Phase::Loading(_) | Phase::Applying(_) => SessionStatus::Loading,
            Phase::Error(message) => SessionStatus::Error(message.to_string()),
            Phase::Empty | Phase::Ready if self.refresh.is_some() => SessionStatus::Loading,
            Phase::Empty => SessionStatus::Empty,
            Phase::Ready => SessionStatus::Ready,
        }
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.phase.is_mutating()
    }

    #[must_use]
    pub fn can_upload(&self) -> bool {
        !self.is_busy()
    }

    #[must_use]
    pub fn can_apply(&self) -> bool {
        !self.is_busy() && self.dataset.is_some() && self.selected().is_some()
    }

    #[must_use]
    pub fn can_refresh(&self) -> bool {
        !self.is_busy() && self.dataset.is_some()
    }

    /// Check the cross-entity invariants: the batch belongs to the current dataset
    /// version and the selection (if any) is part of that batch.
    pub fn check_consistency(&self) -> Result<(), ConsistencyError> {
        self.batch.ensure_matches(self.version)?;
        if let Some(id) = &self.selection
            && self.batch.get(id).is_none()
        {
            return Err(ConsistencyError::UnknownSuggestion { id: id.clone() });
        }
        Ok(())
    }

    /// Copy of `self` carrying `notice`. Used for rejected intents, which never
    /// go through a transition.
    #[must_use]
    pub fn with_notice(&self, notice: Notice) -> Self {
        Self {
            notice: Some(notice),
            ..self.clone()
        }
    }

    pub(crate) fn allocate_op(&mut self) -> OperationId {
        let op = OperationId(self.next_op);
        self.next_op += 1;
        op
    }
}
