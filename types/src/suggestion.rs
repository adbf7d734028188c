//! Suggestions, suggestion batches, and the applied-transformation history.

use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::SystemTime;

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;

use crate::DatasetVersion;

/// Identifier of a suggestion, unique within one batch.
///
/// Backends send either numbers or strings; both normalize to text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SuggestionId(String);

impl SuggestionId {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.trim().is_empty() => Some(Self(s.clone())),
            Value::Number(n) => Some(Self(n.to_string())),
            _ => None,
        }
    }
}

impl From<u64> for SuggestionId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for SuggestionId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl std::fmt::Display for SuggestionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SuggestionDecodeError {
    #[error("suggestion is not a JSON object")]
    NotAnObject,
    #[error("suggestion is missing an `id`")]
    MissingId,
    #[error("suggestion {id} is missing a `title`")]
    MissingTitle { id: SuggestionId },
}

/// One candidate transformation proposed by the backend.
///
/// The full backend object is kept as `payload` and sent back verbatim on apply;
/// the client never interprets it beyond the display fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    id: SuggestionId,
    title: String,
    explanation: String,
    code: Option<String>,
    payload: Value,
}

impl Suggestion {
    pub fn from_payload(payload: Value) -> Result<Self, SuggestionDecodeError> {
        let Value::Object(map) = &payload else {
            return Err(SuggestionDecodeError::NotAnObject);
        };
        let id = map
            .get("id")
            .and_then(SuggestionId::from_json)
            .ok_or(SuggestionDecodeError::MissingId)?;
        let title = map
            .get("title")
            .and_then(Value::as_str)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| SuggestionDecodeError::MissingTitle { id: id.clone() })?
            .to_owned();
        let explanation = map
            .get("explanation")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        let code = map
            .get("code")
            .and_then(Value::as_str)
            .filter(|c| !c.trim().is_empty())
            .map(str::to_owned);

        Ok(Self {
            id,
            title,
            explanation,
            code,
            payload,
        })
    }

    #[must_use]
    pub fn id(&self) -> &SuggestionId {
        &self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    /// Backend-generated code, if the suggestion carried any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    /// The opaque instruction the backend needs to apply this suggestion.
    #[must_use]
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Code shown in the preview pane.
    ///
    /// Falls back to a comment block naming the suggestion when no code was sent.
    #[must_use]
    pub fn code_preview(&self) -> Cow<'_, str> {
        if let Some(code) = &self.code {
            return Cow::Borrowed(code);
        }
        let mut preview = format!("# Generated code for: {}", self.title);
        if !self.explanation.trim().is_empty() {
            preview.push_str("\n# ");
            preview.push_str(&self.explanation);
        }
        Cow::Owned(preview)
    }
}

impl<'de> Deserialize<'de> for Suggestion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let payload = Value::deserialize(deserializer)?;
        Suggestion::from_payload(payload).map_err(serde::de::Error::custom)
    }
}

/// Client-detected consistency violations. Never sent to the network.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConsistencyError {
    #[error("suggestion {id} is not part of the current suggestion batch")]
    UnknownSuggestion { id: SuggestionId },
    #[error("suggestion batch for {batch} does not match dataset {dataset}")]
    StaleBatch {
        batch: DatasetVersion,
        dataset: DatasetVersion,
    },
}

/// The ordered suggestions computed against one dataset version.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SuggestionBatch {
    version: DatasetVersion,
    suggestions: Arc<[Suggestion]>,
}

impl SuggestionBatch {
    /// Build a batch, dropping later suggestions whose id was already seen.
    ///
    /// Returns the dropped ids alongside the batch.
    #[must_use]
    pub fn new(version: DatasetVersion, suggestions: Vec<Suggestion>) -> (Self, Vec<SuggestionId>) {
        let mut seen = HashSet::with_capacity(suggestions.len());
        let mut dropped = Vec::new();
        let mut kept = Vec::with_capacity(suggestions.len());
        for suggestion in suggestions {
            if seen.insert(suggestion.id.clone()) {
                kept.push(suggestion);
            } else {
                dropped.push(suggestion.id);
            }
        }
        (
            Self {
                version,
                suggestions: kept.into(),
            },
            dropped,
        )
    }

    #[must_use]
    pub fn empty(version: DatasetVersion) -> Self {
        Self {
            version,
            suggestions: Arc::from(Vec::new()),
        }
    }

    #[must_use]
    pub fn version(&self) -> DatasetVersion {
        self.version
    }

    #[must_use]
    pub fn get(&self, id: &SuggestionId) -> Option<&Suggestion> {
        self.suggestions.iter().find(|s| &s.id == id)
    }

    #[must_use]
    pub fn position(&self, id: &SuggestionId) -> Option<usize> {
        self.suggestions.iter().position(|s| &s.id == id)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Suggestion] {
        &self.suggestions
    }

    pub fn iter(&self) -> impl Iterator<Item = &Suggestion> {
        self.suggestions.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.suggestions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.suggestions.is_empty()
    }

    /// Verify this batch was computed against `dataset`.
    pub fn ensure_matches(&self, dataset: DatasetVersion) -> Result<(), ConsistencyError> {
        if self.version == dataset {
            Ok(())
        } else {
            Err(ConsistencyError::StaleBatch {
                batch: self.version,
                dataset,
            })
        }
    }
}

/// Immutable snapshot of a suggestion that was successfully applied.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformationRecord {
    sequence: usize,
    suggestion: Suggestion,
    applied_to: DatasetVersion,
    applied_at: SystemTime,
}

impl TransformationRecord {
    /// 1-based position in the history.
    #[must_use]
    pub fn sequence(&self) -> usize {
        self.sequence
    }

    #[must_use]
    pub fn suggestion(&self) -> &Suggestion {
        &self.suggestion
    }

    /// Dataset version the suggestion was applied against.
    #[must_use]
    pub fn applied_to(&self) -> DatasetVersion {
        self.applied_to
    }

    #[must_use]
    pub fn applied_at(&self) -> SystemTime {
        self.applied_at
    }
}

/// Append-only, strictly chronological history of applied transformations.
///
/// There is no removal or reordering API.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransformationHistory {
    records: Arc<Vec<TransformationRecord>>,
}

impl TransformationHistory {
    /// A new history with one more record; `self` is left untouched.
    #[must_use]
    pub fn appended(
        &self,
        suggestion: Suggestion,
        applied_to: DatasetVersion,
        applied_at: SystemTime,
    ) -> Self {
        let mut records = Vec::clone(&self.records);
        records.push(TransformationRecord {
            sequence: records.len() + 1,
            suggestion,
            applied_to,
            applied_at,
        });
        Self {
            records: Arc::new(records),
        }
    }

    #[must_use]
    pub fn records(&self) -> &[TransformationRecord] {
        &self.records
    }

    #[must_use]
    pub fn last(&self) -> Option<&TransformationRecord> {
        self.records.last()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
