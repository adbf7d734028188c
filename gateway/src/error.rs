//! Gateway error taxonomy and backend error-body parsing.

use std::path::PathBuf;

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

use wrangle_types::{NonEmptyStaticStr, NonEmptyString, truncate_with_ellipsis};

use crate::Endpoint;

const MAX_DETAIL_CHARS: usize = 240;
const UNKNOWN_ERROR: NonEmptyStaticStr = NonEmptyStaticStr::new("unknown error");

/// Coarse classification of a [`GatewayError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Validation,
    NotFound,
    Transformation,
    Unreadable,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Network failure, timeout, server error, or an undecodable response.
    #[error("{}", transport_text(*.status, message))]
    Transport {
        status: Option<StatusCode>,
        message: NonEmptyString,
    },
    /// The backend (or the client, before sending) rejected the input format.
    #[error("{message}")]
    Validation { message: NonEmptyString },
    /// No dataset has been uploaded yet.
    #[error("{message}")]
    NotFound { message: NonEmptyString },
    /// The suggestion payload was rejected against the current dataset.
    #[error("{message}")]
    Transformation { message: NonEmptyString },
    /// A local upload file could not be read. Never reaches the network.
    #[error("cannot read {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn transport_text(status: Option<StatusCode>, message: &NonEmptyString) -> String {
    match status {
        Some(status) => format!("Backend error ({status}): {message}"),
        None => format!("Backend unreachable: {message}"),
    }
}

impl GatewayError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            status: None,
            message: NonEmptyString::or_fallback(message, UNKNOWN_ERROR),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: NonEmptyString::or_fallback(message, UNKNOWN_ERROR),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: NonEmptyString::or_fallback(message, UNKNOWN_ERROR),
        }
    }

    pub fn transformation(message: impl Into<String>) -> Self {
        Self::Transformation {
            message: NonEmptyString::or_fallback(message, UNKNOWN_ERROR),
        }
    }

    pub(crate) fn from_reqwest(endpoint: Endpoint, err: &reqwest::Error) -> Self {
        let detail = if err.is_timeout() {
            format!("{} timed out", endpoint.path())
        } else if err.is_connect() {
            format!("connection to {} failed", endpoint.path())
        } else {
            format!("{} failed: {err}", endpoint.path())
        };
        Self::transport(detail)
    }

    pub(crate) fn malformed(endpoint: Endpoint, err: &serde_json::Error) -> Self {
        Self::transport(format!("malformed response from {}: {err}", endpoint.path()))
    }

    /// Map a non-2xx response to the taxonomy for the endpoint that produced it.
    pub(crate) fn from_status(endpoint: Endpoint, status: StatusCode, body: &str) -> Self {
        let message = extract_error_message(body)
            .or_else(|| {
                let trimmed = body.trim();
                (!trimmed.is_empty() && !looks_like_markup(trimmed)).then(|| trimmed.to_string())
            })
            .map(|m| truncate_with_ellipsis(&m, MAX_DETAIL_CHARS))
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or(UNKNOWN_ERROR.as_str())
                    .to_string()
            });

        match (endpoint, status.as_u16()) {
            (Endpoint::Upload, 400 | 413 | 415 | 422) => Self::validation(message),
            (Endpoint::Apply, 400 | 404 | 409 | 422) => Self::transformation(message),
            (_, 404) => Self::not_found(message),
            _ => Self::Transport {
                status: Some(status),
                message: NonEmptyString::or_fallback(message, UNKNOWN_ERROR),
            },
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport { .. } => ErrorKind::Transport,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Transformation { .. } => ErrorKind::Transformation,
            Self::Unreadable { .. } => ErrorKind::Unreadable,
        }
    }
}

/// Pull a human-readable message out of a JSON error body.
///
/// Recognizes `{"error": "..."}`, `{"error": {"message": "..."}}`, `{"message": "..."}`,
/// `{"detail": "..."}` and a bare JSON string.
#[must_use]
pub fn extract_error_message(body: &str) -> Option<String> {
    let payload: Value = serde_json::from_str(body.trim()).ok()?;
    payload
        .get("error")
        .and_then(Value::as_str)
        .or_else(|| payload.pointer("/error/message").and_then(Value::as_str))
        .or_else(|| payload.get("message").and_then(Value::as_str))
        .or_else(|| payload.get("detail").and_then(Value::as_str))
        .or_else(|| payload.as_str())
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(ToString::to_string)
}

fn looks_like_markup(body: &str) -> bool {
    let lower = body.get(..body.len().min(64)).unwrap_or(body).to_ascii_lowercase();
    lower.starts_with("<!doctype") || lower.starts_with("<html")
}
