//! Client for the Wrangle suggestion backend.
//!
//! # Architecture
//!
//! - [`Gateway`] - The five backend operations the session engine depends on
//! - [`HttpGateway`] - reqwest implementation over the backend's JSON/multipart contract
//! - [`GatewayError`] - Failure taxonomy shared by every implementation
//!
//! # Endpoints
//!
//! All paths are relative to the configured base URL (default
//! `http://localhost:5000/api`):
//!
//! | Operation | Request | Success body |
//! |-----------|---------|--------------|
//! | `upload_file` | `POST /upload` (multipart field `file`) | `{ success, message? }` |
//! | `fetch_data` | `GET /data` | `{ data, columns }` |
//! | `fetch_suggestions` | `GET /suggestions` | `{ suggestions }` |
//! | `apply_transformation` | `POST /apply-transformation` `{ suggestion }` | `{ new_data, columns }` |
//! | `export_current_data` | `GET /export-csv` | raw CSV bytes |
//!
//! # Error Handling
//!
//! Every operation returns `Result<_, GatewayError>`. Non-2xx responses are mapped per
//! endpoint (see [`GatewayError`]); network failures and undecodable 2xx bodies are
//! [`GatewayError::Transport`]. Implementations never retry.

mod error;
mod http;
mod wire;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

pub use error::{ErrorKind, GatewayError, extract_error_message};
pub use http::HttpGateway;
pub use wire::content_disposition_filename;
pub use wrangle_types;

use wrangle_types::{Dataset, FileFormat, Suggestion};

/// Default backend base URL.
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000/api";

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Backend endpoints, used for logging and status-code classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Upload,
    Data,
    Suggestions,
    Apply,
    Export,
}

impl Endpoint {
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Upload => "/upload",
            Self::Data => "/data",
            Self::Suggestions => "/suggestions",
            Self::Apply => "/apply-transformation",
            Self::Export => "/export-csv",
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayConfigError {
    #[error("invalid backend URL {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("backend URL {url:?} must use http or https")]
    UnsupportedScheme { url: String },
}

/// Connection settings for [`HttpGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    base_url: String,
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl GatewayConfig {
    /// Validate `base_url` and build a config with default timeouts.
    pub fn new(base_url: &str) -> Result<Self, GatewayConfigError> {
        let trimmed = base_url.trim();
        let parsed =
            reqwest::Url::parse(trimmed).map_err(|e| GatewayConfigError::InvalidBaseUrl {
                url: trimmed.to_string(),
                reason: e.to_string(),
            })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(GatewayConfigError::UnsupportedScheme {
                url: trimmed.to_string(),
            });
        }
        Ok(Self {
            base_url: trimmed.trim_end_matches('/').to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub(crate) fn url_for(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path())
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// A local file staged for upload.
///
/// Construction validates the extension, so an unsupported file never reaches the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    file_name: String,
    format: FileFormat,
    bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, GatewayError> {
        let file_name = file_name.into();
        let format = FileFormat::from_path(Path::new(&file_name))
            .map_err(|e| GatewayError::validation(e.to_string()))?;
        Ok(Self {
            file_name,
            format,
            bytes,
        })
    }

    /// Read `path` from disk.
    pub async fn read(path: &Path) -> Result<Self, GatewayError> {
        let format = FileFormat::from_path(path).map_err(|e| GatewayError::validation(e.to_string()))?;
        let file_name = display_name(path);
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| GatewayError::Unreadable {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self {
            file_name,
            format,
            bytes,
        })
    }

    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    #[must_use]
    pub fn format(&self) -> FileFormat {
        self.format
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub(crate) fn into_parts(self) -> (String, FileFormat, Vec<u8>) {
        (self.file_name, self.format, self.bytes)
    }
}

/// Final path component of `path`, or the whole path when it has none.
#[must_use]
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.to_string_lossy(), |name| name.to_string_lossy())
        .into_owned()
}

/// Backend acknowledgement of an upload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReceipt {
    pub message: Option<String>,
}

/// CSV bytes returned by the export endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFile {
    /// Bare file name suggested by the backend, with any directory components removed.
    pub file_name: Option<String>,
    pub bytes: Vec<u8>,
}

/// The backend operations the session engine relies on.
///
/// Implementations must be cheap to share across tasks; the engine holds one behind an
/// `Arc` and issues each call from a spawned task.
pub trait Gateway: Send + Sync + 'static {
    /// Replace the backend's dataset with `file`.
    fn upload_file(
        &self,
        file: UploadFile,
    ) -> impl Future<Output = Result<UploadReceipt, GatewayError>> + Send;

    /// Current dataset, normalized so every record carries every column.
    fn fetch_data(&self) -> impl Future<Output = Result<Dataset, GatewayError>> + Send;

    /// Suggestions for the current dataset, in backend order.
    fn fetch_suggestions(&self)
    -> impl Future<Output = Result<Vec<Suggestion>, GatewayError>> + Send;

    /// Apply `suggestion` and return the resulting dataset.
    fn apply_transformation(
        &self,
        suggestion: &Suggestion,
    ) -> impl Future<Output = Result<Dataset, GatewayError>> + Send;

    /// Current dataset serialized as CSV by the backend.
    fn export_current_data(&self)
    -> impl Future<Output = Result<ExportedFile, GatewayError>> + Send;
}
