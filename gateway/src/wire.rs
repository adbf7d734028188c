//! JSON shapes exchanged with the backend.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use wrangle_types::Record;

fn default_success() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadResponse {
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Body of `GET /data` and `POST /apply-transformation`.
///
/// The apply endpoint names its rows `new_data`.
#[derive(Debug, Deserialize)]
pub(crate) struct TableResponse {
    #[serde(alias = "new_data")]
    pub data: Vec<Record>,
    #[serde(default)]
    pub columns: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SuggestionsResponse {
    #[serde(default)]
    pub suggestions: Vec<Value>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ApplyRequest<'a> {
    pub suggestion: &'a Value,
}

/// Extract a bare file name from a `Content-Disposition` header value.
///
/// Accepts quoted and unquoted `filename=` parameters. Directory components are dropped
/// so the result is always safe to join onto an export directory.
#[must_use]
pub fn content_disposition_filename(header: &str) -> Option<String> {
    let raw = header.split(';').map(str::trim).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("filename")
            .then(|| value.trim().trim_matches('"'))
    })?;
    let name = Path::new(&raw.replace('\\', "/"))
        .file_name()?
        .to_string_lossy()
        .into_owned();
    (!name.is_empty() && name != "." && name != "..").then_some(name)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{TableResponse, UploadResponse, content_disposition_filename};

    #[test]
    fn filename_from_quoted_and_bare_params() {
        assert_eq!(
            content_disposition_filename(r#"attachment; filename="911.csv""#).as_deref(),
            Some("911.csv")
        );
        assert_eq!(
            content_disposition_filename("attachment; filename=cleaned.csv").as_deref(),
            Some("cleaned.csv")
        );
        assert_eq!(content_disposition_filename("inline"), None);
    }

    #[test]
    fn filename_drops_directory_components() {
        assert_eq!(
            content_disposition_filename(r#"attachment; filename="../../etc/passwd""#).as_deref(),
            Some("passwd")
        );
        assert_eq!(
            content_disposition_filename(r#"attachment; filename="C:\\temp\\out.csv""#).as_deref(),
            Some("out.csv")
        );
        assert_eq!(content_disposition_filename(r#"attachment; filename="..""#), None);
    }

    #[test]
    fn apply_body_uses_new_data_alias() {
        let body = json!({
            "new_data": [{"zip": 19525, "title": "EMS"}],
            "columns": ["zip", "title"],
        });
        let parsed: TableResponse = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.data.len(), 1);
        assert_eq!(parsed.columns, vec!["zip", "title"]);
    }

    #[test]
    fn upload_body_without_success_flag_counts_as_success() {
        let parsed: UploadResponse =
            serde_json::from_value(json!({"message": "File uploaded successfully"})).unwrap();
        assert!(parsed.success);
        assert_eq!(parsed.message.as_deref(), Some("File uploaded successfully"));
    }
}
