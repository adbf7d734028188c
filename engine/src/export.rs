//! Export naming and the transformation-history script.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;

use wrangle_gateway::GatewayError;
use wrangle_types::{FileFormat, TransformationHistory, sanitize_cell_text};

const DEFAULT_STEM: &str = "dataset";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn stem(label: Option<&str>) -> String {
    label
        .and_then(|l| Path::new(l).file_stem())
        .map(|s| sanitize_cell_text(&s.to_string_lossy()).trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_STEM.to_string())
}

/// File name used for a CSV export when the backend does not suggest one.
#[must_use]
pub fn csv_file_name(label: Option<&str>) -> String {
    match label {
        Some(_) => format!("{}.csv", stem(label)),
        None => "export.csv".to_string(),
    }
}

/// File name for the exported transformation script.
#[must_use]
pub fn script_file_name(label: Option<&str>) -> String {
    format!("{}_transformations.py", stem(label))
}

fn python_string(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 2);
    out.push('"');
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Render the applied-transformation history as one Python script.
///
/// The script loads the source file and then runs each step's code in the order
/// it was applied.
#[must_use]
pub fn render_script(label: Option<&str>, history: &TransformationHistory) -> String {
    let source = label
        .map(|l| sanitize_cell_text(l).trim().to_string())
        .filter(|l| !l.is_empty());
    let mut out = String::new();

    let _ = writeln!(
        out,
        "# Transformations applied to {}",
        source.as_deref().unwrap_or(DEFAULT_STEM)
    );
    let _ = writeln!(out, "# Steps: {}", history.len());
    out.push('\n');
    out.push_str("import pandas as pd\n\n");

    let file = source
        .clone()
        .unwrap_or_else(|| format!("{DEFAULT_STEM}.csv"));
    let reader = match FileFormat::from_path(Path::new(&file)) {
        Ok(FileFormat::Xlsx | FileFormat::Xls) => "read_excel",
        Ok(FileFormat::Csv) | Err(_) => "read_csv",
    };
    let _ = writeln!(out, "df = pd.{reader}({})", python_string(&file));

    for record in history.records() {
        let suggestion = record.suggestion();
        let applied_at: DateTime<Utc> = record.applied_at().into();
        out.push('\n');
        let _ = writeln!(
            out,
            "# Step {}: {}",
            record.sequence(),
            sanitize_cell_text(suggestion.title())
        );
        let _ = writeln!(
            out,
            "# Applied {} to {}",
            applied_at.format("%Y-%m-%d %H:%M:%S UTC"),
            record.applied_to()
        );
        let code = suggestion.code_preview();
        out.push_str(code.trim_end());
        out.push('\n');
    }

    out
}
