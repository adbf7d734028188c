//! Accepted upload formats.

use std::path::Path;

use thiserror::Error;

/// File formats the backend can ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileFormat {
    Csv,
    Xlsx,
    Xls,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unsupported file type {extension:?}: expected .csv, .xlsx or .xls")]
pub struct UnsupportedFormat {
    pub extension: String,
}

impl FileFormat {
    /// Classify a path by its extension (case-insensitive).
    pub fn from_path(path: &Path) -> Result<Self, UnsupportedFormat> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        match extension.as_str() {
            "csv" => Ok(Self::Csv),
            "xlsx" => Ok(Self::Xlsx),
            "xls" => Ok(Self::Xls),
            _ => Err(UnsupportedFormat { extension }),
        }
    }

    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Csv => "text/csv",
            Self::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            Self::Xls => "application/vnd.ms-excel",
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Xlsx => "xlsx",
            Self::Xls => "xls",
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::FileFormat;

    #[test]
    fn accepts_csv_and_spreadsheets() {
        assert_eq!(FileFormat::from_path(Path::new("911.csv")), Ok(FileFormat::Csv));
        assert_eq!(FileFormat::from_path(Path::new("/tmp/Q3.XLSX")), Ok(FileFormat::Xlsx));
        assert_eq!(FileFormat::from_path(Path::new("legacy.xls")), Ok(FileFormat::Xls));
    }

    #[test]
    fn rejects_other_extensions() {
        let err = FileFormat::from_path(Path::new("notes.txt")).unwrap_err();
        assert_eq!(err.extension, "txt");
        assert!(FileFormat::from_path(Path::new("no_extension")).is_err());
        assert!(FileFormat::from_path(Path::new("archive.csv.gz")).is_err());
    }
}
