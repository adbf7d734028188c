//! Tabular dataset types.
//!
//! A [`Dataset`] is replaced wholesale on every change and never mutated in
//! place, so it is shared behind an `Arc` by the engine and handed to the UI as
//! a read-only snapshot.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// A single cell value. Nested arrays/objects are not valid cells.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    #[default]
    Null,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

static NULL: Scalar = Scalar::Null;

impl Scalar {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// Text used for display and filtering. Null renders as empty.
    #[must_use]
    pub fn display(&self) -> Cow<'_, str> {
        match self {
            Scalar::Null => Cow::Borrowed(""),
            Scalar::Bool(b) => Cow::Borrowed(if *b { "true" } else { "false" }),
            Scalar::Number(n) => Cow::Owned(n.to_string()),
            Scalar::Text(s) => Cow::Borrowed(s),
        }
    }

    const fn rank(&self) -> u8 {
        match self {
            Scalar::Null => 0,
            Scalar::Bool(_) => 1,
            Scalar::Number(_) => 2,
            Scalar::Text(_) => 3,
        }
    }

    /// Total order used by the data preview: null < bool < number < text.
    ///
    /// Numbers compare numerically (not lexically), text compares by code point.
    #[must_use]
    pub fn sort_cmp(&self, other: &Scalar) -> Ordering {
        match (self, other) {
            (Scalar::Bool(a), Scalar::Bool(b)) => a.cmp(b),
            (Scalar::Number(a), Scalar::Number(b)) => {
                let a = a.as_f64().unwrap_or(f64::NAN);
                let b = b.as_f64().unwrap_or(f64::NAN);
                a.total_cmp(&b)
            }
            (Scalar::Text(a), Scalar::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_owned())
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Number(value.into())
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Scalar::Number(value.into())
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        serde_json::Number::from_f64(value).map_or(Scalar::Null, Scalar::Number)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

/// One row: column name to cell value. Missing keys read as null.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, Scalar>);

impl Record {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.0.insert(column.into(), value.into());
        self
    }

    /// Cell for `column`, or null when the record has no such key.
    #[must_use]
    pub fn get(&self, column: &str) -> &Scalar {
        self.0.get(column).unwrap_or(&NULL)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Scalar)> for Record {
    fn from_iter<T: IntoIterator<Item = (String, Scalar)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Monotonic identity of the dataset a session currently holds.
///
/// Suggestions are only meaningful against the version they were fetched for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DatasetVersion(u64);

impl DatasetVersion {
    pub const INITIAL: Self = Self(0);

    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for DatasetVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Columns that had to be added to keep every record key declared.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SchemaRepair {
    pub added_columns: Vec<String>,
    pub derived: bool,
}

impl SchemaRepair {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.added_columns.is_empty()
    }
}

/// Ordered records plus the declared display order of columns.
///
/// Invariant: every record key appears in `columns`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    columns: Vec<String>,
    records: Vec<Record>,
}

impl Dataset {
    /// Build a dataset, repairing the column list so it covers every record key.
    ///
    /// Declared columns keep their order (duplicates dropped); undeclared keys are
    /// appended in sorted order. With no declared columns the list is derived entirely
    /// from the records and `SchemaRepair::derived` is set.
    #[must_use]
    pub fn normalized(columns: Vec<String>, records: Vec<Record>) -> (Self, SchemaRepair) {
        let derived = columns.is_empty() && !records.is_empty();
        let mut seen = BTreeSet::new();
        let mut ordered = Vec::with_capacity(columns.len());
        for column in columns {
            if seen.insert(column.clone()) {
                ordered.push(column);
            }
        }

        let undeclared: BTreeSet<&str> = records
            .iter()
            .flat_map(Record::keys)
            .filter(|key| !seen.contains(*key))
            .collect();
        let added_columns: Vec<String> = undeclared.into_iter().map(str::to_owned).collect();
        ordered.extend(added_columns.iter().cloned());

        let repair = SchemaRepair {
            added_columns,
            derived,
        };
        (
            Self {
                columns: ordered,
                records,
            },
            repair,
        )
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Cell at `row` / `column`, null when either is absent.
    #[must_use]
    pub fn cell(&self, row: usize, column: &str) -> &Scalar {
        self.records.get(row).map_or(&NULL, |record| record.get(column))
    }
}
