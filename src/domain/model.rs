use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::utils::error::{EtlError, Result};

/// One study exactly as the registry returned it.
pub type RawRecord = serde_json::Value;

/// Leaf value of a flattened record. JSON `null` becomes empty text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlatValue {
    Text(String),
    Number(serde_json::Number),
    Bool(bool),
}

impl FlatValue {
    pub fn empty() -> Self {
        FlatValue::Text(String::new())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, FlatValue::Text(s) if s.is_empty())
    }
}

impl fmt::Display for FlatValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlatValue::Text(s) => f.write_str(s),
            FlatValue::Number(n) => write!(f, "{}", n),
            FlatValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for FlatValue {
    fn from(value: &str) -> Self {
        FlatValue::Text(value.to_string())
    }
}

impl From<String> for FlatValue {
    fn from(value: String) -> Self {
        FlatValue::Text(value)
    }
}

/// Dotted-path keyed leaves of one record. Ordering only makes iteration
/// deterministic; lookups never depend on it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlatRecord {
    fields: BTreeMap<String, FlatValue>,
}

impl FlatRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: FlatValue) {
        self.fields.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&FlatValue> {
        self.fields.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FlatValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>> FromIterator<(K, FlatValue)> for FlatRecord {
    fn from_iter<T: IntoIterator<Item = (K, FlatValue)>>(iter: T) -> Self {
        let mut record = FlatRecord::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

/// A row keyed by output column name, in output column order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectedRow {
    cells: Vec<(String, String)>,
}

impl ProjectedRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `column`, replacing an existing value in place.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<String>) {
        let column = column.into();
        let value = value.into();
        match self.cells.iter_mut().find(|(name, _)| *name == column) {
            Some(cell) => cell.1 = value,
            None => self.cells.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(_, value)| value.as_str())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Rows sharing one header, written as a single sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputTable {
    header: Vec<String>,
    rows: Vec<ProjectedRow>,
}

impl OutputTable {
    pub fn new(header: Vec<String>) -> Self {
        Self {
            header,
            rows: Vec::new(),
        }
    }

    /// Appends a row whose columns must equal the header, in order.
    pub fn push(&mut self, row: ProjectedRow) -> Result<()> {
        if !row.columns().eq(self.header.iter().map(String::as_str)) {
            return Err(EtlError::ProcessingError {
                message: format!(
                    "row columns {:?} do not match table header {:?}",
                    row.columns().collect::<Vec<_>>(),
                    self.header
                ),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn rows(&self) -> &[ProjectedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.header.iter().position(|name| name == column)
    }
}

/// Raw records gathered across all pages of one run.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub records: Vec<RawRecord>,
    pub pages: usize,
    /// False when a page failed and the sequence ended early.
    pub complete: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadResult {
    pub path: PathBuf,
    pub rows: usize,
    pub formatted: bool,
}

/// Summary message handed to a notifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub row_count: usize,
    pub attachment: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    Sent,
    Skipped,
    AuthenticationFailed(String),
    ProtocolFailed(String),
    Failed(String),
}

impl NotifyOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, NotifyOutcome::Sent)
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub pages_fetched: usize,
    pub records_fetched: usize,
    pub fetch_complete: bool,
    pub rows_retained: usize,
    pub output: Option<LoadResult>,
    pub notification: NotifyOutcome,
}
