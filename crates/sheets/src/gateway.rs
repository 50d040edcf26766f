use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use slotbook_core::errors::ApplicationError;
use slotbook_core::grid::{CellAddress, CellRange, GridError};

/// A store cell resolved at the boundary. Blank strings and missing cells are both `Empty`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CellValue {
    Text(String),
    Empty,
}

static EMPTY_CELL: CellValue = CellValue::Empty;

impl CellValue {
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.is_empty() {
            Self::Empty
        } else {
            Self::Text(value)
        }
    }

    /// Numbers and booleans are rendered as text; nulls, blanks and nested values are empty.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::String(text) => Self::text(text.as_str()),
            Value::Number(number) => Self::Text(number.to_string()),
            Value::Bool(flag) => Self::Text(flag.to_string()),
            Value::Null | Value::Array(_) | Value::Object(_) => Self::Empty,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Text(text) => text,
            Self::Empty => "",
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// The cell text, or `default` when the cell is empty.
    pub fn text_or<'a>(&'a self, default: &'a str) -> &'a str {
        match self {
            Self::Text(text) => text,
            Self::Empty => default,
        }
    }
}

/// A block of cells, row-major and relative to the top-left corner of the requested range.
/// Trailing empty rows and cells may be absent; lookups past the end read as empty.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValueRange {
    rows: Vec<Vec<CellValue>>,
}

impl ValueRange {
    pub fn new(rows: Vec<Vec<CellValue>>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn row(&self, row: usize) -> &[CellValue] {
        self.rows.get(row).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn cell(&self, row: usize, column: usize) -> &CellValue {
        self.row(row).get(column).unwrap_or(&EMPTY_CELL)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|row| row.iter().all(CellValue::is_empty))
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Request(String),
    #[error("store returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("could not decode store response: {0}")]
    Decode(String),
    #[error("store authentication failed: {0}")]
    Auth(String),
    #[error(transparent)]
    Grid(#[from] GridError),
}

impl From<StoreError> for ApplicationError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Grid(error) => Self::Domain(error.into()),
            other => Self::Store(other.to_string()),
        }
    }
}

/// Cell-level access to a remote spreadsheet. Every call is one remote round trip and is never
/// retried here.
#[async_trait]
pub trait TabularStore: Send + Sync {
    async fn read_range(&self, sheet: &str, range: &CellRange) -> Result<ValueRange, StoreError>;
    async fn append_row(&self, sheet: &str, values: Vec<String>) -> Result<(), StoreError>;
    /// Overwrites one cell verbatim; `""` clears it.
    async fn update_cell(
        &self,
        sheet: &str,
        cell: CellAddress,
        value: &str,
    ) -> Result<(), StoreError>;
}

/// `Sheet!A1:B2`, quoting sheet names that are not plain identifiers.
pub fn qualified_range(sheet: &str, range: &CellRange) -> String {
    let plain = !sheet.is_empty() && sheet.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
    if plain {
        format!("{sheet}!{range}")
    } else {
        format!("'{}'!{range}", sheet.replace('\'', "''"))
    }
}
