//! Addressing for the booking grid.
//!
//! The grid is a fixed spreadsheet block: day labels live in row 1 (columns B..H),
//! time labels in column A (rows 2..10), and every cell in B2:H10 is one bookable slot.
//! Everything here is pure; store access lives in `slotbook-sheets`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const HEADER_ROW: u32 = 1;
pub const TIME_COLUMN: u32 = 1;
pub const FIRST_DAY_COLUMN: u32 = 2;
pub const LAST_DAY_COLUMN: u32 = 8;
pub const FIRST_SLOT_ROW: u32 = 2;
pub const LAST_SLOT_ROW: u32 = 10;
pub const SLOTS_PER_DAY: usize = (LAST_SLOT_ROW - FIRST_SLOT_ROW + 1) as usize;

const MAX_COLUMN: u32 = 26;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GridError {
    #[error("column index {0} is outside the single-letter range 1..=26")]
    ColumnOutOfRange(u32),
    #[error("`{0}` is not a single-letter column")]
    InvalidColumnLetter(String),
    #[error("`{0}` is not a valid cell reference")]
    InvalidCellReference(String),
    #[error("`{0}` is not a valid cell range")]
    InvalidRange(String),
    #[error("column {column}, row {row} is outside the bookable area B2:H10")]
    OutsideBookingArea { column: u32, row: u32 },
}

/// Maps a 1-based column index to its spreadsheet letter (`1 -> 'A'`).
pub fn column_letter(index: u32) -> Result<char, GridError> {
    if !(1..=MAX_COLUMN).contains(&index) {
        return Err(GridError::ColumnOutOfRange(index));
    }
    // bounded above, so the narrowing cannot truncate
    Ok(char::from(b'A' + (index - 1) as u8))
}

/// Inverse of [`column_letter`]; accepts either case.
pub fn column_index(letter: char) -> Result<u32, GridError> {
    let upper = letter.to_ascii_uppercase();
    if !upper.is_ascii_uppercase() {
        return Err(GridError::InvalidColumnLetter(letter.to_string()));
    }
    Ok(u32::from(upper as u8 - b'A') + 1)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellAddress {
    column: u32,
    row: u32,
}

impl CellAddress {
    pub fn new(column: u32, row: u32) -> Result<Self, GridError> {
        column_letter(column)?;
        if row == 0 {
            return Err(GridError::InvalidCellReference(format!("column {column}, row 0")));
        }
        Ok(Self { column, row })
    }

    const fn at(column: u32, row: u32) -> Self {
        Self { column, row }
    }

    pub fn column(&self) -> u32 {
        self.column
    }

    pub fn row(&self) -> u32 {
        self.row
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match column_letter(self.column) {
            Ok(letter) => write!(f, "{letter}{}", self.row),
            Err(_) => write!(f, "?{}", self.row),
        }
    }
}

impl FromStr for CellAddress {
    type Err = GridError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let invalid = || GridError::InvalidCellReference(value.to_owned());

        let mut chars = trimmed.chars();
        let letter = chars.next().ok_or_else(invalid)?;
        let digits = chars.as_str();
        if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
            return Err(invalid());
        }

        let column = column_index(letter).map_err(|_| invalid())?;
        let row = digits.parse::<u32>().map_err(|_| invalid())?;
        Self::new(column, row).map_err(|_| invalid())
    }
}

/// A bookable (day column, time row) pair inside B2:H10.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Slot {
    column: u32,
    row: u32,
}

impl Slot {
    pub fn new(column: u32, row: u32) -> Result<Self, GridError> {
        if !is_day_column(column) || !(FIRST_SLOT_ROW..=LAST_SLOT_ROW).contains(&row) {
            return Err(GridError::OutsideBookingArea { column, row });
        }
        Ok(Self { column, row })
    }

    pub fn from_cell(cell: CellAddress) -> Result<Self, GridError> {
        Self::new(cell.column, cell.row)
    }

    pub fn column(&self) -> u32 {
        self.column
    }

    pub fn row(&self) -> u32 {
        self.row
    }

    pub fn cell(&self) -> CellAddress {
        CellAddress::at(self.column, self.row)
    }
}

pub fn is_day_column(column: u32) -> bool {
    (FIRST_DAY_COLUMN..=LAST_DAY_COLUMN).contains(&column)
}

pub fn day_columns() -> impl Iterator<Item = u32> {
    FIRST_DAY_COLUMN..=LAST_DAY_COLUMN
}

pub fn slot_rows() -> impl Iterator<Item = u32> {
    FIRST_SLOT_ROW..=LAST_SLOT_ROW
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct RangeBound {
    column: u32,
    row: Option<u32>,
}

/// An A1-notation range: a single cell, a rectangle, or whole columns (`A:C`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CellRange {
    start: RangeBound,
    end: RangeBound,
}

impl CellRange {
    pub fn cell(cell: CellAddress) -> Self {
        let bound = RangeBound { column: cell.column, row: Some(cell.row) };
        Self { start: bound, end: bound }
    }

    pub fn rect(start: CellAddress, end: CellAddress) -> Result<Self, GridError> {
        if end.column < start.column || end.row < start.row {
            return Err(GridError::InvalidRange(format!("{start}:{end}")));
        }
        Ok(Self {
            start: RangeBound { column: start.column, row: Some(start.row) },
            end: RangeBound { column: end.column, row: Some(end.row) },
        })
    }

    pub fn columns(first: u32, last: u32) -> Result<Self, GridError> {
        column_letter(first)?;
        column_letter(last)?;
        if last < first {
            return Err(GridError::InvalidRange(format!("columns {first}..{last}")));
        }
        Ok(Self {
            start: RangeBound { column: first, row: None },
            end: RangeBound { column: last, row: None },
        })
    }

    pub fn first_column(&self) -> u32 {
        self.start.column
    }

    pub fn last_column(&self) -> u32 {
        self.end.column
    }

    pub fn first_row(&self) -> u32 {
        self.start.row.unwrap_or(1)
    }

    /// `None` for whole-column ranges.
    pub fn last_row(&self) -> Option<u32> {
        self.end.row
    }

    pub fn is_single_cell(&self) -> bool {
        self.start == self.end && self.start.row.is_some()
    }

    pub fn start_cell(&self) -> CellAddress {
        CellAddress::at(self.start.column, self.first_row())
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let render = |bound: RangeBound| -> String {
            let letter = column_letter(bound.column).unwrap_or('?');
            match bound.row {
                Some(row) => format!("{letter}{row}"),
                None => letter.to_string(),
            }
        };

        if self.is_single_cell() {
            return write!(f, "{}", render(self.start));
        }
        write!(f, "{}:{}", render(self.start), render(self.end))
    }
}

impl FromStr for CellRange {
    type Err = GridError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || GridError::InvalidRange(value.to_owned());
        let trimmed = value.trim();

        let Some((left, right)) = trimmed.split_once(':') else {
            return trimmed.parse::<CellAddress>().map(Self::cell).map_err(|_| invalid());
        };

        let parse_bound = |raw: &str| -> Result<RangeBound, GridError> {
            let mut chars = raw.chars();
            let letter = chars.next().ok_or_else(invalid)?;
            let column = column_index(letter).map_err(|_| invalid())?;
            let digits = chars.as_str();
            if digits.is_empty() {
                return Ok(RangeBound { column, row: None });
            }
            let cell = raw.parse::<CellAddress>().map_err(|_| invalid())?;
            Ok(RangeBound { column, row: Some(cell.row) })
        };

        let start = parse_bound(left)?;
        let end = parse_bound(right)?;
        match (start.row, end.row) {
            (Some(first_row), Some(last_row)) => Self::rect(
                CellAddress::at(start.column, first_row),
                CellAddress::at(end.column, last_row),
            )
            .map_err(|_| invalid()),
            (None, None) => Self::columns(start.column, end.column).map_err(|_| invalid()),
            _ => Err(invalid()),
        }
    }
}

/// `B1:H1`
pub fn day_header_range() -> CellRange {
    CellRange {
        start: RangeBound { column: FIRST_DAY_COLUMN, row: Some(HEADER_ROW) },
        end: RangeBound { column: LAST_DAY_COLUMN, row: Some(HEADER_ROW) },
    }
}

/// `A2:A10`
pub fn time_label_range() -> CellRange {
    CellRange {
        start: RangeBound { column: TIME_COLUMN, row: Some(FIRST_SLOT_ROW) },
        end: RangeBound { column: TIME_COLUMN, row: Some(LAST_SLOT_ROW) },
    }
}

/// The nine occupancy cells of one day column, e.g. `C2:C10`.
pub fn day_slots_range(column: u32) -> Result<CellRange, GridError> {
    if !is_day_column(column) {
        return Err(GridError::OutsideBookingArea { column, row: FIRST_SLOT_ROW });
    }
    Ok(CellRange {
        start: RangeBound { column, row: Some(FIRST_SLOT_ROW) },
        end: RangeBound { column, row: Some(LAST_SLOT_ROW) },
    })
}

/// The header cell of one day column, e.g. `C1`.
pub fn day_label_cell(column: u32) -> Result<CellAddress, GridError> {
    if !is_day_column(column) {
        return Err(GridError::OutsideBookingArea { column, row: HEADER_ROW });
    }
    Ok(CellAddress::at(column, HEADER_ROW))
}

/// `A1:H10`, headers included.
pub fn full_grid_range() -> CellRange {
    CellRange {
        start: RangeBound { column: TIME_COLUMN, row: Some(HEADER_ROW) },
        end: RangeBound { column: LAST_DAY_COLUMN, row: Some(LAST_SLOT_ROW) },
    }
}
