use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use slotbook_core::grid::{CellAddress, CellRange};

use crate::gateway::{CellValue, StoreError, TabularStore, ValueRange};

type SheetCells = BTreeMap<(u32, u32), String>;

/// Builds an [`InMemoryTabularStore`] with initial contents.
#[derive(Debug, Default)]
pub struct StoreSeed {
    sheets: HashMap<String, SheetCells>,
}

impl StoreSeed {
    /// Writes `rows` starting at column A of `first_row`. Empty strings leave cells blank.
    pub fn rows(mut self, sheet: &str, first_row: u32, rows: &[&[&str]]) -> Self {
        let cells = self.sheets.entry(sheet.to_owned()).or_default();
        for (row_offset, row) in rows.iter().enumerate() {
            for (column_offset, value) in row.iter().enumerate() {
                if value.is_empty() {
                    continue;
                }
                let key = (first_row + row_offset as u32, 1 + column_offset as u32);
                cells.insert(key, (*value).to_owned());
            }
        }
        self
    }

    pub fn cell(mut self, sheet: &str, cell: CellAddress, value: &str) -> Self {
        let cells = self.sheets.entry(sheet.to_owned()).or_default();
        if value.is_empty() {
            cells.remove(&(cell.row(), cell.column()));
        } else {
            cells.insert((cell.row(), cell.column()), value.to_owned());
        }
        self
    }

    pub fn build(self) -> InMemoryTabularStore {
        InMemoryTabularStore {
            sheets: Arc::new(RwLock::new(self.sheets)),
            unavailable: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// Process-local [`TabularStore`] with Sheets-like read semantics: trailing empty cells and
/// rows are dropped from results, and appends land below the last used row.
#[derive(Clone, Debug, Default)]
pub struct InMemoryTabularStore {
    sheets: Arc<RwLock<HashMap<String, SheetCells>>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryTabularStore {
    pub fn seed() -> StoreSeed {
        StoreSeed::default()
    }

    /// While set, every call fails with a request error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn cell(&self, sheet: &str, cell: CellAddress) -> Option<String> {
        let sheets = self.sheets.read().await;
        sheets.get(sheet)?.get(&(cell.row(), cell.column())).cloned()
    }

    /// Dense rows from row 1 to the last used row, padded to the widest used column.
    pub async fn rows(&self, sheet: &str) -> Vec<Vec<String>> {
        let sheets = self.sheets.read().await;
        let Some(cells) = sheets.get(sheet) else {
            return Vec::new();
        };

        let last_row = cells.keys().map(|(row, _)| *row).max().unwrap_or(0);
        let last_column = cells.keys().map(|(_, column)| *column).max().unwrap_or(0);
        (1..=last_row)
            .map(|row| {
                (1..=last_column)
                    .map(|column| cells.get(&(row, column)).cloned().unwrap_or_default())
                    .collect()
            })
            .collect()
    }

    async fn enter(&self) -> Result<(), StoreError> {
        // let concurrent callers interleave the way remote calls would
        tokio::task::yield_now().await;
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Request("in-memory store marked unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl TabularStore for InMemoryTabularStore {
    async fn read_range(&self, sheet: &str, range: &CellRange) -> Result<ValueRange, StoreError> {
        self.enter().await?;

        let sheets = self.sheets.read().await;
        let Some(cells) = sheets.get(sheet) else {
            return Ok(ValueRange::default());
        };

        let first_row = range.first_row();
        let last_row = match range.last_row() {
            Some(row) => row,
            None => cells.keys().map(|(row, _)| *row).max().unwrap_or(0),
        };

        let mut rows: Vec<Vec<CellValue>> = (first_row..=last_row)
            .map(|row| {
                let mut values: Vec<CellValue> = (range.first_column()..=range.last_column())
                    .map(|column| {
                        cells.get(&(row, column)).map_or(CellValue::Empty, |value| {
                            CellValue::text(value.as_str())
                        })
                    })
                    .collect();
                while values.last().is_some_and(CellValue::is_empty) {
                    values.pop();
                }
                values
            })
            .collect();
        while rows.last().is_some_and(Vec::is_empty) {
            rows.pop();
        }

        Ok(ValueRange::new(rows))
    }

    async fn append_row(&self, sheet: &str, values: Vec<String>) -> Result<(), StoreError> {
        self.enter().await?;

        let mut sheets = self.sheets.write().await;
        let cells = sheets.entry(sheet.to_owned()).or_default();
        let next_row = cells.keys().map(|(row, _)| *row).max().unwrap_or(0) + 1;
        for (offset, value) in values.into_iter().enumerate() {
            if !value.is_empty() {
                cells.insert((next_row, 1 + offset as u32), value);
            }
        }
        Ok(())
    }

    async fn update_cell(
        &self,
        sheet: &str,
        cell: CellAddress,
        value: &str,
    ) -> Result<(), StoreError> {
        self.enter().await?;

        let mut sheets = self.sheets.write().await;
        let cells = sheets.entry(sheet.to_owned()).or_default();
        if value.is_empty() {
            cells.remove(&(cell.row(), cell.column()));
        } else {
            cells.insert((cell.row(), cell.column()), value.to_owned());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use slotbook_core::grid::{CellAddress, CellRange};

    use super::InMemoryTabularStore;
    use crate::gateway::{StoreError, TabularStore};

    fn cell(raw: &str) -> CellAddress {
        raw.parse().expect("cell reference")
    }

    fn range(raw: &str) -> CellRange {
        raw.parse().expect("range")
    }

    #[tokio::test]
    async fn reads_drop_trailing_blanks_like_the_remote_store() {
        let store = InMemoryTabularStore::seed()
            .rows("Booking", 1, &[&["", "Mon", "Tue"], &["09:00", "", "Bob (2)"], &["10:00"]])
            .build();

        let block = store.read_range("Booking", &range("A1:H10")).await.expect("read");
        assert_eq!(block.rows().len(), 3);
        assert_eq!(block.row(0).len(), 3);
        assert_eq!(block.row(2).len(), 1);
        assert!(block.cell(1, 1).is_empty());
        assert_eq!(block.cell(1, 2).as_str(), "Bob (2)");

        let column = store.read_range("Booking", &range("B2:B10")).await.expect("read");
        assert!(column.rows().is_empty());
    }

    #[tokio::test]
    async fn whole_column_reads_extend_to_the_last_used_row() {
        let store = InMemoryTabularStore::seed()
            .rows("Users", 1, &[&["1", "Ann", "10"], &["2", "Ben", "20"]])
            .build();

        let block = store.read_range("Users", &range("A:C")).await.expect("read");
        assert_eq!(block.rows().len(), 2);
        assert_eq!(block.cell(1, 1).as_str(), "Ben");
    }

    #[tokio::test]
    async fn appends_land_below_the_last_used_row() {
        let store = InMemoryTabularStore::seed().rows("Users", 1, &[&["1", "Ann", "10"]]).build();

        store
            .append_row("Users", vec!["2".into(), "Ben".into(), "20".into()])
            .await
            .expect("append");
        store.append_row("Empty", vec!["3".into()]).await.expect("append to new sheet");

        assert_eq!(
            store.rows("Users").await,
            vec![vec!["1", "Ann", "10"], vec!["2", "Ben", "20"]]
        );
        assert_eq!(store.rows("Empty").await, vec![vec!["3"]]);
    }

    #[tokio::test]
    async fn clearing_a_cell_removes_it() {
        let store = InMemoryTabularStore::seed().cell("Booking", cell("C4"), "Ann (10)").build();

        store.update_cell("Booking", cell("C4"), "").await.expect("clear");
        store.update_cell("Booking", cell("C4"), "").await.expect("clear again");

        assert_eq!(store.cell("Booking", cell("C4")).await, None);
    }

    #[tokio::test]
    async fn unavailable_store_fails_every_call() {
        let store = InMemoryTabularStore::default();
        store.set_unavailable(true);

        assert!(matches!(
            store.read_range("Booking", &range("A1:H10")).await,
            Err(StoreError::Request(_))
        ));
        assert!(store.update_cell("Booking", cell("B2"), "x").await.is_err());
        assert!(store.append_row("Users", vec!["1".into()]).await.is_err());

        store.set_unavailable(false);
        assert!(store.read_range("Booking", &range("A1:H10")).await.is_ok());
    }
}
