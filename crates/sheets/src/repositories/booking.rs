use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use slotbook_core::domain::{
    BookedSlot, DayOption, DaySchedule, OwnerLabel, SlotOption, DEFAULT_DAY_LABEL,
    DEFAULT_TIME_LABEL,
};
use slotbook_core::grid::{self, CellAddress, CellRange, Slot, FIRST_DAY_COLUMN, SLOTS_PER_DAY};

use crate::gateway::{StoreError, TabularStore, ValueRange};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClaimOutcome {
    Claimed,
    AlreadyTaken { current_owner: String },
}

/// The whole grid, `A1:H10`, as read in one call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GridSnapshot {
    cells: ValueRange,
}

impl GridSnapshot {
    pub fn new(cells: ValueRange) -> Self {
        Self { cells }
    }

    /// Day label for a 1-based column.
    pub fn day_label(&self, column: u32) -> &str {
        self.cells.cell(0, column.saturating_sub(1) as usize).text_or(DEFAULT_DAY_LABEL)
    }

    /// Time label for a 1-based row.
    pub fn time_label(&self, row: u32) -> &str {
        self.cells.cell(row.saturating_sub(1) as usize, 0).text_or(DEFAULT_TIME_LABEL)
    }

    /// Every cell held by `owner`, in row-major order (earlier times first, then days).
    pub fn bookings_for(&self, owner: &OwnerLabel) -> Vec<BookedSlot> {
        let mut booked = Vec::new();
        for row in grid::slot_rows() {
            for column in grid::day_columns() {
                let value = self.cells.cell(row as usize - 1, column as usize - 1);
                if value.is_empty() || !owner.matches(value.as_str()) {
                    continue;
                }
                let Ok(slot) = Slot::new(column, row) else {
                    continue;
                };
                booked.push(BookedSlot {
                    cell: slot.cell(),
                    day_label: self.day_label(column).to_owned(),
                    time_label: self.time_label(row).to_owned(),
                });
            }
        }
        booked
    }
}

/// Slot occupancy on the booking sheet. Claims are serialised per cell inside this process, so
/// two callers racing for one free cell get at most one success.
pub struct BookingGrid {
    store: Arc<dyn TabularStore>,
    sheet: String,
    cell_locks: Mutex<HashMap<CellAddress, Arc<tokio::sync::Mutex<()>>>>,
}

impl BookingGrid {
    pub fn new(store: Arc<dyn TabularStore>, sheet: impl Into<String>) -> Self {
        Self { store, sheet: sheet.into(), cell_locks: Mutex::new(HashMap::new()) }
    }

    pub fn sheet(&self) -> &str {
        &self.sheet
    }

    /// Header row `B1:H1`. Blank headers fall back to the default label; columns past the last
    /// non-blank header are not offered.
    pub async fn day_labels(&self) -> Result<Vec<DayOption>, StoreError> {
        let header = self
            .store
            .read_range(&self.sheet, &grid::day_header_range())
            .await
            .map_err(|error| self.log_failure("booking.days_read_failed", error))?;

        Ok(header
            .row(0)
            .iter()
            .zip(FIRST_DAY_COLUMN..)
            .map(|(value, column)| DayOption {
                column,
                label: value.text_or(DEFAULT_DAY_LABEL).to_owned(),
            })
            .collect())
    }

    pub async fn day_label(&self, column: u32) -> Result<String, StoreError> {
        let cell = grid::day_label_cell(column)?;
        let header = self.store.read_range(&self.sheet, &CellRange::cell(cell)).await?;
        Ok(header.cell(0, 0).text_or(DEFAULT_DAY_LABEL).to_owned())
    }

    /// Time labels, occupancy and the day label for one column, read concurrently. A failed
    /// header read only costs the label.
    pub async fn time_column(&self, column: u32) -> Result<DaySchedule, StoreError> {
        let slots_range = grid::day_slots_range(column)?;
        let times_range = grid::time_label_range();

        let (times, occupancy, day_label) = tokio::join!(
            self.store.read_range(&self.sheet, &times_range),
            self.store.read_range(&self.sheet, &slots_range),
            self.day_label(column),
        );
        let times = times.map_err(|error| self.log_failure("booking.times_read_failed", error))?;
        let occupancy =
            occupancy.map_err(|error| self.log_failure("booking.slots_read_failed", error))?;
        let day_label = day_label.unwrap_or_else(|error| {
            warn!(
                event_name = "booking.day_label_read_failed",
                column,
                error = %error,
                "falling back to default day label"
            );
            DEFAULT_DAY_LABEL.to_owned()
        });

        let mut slots = Vec::with_capacity(SLOTS_PER_DAY);
        for (offset, row) in grid::slot_rows().enumerate() {
            slots.push(SlotOption {
                slot: Slot::new(column, row)?,
                time_label: times.cell(offset, 0).text_or(DEFAULT_TIME_LABEL).to_owned(),
                occupied: !occupancy.cell(offset, 0).is_empty(),
            });
        }

        Ok(DaySchedule { column, day_label, slots })
    }

    /// Re-reads the cell and writes `owner` only if it is still empty.
    pub async fn claim(&self, slot: Slot, owner: &OwnerLabel) -> Result<ClaimOutcome, StoreError> {
        let cell = slot.cell();
        let lock = self.cell_lock(cell);
        let _guard = lock.lock().await;

        let current = self
            .store
            .read_range(&self.sheet, &CellRange::cell(cell))
            .await
            .map_err(|error| self.log_failure("booking.claim_read_failed", error))?;
        let existing = current.cell(0, 0);
        if !existing.is_empty() {
            info!(
                event_name = "booking.slot_taken",
                cell = %cell,
                "slot already occupied at commit time"
            );
            return Ok(ClaimOutcome::AlreadyTaken { current_owner: existing.as_str().to_owned() });
        }

        self.store
            .update_cell(&self.sheet, cell, owner.as_str())
            .await
            .map_err(|error| self.log_failure("booking.claim_write_failed", error))?;
        info!(event_name = "booking.slot_claimed", cell = %cell, "slot claimed");
        Ok(ClaimOutcome::Claimed)
    }

    /// Clears a bookable cell unconditionally. Clearing an empty cell is a no-op success.
    pub async fn release(&self, cell: CellAddress) -> Result<(), StoreError> {
        let slot = Slot::from_cell(cell)?;
        let lock = self.cell_lock(slot.cell());
        let _guard = lock.lock().await;

        self.store
            .update_cell(&self.sheet, slot.cell(), "")
            .await
            .map_err(|error| self.log_failure("booking.release_failed", error))?;
        info!(event_name = "booking.slot_released", cell = %cell, "slot released");
        Ok(())
    }

    pub async fn snapshot(&self) -> Result<GridSnapshot, StoreError> {
        let cells = self
            .store
            .read_range(&self.sheet, &grid::full_grid_range())
            .await
            .map_err(|error| self.log_failure("booking.snapshot_failed", error))?;
        Ok(GridSnapshot::new(cells))
    }

    fn cell_lock(&self, cell: CellAddress) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = match self.cell_locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(locks.entry(cell).or_default())
    }

    fn log_failure(&self, event_name: &'static str, error: StoreError) -> StoreError {
        warn!(event_name, sheet = %self.sheet, error = %error, "booking grid store call failed");
        error
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use slotbook_core::domain::{OwnerLabel, UserProfile};
    use slotbook_core::grid::{CellAddress, Slot};

    use super::{BookingGrid, ClaimOutcome};
    use crate::gateway::{StoreError, TabularStore};
    use crate::memory::InMemoryTabularStore;

    const WEEK: &[&str] = &["", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

    fn owner(name: &str, id: &str) -> OwnerLabel {
        UserProfile::new(name, id).owner_label()
    }

    fn cell(raw: &str) -> CellAddress {
        raw.parse().expect("cell reference")
    }

    fn seeded_store() -> InMemoryTabularStore {
        let times = ["09:00", "10:00", "11:00", "12:00", "13:00", "14:00", "15:00", "16:00", "17:00"];
        let mut seed = InMemoryTabularStore::seed().rows("Booking", 1, &[WEEK]);
        for (offset, time) in times.iter().enumerate() {
            seed = seed.rows("Booking", 2 + offset as u32, &[&[time]]);
        }
        seed.build()
    }

    async fn occupy(store: &InMemoryTabularStore, raw: &str, value: &str) {
        store.update_cell("Booking", cell(raw), value).await.expect("seed cell");
    }

    fn grid(store: &InMemoryTabularStore) -> BookingGrid {
        BookingGrid::new(Arc::new(store.clone()), "Booking")
    }

    #[tokio::test]
    async fn day_labels_follow_the_header_row() {
        let store = seeded_store();
        let days = grid(&store).day_labels().await.expect("days");

        assert_eq!(days.len(), 7);
        assert_eq!((days[0].column, days[0].label.as_str()), (2, "Mon"));
        assert_eq!((days[6].column, days[6].label.as_str()), (8, "Sun"));
    }

    #[tokio::test]
    async fn blank_headers_get_the_default_label() {
        let store =
            InMemoryTabularStore::seed().rows("Booking", 1, &[&["", "Mon", "", "Wed"]]).build();
        let days = grid(&store).day_labels().await.expect("days");

        let labels: Vec<&str> = days.iter().map(|day| day.label.as_str()).collect();
        assert_eq!(labels, vec!["Mon", "Day", "Wed"]);
    }

    #[tokio::test]
    async fn time_column_marks_occupied_slots() {
        let store = seeded_store();
        occupy(&store, "C3", "Bob (2)").await;

        let day = grid(&store).time_column(3).await.expect("column");

        assert_eq!(day.day_label, "Tue");
        assert_eq!(day.slots.len(), 9);
        assert_eq!(day.slots[0].time_label, "09:00");
        assert!(!day.slots[0].occupied);
        assert!(day.slots[1].occupied);
        assert_eq!(day.free_slots().count(), 8);
    }

    #[tokio::test]
    async fn missing_labels_fall_back_to_defaults() {
        let store = InMemoryTabularStore::default();
        let day = grid(&store).time_column(5).await.expect("column");

        assert_eq!(day.day_label, "Day");
        assert!(day.slots.iter().all(|slot| slot.time_label == "Time" && !slot.occupied));
    }

    #[tokio::test]
    async fn claim_writes_the_owner_label_into_a_free_cell() {
        let store = seeded_store();
        let slot = Slot::new(4, 6).expect("slot");

        let outcome = grid(&store).claim(slot, &owner("Ann", "10")).await.expect("claim");

        assert_eq!(outcome, ClaimOutcome::Claimed);
        assert_eq!(store.cell("Booking", cell("D6")).await.as_deref(), Some("Ann (10)"));
    }

    #[tokio::test]
    async fn claim_rejects_an_occupied_cell_without_writing() {
        let store = seeded_store();
        occupy(&store, "D6", "Bob (2)").await;
        let slot = Slot::new(4, 6).expect("slot");

        let outcome = grid(&store).claim(slot, &owner("Ann", "10")).await.expect("claim");

        assert_eq!(outcome, ClaimOutcome::AlreadyTaken { current_owner: "Bob (2)".to_owned() });
        assert_eq!(store.cell("Booking", cell("D6")).await.as_deref(), Some("Bob (2)"));
    }

    #[tokio::test]
    async fn racing_claims_for_one_cell_yield_a_single_success() {
        let store = seeded_store();
        let grid = Arc::new(grid(&store));
        let slot = Slot::new(2, 2).expect("slot");

        let claims = (0..6).map(|index| {
            let grid = Arc::clone(&grid);
            tokio::spawn(async move {
                grid.claim(slot, &owner("Racer", &index.to_string())).await
            })
        });
        let mut winners = 0;
        for claim in claims.collect::<Vec<_>>() {
            let outcome = claim.await.expect("task").expect("claim");
            if outcome == ClaimOutcome::Claimed {
                winners += 1;
            }
        }

        assert_eq!(winners, 1);
        let holder = store.cell("Booking", cell("B2")).await.expect("cell is held");
        assert!(holder.starts_with("Racer ("));
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let store = seeded_store();
        occupy(&store, "E9", "Ann (10)").await;
        let grid = grid(&store);

        grid.release(cell("E9")).await.expect("first release");
        grid.release(cell("E9")).await.expect("second release");

        assert_eq!(store.cell("Booking", cell("E9")).await, None);
    }

    #[tokio::test]
    async fn release_refuses_cells_outside_the_bookable_area() {
        let store = seeded_store();
        let error = grid(&store).release(cell("C1")).await.expect_err("header cell");

        assert!(matches!(error, StoreError::Grid(_)));
        assert_eq!(store.cell("Booking", cell("C1")).await.as_deref(), Some("Tue"));
    }

    #[tokio::test]
    async fn snapshot_lists_bookings_for_one_owner_in_row_major_order() {
        let store = seeded_store();
        occupy(&store, "F2", " Ann (10) ").await;
        occupy(&store, "B4", "Ann (10)").await;
        occupy(&store, "C2", "Ann (100)").await;
        occupy(&store, "H10", "Ann (10)").await;

        let snapshot = grid(&store).snapshot().await.expect("snapshot");
        let booked = snapshot.bookings_for(&owner("Ann", "10"));

        let listed: Vec<(String, &str, &str)> = booked
            .iter()
            .map(|slot| (slot.cell.to_string(), slot.day_label.as_str(), slot.time_label.as_str()))
            .collect();
        assert_eq!(
            listed,
            vec![
                ("F2".to_owned(), "Fri", "09:00"),
                ("B4".to_owned(), "Mon", "11:00"),
                ("H10".to_owned(), "Sun", "17:00"),
            ]
        );
    }

    #[tokio::test]
    async fn store_failures_surface_as_errors() {
        let store = seeded_store();
        store.set_unavailable(true);
        let grid = grid(&store);

        assert!(grid.day_labels().await.is_err());
        assert!(grid.time_column(3).await.is_err());
        assert!(grid.snapshot().await.is_err());
        assert!(grid.claim(Slot::new(3, 3).expect("slot"), &owner("A", "1")).await.is_err());
    }
}
