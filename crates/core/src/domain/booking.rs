use serde::{Deserialize, Serialize};

use crate::grid::{CellAddress, Slot};

pub const DEFAULT_DAY_LABEL: &str = "Day";
pub const DEFAULT_TIME_LABEL: &str = "Time";

/// One selectable day, taken from the header row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayOption {
    pub column: u32,
    pub label: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotOption {
    pub slot: Slot,
    pub time_label: String,
    pub occupied: bool,
}

/// A day column with its nine slots, in row order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySchedule {
    pub column: u32,
    pub day_label: String,
    pub slots: Vec<SlotOption>,
}

impl DaySchedule {
    pub fn free_slots(&self) -> impl Iterator<Item = &SlotOption> {
        self.slots.iter().filter(|slot| !slot.occupied)
    }

    pub fn has_free_slots(&self) -> bool {
        self.free_slots().next().is_some()
    }
}

/// A reservation held by the current user, as shown in the listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookedSlot {
    pub cell: CellAddress,
    pub day_label: String,
    pub time_label: String,
}
