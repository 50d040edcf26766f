use std::fmt;

use thiserror::Error;

use slotbook_core::grid::{is_day_column, CellAddress, GridError, Slot};

pub const START_COMMAND: &str = "/start";
pub const MY_SLOTS_COMMAND: &str = "/my";

const DAY_PREFIX: &str = "day_";
const BOOK_PREFIX: &str = "book_";
const CANCEL_PREFIX: &str = "del_";
const ADD_SLOT_PAYLOAD: &str = "add_slot";
const BACK_TO_DAYS_PAYLOAD: &str = "back_days";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatCommand {
    Start,
    MySlots,
    FreeText(String),
}

impl ChatCommand {
    /// `/start`, `/start@bot_name` and `/start <deep-link>` all count as the start command.
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        let head = trimmed.split_whitespace().next().unwrap_or_default();
        let command = head.split_once('@').map_or(head, |(command, _)| command);

        match command {
            START_COMMAND => Self::Start,
            MY_SLOTS_COMMAND => Self::MySlots,
            _ => Self::FreeText(trimmed.to_owned()),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("unknown button payload `{0}`")]
    Unknown(String),
    #[error("malformed button payload `{payload}`: {reason}")]
    Malformed { payload: String, reason: String },
    #[error(transparent)]
    Grid(#[from] GridError),
}

/// Decoded inline-button payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallbackAction {
    SelectDay { column: u32 },
    Book { slot: Slot },
    Cancel { cell: CellAddress },
    AddSlot,
    BackToDays,
}

impl CallbackAction {
    pub fn payload(&self) -> String {
        match self {
            Self::SelectDay { column } => format!("{DAY_PREFIX}{column}"),
            Self::Book { slot } => format!("{BOOK_PREFIX}{}_{}", slot.column(), slot.row()),
            Self::Cancel { cell } => format!("{CANCEL_PREFIX}{cell}"),
            Self::AddSlot => ADD_SLOT_PAYLOAD.to_owned(),
            Self::BackToDays => BACK_TO_DAYS_PAYLOAD.to_owned(),
        }
    }

    pub fn parse(raw: &str) -> Result<Self, PayloadError> {
        let malformed = |reason: &str| PayloadError::Malformed {
            payload: raw.to_owned(),
            reason: reason.to_owned(),
        };

        if raw == ADD_SLOT_PAYLOAD {
            return Ok(Self::AddSlot);
        }
        if raw == BACK_TO_DAYS_PAYLOAD {
            return Ok(Self::BackToDays);
        }

        if let Some(column) = raw.strip_prefix(DAY_PREFIX) {
            let column: u32 = column.parse().map_err(|_| malformed("day column is not a number"))?;
            if !is_day_column(column) {
                return Err(malformed("column is not a day column"));
            }
            return Ok(Self::SelectDay { column });
        }

        if let Some(rest) = raw.strip_prefix(BOOK_PREFIX) {
            let (column, row) =
                rest.split_once('_').ok_or_else(|| malformed("expected column_row"))?;
            let column: u32 = column.parse().map_err(|_| malformed("column is not a number"))?;
            let row: u32 = row.parse().map_err(|_| malformed("row is not a number"))?;
            return Ok(Self::Book { slot: Slot::new(column, row)? });
        }

        if let Some(cell) = raw.strip_prefix(CANCEL_PREFIX) {
            return Ok(Self::Cancel { cell: cell.parse()? });
        }

        Err(PayloadError::Unknown(raw.to_owned()))
    }
}

impl fmt::Display for CallbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.payload())
    }
}

#[cfg(test)]
mod tests {
    use slotbook_core::grid::{GridError, Slot};

    use super::{CallbackAction, ChatCommand, PayloadError};

    #[test]
    fn commands_are_recognised_with_bot_suffix_and_arguments() {
        assert_eq!(ChatCommand::parse("/start"), ChatCommand::Start);
        assert_eq!(ChatCommand::parse("  /start@slot_bot "), ChatCommand::Start);
        assert_eq!(ChatCommand::parse("/start campaign-7"), ChatCommand::Start);
        assert_eq!(ChatCommand::parse("/my"), ChatCommand::MySlots);
        assert_eq!(
            ChatCommand::parse("  Alice Smith "),
            ChatCommand::FreeText("Alice Smith".to_owned())
        );
        assert_eq!(ChatCommand::parse("/mystery"), ChatCommand::FreeText("/mystery".to_owned()));
    }

    #[test]
    fn payloads_use_the_exact_wire_format() {
        let slot = Slot::new(3, 5).expect("slot");
        assert_eq!(CallbackAction::SelectDay { column: 2 }.payload(), "day_2");
        assert_eq!(CallbackAction::Book { slot }.payload(), "book_3_5");
        assert_eq!(CallbackAction::Cancel { cell: slot.cell() }.payload(), "del_C5");
        assert_eq!(CallbackAction::AddSlot.payload(), "add_slot");
        assert_eq!(CallbackAction::BackToDays.payload(), "back_days");
    }

    #[test]
    fn payloads_parse_into_actions() {
        assert_eq!(CallbackAction::parse("day_8"), Ok(CallbackAction::SelectDay { column: 8 }));
        assert_eq!(
            CallbackAction::parse("book_2_10"),
            Ok(CallbackAction::Book { slot: Slot::new(2, 10).expect("slot") })
        );
        assert_eq!(
            CallbackAction::parse("del_H2"),
            Ok(CallbackAction::Cancel { cell: Slot::new(8, 2).expect("slot").cell() })
        );
        assert_eq!(CallbackAction::parse("back_days"), Ok(CallbackAction::BackToDays));
    }

    #[test]
    fn malformed_payloads_are_rejected() {
        assert!(matches!(CallbackAction::parse("day_1"), Err(PayloadError::Malformed { .. })));
        assert!(matches!(CallbackAction::parse("day_x"), Err(PayloadError::Malformed { .. })));
        assert!(matches!(CallbackAction::parse("book_3"), Err(PayloadError::Malformed { .. })));
        assert!(matches!(
            CallbackAction::parse("book_3_11"),
            Err(PayloadError::Grid(GridError::OutsideBookingArea { column: 3, row: 11 }))
        ));
        assert!(matches!(CallbackAction::parse("del_"), Err(PayloadError::Grid(_))));
        assert_eq!(
            CallbackAction::parse("refresh"),
            Err(PayloadError::Unknown("refresh".to_owned()))
        );
    }
}
