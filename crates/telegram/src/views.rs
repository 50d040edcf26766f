//! Rendered chat messages. All text is Telegram HTML; user-supplied values are escaped.

use std::fmt::Write as _;

use slotbook_core::domain::{BookedSlot, DayOption, DaySchedule, OwnerLabel};

use crate::commands::CallbackAction;
use crate::keyboard::{bold, escape_html, InlineButton, MessageBuilder, MessageTemplate};

pub const BUTTONS_PER_ROW: usize = 2;

pub const SLOT_TAKEN_ALERT: &str = "⚠️ Slot is already taken!";
pub const DAYS_UNAVAILABLE: &str = "Error with Spreadsheet (days).";
pub const LISTING_UNAVAILABLE: &str = "Error with db.";
pub const NO_FREE_SLOTS: &str = "😔 No slots available.";
pub const NO_ACTIVE_SLOTS: &str = "You have no active slots.";

pub fn greeting(display_name: &str) -> MessageTemplate {
    MessageTemplate::text(format!("👋 Hello, {}!", bold(display_name)))
}

pub fn name_prompt() -> MessageTemplate {
    MessageTemplate::text("👋 Welcome!\nPlease, write your <b>Name and Surname</b>:")
}

pub fn identifier_prompt() -> MessageTemplate {
    MessageTemplate::text("Please, write your <b>Student ID</b>:")
}

pub fn registration_confirmed() -> MessageTemplate {
    MessageTemplate::text("✅ Registration successful!")
}

/// The registration row could not be written; the identifier prompt stays active.
pub fn registration_not_saved() -> MessageTemplate {
    MessageTemplate::text("Error with db. Please, write your <b>Student ID</b> again:")
}

pub fn restart_hint() -> MessageTemplate {
    MessageTemplate::text("Click -> /start.")
}

pub fn register_first() -> MessageTemplate {
    MessageTemplate::text("First, write /start for registration.")
}

pub fn authentication_error() -> MessageTemplate {
    MessageTemplate::text("Authentication error. Click -> /start")
}

pub fn failure(user_message: &str) -> MessageTemplate {
    MessageTemplate::text(user_message)
}

pub fn booking_confirmed() -> MessageTemplate {
    MessageTemplate::text("✅ Booking is successful! Check your slots - /my.")
}

pub fn slot_deleted() -> MessageTemplate {
    MessageTemplate::text("🗑 Slot deleted!")
}

pub fn day_selection(days: &[DayOption]) -> MessageTemplate {
    MessageBuilder::new("📅 <b>Choose a day:</b>")
        .grid(BUTTONS_PER_ROW, |grid| {
            for day in days {
                grid.button(&day.label, CallbackAction::SelectDay { column: day.column }.payload());
            }
        })
        .build()
}

/// Free slots only, then a back button on its own row.
pub fn time_selection(schedule: &DaySchedule) -> MessageTemplate {
    let mut builder =
        MessageBuilder::new(format!("🗓 {}", bold(&schedule.day_label))).line("Choose a time:");
    if !schedule.has_free_slots() {
        builder = builder.line(NO_FREE_SLOTS);
    }

    builder
        .grid(BUTTONS_PER_ROW, |grid| {
            for option in schedule.free_slots() {
                let payload = CallbackAction::Book { slot: option.slot }.payload();
                grid.button(&option.time_label, payload);
            }
        })
        .row(InlineButton::new("🔙 Back", CallbackAction::BackToDays.payload()))
        .build()
}

pub fn my_slots(owner: &OwnerLabel, booked: &[BookedSlot]) -> MessageTemplate {
    let mut text = format!("👤 {}\n📋 <b>Your slots:</b>\n\n", bold(owner.as_str()));
    for (index, slot) in booked.iter().enumerate() {
        let _ = writeln!(
            text,
            "{}. {}: {}",
            index + 1,
            bold(&slot.day_label),
            escape_html(&slot.time_label)
        );
    }
    if booked.is_empty() {
        text.push_str(NO_ACTIVE_SLOTS);
    }

    let mut builder = MessageBuilder::new(text);
    for (index, slot) in booked.iter().enumerate() {
        builder = builder.row(InlineButton::new(
            format!("❌ Delete №{}", index + 1),
            CallbackAction::Cancel { cell: slot.cell }.payload(),
        ));
    }
    builder
        .row(InlineButton::new("➕ Book another slot", CallbackAction::AddSlot.payload()))
        .build()
}

#[cfg(test)]
mod tests {
    use slotbook_core::domain::{BookedSlot, DayOption, DaySchedule, SlotOption, UserProfile};
    use slotbook_core::grid::Slot;

    use super::{day_selection, greeting, my_slots, time_selection, NO_ACTIVE_SLOTS, NO_FREE_SLOTS};

    fn schedule(occupied_rows: &[u32]) -> DaySchedule {
        DaySchedule {
            column: 3,
            day_label: "Tue".to_owned(),
            slots: (2..=10)
                .map(|row| SlotOption {
                    slot: Slot::new(3, row).expect("slot"),
                    time_label: format!("{:02}:00", row + 7),
                    occupied: occupied_rows.contains(&row),
                })
                .collect(),
        }
    }

    #[test]
    fn greeting_bolds_the_escaped_name() {
        assert_eq!(greeting("Alice Smith").text, "👋 Hello, <b>Alice Smith</b>!");
        assert_eq!(greeting("<Bob>").text, "👋 Hello, <b>&lt;Bob&gt;</b>!");
    }

    #[test]
    fn day_selection_pairs_days_two_per_row() {
        let days: Vec<DayOption> = ["Mon", "Tue", "Wed"]
            .iter()
            .zip(2..)
            .map(|(label, column)| DayOption { column, label: (*label).to_owned() })
            .collect();

        let message = day_selection(&days);
        assert_eq!(message.text, "📅 <b>Choose a day:</b>");
        let keyboard = message.keyboard.as_ref().expect("keyboard");
        assert_eq!(keyboard.rows().len(), 2);
        assert_eq!(message.callback_payloads(), vec!["day_2", "day_3", "day_4"]);
    }

    #[test]
    fn time_selection_offers_only_free_slots_and_ends_with_back() {
        let message = time_selection(&schedule(&[2, 4, 5]));

        assert_eq!(message.text, "🗓 <b>Tue</b>\nChoose a time:");
        let payloads = message.callback_payloads();
        assert_eq!(payloads.len(), 7);
        assert_eq!(payloads.first(), Some(&"book_3_3"));
        assert!(!payloads.contains(&"book_3_4"));
        assert_eq!(payloads.last(), Some(&"back_days"));
        let keyboard = message.keyboard.as_ref().expect("keyboard");
        assert_eq!(keyboard.rows().last().map(Vec::len), Some(1));
    }

    #[test]
    fn fully_booked_day_renders_only_back_and_notice() {
        let message = time_selection(&schedule(&[2, 3, 4, 5, 6, 7, 8, 9, 10]));

        assert!(message.text.ends_with(NO_FREE_SLOTS));
        assert_eq!(message.callback_payloads(), vec!["back_days"]);
    }

    #[test]
    fn listing_numbers_entries_and_offers_delete_buttons() {
        let owner = UserProfile::new("Ann", "10").owner_label();
        let booked = vec![
            BookedSlot {
                cell: Slot::new(2, 3).expect("slot").cell(),
                day_label: "Mon".to_owned(),
                time_label: "10:00".to_owned(),
            },
            BookedSlot {
                cell: Slot::new(4, 3).expect("slot").cell(),
                day_label: "Wed".to_owned(),
                time_label: "10:00".to_owned(),
            },
        ];

        let message = my_slots(&owner, &booked);
        assert_eq!(
            message.text,
            "👤 <b>Ann (10)</b>\n📋 <b>Your slots:</b>\n\n1. <b>Mon</b>: 10:00\n2. <b>Wed</b>: 10:00\n"
        );
        assert_eq!(message.callback_payloads(), vec!["del_B3", "del_D3", "add_slot"]);
        let keyboard = message.keyboard.as_ref().expect("keyboard");
        assert_eq!(keyboard.rows()[1][0].text, "❌ Delete №2");
    }

    #[test]
    fn empty_listing_still_offers_booking() {
        let owner = UserProfile::new("Ann", "10").owner_label();
        let message = my_slots(&owner, &[]);

        assert!(message.text.ends_with(NO_ACTIVE_SLOTS));
        assert_eq!(message.callback_payloads(), vec!["add_slot"]);
    }
}
