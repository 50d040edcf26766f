//! Booking Assistant - the conversation behind the bot
//!
//! Implements the chat services the Telegram crate dispatches to:
//! - **Registration** (`registration`) - `/start`, name and identifier prompts, `/my` lookups
//! - **Booking** (`booking`) - day and time selection, claims, the slot listing, cancellation
//!
//! Registration decisions come from the pure `RegistrationFlow` in `slotbook-core`; this crate
//! performs the side effects (registry appends, grid reads and writes) and turns results into
//! outbound chat actions. Store failures become user-facing messages here and never reach the
//! polling loop.

mod assistant;
mod booking;
mod registration;

pub use assistant::BookingAssistant;
