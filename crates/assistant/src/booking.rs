use tracing::{info, warn};

use slotbook_core::domain::UserProfile;
use slotbook_core::grid::{CellAddress, Slot};
use slotbook_sheets::ClaimOutcome;
use slotbook_telegram::{views, CallbackReply, EventContext, MessageRef, Outbound};

use crate::assistant::{failure_text, BookingAssistant};

impl BookingAssistant {
    /// A new day-selection message, or the days error when the header row is unreadable or blank.
    pub(crate) async fn day_selection(&self, chat_id: i64, ctx: &EventContext) -> Outbound {
        match self.grid.day_labels().await {
            Ok(days) if !days.is_empty() => Outbound::send(chat_id, views::day_selection(&days)),
            Ok(_) => {
                warn!(
                    event_name = "booking.days_missing",
                    correlation_id = %ctx.correlation_id,
                    sheet = %self.grid.sheet(),
                    "day header row is empty"
                );
                Outbound::send(chat_id, views::failure(views::DAYS_UNAVAILABLE))
            }
            Err(_) => Outbound::send(chat_id, views::failure(views::DAYS_UNAVAILABLE)),
        }
    }

    /// A new my-slots listing message.
    pub(crate) async fn listing(
        &self,
        chat_id: i64,
        profile: &UserProfile,
        ctx: &EventContext,
    ) -> Outbound {
        let owner = profile.owner_label();
        match self.grid.snapshot().await {
            Ok(snapshot) => {
                let booked = snapshot.bookings_for(&owner);
                info!(
                    event_name = "booking.listing_rendered",
                    correlation_id = %ctx.correlation_id,
                    slots = booked.len(),
                    "rendered slot listing"
                );
                Outbound::send(chat_id, views::my_slots(&owner, &booked))
            }
            Err(_) => Outbound::send(chat_id, views::failure(views::LISTING_UNAVAILABLE)),
        }
    }

    /// Re-renders `target` as the time selection for `column`. A failed read leaves the message
    /// as it is.
    async fn time_selection(
        &self,
        column: u32,
        target: MessageRef,
        ctx: &EventContext,
    ) -> Option<Outbound> {
        match self.grid.time_column(column).await {
            Ok(schedule) => Some(Outbound::edit(target, views::time_selection(&schedule))),
            Err(error) => {
                warn!(
                    event_name = "booking.time_selection_unavailable",
                    correlation_id = %ctx.correlation_id,
                    column,
                    error = %error,
                    "leaving message unchanged"
                );
                None
            }
        }
    }

    pub(crate) async fn select_day(
        &self,
        column: u32,
        target: MessageRef,
        ctx: &EventContext,
    ) -> CallbackReply {
        CallbackReply::new(self.time_selection(column, target, ctx).await.into_iter().collect())
    }

    pub(crate) async fn book(
        &self,
        slot: Slot,
        profile: &UserProfile,
        target: MessageRef,
        ctx: &EventContext,
    ) -> CallbackReply {
        match self.grid.claim(slot, &profile.owner_label()).await {
            Ok(ClaimOutcome::Claimed) => {
                info!(
                    event_name = "booking.confirmed",
                    correlation_id = %ctx.correlation_id,
                    cell = %slot.cell(),
                    "booking confirmed"
                );
                CallbackReply::new(vec![Outbound::edit(target, views::booking_confirmed())])
            }
            Ok(ClaimOutcome::AlreadyTaken { .. }) => {
                let refreshed = self.time_selection(slot.column(), target, ctx).await;
                CallbackReply::new(refreshed.into_iter().collect())
                    .with_alert(views::SLOT_TAKEN_ALERT)
            }
            Err(error) => CallbackReply::default().with_alert(failure_text(error, ctx)),
        }
    }

    /// Clears the cell, marks the listing message deleted and sends a fresh listing.
    pub(crate) async fn cancel(
        &self,
        cell: CellAddress,
        profile: &UserProfile,
        target: MessageRef,
        ctx: &EventContext,
    ) -> CallbackReply {
        if let Err(error) = self.grid.release(cell).await {
            let text = failure_text(error, ctx);
            return CallbackReply::new(vec![Outbound::send(target.chat_id, views::failure(text))]);
        }

        info!(
            event_name = "booking.cancelled",
            correlation_id = %ctx.correlation_id,
            cell = %cell,
            "booking cancelled"
        );
        CallbackReply::new(vec![
            Outbound::edit(target, views::slot_deleted()),
            self.listing(target.chat_id, profile, ctx).await,
        ])
    }

    /// `add_slot` and `back_days`: replace the current message with a new day selection.
    pub(crate) async fn restart_day_selection(
        &self,
        target: MessageRef,
        ctx: &EventContext,
    ) -> CallbackReply {
        CallbackReply::new(vec![
            Outbound::delete(target),
            self.day_selection(target.chat_id, ctx).await,
        ])
    }
}
